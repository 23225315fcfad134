//! Equipment extraction
//!
//! Two source shapes exist. Current forms answer a repeat group, one object
//! per appliance; every item passes through with its values untouched. Older
//! forms only had parallel "types" and "count" strings; those produce
//! synthesized items carrying a name and a quantity, tagged
//! `EquipmentSource::AggregateCounts` so consumers can tell them apart.

use serde_json::Value;

use super::enum_mapping::CanonicalEnum;
use super::fields::{value_i64, value_list, value_text};
use super::raw_record::RawRecord;
use crate::models::{EquipmentItem, EquipmentSource, TimeOfDay};

pub const REPEAT_GROUP_KEYS: &[&str] = &[
    "facility_equipment",
    "equipment",
    "equipment_list",
    "equipment_repeat",
];
pub const LEGACY_TYPE_KEYS: &[&str] = &["facility_equipment_types", "equipment_types"];
pub const LEGACY_COUNT_KEYS: &[&str] = &["facility_equipment_count", "equipment_count"];

const ITEM_NAME: &[&str] = &["equipment_name", "name", "equipment_type", "appliance", "item", "type"];
const ITEM_POWER: &[&str] = &[
    "power_rating_watts",
    "power_rating",
    "power_watts",
    "wattage",
    "watts",
    "power",
];
const ITEM_QUANTITY: &[&str] = &["quantity", "equipment_quantity", "qty", "count", "number"];
const ITEM_HOURS_DAY: &[&str] = &["hours_per_day", "hours_day", "daily_hours", "usage_hours_day"];
const ITEM_HOURS_NIGHT: &[&str] = &[
    "hours_per_night",
    "hours_night",
    "nightly_hours",
    "usage_hours_night",
];
const ITEM_TIME_OF_DAY: &[&str] = &["time_of_day", "usage_time", "time_used"];
const ITEM_WEEKLY_DAYS: &[&str] = &["weekly_usage_days", "days_per_week", "weekly_days", "usage_days"];
const ITEM_CATEGORY: &[&str] = &["category", "equipment_category"];
const ITEM_CRITICAL: &[&str] = &["critical", "is_critical", "essential"];

/// Detect the equipment shape present in `record` and extract the list
pub fn extract_equipment(record: &RawRecord<'_>) -> (Vec<EquipmentItem>, EquipmentSource) {
    if let Some(items) = repeat_group(record) {
        let equipment = items.iter().map(item_from_repeat).collect();
        return (equipment, EquipmentSource::RepeatGroup);
    }

    let types = record.list(LEGACY_TYPE_KEYS);
    if types.is_empty() {
        return (Vec::new(), EquipmentSource::None);
    }

    let counts: Vec<i64> = record
        .list(LEGACY_COUNT_KEYS)
        .iter()
        .map(|c| value_i64(&Value::String(c.clone())).unwrap_or(0))
        .collect();

    (
        synthesize_from_counts(&types, &counts),
        EquipmentSource::AggregateCounts,
    )
}

/// Non-empty repeat-group array; a JSON-encoded string array is accepted too
fn repeat_group(record: &RawRecord<'_>) -> Option<Vec<Value>> {
    REPEAT_GROUP_KEYS.iter().find_map(|key| {
        let items = match record.get(key)? {
            Value::Array(items) => items.clone(),
            Value::String(s) if s.trim_start().starts_with('[') => {
                serde_json::from_str::<Vec<Value>>(s).ok()?
            }
            _ => return None,
        };
        (!items.is_empty()).then_some(items)
    })
}

fn item_from_repeat(value: &Value) -> EquipmentItem {
    let Some(map) = value.as_object() else {
        // Bare string element: the name is all we know
        return EquipmentItem::synthesized(value_text(value).unwrap_or_default(), 1);
    };

    let item = RawRecord::new(map);
    EquipmentItem {
        name: item.text(ITEM_NAME).unwrap_or_default(),
        power_rating_watts: item.number(ITEM_POWER),
        quantity: item.int(ITEM_QUANTITY),
        hours_per_day: item.number(ITEM_HOURS_DAY),
        hours_per_night: item.number(ITEM_HOURS_NIGHT),
        time_of_day: TimeOfDay::from_label(item.text(ITEM_TIME_OF_DAY).as_deref()),
        weekly_usage_days: item.int(ITEM_WEEKLY_DAYS),
        category: item.text(ITEM_CATEGORY).unwrap_or_default(),
        critical: item.flag(ITEM_CRITICAL),
    }
}

/// One item per distinct type (case-insensitive, first spelling kept)
///
/// - no counts: quantity 1 each
/// - one count per raw type: counts summed per distinct type
/// - otherwise the first count is an aggregate total split evenly, the
///   remainder going one each to the first types
pub fn synthesize_from_counts(types: &[String], counts: &[i64]) -> Vec<EquipmentItem> {
    let mut distinct: Vec<(String, String)> = Vec::new();
    let mut per_type_totals: Vec<i64> = Vec::new();

    for (index, name) in types.iter().enumerate() {
        let key = name.to_lowercase();
        let position = match distinct.iter().position(|(k, _)| *k == key) {
            Some(position) => position,
            None => {
                distinct.push((key, name.clone()));
                per_type_totals.push(0);
                distinct.len() - 1
            }
        };
        if counts.len() == types.len() {
            // Repeated huge answers saturate instead of overflowing
            per_type_totals[position] =
                per_type_totals[position].saturating_add(counts[index].max(0));
        }
    }

    let quantities: Vec<i64> = if counts.is_empty() {
        vec![1; distinct.len()]
    } else if counts.len() == types.len() {
        per_type_totals
    } else {
        let total = counts[0].max(0);
        let n = distinct.len() as i64;
        let (base, remainder) = (total / n, total % n);
        (0..n).map(|i| base + i64::from(i < remainder)).collect()
    };

    distinct
        .into_iter()
        .zip(quantities)
        .map(|((_, name), quantity)| EquipmentItem::synthesized(name, quantity))
        .collect()
}

/// Names from a department repeat group or a comma-separated answer
pub fn extract_departments(record: &RawRecord<'_>, keys: &[&str]) -> Vec<String> {
    const NAME_KEYS: &[&str] = &["department_name", "department", "name"];

    keys.iter()
        .filter_map(|key| record.get(key))
        .map(|value| match value {
            Value::Array(items) if items.iter().any(Value::is_object) => items
                .iter()
                .filter_map(|item| match item.as_object() {
                    Some(map) => RawRecord::new(map).text(NAME_KEYS),
                    None => value_text(item),
                })
                .collect(),
            other => value_list(other),
        })
        .find(|names: &Vec<String>| !names.is_empty())
        .unwrap_or_default()
}
