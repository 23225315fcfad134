//! Structured survey content embedded in every `Survey` row
//!
//! Serialized as camelCase JSON into `surveys.facility_data`; downstream
//! sizing calculators read this shape directly.

use serde::{Deserialize, Serialize};

use super::enums::{
    ElectricityAvailability, ElectricityReliability, ElectricitySource, Ownership, TimeOfDay,
    TransportationAccess,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityData {
    pub productive_sectors: Vec<String>,
    pub subsector_activities: Vec<String>,
    pub ownership: Ownership,
    pub catchment_population: i64,
    pub core_services: Vec<String>,
    pub electricity_source: ElectricitySource,
    pub electricity_reliability: ElectricityReliability,
    pub electricity_availability: ElectricityAvailability,
    pub operational_hours: OperationalHours,
    pub operational_days: i64,
    pub critical_needs: Vec<String>,
    pub staff: Staff,
    pub buildings: Buildings,
    pub departments: Vec<String>,
    pub equipment: Vec<EquipmentItem>,
    /// How `equipment` was obtained; synthesized lists carry no per-item load data
    pub equipment_source: EquipmentSource,
    pub infrastructure: Infrastructure,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationalHours {
    pub day: f64,
    pub night: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub support: i64,
    pub technical: i64,
    pub night_coverage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buildings {
    pub total: i64,
    pub departments_with_wiring: i64,
    pub rooms: i64,
    pub rooms_with_connection: i64,
}

/// One appliance line from the equipment repeat group
///
/// Values are stored exactly as submitted: load and sizing calculations
/// depend on them, so the transformer never rescales or clamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentItem {
    pub name: String,
    pub power_rating_watts: f64,
    /// Expected range: >= 0
    pub quantity: i64,
    /// Expected range: 0-24
    pub hours_per_day: f64,
    /// Expected range: 0-24
    pub hours_per_night: f64,
    pub time_of_day: TimeOfDay,
    /// Expected range: 0-7
    pub weekly_usage_days: i64,
    pub category: String,
    pub critical: bool,
}

impl EquipmentItem {
    /// Placeholder item for a type known only from aggregate counts
    pub fn synthesized(name: String, quantity: i64) -> Self {
        Self {
            name,
            power_rating_watts: 0.0,
            quantity,
            hours_per_day: 0.0,
            hours_per_night: 0.0,
            time_of_day: TimeOfDay::Unknown,
            weekly_usage_days: 0,
            category: String::new(),
            critical: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSource {
    /// Native repeat group, one structured element per item
    RepeatGroup,
    /// Legacy parallel "types"/"count" strings; items are synthesized
    AggregateCounts,
    /// No equipment answered
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Infrastructure {
    pub water_access: bool,
    pub national_grid: bool,
    pub transportation_access: TransportationAccess,
    pub communication: String,
    pub digital_connectivity: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    /// GeoJSON order: `[longitude, latitude]`
    pub coordinates: Option<[f64; 2]>,
    pub address: String,
    pub region: String,
    pub country: String,
}
