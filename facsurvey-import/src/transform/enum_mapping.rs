//! Free-text to canonical enum mapping
//!
//! Each enum carries a static synonym table. Input is normalized (lowercase,
//! `_` `-` `/` treated as spaces, whitespace collapsed) and matched in two
//! steps: an exact synonym, then the longest synonym that is a whole-word
//! prefix of the input ("solar panel on roof" → solar). No match, empty
//! input and absent input all give the enum's fallback variant.

use crate::models::{
    ElectricityAvailability, ElectricityReliability, ElectricitySource, FacilityType, Ownership,
    TimeOfDay, TransportationAccess,
};

/// A closed enum reachable from arbitrary survey text
pub trait CanonicalEnum: Copy + 'static {
    /// Normalized synonym → variant
    const SYNONYMS: &'static [(&'static str, Self)];

    /// Variant for unrecognized, empty or absent input
    const FALLBACK: Self;

    fn from_label(label: Option<&str>) -> Self {
        label
            .map(normalize_label)
            .and_then(|label| lookup(Self::SYNONYMS, &label))
            .unwrap_or(Self::FALLBACK)
    }
}

pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .replace(['_', '-', '/'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn lookup<T: Copy>(table: &[(&str, T)], label: &str) -> Option<T> {
    if label.is_empty() {
        return None;
    }

    if let Some((_, value)) = table.iter().find(|(synonym, _)| *synonym == label) {
        return Some(*value);
    }

    table
        .iter()
        .filter(|(synonym, _)| {
            label
                .strip_prefix(synonym)
                .is_some_and(|rest| rest.starts_with(' '))
        })
        .max_by_key(|(synonym, _)| synonym.len())
        .map(|(_, value)| *value)
}

impl CanonicalEnum for ElectricitySource {
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("grid", Self::Grid),
        ("national grid", Self::Grid),
        ("grid connection", Self::Grid),
        ("grid connected", Self::Grid),
        ("main grid", Self::Grid),
        ("mains", Self::Grid),
        ("utility", Self::Grid),
        ("public grid", Self::Grid),
        ("electricity grid", Self::Grid),
        ("solar", Self::Solar),
        ("solar panel", Self::Solar),
        ("solar panels", Self::Solar),
        ("solar pv", Self::Solar),
        ("pv", Self::Solar),
        ("photovoltaic", Self::Solar),
        ("solar home system", Self::Solar),
        ("diesel generator", Self::DieselGenerator),
        ("diesel", Self::DieselGenerator),
        ("generator", Self::DieselGenerator),
        ("genset", Self::DieselGenerator),
        ("petrol generator", Self::DieselGenerator),
        ("fuel generator", Self::DieselGenerator),
        ("hybrid", Self::Hybrid),
        ("mixed", Self::Hybrid),
        ("combination", Self::Hybrid),
        ("solar diesel hybrid", Self::Hybrid),
        ("grid and solar", Self::Hybrid),
        ("battery", Self::Battery),
        ("batteries", Self::Battery),
        ("battery bank", Self::Battery),
        ("inverter", Self::Battery),
        ("none", Self::None),
        ("no electricity", Self::None),
        ("no power", Self::None),
        ("not connected", Self::None),
        ("other", Self::Other),
    ];
    const FALLBACK: Self = Self::Other;
}

impl CanonicalEnum for ElectricityReliability {
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("reliable", Self::Reliable),
        ("very reliable", Self::Reliable),
        ("always available", Self::Reliable),
        ("stable", Self::Reliable),
        ("mostly reliable", Self::MostlyReliable),
        ("fairly reliable", Self::MostlyReliable),
        ("somewhat reliable", Self::MostlyReliable),
        ("usually reliable", Self::MostlyReliable),
        ("occasional outages", Self::MostlyReliable),
        ("moderate", Self::MostlyReliable),
        ("intermittent", Self::Intermittent),
        ("frequent outages", Self::Intermittent),
        ("irregular", Self::Intermittent),
        ("fluctuating", Self::Intermittent),
        ("sometimes", Self::Intermittent),
        ("unreliable", Self::Unreliable),
        ("very unreliable", Self::Unreliable),
        ("not reliable", Self::Unreliable),
        ("poor", Self::Unreliable),
        ("rarely available", Self::Unreliable),
        ("unknown", Self::Unknown),
    ];
    const FALLBACK: Self = Self::Unknown;
}

impl CanonicalEnum for ElectricityAvailability {
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("full day", Self::FullDay),
        ("24 hours", Self::FullDay),
        ("24hrs", Self::FullDay),
        ("24 hrs", Self::FullDay),
        ("24h", Self::FullDay),
        ("24 7", Self::FullDay),
        ("all day", Self::FullDay),
        ("always", Self::FullDay),
        ("daytime only", Self::DaytimeOnly),
        ("daytime", Self::DaytimeOnly),
        ("day time", Self::DaytimeOnly),
        ("day only", Self::DaytimeOnly),
        ("daylight hours", Self::DaytimeOnly),
        ("few hours", Self::FewHours),
        ("a few hours", Self::FewHours),
        ("some hours", Self::FewHours),
        ("limited hours", Self::FewHours),
        ("partial", Self::FewHours),
        ("none", Self::None),
        ("never", Self::None),
        ("no electricity", Self::None),
        ("not available", Self::None),
        ("unknown", Self::Unknown),
    ];
    const FALLBACK: Self = Self::Unknown;
}

impl CanonicalEnum for Ownership {
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("public", Self::Public),
        ("government", Self::Public),
        ("govt", Self::Public),
        ("state", Self::Public),
        ("county", Self::Public),
        ("ministry of health", Self::Public),
        ("moh", Self::Public),
        ("private", Self::Private),
        ("private for profit", Self::Private),
        ("for profit", Self::Private),
        ("privately owned", Self::Private),
        ("community", Self::Community),
        ("community owned", Self::Community),
        ("community based", Self::Community),
        ("cbo", Self::Community),
        ("ngo", Self::Ngo),
        ("non governmental", Self::Ngo),
        ("non governmental organization", Self::Ngo),
        ("non profit", Self::Ngo),
        ("nonprofit", Self::Ngo),
        ("faith based", Self::FaithBased),
        ("faith based organization", Self::FaithBased),
        ("fbo", Self::FaithBased),
        ("church", Self::FaithBased),
        ("mission", Self::FaithBased),
        ("religious", Self::FaithBased),
        ("mosque", Self::FaithBased),
        ("other", Self::Other),
    ];
    const FALLBACK: Self = Self::Other;
}

impl CanonicalEnum for TransportationAccess {
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("paved road", Self::PavedRoad),
        ("paved", Self::PavedRoad),
        ("tarmac", Self::PavedRoad),
        ("tarmac road", Self::PavedRoad),
        ("asphalt", Self::PavedRoad),
        ("unpaved road", Self::UnpavedRoad),
        ("unpaved", Self::UnpavedRoad),
        ("murram", Self::UnpavedRoad),
        ("gravel", Self::UnpavedRoad),
        ("gravel road", Self::UnpavedRoad),
        ("dirt road", Self::UnpavedRoad),
        ("earth road", Self::UnpavedRoad),
        ("feeder road", Self::UnpavedRoad),
        ("seasonal road", Self::SeasonalRoad),
        ("seasonal", Self::SeasonalRoad),
        ("footpath", Self::Footpath),
        ("foot path", Self::Footpath),
        ("path", Self::Footpath),
        ("on foot", Self::Footpath),
        ("walking", Self::Footpath),
        ("waterway", Self::Waterway),
        ("boat", Self::Waterway),
        ("river", Self::Waterway),
        ("canoe", Self::Waterway),
        ("none", Self::None),
        ("no access", Self::None),
        ("other", Self::Other),
    ];
    const FALLBACK: Self = Self::Other;
}

impl CanonicalEnum for FacilityType {
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("healthcare", Self::Healthcare),
        ("health care", Self::Healthcare),
        ("health", Self::Healthcare),
        ("health facility", Self::Healthcare),
        ("health centre", Self::Healthcare),
        ("health center", Self::Healthcare),
        ("health post", Self::Healthcare),
        ("clinic", Self::Healthcare),
        ("hospital", Self::Healthcare),
        ("dispensary", Self::Healthcare),
        ("medical", Self::Healthcare),
        ("education", Self::Education),
        ("school", Self::Education),
        ("primary school", Self::Education),
        ("secondary school", Self::Education),
        ("college", Self::Education),
        ("university", Self::Education),
        ("community", Self::Community),
        ("community centre", Self::Community),
        ("community center", Self::Community),
        ("community hall", Self::Community),
        ("agriculture", Self::Agriculture),
        ("agricultural", Self::Agriculture),
        ("farm", Self::Agriculture),
        ("farming", Self::Agriculture),
        ("irrigation", Self::Agriculture),
        ("agro processing", Self::Agriculture),
        ("milling", Self::Agriculture),
        ("commercial", Self::Commercial),
        ("business", Self::Commercial),
        ("shop", Self::Commercial),
        ("market", Self::Commercial),
        ("retail", Self::Commercial),
        ("enterprise", Self::Commercial),
        ("other", Self::Other),
    ];
    const FALLBACK: Self = Self::Other;
}

impl CanonicalEnum for TimeOfDay {
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("morning", Self::Morning),
        ("early morning", Self::Morning),
        ("am", Self::Morning),
        ("afternoon", Self::Afternoon),
        ("midday", Self::Afternoon),
        ("noon", Self::Afternoon),
        ("evening", Self::Evening),
        ("dusk", Self::Evening),
        ("night", Self::Night),
        ("nighttime", Self::Night),
        ("night time", Self::Night),
        ("overnight", Self::Night),
        ("unknown", Self::Unknown),
    ];
    const FALLBACK: Self = Self::Unknown;
}
