//! Canonical enumerations of the facility survey domain
//!
//! Every enum has an explicit fallback variant (`Other` or `Unknown`) so that
//! any free-text answer from the source form maps into the closed set. The
//! synonym tables live in [`crate::transform::enum_mapping`].

use serde::{Deserialize, Serialize};

/// Primary electricity source of a facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectricitySource {
    Grid,
    Solar,
    DieselGenerator,
    Hybrid,
    Battery,
    None,
    Other,
}

/// How dependable the facility's supply is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectricityReliability {
    Reliable,
    MostlyReliable,
    Intermittent,
    Unreliable,
    Unknown,
}

/// Hours of the day when electricity is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectricityAvailability {
    FullDay,
    DaytimeOnly,
    FewHours,
    None,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    Public,
    Private,
    Community,
    Ngo,
    FaithBased,
    Other,
}

/// Road/transport access to the facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportationAccess {
    PavedRoad,
    UnpavedRoad,
    SeasonalRoad,
    Footpath,
    Waterway,
    None,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityType {
    Healthcare,
    Education,
    Community,
    Agriculture,
    Commercial,
    Other,
}

/// Part of the day an equipment item is mostly used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
    Unknown,
}

impl FacilityType {
    /// Column value stored in `facilities.facility_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityType::Healthcare => "healthcare",
            FacilityType::Education => "education",
            FacilityType::Community => "community",
            FacilityType::Agriculture => "agriculture",
            FacilityType::Commercial => "commercial",
            FacilityType::Other => "other",
        }
    }

    /// Inverse of [`FacilityType::as_str`]; unknown column values read as `Other`
    pub fn from_db(value: &str) -> Self {
        match value {
            "healthcare" => FacilityType::Healthcare,
            "education" => FacilityType::Education,
            "community" => FacilityType::Community,
            "agriculture" => FacilityType::Agriculture,
            "commercial" => FacilityType::Commercial,
            _ => FacilityType::Other,
        }
    }
}
