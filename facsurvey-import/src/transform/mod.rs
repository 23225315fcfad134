//! Field transformer: one raw submission → survey draft + facility hint
//!
//! Pure and synchronous. Every answer is optional-with-default; only a
//! payload that is not an object, or lacks an external id or a facility name,
//! is rejected.

pub mod enum_mapping;
pub mod equipment;
pub mod fields;
pub mod geolocation;
pub mod raw_record;

use serde_json::Value;

use crate::error::TransformError;
use crate::models::{
    Buildings, ElectricityAvailability, ElectricityReliability, ElectricitySource, FacilityData,
    FacilityHint, FacilityType, Infrastructure, Location, OperationalHours, Ownership, Staff,
    SurveyDraft, TransformedSurvey, TransportationAccess,
};
use enum_mapping::CanonicalEnum;
use equipment::{extract_departments, extract_equipment};
use raw_record::RawRecord;

pub const EXTERNAL_ID_KEYS: &[&str] = &["_id", "_uuid", "instanceid"];
pub const FACILITY_NAME_KEYS: &[&str] = &[
    "facility_name",
    "name_of_facility",
    "facility",
    "institution_name",
];
pub const FACILITY_TYPE_KEYS: &[&str] = &["facility_type", "type_of_facility", "facility_category"];
pub const COLLECTION_DATE_KEYS: &[&str] =
    &["collection_date", "today", "_submission_time", "end", "start"];
pub const RESPONDENT_KEYS: &[&str] = &["respondent_id", "respondent", "_submitted_by", "username"];
pub const GEOLOCATION_KEYS: &[&str] = &[
    "_geolocation",
    "geolocation",
    "gps",
    "location_gps",
    "facility_location",
];

const PRODUCTIVE_SECTORS: &[&str] = &["productive_sectors", "productive_sector", "sectors"];
const SUBSECTOR_ACTIVITIES: &[&str] = &["subsector_activities", "subsector_activity", "subsectors"];
const OWNERSHIP: &[&str] = &["ownership", "facility_ownership", "owner_type"];
const CATCHMENT_POPULATION: &[&str] = &["catchment_population", "population_served", "catchment"];
const CORE_SERVICES: &[&str] = &["core_services", "services", "main_services"];
const ELECTRICITY_SOURCE: &[&str] = &[
    "electricity_source",
    "main_electricity_source",
    "power_source",
    "energy_source",
];
const ELECTRICITY_RELIABILITY: &[&str] = &["electricity_reliability", "power_reliability", "reliability"];
const ELECTRICITY_AVAILABILITY: &[&str] = &[
    "electricity_availability",
    "power_availability",
    "hours_of_electricity",
];
const HOURS_DAY: &[&str] = &["operational_hours_day", "operating_hours_day", "day_hours"];
const HOURS_NIGHT: &[&str] = &["operational_hours_night", "operating_hours_night", "night_hours"];
const OPERATIONAL_DAYS: &[&str] = &["operational_days", "operating_days", "days_open"];
const CRITICAL_NEEDS: &[&str] = &["critical_needs", "priority_needs", "needs"];
const SUPPORT_STAFF: &[&str] = &["support_staff", "staff_support", "number_support_staff"];
const TECHNICAL_STAFF: &[&str] = &["technical_staff", "staff_technical", "number_technical_staff"];
const NIGHT_COVERAGE: &[&str] = &["night_coverage", "night_staff", "staff_night_coverage"];
const BUILDINGS_TOTAL: &[&str] = &["total_buildings", "buildings_total", "number_of_buildings"];
const DEPARTMENTS_WITH_WIRING: &[&str] = &["departments_with_wiring", "wired_departments"];
const ROOMS: &[&str] = &["total_rooms", "rooms", "number_of_rooms"];
const ROOMS_WITH_CONNECTION: &[&str] = &[
    "rooms_with_connection",
    "rooms_with_electricity",
    "connected_rooms",
];
const DEPARTMENTS: &[&str] = &["departments", "department_list", "facility_departments"];
const WATER_ACCESS: &[&str] = &["water_access", "has_water", "water_available"];
const NATIONAL_GRID: &[&str] = &["national_grid", "grid_connected", "connected_to_grid"];
const TRANSPORTATION_ACCESS: &[&str] = &[
    "transportation_access",
    "transport_access",
    "road_access",
    "access_road",
];
const COMMUNICATION: &[&str] = &["communication", "communication_means", "phone_network"];
const DIGITAL_CONNECTIVITY: &[&str] = &["digital_connectivity", "internet_access", "internet"];
const ADDRESS: &[&str] = &["address", "facility_address", "physical_address"];
const REGION: &[&str] = &["region", "county", "district", "province"];
const COUNTRY: &[&str] = &["country"];

/// Map one raw submission into a survey draft and a facility identity hint
pub fn transform(payload: &Value) -> Result<TransformedSurvey, TransformError> {
    let map = payload.as_object().ok_or(TransformError::NotAnObject)?;
    let record = RawRecord::new(map);

    let external_id = record
        .text(EXTERNAL_ID_KEYS)
        .ok_or(TransformError::MissingExternalId)?;
    let facility_name = record
        .text(FACILITY_NAME_KEYS)
        .ok_or(TransformError::MissingFacilityName)?;

    let facility_type = record
        .text(FACILITY_TYPE_KEYS)
        .map(|label| FacilityType::from_label(Some(&label)));
    let coordinates = record.geolocation(GEOLOCATION_KEYS);

    let (equipment, equipment_source) = extract_equipment(&record);

    let facility_data = FacilityData {
        productive_sectors: record.list(PRODUCTIVE_SECTORS),
        subsector_activities: record.list(SUBSECTOR_ACTIVITIES),
        ownership: Ownership::from_label(record.text(OWNERSHIP).as_deref()),
        catchment_population: record.int(CATCHMENT_POPULATION),
        core_services: record.list(CORE_SERVICES),
        electricity_source: ElectricitySource::from_label(
            record.text(ELECTRICITY_SOURCE).as_deref(),
        ),
        electricity_reliability: ElectricityReliability::from_label(
            record.text(ELECTRICITY_RELIABILITY).as_deref(),
        ),
        electricity_availability: ElectricityAvailability::from_label(
            record.text(ELECTRICITY_AVAILABILITY).as_deref(),
        ),
        operational_hours: OperationalHours {
            day: record.number(HOURS_DAY),
            night: record.number(HOURS_NIGHT),
        },
        operational_days: record.int(OPERATIONAL_DAYS),
        critical_needs: record.list(CRITICAL_NEEDS),
        staff: Staff {
            support: record.int(SUPPORT_STAFF),
            technical: record.int(TECHNICAL_STAFF),
            night_coverage: record.flag(NIGHT_COVERAGE),
        },
        buildings: Buildings {
            total: record.int(BUILDINGS_TOTAL),
            departments_with_wiring: record.int(DEPARTMENTS_WITH_WIRING),
            rooms: record.int(ROOMS),
            rooms_with_connection: record.int(ROOMS_WITH_CONNECTION),
        },
        departments: extract_departments(&record, DEPARTMENTS),
        equipment,
        equipment_source,
        infrastructure: Infrastructure {
            water_access: record.flag(WATER_ACCESS),
            national_grid: record.flag(NATIONAL_GRID),
            transportation_access: TransportationAccess::from_label(
                record.text(TRANSPORTATION_ACCESS).as_deref(),
            ),
            communication: record.text(COMMUNICATION).unwrap_or_default(),
            digital_connectivity: record.text(DIGITAL_CONNECTIVITY).unwrap_or_default(),
        },
        location: Location {
            coordinates: coordinates.map(|point| point.to_lon_lat()),
            address: record.text(ADDRESS).unwrap_or_default(),
            region: record.text(REGION).unwrap_or_default(),
            country: record.text(COUNTRY).unwrap_or_default(),
        },
    };

    Ok(TransformedSurvey {
        survey: SurveyDraft {
            external_id,
            collection_date: record.datetime(COLLECTION_DATE_KEYS),
            respondent_id: record.text(RESPONDENT_KEYS),
            facility_data,
            raw_data: payload.clone(),
        },
        facility: FacilityHint {
            name: facility_name,
            facility_type,
            coordinates,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EquipmentSource, GeoPoint};
    use serde_json::json;

    #[test]
    fn test_legacy_clinic_scenario() {
        let payload = json!({
            "_id": 101,
            "facility_name": "Test Clinic",
            "electricity_source": "Solar panel",
            "facility_equipment_types": "fridge,microscope",
            "facility_equipment_count": "2"
        });

        let out = transform(&payload).unwrap();
        let data = &out.survey.facility_data;
        assert_eq!(out.survey.external_id, "101");
        assert_eq!(out.facility.name, "Test Clinic");
        assert_eq!(data.electricity_source, ElectricitySource::Solar);
        assert_eq!(data.equipment.len(), 2);
        let names: Vec<&str> = data.equipment.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["fridge", "microscope"]);
        assert_eq!(data.equipment_source, EquipmentSource::AggregateCounts);
    }

    #[test]
    fn test_kobo_style_submission() {
        let payload = json!({
            "_id": 7781,
            "_uuid": "3f9d5c1e-8a7b-4c2d-9e0f-1a2b3c4d5e6f",
            "_submission_time": "2024-05-02T08:15:00",
            "_submitted_by": "enumerator_3",
            "_geolocation": [-0.0917, 34.768],
            "group_facility/facility_name": "  Kisumu Health Centre ",
            "group_facility/facility_type": "health_centre",
            "group_facility/ownership": "government",
            "group_facility/catchment_population": "12000",
            "group_facility/core_services": "maternity, outpatient,lab",
            "group_power/electricity_source": "national_grid",
            "group_power/electricity_reliability": "intermittent",
            "group_power/electricity_availability": "few_hours",
            "group_ops/operational_hours_day": "10",
            "group_ops/operational_hours_night": "0",
            "group_ops/operational_days": "6",
            "group_staff/support_staff": "4",
            "group_staff/technical_staff": "2",
            "group_staff/night_coverage": "yes",
            "group_infra/water_access": "no",
            "group_infra/transportation_access": "murram",
            "region": "Kisumu"
        });

        let out = transform(&payload).unwrap();
        let data = &out.survey.facility_data;

        assert_eq!(out.survey.external_id, "7781");
        assert_eq!(out.survey.respondent_id.as_deref(), Some("enumerator_3"));
        assert!(out.survey.collection_date.is_some());
        assert_eq!(out.survey.raw_data, payload);

        assert_eq!(out.facility.name, "Kisumu Health Centre");
        assert_eq!(out.facility.facility_type, Some(FacilityType::Healthcare));
        assert_eq!(out.facility.coordinates, GeoPoint::new(-0.0917, 34.768));

        assert_eq!(data.ownership, Ownership::Public);
        assert_eq!(data.catchment_population, 12000);
        assert_eq!(data.core_services, vec!["maternity", "outpatient", "lab"]);
        assert_eq!(data.electricity_source, ElectricitySource::Grid);
        assert_eq!(data.electricity_reliability, ElectricityReliability::Intermittent);
        assert_eq!(data.electricity_availability, ElectricityAvailability::FewHours);
        assert_eq!(data.operational_hours, OperationalHours { day: 10.0, night: 0.0 });
        assert_eq!(data.operational_days, 6);
        assert_eq!(data.staff, Staff { support: 4, technical: 2, night_coverage: true });
        assert!(!data.infrastructure.water_access);
        assert_eq!(
            data.infrastructure.transportation_access,
            TransportationAccess::UnpavedRoad
        );
        assert_eq!(data.location.coordinates, Some([34.768, -0.0917]));
        assert_eq!(data.location.region, "Kisumu");
        assert_eq!(data.equipment_source, EquipmentSource::None);
    }

    #[test]
    fn test_sparse_submission_gets_defaults() {
        let out = transform(&json!({"_id": "a1", "facility": "Bare Site"})).unwrap();
        let data = &out.survey.facility_data;

        assert_eq!(out.facility.facility_type, None);
        assert_eq!(out.facility.coordinates, None);
        assert!(data.productive_sectors.is_empty());
        assert!(data.critical_needs.is_empty());
        assert_eq!(data.catchment_population, 0);
        assert_eq!(data.electricity_source, ElectricitySource::Other);
        assert_eq!(data.electricity_reliability, ElectricityReliability::Unknown);
        assert_eq!(data.ownership, Ownership::Other);
        assert_eq!(data.infrastructure.transportation_access, TransportationAccess::Other);
        assert!(data.equipment.is_empty());
        assert_eq!(data.location.coordinates, None);
        assert!(out.survey.collection_date.is_none());
        assert!(out.survey.respondent_id.is_none());
    }

    #[test]
    fn test_unrecognized_facility_type_is_other() {
        let out = transform(&json!({
            "_id": "a1",
            "facility_name": "Site",
            "facility_type": "spaceport"
        }))
        .unwrap();
        assert_eq!(out.facility.facility_type, Some(FacilityType::Other));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(transform(&json!([1, 2])), Err(TransformError::NotAnObject));
        assert_eq!(
            transform(&json!({"facility_name": "Clinic"})),
            Err(TransformError::MissingExternalId)
        );
        assert_eq!(
            transform(&json!({"_id": 1, "facility_name": "   "})),
            Err(TransformError::MissingFacilityName)
        );
    }

    #[test]
    fn test_invalid_geolocation_does_not_fail() {
        let out = transform(&json!({
            "_id": 1,
            "facility_name": "Clinic",
            "gps": "not a location"
        }))
        .unwrap();
        assert!(out.facility.coordinates.is_none());
        assert!(out.survey.facility_data.location.coordinates.is_none());
    }
}
