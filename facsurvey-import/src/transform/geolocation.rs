//! Geolocation parsing
//!
//! Accepted shapes:
//! - `"lat lon [altitude accuracy]"` (ODK geopoint string; commas also accepted)
//! - `{"type": "Point", "coordinates": [lon, lat]}` (GeoJSON order)
//! - `[lat, lon]` (the `_geolocation` array form)
//!
//! Anything else, including out-of-range values, yields `None`.

use serde_json::Value;

use super::fields::value_f64;
use crate::models::GeoPoint;

pub fn parse_geolocation(value: &Value) -> Option<GeoPoint> {
    match value {
        Value::String(s) => parse_geopoint_string(s),
        Value::Object(map) => {
            let is_point = map
                .get("type")
                .and_then(Value::as_str)
                .map_or(true, |t| t.eq_ignore_ascii_case("point"));
            if !is_point {
                return None;
            }
            let coords = map.get("coordinates")?.as_array()?;
            let (lon, lat) = pair(coords)?;
            GeoPoint::new(lat, lon)
        }
        Value::Array(items) => {
            let (lat, lon) = pair(items)?;
            GeoPoint::new(lat, lon)
        }
        _ => None,
    }
}

fn parse_geopoint_string(s: &str) -> Option<GeoPoint> {
    let parts: Vec<f64> = s
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;

    // lat lon, optionally followed by altitude and accuracy
    if !(2..=4).contains(&parts.len()) {
        return None;
    }
    GeoPoint::new(parts[0], parts[1])
}

fn pair(items: &[Value]) -> Option<(f64, f64)> {
    match items {
        [a, b, ..] => Some((value_f64(a)?, value_f64(b)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_geopoint_string() {
        let point = parse_geolocation(&json!("-1.2921 36.8219 1661.0 5.0")).unwrap();
        assert_eq!(point.latitude, -1.2921);
        assert_eq!(point.longitude, 36.8219);

        let point = parse_geolocation(&json!("-1.5,36.5")).unwrap();
        assert_eq!(point.to_lon_lat(), [36.5, -1.5]);
    }

    #[test]
    fn test_geojson_point_is_lon_lat() {
        let point = parse_geolocation(&json!({
            "type": "Point",
            "coordinates": [36.8219, -1.2921]
        }))
        .unwrap();
        assert_eq!(point.latitude, -1.2921);
        assert_eq!(point.longitude, 36.8219);
    }

    #[test]
    fn test_geolocation_array_is_lat_lon() {
        let point = parse_geolocation(&json!([-1.2921, 36.8219])).unwrap();
        assert_eq!(point.latitude, -1.2921);
        assert_eq!(point.longitude, 36.8219);
    }

    #[test]
    fn test_invalid_inputs_yield_none() {
        for value in [
            json!(""),
            json!("somewhere near the river"),
            json!("1.0"),
            json!("95.0 10.0"),
            json!("1 2 3 4 5"),
            json!([null, null]),
            json!([1.0]),
            json!({"type": "Polygon", "coordinates": [[0, 0]]}),
            json!({"type": "Point"}),
            json!(12.5),
            json!(null),
        ] {
            assert!(parse_geolocation(&value).is_none(), "{value}");
        }
    }
}
