use chrono::NaiveDateTime;
use serde::Serialize;

/// Column list for `sensors`; keys are widened so either INTEGER or BIGINT
/// schemas decode into `i64`.
pub const SENSOR_COLUMNS: &str =
    "sensor_id::int8 AS sensor_id, mac_addr, device_id, device_location";

/// Column list for `temperature_log`; measurements are cast to `float8` so
/// NUMERIC columns come back as JSON numbers.
pub const TEMPERATURE_LOG_COLUMNS: &str = "log_id::int8 AS log_id, read_time, \
     sensor_id::int8 AS sensor_id, temperature_f::float8 AS temperature_f, \
     humidity::float8 AS humidity, pressure::float8 AS pressure";

/// Registered sensor
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Sensor {
    pub sensor_id: i64,
    pub mac_addr: String,
    pub device_id: String,
    pub device_location: String,
}

/// One temperature reading
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TemperatureLog {
    pub log_id: i64,
    #[serde(serialize_with = "crate::serialize::timestamp")]
    pub read_time: NaiveDateTime,
    pub sensor_id: i64,
    pub temperature_f: f64,
    pub humidity: f64,
    pub pressure: f64,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// Response wrapper for sensor writes
#[derive(Debug, Serialize)]
pub struct SensorResponse {
    pub message: &'static str,
    pub sensor: Option<Sensor>,
}

/// Response wrapper for temperature log writes
#[derive(Debug, Serialize)]
pub struct TemperatureLogResponse {
    pub message: &'static str,
    pub log: Option<TemperatureLog>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
    pub log_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_temperature_log_json_shape() {
        let log = TemperatureLog {
            log_id: 7,
            read_time: NaiveDateTime::parse_from_str("2025-09-24 13:05:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            sensor_id: 3,
            temperature_f: 72.5,
            humidity: 44.3,
            pressure: 995.2,
        };

        assert_eq!(
            serde_json::to_value(&log).unwrap(),
            json!({
                "log_id": 7,
                "read_time": "2025-09-24 13:05:00",
                "sensor_id": 3,
                "temperature_f": 72.5,
                "humidity": 44.3,
                "pressure": 995.2,
            })
        );
    }

    #[test]
    fn test_missing_read_back_serializes_as_null() {
        let response = SensorResponse {
            message: "sensor updated",
            sensor: None,
        };

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "message": "sensor updated", "sensor": null })
        );
    }
}
