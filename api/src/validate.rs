use crate::db::Param;
use crate::rest::ApiError;
use crate::serialize::parse_read_time;
use crate::{sensors, temperatures};
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{header::CONTENT_TYPE, request::Parts, HeaderMap},
};
use serde_json::{Map, Value};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

const READ_TIME_HINT: &str = "read_time must be ISO-like (e.g., '2025-09-24 13:05:00')";

/// JSON object body of a write request.
///
/// Rejects with 415 unless the request declares a JSON content type. A body
/// that is empty, malformed, or not an object is treated as `{}` so that the
/// field-presence check reports what is missing.
#[derive(Debug, Default)]
pub struct JsonBody(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_json_content_type(req.headers()) {
            return Err(ApiError::UnsupportedMediaType(
                "Content-Type must be application/json".to_string(),
            ));
        }

        let body = match Bytes::from_request(req, state).await {
            Ok(bytes) => bytes,
            Err(_) => return Ok(Self::default()),
        };

        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            _ => Ok(Self::default()),
        }
    }
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Non-negative integer id taken from the last path segment.
///
/// Non-digit segments are treated as an unknown route. A digit-only id too
/// large for `i64` cannot name a stored row, so it gets the resource's own 404.
#[derive(Debug, Clone, Copy)]
pub struct RouteId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for RouteId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::route_not_found())?;

        let Some((name, raw)) = params.into_iter().next_back() else {
            return Err(ApiError::route_not_found());
        };

        if !is_route_id(&raw) {
            return Err(ApiError::route_not_found());
        }

        raw.parse()
            .map(RouteId)
            .map_err(|_| unknown_id(&name, &raw))
    }
}

fn is_route_id(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

fn unknown_id(param: &str, raw: &str) -> ApiError {
    match param {
        "sensor_id" => sensors::not_found(raw),
        "log_id" => temperatures::not_found(raw),
        _ => ApiError::route_not_found(),
    }
}

/// Names from `required` absent from `body`, in `required` order.
pub fn missing_fields<'a>(required: &[&'a str], body: &Map<String, Value>) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|field| !body.contains_key(*field))
        .collect()
}

pub fn require_fields(required: &[&str], body: &Map<String, Value>) -> Result<(), ApiError> {
    let missing = missing_fields(required, body);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Missing fields: {}",
            missing.join(", ")
        )))
    }
}

/// Integer field. Accepts integers, finite floats (truncated), integer
/// strings and booleans (as 0 or 1).
pub fn int_field(field: &str, value: &Value) -> Result<i64, ApiError> {
    let parsed = match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| ApiError::BadRequest(format!("{field} must be an integer")))
}

/// Float field. Accepts numbers, numeric strings and booleans; rejects NaN
/// and infinities.
pub fn float_field(field: &str, value: &Value) -> Result<f64, ApiError> {
    let parsed = match value {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|f| f.is_finite())
        .ok_or_else(|| ApiError::BadRequest(format!("{field} must be a number")))
}

/// Text field. Numbers and booleans are stored in their JSON text form.
pub fn text_field(field: &str, value: &Value) -> Result<String, ApiError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) | Value::Bool(_) => Ok(value.to_string()),
        _ => Err(ApiError::BadRequest(format!("{field} must be a string"))),
    }
}

pub fn read_time_field(value: &Value) -> Result<Param, ApiError> {
    value
        .as_str()
        .and_then(parse_read_time)
        .map(Param::Timestamp)
        .ok_or_else(|| ApiError::BadRequest(READ_TIME_HINT.to_string()))
}

/// `read_time` as supplied on create. Absent or falsy values (null, false,
/// zero, empty string, array or object) fall back to the current UTC time.
pub fn optional_read_time(body: &Map<String, Value>) -> Result<Param, ApiError> {
    match body.get("read_time") {
        Some(value) if !is_falsy(value) => read_time_field(value),
        _ => Ok(Param::Timestamp(crate::serialize::utc_now())),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// First value of `key` in a decoded query string. Later repeats are ignored.
pub fn query_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Resolves `limit` and `offset` query parameters. `limit` is clamped to
/// [`MAX_LIMIT`]; negative values pass through untouched.
pub fn pagination(limit: Option<&str>, offset: Option<&str>) -> Result<(i64, i64), ApiError> {
    let parse = |raw: Option<&str>, default: i64| match raw {
        None => Ok(default),
        Some(s) => s.trim().parse::<i64>(),
    };

    match (parse(limit, DEFAULT_LIMIT), parse(offset, 0)) {
        (Ok(limit), Ok(offset)) => Ok((limit.min(MAX_LIMIT), offset)),
        _ => Err(ApiError::BadRequest(
            "limit and offset must be integers".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json_content_type(&headers("application/json")));
        assert!(is_json_content_type(&headers("application/json; charset=utf-8")));
        assert!(is_json_content_type(&headers("application/vnd.api+json")));
        assert!(!is_json_content_type(&headers("text/plain")));
        assert!(!is_json_content_type(&HeaderMap::new()));
    }

    #[test]
    fn test_missing_fields_keep_required_order() {
        let data = body(json!({ "device_id": "d-1" }));
        let missing = missing_fields(
            &["sensor_id", "mac_addr", "device_id", "device_location"],
            &data,
        );
        assert_eq!(missing, vec!["sensor_id", "mac_addr", "device_location"]);
    }

    #[test]
    fn test_require_fields_message() {
        let err = require_fields(&["sensor_id", "pressure"], &Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "Missing fields: sensor_id, pressure");
    }

    #[test]
    fn test_null_counts_as_present() {
        let data = body(json!({ "sensor_id": null }));
        assert!(require_fields(&["sensor_id"], &data).is_ok());
    }

    #[test]
    fn test_int_field_coercions() {
        assert_eq!(int_field("sensor_id", &json!(5)).unwrap(), 5);
        assert_eq!(int_field("sensor_id", &json!(5.9)).unwrap(), 5);
        assert_eq!(int_field("sensor_id", &json!(" 12 ")).unwrap(), 12);
        assert!(int_field("sensor_id", &json!("5.0")).is_err());
        assert_eq!(int_field("sensor_id", &json!(true)).unwrap(), 1);
        assert_eq!(int_field("sensor_id", &json!(false)).unwrap(), 0);
        assert_eq!(
            int_field("sensor_id", &json!(null)).unwrap_err().to_string(),
            "sensor_id must be an integer"
        );
    }

    #[test]
    fn test_float_field_coercions() {
        assert_eq!(float_field("humidity", &json!(44)).unwrap(), 44.0);
        assert_eq!(float_field("humidity", &json!("44.5")).unwrap(), 44.5);
        assert_eq!(float_field("humidity", &json!(true)).unwrap(), 1.0);
        assert!(float_field("humidity", &json!("NaN")).is_err());
        assert_eq!(
            float_field("humidity", &json!([1])).unwrap_err().to_string(),
            "humidity must be a number"
        );
    }

    #[test]
    fn test_text_field_coercions() {
        assert_eq!(text_field("mac_addr", &json!("aa:bb")).unwrap(), "aa:bb");
        assert_eq!(text_field("device_id", &json!(42)).unwrap(), "42");
        assert!(text_field("device_location", &json!(null)).is_err());
    }

    #[test]
    fn test_optional_read_time_defaults_to_now() {
        let before = crate::serialize::utc_now();
        let Param::Timestamp(ts) = optional_read_time(&Map::new()).unwrap() else {
            panic!("expected timestamp");
        };
        assert!(ts >= before);
    }

    #[test]
    fn test_falsy_read_time_defaults_to_now() {
        let before = crate::serialize::utc_now();
        for value in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            let data = body(json!({ "read_time": value }));
            let Param::Timestamp(ts) = optional_read_time(&data).unwrap() else {
                panic!("expected timestamp");
            };
            assert!(ts >= before);
        }
    }

    #[test]
    fn test_query_value_takes_first() {
        let params = vec![
            ("limit".to_string(), "5".to_string()),
            ("offset".to_string(), "2".to_string()),
            ("limit".to_string(), "6".to_string()),
        ];
        assert_eq!(query_value(&params, "limit"), Some("5"));
        assert_eq!(query_value(&params, "offset"), Some("2"));
        assert_eq!(query_value(&params, "sort"), None);
    }

    #[test]
    fn test_read_time_rejects_non_strings() {
        let data = body(json!({ "read_time": 1727183100 }));
        assert_eq!(
            optional_read_time(&data).unwrap_err().to_string(),
            READ_TIME_HINT
        );
    }

    #[test]
    fn test_pagination_defaults_and_clamp() {
        assert_eq!(pagination(None, None).unwrap(), (100, 0));
        assert_eq!(pagination(Some("5000"), Some("20")).unwrap(), (1000, 20));
        assert_eq!(pagination(Some("-1"), None).unwrap(), (-1, 0));
        assert!(pagination(Some("ten"), None).is_err());
        assert!(pagination(None, Some("")).is_err());
    }

    #[test]
    fn test_route_ids() {
        assert!(is_route_id("42"));
        assert!(is_route_id("99999999999999999999"));
        assert!(!is_route_id("-1"));
        assert!(!is_route_id("4a"));
        assert!(!is_route_id(""));
    }

    #[test]
    fn test_oversized_id_names_the_resource() {
        let raw = "99999999999999999999";
        assert_eq!(
            unknown_id("sensor_id", raw).to_string(),
            "Sensor 99999999999999999999 not found"
        );
        assert_eq!(
            unknown_id("log_id", raw).to_string(),
            "log 99999999999999999999 not found"
        );
        assert_eq!(unknown_id("other", raw).to_string(), "Resource not found");
    }
}
