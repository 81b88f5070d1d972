use crate::db::Param;
use crate::model::{Sensor, SensorResponse, SENSOR_COLUMNS};
use crate::rest::{ApiError, AppState};
use crate::validate::{int_field, require_fields, text_field, JsonBody, RouteId};
use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

const REQUIRED: [&str; 4] = ["sensor_id", "mac_addr", "device_id", "device_location"];
const UPDATABLE: [&str; 3] = ["mac_addr", "device_id", "device_location"];

pub(crate) fn not_found(sensor_id: impl std::fmt::Display) -> ApiError {
    ApiError::NotFound(format!("Sensor {sensor_id} not found"))
}

async fn read_back(state: &AppState, sensor_id: i64) -> crate::errors::Result<Option<Sensor>> {
    state
        .db
        .fetch_one(
            &format!("SELECT {SENSOR_COLUMNS} FROM sensors WHERE sensor_id = $1"),
            &[Param::Int(sensor_id)],
        )
        .await
}

/// `GET /api/v1/sensors`
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Sensor>>, ApiError> {
    let sensors = state
        .db
        .fetch_all(
            &format!("SELECT {SENSOR_COLUMNS} FROM sensors ORDER BY sensor_id ASC"),
            &[],
        )
        .await
        .map_err(|e| ApiError::database(e, "list sensors"))?;

    Ok(Json(sensors))
}

/// `GET /api/v1/sensors/:sensor_id`
pub async fn get(
    State(state): State<AppState>,
    RouteId(sensor_id): RouteId,
) -> Result<Json<Sensor>, ApiError> {
    read_back(&state, sensor_id)
        .await
        .map_err(|e| ApiError::database(e, "fetch sensor"))?
        .map(Json)
        .ok_or_else(|| not_found(sensor_id))
}

/// `POST /api/v1/sensors`
pub async fn create(
    State(state): State<AppState>,
    JsonBody(data): JsonBody,
) -> Result<(StatusCode, Json<SensorResponse>), ApiError> {
    require_fields(&REQUIRED, &data)?;

    let sensor_id = int_field("sensor_id", &data["sensor_id"])?;
    let mut params = vec![Param::Int(sensor_id)];
    for field in UPDATABLE {
        params.push(Param::Text(text_field(field, &data[field])?));
    }

    state
        .db
        .execute(
            "INSERT INTO sensors (sensor_id, mac_addr, device_id, device_location) \
             VALUES ($1, $2, $3, $4) RETURNING sensor_id::int8",
            &params,
        )
        .await
        .map_err(|e| ApiError::database(e, "create sensor"))?;

    info!("Created sensor {}", sensor_id);

    let sensor = read_back(&state, sensor_id)
        .await
        .map_err(|e| ApiError::database(e, "create sensor"))?;

    Ok((
        StatusCode::CREATED,
        Json(SensorResponse {
            message: "sensor created",
            sensor,
        }),
    ))
}

/// `PUT /api/v1/sensors/:sensor_id`
pub async fn update(
    State(state): State<AppState>,
    RouteId(sensor_id): RouteId,
    JsonBody(data): JsonBody,
) -> Result<Json<SensorResponse>, ApiError> {
    let mut sets = Vec::new();
    let mut params = Vec::new();

    for field in UPDATABLE {
        if let Some(value) = data.get(field) {
            params.push(Param::Text(text_field(field, value)?));
            sets.push(format!("{} = ${}", field, params.len()));
        }
    }

    if sets.is_empty() {
        return Err(ApiError::BadRequest(
            "No updatable fields provided".to_string(),
        ));
    }

    params.push(Param::Int(sensor_id));
    let query = format!(
        "UPDATE sensors SET {} WHERE sensor_id = ${} RETURNING sensor_id::int8",
        sets.join(", "),
        params.len()
    );

    let written = state
        .db
        .execute(&query, &params)
        .await
        .map_err(|e| ApiError::database(e, "update sensor"))?;

    if written.rows_affected == 0 {
        return Err(not_found(sensor_id));
    }

    let sensor = read_back(&state, sensor_id)
        .await
        .map_err(|e| ApiError::database(e, "update sensor"))?;

    Ok(Json(SensorResponse {
        message: "sensor updated",
        sensor,
    }))
}
