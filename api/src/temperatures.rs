use crate::db::Param;
use crate::model::{
    DeletedResponse, TemperatureLog, TemperatureLogResponse, TEMPERATURE_LOG_COLUMNS,
};
use crate::rest::{ApiError, AppState};
use crate::validate::{
    float_field, int_field, optional_read_time, pagination, query_value, read_time_field,
    require_fields, JsonBody, RouteId,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

const REQUIRED: [&str; 4] = ["sensor_id", "temperature_f", "humidity", "pressure"];
const READINGS: [&str; 3] = ["temperature_f", "humidity", "pressure"];

pub(crate) fn not_found(log_id: impl std::fmt::Display) -> ApiError {
    ApiError::NotFound(format!("log {log_id} not found"))
}

async fn read_back(
    state: &AppState,
    log_id: i64,
) -> crate::errors::Result<Option<TemperatureLog>> {
    state
        .db
        .fetch_one(
            &format!("SELECT {TEMPERATURE_LOG_COLUMNS} FROM temperature_log WHERE log_id = $1"),
            &[Param::Int(log_id)],
        )
        .await
}

/// `POST /api/v1/temperatures`
pub async fn create(
    State(state): State<AppState>,
    JsonBody(data): JsonBody,
) -> Result<(StatusCode, Json<TemperatureLogResponse>), ApiError> {
    require_fields(&REQUIRED, &data)?;

    let read_time = optional_read_time(&data)?;
    let sensor_id = int_field("sensor_id", &data["sensor_id"])?;
    let mut params = vec![read_time, Param::Int(sensor_id)];
    for field in READINGS {
        params.push(Param::Float(float_field(field, &data[field])?));
    }

    let written = state
        .db
        .execute(
            "INSERT INTO temperature_log (read_time, sensor_id, temperature_f, humidity, pressure) \
             VALUES ($1, $2, $3, $4, $5) RETURNING log_id::int8",
            &params,
        )
        .await
        .map_err(|e| ApiError::database(e, "create log"))?;

    let log = match written.generated_id {
        Some(log_id) => {
            info!("Created temperature log {}", log_id);
            read_back(&state, log_id)
                .await
                .map_err(|e| ApiError::database(e, "create log"))?
        }
        None => None,
    };

    Ok((
        StatusCode::CREATED,
        Json(TemperatureLogResponse {
            message: "log created",
            log,
        }),
    ))
}

/// `GET /api/v1/temperatures?limit=&offset=`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<TemperatureLog>>, ApiError> {
    let (limit, offset) = pagination(
        query_value(&params, "limit"),
        query_value(&params, "offset"),
    )?;

    let logs = state
        .db
        .fetch_all(
            &format!(
                "SELECT {TEMPERATURE_LOG_COLUMNS} FROM temperature_log \
                 ORDER BY log_id DESC LIMIT $1 OFFSET $2"
            ),
            &[Param::Int(limit), Param::Int(offset)],
        )
        .await
        .map_err(|e| ApiError::database(e, "list logs"))?;

    Ok(Json(logs))
}

/// `GET /api/v1/temperatures/:log_id`
pub async fn get(
    State(state): State<AppState>,
    RouteId(log_id): RouteId,
) -> Result<Json<TemperatureLog>, ApiError> {
    read_back(&state, log_id)
        .await
        .map_err(|e| ApiError::database(e, "fetch log"))?
        .map(Json)
        .ok_or_else(|| not_found(log_id))
}

/// `PUT /api/v1/temperatures/:log_id`
pub async fn update(
    State(state): State<AppState>,
    RouteId(log_id): RouteId,
    JsonBody(data): JsonBody,
) -> Result<Json<TemperatureLogResponse>, ApiError> {
    let mut sets = Vec::new();
    let mut params = Vec::new();

    if let Some(value) = data.get("read_time") {
        params.push(read_time_field(value)?);
        sets.push(format!("read_time = ${}", params.len()));
    }

    if let Some(value) = data.get("sensor_id") {
        params.push(Param::Int(int_field("sensor_id", value)?));
        sets.push(format!("sensor_id = ${}", params.len()));
    }

    for field in READINGS {
        if let Some(value) = data.get(field) {
            params.push(Param::Float(float_field(field, value)?));
            sets.push(format!("{} = ${}", field, params.len()));
        }
    }

    if sets.is_empty() {
        return Err(ApiError::BadRequest(
            "No updatable fields provided".to_string(),
        ));
    }

    params.push(Param::Int(log_id));
    let query = format!(
        "UPDATE temperature_log SET {} WHERE log_id = ${} RETURNING log_id::int8",
        sets.join(", "),
        params.len()
    );

    let written = state
        .db
        .execute(&query, &params)
        .await
        .map_err(|e| ApiError::database(e, "update log"))?;

    if written.rows_affected == 0 {
        return Err(not_found(log_id));
    }

    let log = read_back(&state, log_id)
        .await
        .map_err(|e| ApiError::database(e, "update log"))?;

    Ok(Json(TemperatureLogResponse {
        message: "log updated",
        log,
    }))
}

/// `DELETE /api/v1/temperatures/:log_id`
pub async fn delete(
    State(state): State<AppState>,
    RouteId(log_id): RouteId,
) -> Result<Json<DeletedResponse>, ApiError> {
    let written = state
        .db
        .execute(
            "DELETE FROM temperature_log WHERE log_id = $1 RETURNING log_id::int8",
            &[Param::Int(log_id)],
        )
        .await
        .map_err(|e| ApiError::database(e, "delete log"))?;

    if written.rows_affected == 0 {
        return Err(not_found(log_id));
    }

    info!("Deleted temperature log {}", log_id);

    Ok(Json(DeletedResponse {
        message: "log deleted",
        log_id,
    }))
}
