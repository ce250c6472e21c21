//! Treatment plan endpoints

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use careplan_core::{PatientId, TreatmentPlan};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::errors::ApiError;
use super::identity::CurrentUser;
use crate::server::CarePlanServer;

/// Query of `GET /plan`
#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    #[serde(rename = "patientId")]
    pub patient_id: Option<String>,
}

/// Body of `POST /plan`
#[derive(Debug, Deserialize)]
pub struct SavePlanRequest {
    #[serde(rename = "patientId")]
    pub patient_id: Option<Value>,
    pub nodes: Option<Value>,
    pub edges: Option<Value>,
}

/// Body of `POST /plan/create`
#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    #[serde(rename = "patientId")]
    pub patient_id: Option<Value>,
}

fn parse_patient_id(raw: &str) -> Result<PatientId, ApiError> {
    raw.parse::<PatientId>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid patient ID: {}", raw)))
}

/// Accepts a positive JSON number or a numeric string
fn patient_id_from_value(value: Option<&Value>) -> Result<PatientId, ApiError> {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid patient ID: {}", n)))
            .and_then(|raw| {
                PatientId::new(raw)
                    .map_err(|_| ApiError::BadRequest(format!("Invalid patient ID: {}", raw)))
            }),
        Some(Value::String(s)) => parse_patient_id(s),
        Some(other) => Err(ApiError::BadRequest(format!("Invalid patient ID: {}", other))),
        None => Err(ApiError::BadRequest("Patient ID is required".to_string())),
    }
}

fn body_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
}

/// `GET /plan?patientId=N`: the stored plan, or `null` when there is none
pub async fn get_plan_handler(
    State(server): State<Arc<CarePlanServer>>,
    CurrentUser(identity): CurrentUser,
    Query(query): Query<PlanQuery>,
) -> Result<Json<Option<TreatmentPlan>>, ApiError> {
    let raw = query
        .patient_id
        .ok_or_else(|| ApiError::BadRequest("Patient ID is required".to_string()))?;
    let patient_id = parse_patient_id(&raw)?;

    debug!(patient_id = %patient_id, user_id = identity.user_id, "Fetching treatment plan");

    let plan = server.plans().fetch_plan(patient_id).await?;
    Ok(Json(plan))
}

/// `POST /plan`: replace the patient's graph
pub async fn save_plan_handler(
    State(server): State<Arc<CarePlanServer>>,
    user: CurrentUser,
    payload: Result<Json<SavePlanRequest>, JsonRejection>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    let identity = user.require_editor()?;
    let Json(request) = payload.map_err(body_rejection)?;

    let patient_id = patient_id_from_value(request.patient_id.as_ref())?;
    let (nodes, edges) = match (request.nodes, request.edges) {
        (Some(nodes), Some(edges)) => (nodes, edges),
        _ => return Err(ApiError::BadRequest("Missing required fields".to_string())),
    };

    let plan = server.plans().save_plan(patient_id, &nodes, &edges).await?;

    info!(
        patient_id = %patient_id,
        user_id = identity.user_id,
        plan_id = %plan.id,
        "Treatment plan stored"
    );
    Ok(Json(plan))
}

/// `POST /plan/create`: create an empty plan unless one exists
pub async fn create_plan_handler(
    State(server): State<Arc<CarePlanServer>>,
    user: CurrentUser,
    payload: Result<Json<CreatePlanRequest>, JsonRejection>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    user.require_editor()?;
    let Json(request) = payload.map_err(body_rejection)?;
    let patient_id = patient_id_from_value(request.patient_id.as_ref())?;

    let plan = server.plans().create_plan(patient_id).await?;
    Ok(Json(plan))
}
