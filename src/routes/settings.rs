//! Team settings endpoints.
//!
//! GET returns the effective merge of the stored per-team documents over the
//! built-in defaults; PUT stores a partial override (only the documents
//! provided are replaced) and returns the new effective merge.

use crate::error::ApiError;
use crate::models::{ApiResponse, ResponseMeta};
use crate::routes::helpers::require_team;
use crate::settings::{
    AnalysisConfig, MetricsConfig, WorkflowConfig, resolve_document_value,
};
use rocket::State;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Effective (merged) team settings.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TeamSettingsResponse {
    pub analysis_config: JsonValue,
    pub workflow_config: JsonValue,
    pub metrics_config: JsonValue,
}

/// Partial settings override; omitted documents keep their stored value.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TeamSettingsUpdate {
    #[serde(default)]
    pub analysis_config: Option<JsonValue>,
    #[serde(default)]
    pub workflow_config: Option<JsonValue>,
    #[serde(default)]
    pub metrics_config: Option<JsonValue>,
}

fn resolved_response(
    analysis: Option<&str>,
    workflow: Option<&str>,
    metrics: Option<&str>,
) -> TeamSettingsResponse {
    TeamSettingsResponse {
        analysis_config: resolve_document_value::<AnalysisConfig>(analysis),
        workflow_config: resolve_document_value::<WorkflowConfig>(workflow),
        metrics_config: resolve_document_value::<MetricsConfig>(metrics),
    }
}

#[openapi(tag = "Team")]
#[get("/team/<team_id>/settings")]
pub async fn get_team_settings(
    team_id: i32,
    pool: &State<PgPool>,
) -> Result<Json<ApiResponse<TeamSettingsResponse>>, ApiError> {
    let team = require_team(pool.inner(), team_id).await?;

    let response = resolved_response(
        team.analysis_config.as_deref(),
        team.workflow_config.as_deref(),
        team.metrics_config.as_deref(),
    );

    let meta = ResponseMeta::default().with_team_id(team_id);
    Ok(Json(ApiResponse::with_meta(response, meta)))
}

#[openapi(tag = "Team")]
#[put("/team/<team_id>/settings", data = "<update>")]
pub async fn update_team_settings(
    team_id: i32,
    update: Json<TeamSettingsUpdate>,
    pool: &State<PgPool>,
) -> Result<Json<ApiResponse<TeamSettingsResponse>>, ApiError> {
    require_team(pool.inner(), team_id).await?;
    let update = update.into_inner();

    let serialize = |doc: &Option<JsonValue>| -> Result<Option<String>, ApiError> {
        match doc {
            Some(value) if !value.is_object() => Err(ApiError::BadRequest(
                "Settings documents must be JSON objects".to_string(),
            )),
            Some(value) => Ok(Some(value.to_string())),
            None => Ok(None),
        }
    };

    let analysis = serialize(&update.analysis_config)?;
    let workflow = serialize(&update.workflow_config)?;
    let metrics = serialize(&update.metrics_config)?;

    let store = crate::store::TeamStore::new(pool.inner().clone());
    store
        .update_settings(
            team_id,
            analysis.as_deref(),
            workflow.as_deref(),
            metrics.as_deref(),
        )
        .await?;

    let team = require_team(pool.inner(), team_id).await?;
    let response = resolved_response(
        team.analysis_config.as_deref(),
        team.workflow_config.as_deref(),
        team.metrics_config.as_deref(),
    );

    let meta = ResponseMeta::default().with_team_id(team_id);
    Ok(Json(ApiResponse::with_meta(response, meta)))
}
