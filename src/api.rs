//! Thin admin surface over the store, the platform client, and the
//! scheduler's run state. Everything interesting happens in the scheduler;
//! these handlers only move JSON in and out.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use banter_core::{
    ActivityLog, ConfigStore, CoreError, DatabaseError, ErrorExt, TemplateCategory,
};
use database::{Database, PolicyUpdate};
use engagement_scheduler::{EngagementScheduler, SchedulerState};
use serde::Deserialize;
use std::sync::Arc;
use twitter_client::TwitterClient;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub client: Arc<TwitterClient>,
    pub scheduler: Arc<EngagementScheduler>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/verify", get(verify_credentials))
        .route("/api/accounts", get(list_accounts).post(add_account))
        .route("/api/accounts/:id", axum::routing::delete(delete_account))
        .route("/api/accounts/:id/toggle", put(toggle_account))
        .route("/api/templates", get(list_templates).post(add_template))
        .route("/api/templates/:id", axum::routing::delete(delete_template))
        .route("/api/policy", get(get_policy).put(update_policy))
        .route("/api/logs", get(list_logs))
        .route("/api/bot/start", post(start_bot))
        .route("/api/bot/stop", post(stop_bot))
        .with_state(state)
}

struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::Database(DatabaseError::RecordNotFound { .. }) => StatusCode::NOT_FOUND,
            CoreError::Database(DatabaseError::ConstraintViolation { .. }) => {
                StatusCode::BAD_REQUEST
            }
            CoreError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            CoreError::Config(_) => StatusCode::BAD_REQUEST,
            CoreError::PlatformApi(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({
            "error": self.0.error_code(),
            "message": self.0.user_friendly_message(),
        }));
        (status, body).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "scheduler_running": state.scheduler.is_running().await,
    }))
}

async fn verify_credentials(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.client.verify_credentials().await?;
    Ok(Json(serde_json::json!({
        "status": "connected",
        "user": {
            "id": user.id,
            "username": user.username,
            "name": user.name,
        }
    })))
}

async fn list_accounts(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let accounts = state.db.list_accounts(false).await?;
    Ok(Json(serde_json::json!({ "accounts": accounts })))
}

#[derive(Deserialize)]
struct AddAccountRequest {
    handle: String,
}

async fn add_account(
    State(state): State<AppState>,
    Json(payload): Json<AddAccountRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let handle = payload.handle.trim().trim_start_matches('@');
    if handle.is_empty() {
        return Err(CoreError::InvalidInput {
            message: "handle is required".to_string(),
        }
        .into());
    }

    // Make sure the handle exists on the platform before monitoring it.
    let user = state.client.lookup_user(handle).await?;
    let account = state.db.insert_account(handle, Some(user.name)).await?;

    Ok(Json(serde_json::json!({
        "message": format!("Target account @{} added successfully", account.handle),
        "account": account,
    })))
}

async fn delete_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.db.delete_account(account_id).await?;
    Ok(Json(serde_json::json!({
        "message": "Account deleted successfully"
    })))
}

async fn toggle_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = state.db.toggle_account(account_id).await?;
    let status = if account.is_active {
        "activated"
    } else {
        "deactivated"
    };
    Ok(Json(serde_json::json!({
        "message": format!("Account {} successfully", status),
        "account": account,
    })))
}

async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let templates = state.db.list_templates(false).await?;
    Ok(Json(serde_json::json!({ "templates": templates })))
}

#[derive(Deserialize)]
struct AddTemplateRequest {
    text: String,
    #[serde(default)]
    category: Option<TemplateCategory>,
}

async fn add_template(
    State(state): State<AppState>,
    Json(payload): Json<AddTemplateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(CoreError::InvalidInput {
            message: "template text is required".to_string(),
        }
        .into());
    }
    let category = payload.category.unwrap_or(TemplateCategory::General);
    let template = state.db.insert_template(text, category).await?;
    Ok(Json(serde_json::json!({
        "message": "Reply template added successfully",
        "template": template,
    })))
}

async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.db.delete_template(template_id).await?;
    Ok(Json(serde_json::json!({
        "message": "Template deleted successfully"
    })))
}

async fn get_policy(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let policy = state.db.ensure_policy().await?;
    Ok(Json(serde_json::json!({ "policy": policy })))
}

async fn update_policy(
    State(state): State<AppState>,
    Json(update): Json<PolicyUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let policy = state.db.update_policy(update).await?;
    Ok(Json(serde_json::json!({
        "message": "Policy updated successfully",
        "policy": policy,
    })))
}

#[derive(Deserialize)]
struct LogQuery {
    limit: Option<u32>,
}

async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let logs = state.db.list_recent(query.limit.unwrap_or(50)).await?;
    Ok(Json(serde_json::json!({ "logs": logs })))
}

async fn start_bot(State(state): State<AppState>) -> Json<serde_json::Value> {
    let previous = state.scheduler.state().await;
    let current = state.scheduler.clone().start().await;
    let message = match previous {
        SchedulerState::Running => "Bot is already running",
        SchedulerState::Stopped => "Bot started successfully",
    };
    Json(serde_json::json!({
        "message": message,
        "state": current.to_string(),
    }))
}

async fn stop_bot(State(state): State<AppState>) -> Json<serde_json::Value> {
    let previous = state.scheduler.state().await;
    let current = state.scheduler.stop().await;
    let message = match previous {
        SchedulerState::Running => "Bot stopped successfully",
        SchedulerState::Stopped => "Bot is not running",
    };
    Json(serde_json::json!({
        "message": message,
        "state": current.to_string(),
    }))
}
