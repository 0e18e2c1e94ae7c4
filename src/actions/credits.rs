use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::accounts::Account;
use crate::ledger::{CreditsAdded, CreditsUsed, DEFAULT_USE_AMOUNT};
use crate::web::AppState;

use super::body_rejection;

const NO_DATA: &str = "No data provided";

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub app_user_id: Option<String>,
    #[serde(default)]
    pub credits: i32,
}

#[derive(Debug, Deserialize)]
pub struct AddCreditsRequest {
    pub app_user_id: Option<String>,
    #[serde(default)]
    pub credits: i32,
}

#[derive(Debug, Deserialize)]
pub struct UseCreditsRequest {
    pub app_user_id: Option<String>,
    #[serde(default = "default_use_amount")]
    pub credits: i32,
}

fn default_use_amount() -> i32 {
    DEFAULT_USE_AMOUNT
}

#[derive(Debug, Serialize)]
pub struct RegisteredView {
    pub message: &'static str,
    pub user_id: String,
    pub credits: i32,
}

/// View model for an account balance (API response)
#[derive(Debug, Serialize)]
pub struct CreditsView {
    pub user_id: String,
    pub credits: i32,
    pub created_at: String,
}

impl From<Account> for CreditsView {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.id.to_string(),
            credits: account.credits,
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreditsAddedView {
    pub message: &'static str,
    pub user_id: String,
    pub credits_added: i32,
    pub total_credits: i32,
}

impl From<CreditsAdded> for CreditsAddedView {
    fn from(added: CreditsAdded) -> Self {
        Self {
            message: "Credits added successfully",
            user_id: added.user_id.to_string(),
            credits_added: added.credits_added,
            total_credits: added.total_credits,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreditsUsedView {
    pub message: &'static str,
    pub user_id: String,
    pub credits_used: i32,
    pub remaining_credits: i32,
}

impl From<CreditsUsed> for CreditsUsedView {
    fn from(used: CreditsUsed) -> Self {
        Self {
            message: "Credits used successfully",
            user_id: used.user_id.to_string(),
            credits_used: used.credits_used,
            remaining_credits: used.remaining_credits,
        }
    }
}

/// POST /register-user
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return body_rejection(rejection, NO_DATA),
    };

    let app_user_id = request.app_user_id.unwrap_or_default();
    match state.ledger.register(&app_user_id, request.credits).await {
        Ok(account) => (
            StatusCode::CREATED,
            Json(RegisteredView {
                message: "User registered successfully",
                user_id: account.id.to_string(),
                credits: account.credits,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /get-credits/{app_user_id}
pub async fn get_credits(
    State(state): State<AppState>,
    Path(app_user_id): Path<String>,
) -> Response {
    match state.ledger.get(&app_user_id).await {
        Ok(account) => Json(CreditsView::from(account)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /add-credits
pub async fn add_credits(
    State(state): State<AppState>,
    payload: Result<Json<AddCreditsRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return body_rejection(rejection, NO_DATA),
    };

    let app_user_id = request.app_user_id.unwrap_or_default();
    match state.ledger.add_credits(&app_user_id, request.credits).await {
        Ok(added) => Json(CreditsAddedView::from(added)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /use-credits
///
/// `credits` defaults to one generation when omitted.
pub async fn use_credits(
    State(state): State<AppState>,
    payload: Result<Json<UseCreditsRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return body_rejection(rejection, NO_DATA),
    };

    let app_user_id = request.app_user_id.unwrap_or_default();
    match state.ledger.use_credits(&app_user_id, request.credits).await {
        Ok(used) => Json(CreditsUsedView::from(used)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_credits_defaults_to_one() {
        let request: UseCreditsRequest =
            serde_json::from_str(r#"{"app_user_id":"abc"}"#).unwrap();
        assert_eq!(request.credits, 1);
    }

    #[test]
    fn test_register_defaults_to_zero_credits() {
        let request: RegisterUserRequest = serde_json::from_str("{}").unwrap();
        assert!(request.app_user_id.is_none());
        assert_eq!(request.credits, 0);
    }
}
