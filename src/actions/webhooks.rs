use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

use crate::web::AppState;

use super::{body_rejection, json_error};

const NO_EVENT_DATA: &str = "No event data provided";

/// POST /PostBack
///
/// RevenueCat delivery endpoint. Policy no-ops (unknown product, missing
/// user, redelivery) still answer 200 so the sender stops retrying; only
/// malformed envelopes and store failures surface as 500.
pub async fn handle_webhook(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(value)) => value,
        Err(rejection) => return body_rejection(rejection, NO_EVENT_DATA),
    };

    if is_empty_body(&payload) {
        return json_error(StatusCode::BAD_REQUEST, NO_EVENT_DATA);
    }

    match state.reconciler.ingest(payload).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Bodies carrying no event at all: null, false, zero, and empty strings,
/// arrays or objects
fn is_empty_body(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_bodies() {
        for body in [
            Value::Null,
            json!({}),
            json!([]),
            json!(""),
            json!(0),
            json!(0.0),
            json!(false),
        ] {
            assert!(is_empty_body(&body), "{body}");
        }

        for body in [json!({"event": {}}), json!([1]), json!("x"), json!(1), json!(true)] {
            assert!(!is_empty_body(&body), "{body}");
        }
    }
}
