use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart,
        State,
    },
    Json,
};
use serde_json::{json, Value};

use super::{run_service, upload, ApiError, AppState};
use data_error::ProfileError;
use data_profile::{rule_set, RuleSet, UserProfile};

pub async fn get_profile(
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = run_service(&state, |service| service.fetch_profile()).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UserProfile>, ApiError> {
    let Json(payload) = body.map_err(|rejection| {
        ProfileError::validation("value", rejection.body_text())
    })?;

    let profile =
        run_service(&state, move |service| service.update_profile(&payload))
            .await?;
    Ok(Json(profile))
}

pub async fn update_avatar(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let stored = match multipart {
        Ok(multipart) => {
            upload::store_avatar(multipart, &state.uploads_dir).await?
        }
        Err(rejection) => {
            log::debug!("Not a multipart request: {}", rejection.body_text());
            None
        }
    };

    let file = stored.clone();
    let result =
        run_service(&state, move |service| service.update_avatar(file)).await;

    match result {
        Ok(avatar) => Ok(Json(json!({ "avatar": avatar }))),
        Err(err) => {
            if let Some(stored) = stored {
                upload::discard(&state.uploads_dir, &stored).await;
            }
            Err(err.into())
        }
    }
}

pub async fn get_rules() -> Json<RuleSet> {
    Json(rule_set())
}
