//! JSON API under `/api/users`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domain::validate::{validate_user_input, FieldErrors};
use domain::{CoreError, Decline, Outcome, User, UserId, UserInput};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::AppState;

/// Public transport shape of a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id.to_string(),
            full_name: u.full_name,
            email: u.email,
            phone: u.phone,
            address: u.address,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    query: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Response {
    match state.service().list(params.query.as_deref()) {
        Ok(users) => {
            let out: Vec<UserDto> = users.into_iter().map(UserDto::from).collect();
            Json(out).into_response()
        }
        Err(e) => internal(e, "list"),
    }
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return not_found();
    };
    match state.service().get(&id) {
        Ok(Some(user)) => Json(UserDto::from(user)).into_response(),
        Ok(None) => not_found(),
        Err(e) => internal(e, "get"),
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<UserInput>, JsonRejection>,
) -> Response {
    let input = match body {
        Ok(Json(input)) => input,
        Err(rejection) => return bad_body(rejection),
    };
    if let Err(errs) = validate_user_input(&input) {
        return validation_failed(&errs);
    }

    match state.service().create(input) {
        Ok(Outcome::Done(user)) => {
            info!(id = %user.id, "api create ok");
            let location = format!("/api/users/{}", user.id);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(UserDto::from(user)),
            )
                .into_response()
        }
        Ok(Outcome::Declined(reason)) => declined(reason),
        Err(e) => internal(e, "create"),
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UserInput>, JsonRejection>,
) -> Response {
    let Some(id) = parse_id(&id) else {
        return not_found();
    };
    let input = match body {
        Ok(Json(input)) => input,
        Err(rejection) => return bad_body(rejection),
    };
    if let Err(errs) = validate_user_input(&input) {
        return validation_failed(&errs);
    }

    match state.service().update(&id, input) {
        Ok(Outcome::Done(user)) => {
            info!(%id, "api update ok");
            Json(UserDto::from(user)).into_response()
        }
        Ok(Outcome::Declined(reason)) => declined(reason),
        Err(e) => internal(e, "update"),
    }
}

pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return not_found();
    };
    match state.service().delete(&id) {
        Ok(Outcome::Done(())) => {
            info!(%id, "api delete ok");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(Outcome::Declined(reason)) => declined(reason),
        Err(e) => internal(e, "delete"),
    }
}

// Malformed ids cannot name an existing user.
fn parse_id(raw: &str) -> Option<UserId> {
    UserId::parse(raw).ok()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(http_common::json_err("not_found")),
    )
        .into_response()
}

fn bad_body(rejection: JsonRejection) -> Response {
    warn!(err = %rejection.body_text(), "rejected request body");
    (
        StatusCode::BAD_REQUEST,
        Json(http_common::json_error_with_message(
            "bad_request",
            &rejection.body_text(),
        )),
    )
        .into_response()
}

fn validation_failed(errs: &FieldErrors) -> Response {
    warn!(%errs, "validation failed");
    let body = http_common::json_validation_error(errs.iter().map(|(f, m)| (f.key(), m)));
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn declined(reason: Decline) -> Response {
    warn!(reason = reason.code(), "request declined");
    match reason {
        Decline::NotFound => not_found(),
        Decline::EmailInUse | Decline::PhoneInUse => (
            StatusCode::CONFLICT,
            Json(http_common::json_error_with_message(
                "conflict",
                reason.message(),
            )),
        )
            .into_response(),
    }
}

fn internal(e: CoreError, op: &'static str) -> Response {
    error!(err = ?e, op, "storage failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(http_common::json_error_with_message(
            "internal",
            "server error",
        )),
    )
        .into_response()
}
