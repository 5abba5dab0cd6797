//! Server-rendered HTML pages under `/users`.
//!
//! Plain `format!` templates; every user-supplied value goes through
//! `http_common::html_escape`. Writes follow post/redirect/get: success
//! redirects to the index, failures re-render the form with messages.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use domain::validate::{validate_user_input, Field, FieldErrors};
use domain::{CoreError, Decline, Outcome, User, UserId, UserInput};
use http_common::html_escape;
use serde::Deserialize;
use tracing::{error, info};

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
}

pub async fn root() -> Redirect {
    Redirect::to("/users")
}

pub async fn index(State(state): State<AppState>, Query(params): Query<SearchQuery>) -> Response {
    let q = params.q.unwrap_or_default();
    let users = match state.service().list(Some(q.as_str())) {
        Ok(users) => users,
        Err(e) => return fault(e, "list"),
    };

    let rows: String = users
        .iter()
        .map(|u| {
            format!(
                r#"<tr><td>{name}</td><td>{email}</td><td>{phone}</td><td>{address}</td><td><a href="/users/{id}">Details</a> | <a href="/users/{id}/edit">Edit</a> | <a href="/users/{id}/delete">Delete</a></td></tr>"#,
                id = u.id,
                name = html_escape(&u.full_name),
                email = html_escape(&u.email),
                phone = html_escape(&u.phone),
                address = html_escape(&u.address),
            )
        })
        .collect();
    let table = if users.is_empty() {
        r#"<p class="empty">No users found.</p>"#.to_string()
    } else {
        format!(
            "<table><thead><tr><th>Full name</th><th>Email</th><th>Phone</th><th>Address</th><th></th></tr></thead><tbody>{}</tbody></table>",
            rows
        )
    };

    let body = format!(
        r#"<h1>Users</h1>
<form method="get" action="/users" class="search">
  <input type="text" name="q" value="{q}" placeholder="Search by name or email">
  <button type="submit">Search</button>
</form>
<p><a href="/users/new">Create new</a></p>
{table}"#,
        q = html_escape(&q),
        table = table,
    );
    page(StatusCode::OK, "Users", &body)
}

pub async fn details(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let user = match load(&state, &id) {
        Ok(Some(u)) => u,
        Ok(None) => return not_found(),
        Err(e) => return fault(e, "details"),
    };
    let body = format!(
        r#"<h1>User details</h1>
{card}
<p><a href="/users/{id}/edit">Edit</a> | <a href="/users">Back to list</a></p>"#,
        card = user_card(&user),
        id = user.id,
    );
    page(StatusCode::OK, "User details", &body)
}

pub async fn new_form() -> Response {
    render_form(
        "Create user",
        "/users/new",
        &UserInput::default(),
        &FieldErrors::new(),
        None,
    )
}

pub async fn create(State(state): State<AppState>, Form(input): Form<UserInput>) -> Response {
    if let Err(errs) = validate_user_input(&input) {
        return render_form("Create user", "/users/new", &input, &errs, None);
    }
    match state.service().create(input.clone()) {
        Ok(Outcome::Done(user)) => {
            info!(id = %user.id, "ui create ok");
            Redirect::to("/users").into_response()
        }
        Ok(Outcome::Declined(reason)) => {
            let (errs, page_error) = decline_messages(reason);
            render_form("Create user", "/users/new", &input, &errs, page_error)
        }
        Err(e) => fault(e, "create"),
    }
}

pub async fn edit_form(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let user = match load(&state, &id) {
        Ok(Some(u)) => u,
        Ok(None) => return not_found(),
        Err(e) => return fault(e, "edit"),
    };
    render_form(
        "Edit user",
        &format!("/users/{}/edit", user.id),
        &UserInput::from(&user),
        &FieldErrors::new(),
        None,
    )
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(input): Form<UserInput>,
) -> Response {
    let Ok(user_id) = UserId::parse(&id) else {
        return not_found();
    };
    let action = format!("/users/{}/edit", user_id);
    if let Err(errs) = validate_user_input(&input) {
        return render_form("Edit user", &action, &input, &errs, None);
    }
    match state.service().update(&user_id, input.clone()) {
        Ok(Outcome::Done(_)) => {
            info!(id = %user_id, "ui update ok");
            Redirect::to("/users").into_response()
        }
        Ok(Outcome::Declined(reason)) => {
            let (errs, page_error) = decline_messages(reason);
            render_form("Edit user", &action, &input, &errs, page_error)
        }
        Err(e) => fault(e, "update"),
    }
}

pub async fn delete_confirm(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let user = match load(&state, &id) {
        Ok(Some(u)) => u,
        Ok(None) => return not_found(),
        Err(e) => return fault(e, "delete"),
    };
    let body = format!(
        r#"<h1>Delete user</h1>
<p>Are you sure you want to delete this user?</p>
{card}
<form method="post" action="/users/{id}/delete">
  <button type="submit" class="danger">Delete</button> | <a href="/users">Back to list</a>
</form>"#,
        card = user_card(&user),
        id = user.id,
    );
    page(StatusCode::OK, "Delete user", &body)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(user_id) = UserId::parse(&id) else {
        return not_found();
    };
    match state.service().delete(&user_id) {
        Ok(Outcome::Done(())) => {
            info!(id = %user_id, "ui delete ok");
            Redirect::to("/users").into_response()
        }
        Ok(Outcome::Declined(_)) => not_found(),
        Err(e) => fault(e, "delete"),
    }
}

// An unparsable id is treated like a missing user.
fn load(state: &AppState, raw_id: &str) -> Result<Option<User>, CoreError> {
    match UserId::parse(raw_id) {
        Ok(id) => state.service().get(&id),
        Err(_) => Ok(None),
    }
}

// Conflicts attach to their field; anything else is shown above the form.
fn decline_messages(reason: Decline) -> (FieldErrors, Option<&'static str>) {
    let mut errs = FieldErrors::new();
    match reason {
        Decline::EmailInUse => errs.push(Field::Email, reason.message()),
        Decline::PhoneInUse => errs.push(Field::Phone, reason.message()),
        Decline::NotFound => return (errs, Some(reason.message())),
    }
    (errs, None)
}

fn user_card(user: &User) -> String {
    format!(
        r#"<dl>
  <dt>Full name</dt><dd>{name}</dd>
  <dt>Email</dt><dd>{email}</dd>
  <dt>Phone</dt><dd>{phone}</dd>
  <dt>Address</dt><dd>{address}</dd>
</dl>"#,
        name = html_escape(&user.full_name),
        email = html_escape(&user.email),
        phone = html_escape(&user.phone),
        address = html_escape(&user.address),
    )
}

fn render_form(
    title: &str,
    action: &str,
    input: &UserInput,
    errs: &FieldErrors,
    page_error: Option<&str>,
) -> Response {
    let values = [
        (Field::FullName, &input.full_name, "text"),
        (Field::Email, &input.email, "email"),
        (Field::Phone, &input.phone, "tel"),
        (Field::Address, &input.address, "text"),
    ];
    let fields: String = values
        .iter()
        .map(|(field, value, kind)| {
            let messages: String = errs
                .for_field(*field)
                .map(|m| format!(r#"<span class="field-error">{}</span>"#, html_escape(m)))
                .collect();
            format!(
                r#"<div class="field">
  <label for="{key}">{label}</label>
  <input type="{kind}" id="{key}" name="{key}" value="{value}" maxlength="{max}">
  {messages}
</div>"#,
                key = field.key(),
                label = field.label(),
                kind = kind,
                value = html_escape(value),
                max = field.max_len(),
                messages = messages,
            )
        })
        .collect();
    let summary = page_error
        .map(|m| format!(r#"<div class="summary-error">{}</div>"#, html_escape(m)))
        .unwrap_or_default();

    let body = format!(
        r#"<h1>{title}</h1>
{summary}
<form method="post" action="{action}">
{fields}
  <button type="submit">Save</button> | <a href="/users">Back to list</a>
</form>"#,
        title = html_escape(title),
        summary = summary,
        action = html_escape(action),
        fields = fields,
    );
    page(StatusCode::OK, title, &body)
}

fn not_found() -> Response {
    page(
        StatusCode::NOT_FOUND,
        "Not found",
        r#"<h1>User not found</h1><p><a href="/users">Back to list</a></p>"#,
    )
}

fn fault(e: CoreError, op: &'static str) -> Response {
    error!(err = ?e, op, "storage failure");
    page(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Error",
        r#"<h1>Something went wrong</h1><p>An error occurred while processing your request.</p>"#,
    )
}

fn page(status: StatusCode, title: &str, body: &str) -> Response {
    let html = format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - User Directory</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 2rem auto; max-width: 960px; color: #334155; }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ text-align: left; padding: 6px 8px; border-bottom: 1px solid #e2e8f0; }}
        dt {{ font-weight: 600; }}
        dd {{ margin: 0 0 8px 0; }}
        .field {{ margin-bottom: 12px; }}
        .field label {{ display: block; font-weight: 600; }}
        .field input {{ width: 100%; max-width: 420px; padding: 4px; }}
        .field-error, .summary-error {{ color: #b91c1c; display: block; }}
        .danger {{ color: #fff; background: #b91c1c; border: 0; padding: 4px 10px; }}
    </style>
</head>
<body>
{body}
</body>
</html>"##,
        title = html_escape(title),
        body = body,
    );
    (status, Html(html)).into_response()
}
