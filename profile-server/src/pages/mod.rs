//! Server-rendered "View" and "Edit" pages.
//!
//! The edit page validates in the browser against the serialized rule
//! table; the form post below is its fallback when scripts are off.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::Utc;
use serde::Deserialize;

use crate::http::{run_service, status_for, AppState};
use data_profile::{
    avatar_src, placeholder_avatar_url, rule_set, BirthDate, FormErrors,
    Notification, ProfileForm, UserProfile, NOTIFICATION_TTL, REDIRECT_DELAY,
};

const LAYOUT: &str = include_str!("layout.html");
const VIEW: &str = include_str!("view.html");
const EDIT: &str = include_str!("edit.html");
const EDIT_SCRIPT: &str = include_str!("edit.js");

const NOT_SET: &str = "Not set";

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Replace every `{{key}}` in `template` in a single pass, so inserted
/// values are never scanned for placeholders themselves.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut page = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        page.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            page.push_str(&rest[start..]);
            return page;
        };
        let key = &after[..end];
        match values.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => page.push_str(value),
            None => page.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }
    page.push_str(rest);
    page
}

fn toast(notification: Option<&Notification>) -> String {
    match notification {
        Some(notification) => format!(
            r#"<div class="toast toast-{kind}" role="status" data-ttl="{ttl}">{message}</div>"#,
            kind = match notification.kind {
                data_profile::NotificationKind::Success => "success",
                data_profile::NotificationKind::Error => "error",
            },
            ttl = notification.ttl().as_millis(),
            message = escape_html(&notification.message),
        ),
        None => String::new(),
    }
}

fn banner(message: Option<&str>) -> String {
    match message {
        Some(message) => format!(
            r#"<div class="banner" role="alert">{}</div>"#,
            escape_html(message)
        ),
        None => String::new(),
    }
}

fn layout(title: &str, body: &str, notification: Option<&Notification>) -> String {
    fill(
        LAYOUT,
        &[
            ("title", escape_html(title).as_str()),
            ("toast", toast(notification).as_str()),
            ("body", body),
        ],
    )
}

fn or_not_set(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => escape_html(value),
        _ => format!(r#"<span class="muted">{NOT_SET}</span>"#),
    }
}

pub fn render_view(
    profile: &UserProfile,
    notification: Option<&Notification>,
) -> String {
    let social = match profile.social_links.as_deref() {
        Some(link) if !link.is_empty() => {
            let link = escape_html(link);
            format!(r#"<a href="{link}" rel="noopener noreferrer">{link}</a>"#)
        }
        _ => or_not_set(None),
    };
    let date_of_birth =
        profile.date_of_birth.as_ref().map(BirthDate::to_text);

    let body = fill(
        VIEW,
        &[
            ("avatar_src", escape_html(&avatar_src(profile)).as_str()),
            ("name", or_not_set(profile.name.as_deref()).as_str()),
            ("bio", or_not_set(profile.bio.as_deref()).as_str()),
            ("phone", or_not_set(profile.phone.as_deref()).as_str()),
            ("location", or_not_set(profile.location.as_deref()).as_str()),
            ("date_of_birth", or_not_set(date_of_birth.as_deref()).as_str()),
            ("social_links", social.as_str()),
        ],
    );
    layout("Profile", &body, notification)
}

pub fn render_edit(
    form: &ProfileForm,
    errors: &FormErrors,
    avatar: &str,
    failure: Option<&str>,
    notification: Option<&Notification>,
) -> String {
    // The rule table sits inside a <script> element.
    let rules = serde_json::to_string(&rule_set())
        .unwrap_or_else(|_| "null".to_owned())
        .replace("</", "<\\/");
    let error = |field: &str| escape_html(errors.get(field).unwrap_or(""));
    let ttl = NOTIFICATION_TTL.as_millis().to_string();
    let redirect = REDIRECT_DELAY.as_millis().to_string();

    let body = fill(
        EDIT,
        &[
            ("banner", banner(failure).as_str()),
            ("avatar_src", escape_html(avatar).as_str()),
            ("name", escape_html(&form.name).as_str()),
            ("bio", escape_html(&form.bio).as_str()),
            ("phone", escape_html(&form.phone).as_str()),
            ("location", escape_html(&form.location).as_str()),
            ("date_of_birth", escape_html(&form.date_of_birth).as_str()),
            ("social_links", escape_html(&form.social_links).as_str()),
            ("error_name", error("name").as_str()),
            ("error_bio", error("bio").as_str()),
            ("error_phone", error("phone").as_str()),
            ("error_location", error("location").as_str()),
            ("error_date_of_birth", error("dateOfBirth").as_str()),
            ("error_social_links", error("socialLinks").as_str()),
            ("notification_ttl", ttl.as_str()),
            ("redirect_delay", redirect.as_str()),
            ("rules_json", rules.as_str()),
            ("script", EDIT_SCRIPT),
        ],
    );
    layout("Edit Profile", &body, notification)
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    updated: Option<String>,
}

pub async fn view_page(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Response {
    match run_service(&state, |service| service.fetch_profile()).await {
        Ok(profile) => {
            let notification = query
                .updated
                .map(|_| Notification::success("Profile updated successfully"));
            Html(render_view(&profile, notification.as_ref())).into_response()
        }
        Err(err) => {
            let body = banner(Some(&err.to_string()));
            let notification = Notification::error("Failed to load profile");
            (
                status_for(&err),
                Html(layout("Profile", &body, Some(&notification))),
            )
                .into_response()
        }
    }
}

pub async fn edit_page(State(state): State<AppState>) -> Response {
    match run_service(&state, |service| service.fetch_profile()).await {
        Ok(profile) => Html(render_edit(
            &ProfileForm::from_profile(&profile),
            &FormErrors::default(),
            &avatar_src(&profile),
            None,
            None,
        ))
        .into_response(),
        Err(err) => {
            let notification = Notification::error("Failed to load profile");
            let page = render_edit(
                &ProfileForm::default(),
                &FormErrors::default(),
                &placeholder_avatar_url(""),
                Some(&err.to_string()),
                Some(&notification),
            );
            (status_for(&err), Html(page)).into_response()
        }
    }
}

pub async fn submit_edit(
    State(state): State<AppState>,
    Form(form): Form<ProfileForm>,
) -> Response {
    let mut errors = form.validate(Utc::now());
    let mut failure = None;

    if errors.is_empty() {
        let payload = form.to_payload();
        match run_service(&state, move |service| {
            service.update_profile(&payload)
        })
        .await
        {
            Ok(_) => return Redirect::to("/profile?updated=1").into_response(),
            Err(err) => match err.field().map(str::to_owned) {
                Some(field) => errors.insert(&field, err.to_string()),
                None => failure = Some(err),
            },
        }
    }

    let avatar = match run_service(&state, |service| service.fetch_profile()).await {
        Ok(profile) => avatar_src(&profile),
        Err(_) => placeholder_avatar_url(&form.name),
    };
    let status = failure
        .as_ref()
        .map(status_for)
        .unwrap_or(StatusCode::BAD_REQUEST);
    let message = failure
        .as_ref()
        .map(|err| err.to_string())
        .unwrap_or_else(|| "Please fix the highlighted fields".to_owned());
    let notification = Notification::error(message.clone());
    let page = render_edit(
        &form,
        &errors,
        &avatar,
        failure.as_ref().map(|_| message.as_str()),
        Some(&notification),
    );
    (status, Html(page)).into_response()
}
