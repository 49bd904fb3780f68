//! State behind the profile edit page.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::form_urlencoded;

use crate::model::{parse_birth_instant, BirthDate, UserProfile};
use crate::rules::{check_age, check_field, PROFILE_RULES};

const PLACEHOLDER_AVATAR_BASE: &str = "https://ui-avatars.com/api/";

/// How long a toast stays on screen.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// Pause between a successful save and the return to the view page.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(1);

/// Editable copy of the profile. Every input is plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileForm {
    pub name: String,
    pub bio: String,
    pub phone: String,
    pub location: String,
    pub date_of_birth: String,
    pub social_links: String,
}

/// Inline errors, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors(BTreeMap<String, String>);

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_owned(), message.into());
    }

    /// Editing a field dismisses its error.
    pub fn clear(&mut self, field: &str) {
        self.0.remove(field);
    }
}

impl ProfileForm {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            name: profile.name.clone().unwrap_or_default(),
            bio: profile.bio.clone().unwrap_or_default(),
            phone: profile.phone.clone().unwrap_or_default(),
            location: profile.location.clone().unwrap_or_default(),
            date_of_birth: profile
                .date_of_birth
                .as_ref()
                .map(BirthDate::to_text)
                .unwrap_or_default(),
            social_links: profile.social_links.clone().unwrap_or_default(),
        }
    }

    /// Body sent to the update endpoint.
    pub fn to_payload(&self) -> Value {
        json!({
            "name": self.name,
            "bio": self.bio,
            "phone": self.phone,
            "location": self.location,
            "dateOfBirth": self.date_of_birth,
            "socialLinks": self.social_links,
        })
    }

    /// Set a field by its wire name, clearing any error shown for it.
    /// Returns `false` for unknown fields.
    pub fn set(
        &mut self,
        field: &str,
        value: impl Into<String>,
        errors: &mut FormErrors,
    ) -> bool {
        let slot = match field {
            "name" => &mut self.name,
            "bio" => &mut self.bio,
            "phone" => &mut self.phone,
            "location" => &mut self.location,
            "dateOfBirth" => &mut self.date_of_birth,
            "socialLinks" => &mut self.social_links,
            _ => return false,
        };
        *slot = value.into();
        errors.clear(field);
        true
    }

    /// Run the shared rule table over every field.
    ///
    /// Unlike the API, which stops at the first failure, this collects one
    /// message per failing field so all of them can be shown inline.
    pub fn validate(&self, now: DateTime<Utc>) -> FormErrors {
        let payload = self.to_payload();
        let mut errors = FormErrors::default();

        for rule in PROFILE_RULES {
            if let Err(message) = check_field(rule, payload.get(rule.field), now)
            {
                errors.insert(rule.field, message);
            }
        }

        if errors.get("dateOfBirth").is_none() {
            if let Some(birth) = parse_birth_instant(&self.date_of_birth) {
                if let Err(err) = check_age(birth.date_naive(), now.date_naive())
                {
                    errors.insert("dateOfBirth", err.to_string());
                }
            }
        }

        errors
    }
}

/// Generated image shown when the profile has no avatar.
pub fn placeholder_avatar_url(name: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("name", name)
        .append_pair("background", "random")
        .finish();
    format!("{PLACEHOLDER_AVATAR_BASE}?{query}")
}

/// Image source for the avatar slot of a profile.
pub fn avatar_src(profile: &UserProfile) -> String {
    match profile.avatar.as_deref() {
        Some(path) if !path.is_empty() => path.to_owned(),
        _ => placeholder_avatar_url(profile.name.as_deref().unwrap_or("")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Transient toast message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    pub fn ttl(&self) -> Duration {
        NOTIFICATION_TTL
    }
}
