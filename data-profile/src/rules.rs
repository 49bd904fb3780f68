//! The profile rule table.
//!
//! Both the API and the edit page validate against [`PROFILE_RULES`]: the
//! server evaluates it here, the page receives it serialized through
//! [`rule_set`] and drives its own checks from the same data.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::model::{parse_birth_instant, ProfileUpdate};
use data_error::{ProfileError, Result};

/// Minimum age, in calendar years, for a valid date of birth.
pub const MIN_AGE: i32 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Date,
    Url,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub allow_empty: bool,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<&'static str>,
    pub kind: FieldKind,
}

/// Evaluated top to bottom; the first failing rule is reported.
pub const PROFILE_RULES: &[FieldRule] = &[
    FieldRule {
        field: "name",
        required: true,
        allow_empty: false,
        min_len: Some(2),
        max_len: None,
        pattern: None,
        kind: FieldKind::Text,
    },
    FieldRule {
        field: "bio",
        required: false,
        allow_empty: true,
        min_len: None,
        max_len: Some(500),
        pattern: None,
        kind: FieldKind::Text,
    },
    FieldRule {
        field: "phone",
        required: true,
        allow_empty: false,
        min_len: None,
        max_len: None,
        pattern: Some(r"^[0-9\-+ ()]{7,20}$"),
        kind: FieldKind::Text,
    },
    FieldRule {
        field: "location",
        required: true,
        allow_empty: false,
        min_len: None,
        max_len: None,
        pattern: None,
        kind: FieldKind::Text,
    },
    FieldRule {
        field: "dateOfBirth",
        required: true,
        allow_empty: false,
        min_len: None,
        max_len: None,
        pattern: None,
        kind: FieldKind::Date,
    },
    FieldRule {
        field: "socialLinks",
        required: false,
        allow_empty: true,
        min_len: None,
        max_len: None,
        pattern: None,
        kind: FieldKind::Url,
    },
];

/// Message templates. `{field}` and `{limit}` are substituted.
pub mod messages {
    pub const NOT_OBJECT: &str = "\"{field}\" must be of type object";
    pub const REQUIRED: &str = "\"{field}\" is required";
    pub const NOT_STRING: &str = "\"{field}\" must be a string";
    pub const EMPTY: &str = "\"{field}\" is not allowed to be empty";
    pub const TOO_SHORT: &str =
        "\"{field}\" length must be at least {limit} characters long";
    pub const TOO_LONG: &str =
        "\"{field}\" length must be less than or equal to {limit} characters long";
    pub const PATTERN: &str =
        "\"{field}\" must be 7-20 digits, spaces, or + - ( ) characters";
    pub const INVALID_DATE: &str = "\"{field}\" must be a valid date";
    pub const FUTURE_DATE: &str = "\"{field}\" must be in the past";
    pub const INVALID_URL: &str = "\"{field}\" must be a valid uri";
    pub const NOT_ALLOWED: &str = "\"{field}\" is not allowed";
    pub const TOO_YOUNG: &str = "User must be at least {limit} years old";
}

/// Rule table plus the message templates, as handed to the edit page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub fields: &'static [FieldRule],
    pub min_age: i32,
    pub messages: BTreeMap<&'static str, &'static str>,
}

pub fn rule_set() -> RuleSet {
    let messages = BTreeMap::from([
        ("required", messages::REQUIRED),
        ("notString", messages::NOT_STRING),
        ("empty", messages::EMPTY),
        ("tooShort", messages::TOO_SHORT),
        ("tooLong", messages::TOO_LONG),
        ("pattern", messages::PATTERN),
        ("invalidDate", messages::INVALID_DATE),
        ("futureDate", messages::FUTURE_DATE),
        ("invalidUrl", messages::INVALID_URL),
        ("tooYoung", messages::TOO_YOUNG),
    ]);
    RuleSet {
        fields: PROFILE_RULES,
        min_age: MIN_AGE,
        messages,
    }
}

static PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    PROFILE_RULES
        .iter()
        .filter_map(|rule| rule.pattern)
        .map(|pattern| {
            let regex = Regex::new(pattern).expect("rule pattern is valid");
            (pattern, regex)
        })
        .collect()
});

fn render(template: &str, field: &str, limit: Option<usize>) -> String {
    let message = template.replace("{field}", field);
    match limit {
        Some(limit) => message.replace("{limit}", &limit.to_string()),
        None => message,
    }
}

fn is_absolute_url(raw: &str) -> bool {
    Url::parse(raw)
        .ok()
        .and_then(|url| url.host_str().map(|host| !host.is_empty()))
        .unwrap_or(false)
}

/// Check one field against its rule.
/// Returns the human-readable reason on failure.
pub fn check_field(
    rule: &FieldRule,
    value: Option<&Value>,
    now: DateTime<Utc>,
) -> std::result::Result<(), String> {
    let field = rule.field;
    let text = match value {
        None if rule.required => {
            return Err(render(messages::REQUIRED, field, None))
        }
        None => return Ok(()),
        Some(Value::String(text)) => text,
        Some(_) => return Err(render(messages::NOT_STRING, field, None)),
    };

    if text.is_empty() {
        return match rule.kind {
            _ if rule.allow_empty => Ok(()),
            FieldKind::Date => Err(render(messages::INVALID_DATE, field, None)),
            _ => Err(render(messages::EMPTY, field, None)),
        };
    }

    let len = text.chars().count();
    if let Some(min) = rule.min_len.filter(|min| len < *min) {
        return Err(render(messages::TOO_SHORT, field, Some(min)));
    }
    if let Some(max) = rule.max_len.filter(|max| len > *max) {
        return Err(render(messages::TOO_LONG, field, Some(max)));
    }
    if let Some(regex) = rule.pattern.and_then(|p| PATTERNS.get(p)) {
        if !regex.is_match(text) {
            return Err(render(messages::PATTERN, field, None));
        }
    }

    match rule.kind {
        FieldKind::Text => Ok(()),
        FieldKind::Date => match parse_birth_instant(text) {
            None => Err(render(messages::INVALID_DATE, field, None)),
            Some(instant) if instant >= now => {
                Err(render(messages::FUTURE_DATE, field, None))
            }
            Some(_) => Ok(()),
        },
        FieldKind::Url if is_absolute_url(text) => Ok(()),
        FieldKind::Url => Err(render(messages::INVALID_URL, field, None)),
    }
}

/// Whole calendar years between the two dates, ignoring month and day.
pub fn age_in_years(birth: NaiveDate, today: NaiveDate) -> i32 {
    today.year() - birth.year()
}

pub fn check_age(birth: NaiveDate, today: NaiveDate) -> Result<()> {
    if age_in_years(birth, today) < MIN_AGE {
        return Err(ProfileError::AgeRestriction(render(
            messages::TOO_YOUNG,
            "",
            Some(MIN_AGE as usize),
        )));
    }
    Ok(())
}

fn take_string(object: &Map<String, Value>, field: &str) -> Option<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Schema validation of an update payload.
///
/// Fails with [`ProfileError::Validation`] naming the first offending field.
pub fn validate_profile(
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<ProfileUpdate> {
    let object = payload.as_object().ok_or_else(|| {
        ProfileError::validation(
            "value",
            render(messages::NOT_OBJECT, "value", None),
        )
    })?;

    for rule in PROFILE_RULES {
        check_field(rule, object.get(rule.field), now)
            .map_err(|message| ProfileError::validation(rule.field, message))?;
    }

    if let Some(unknown) = object
        .keys()
        .find(|key| !PROFILE_RULES.iter().any(|rule| rule.field == key.as_str()))
    {
        return Err(ProfileError::validation(
            unknown.as_str(),
            render(messages::NOT_ALLOWED, unknown, None),
        ));
    }

    let birth = take_string(object, "dateOfBirth")
        .as_deref()
        .and_then(parse_birth_instant)
        .ok_or_else(|| {
            ProfileError::validation(
                "dateOfBirth",
                render(messages::INVALID_DATE, "dateOfBirth", None),
            )
        })?;

    Ok(ProfileUpdate {
        name: take_string(object, "name").unwrap_or_default(),
        bio: take_string(object, "bio"),
        phone: take_string(object, "phone").unwrap_or_default(),
        location: take_string(object, "location").unwrap_or_default(),
        date_of_birth: birth.date_naive(),
        social_links: take_string(object, "socialLinks"),
    })
}
