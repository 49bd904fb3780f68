use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Identifier of the only user the service knows about.
pub const DEFAULT_USER_ID: &str = "1";

/// The persisted profile record.
///
/// Only `id` is mandatory on disk: a freshly seeded store may hold nothing
/// but an id and a name. Keys this type does not know are kept in `extra`
/// and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<BirthDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_links: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A stored date of birth.
///
/// Records written by older clients may hold a timestamp or a free-form
/// string here. Those are kept verbatim, so one odd value never makes the
/// collection unreadable, and the next update replaces them.
#[derive(Debug, Clone, PartialEq)]
pub enum BirthDate {
    Date(NaiveDate),
    Unparsed(Value),
}

impl BirthDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            BirthDate::Date(date) => Some(*date),
            BirthDate::Unparsed(_) => None,
        }
    }

    /// Text shown to the user: `YYYY-MM-DD`, or the raw value.
    pub fn to_text(&self) -> String {
        match self {
            BirthDate::Date(date) => date.format("%Y-%m-%d").to_string(),
            BirthDate::Unparsed(Value::String(raw)) => raw.clone(),
            BirthDate::Unparsed(other) => other.to_string(),
        }
    }
}

impl From<NaiveDate> for BirthDate {
    fn from(date: NaiveDate) -> Self {
        BirthDate::Date(date)
    }
}

impl Serialize for BirthDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            BirthDate::Date(_) => serializer.serialize_str(&self.to_text()),
            BirthDate::Unparsed(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for BirthDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let parsed = raw
            .as_str()
            .and_then(parse_birth_instant)
            .map(|instant| BirthDate::Date(instant.date_naive()));
        Ok(parsed.unwrap_or(BirthDate::Unparsed(raw)))
    }
}

/// A payload that passed schema validation.
///
/// Optional fields are `None` when the payload omitted them, in which case
/// the stored value is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub name: String,
    pub bio: Option<String>,
    pub phone: String,
    pub location: String,
    pub date_of_birth: NaiveDate,
    pub social_links: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            bio: None,
            phone: None,
            location: None,
            date_of_birth: None,
            social_links: None,
            avatar: None,
            extra: Map::new(),
        }
    }

    /// Shallow merge: fields present in `update` overwrite, the rest stay.
    pub fn apply(&mut self, update: ProfileUpdate) {
        self.name = Some(update.name);
        if let Some(bio) = update.bio {
            self.bio = Some(bio);
        }
        self.phone = Some(update.phone);
        self.location = Some(update.location);
        self.date_of_birth = Some(update.date_of_birth.into());
        if let Some(link) = update.social_links {
            self.social_links = Some(link);
        }
    }
}

/// Parse a birth date given either as `YYYY-MM-DD` (taken as midnight UTC)
/// or as an RFC 3339 timestamp.
pub fn parse_birth_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}
