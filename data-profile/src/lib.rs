pub mod form;
pub mod model;
pub mod rules;

pub use form::{
    avatar_src, placeholder_avatar_url, FormErrors, Notification,
    NotificationKind, ProfileForm, NOTIFICATION_TTL, REDIRECT_DELAY,
};
pub use model::{BirthDate, ProfileUpdate, UserProfile, DEFAULT_USER_ID};
pub use rules::{
    check_age, rule_set, validate_profile, FieldRule, RuleSet, MIN_AGE,
    PROFILE_RULES,
};
