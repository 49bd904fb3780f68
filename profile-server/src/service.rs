use chrono::{DateTime, Utc};
use serde_json::Value;

use data_error::{ProfileError, Result};
use data_profile::{check_age, validate_profile, UserProfile};
use fs_storage::BaseStorage;

/// Public URL prefix under which stored avatars are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// A file the upload handler has already written to the uploads directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub filename: String,
}

impl StoredUpload {
    pub fn public_path(&self) -> String {
        format!("{}/{}", UPLOADS_ROUTE, self.filename)
    }
}

/// Fetch and update operations on the single profile record.
///
/// Every mutation is a full read-modify-write of the collection. Nothing is
/// locked: two requests racing on the same store end with the last write.
pub struct ProfileService {
    storage: Box<dyn BaseStorage<UserProfile> + Send + Sync>,
    user_id: String,
}

impl ProfileService {
    pub fn new(
        storage: impl BaseStorage<UserProfile> + Send + Sync + 'static,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            storage: Box::new(storage),
            user_id: user_id.into(),
        }
    }

    fn load(&self) -> Result<(Vec<UserProfile>, usize)> {
        let records = self.storage.load_all()?;
        let index = records
            .iter()
            .position(|record| record.id == self.user_id)
            .ok_or_else(|| ProfileError::NotFound(self.user_id.clone()))?;
        Ok((records, index))
    }

    pub fn fetch_profile(&self) -> Result<UserProfile> {
        let (mut records, index) = self.load()?;
        Ok(records.swap_remove(index))
    }

    pub fn update_profile(&self, payload: &Value) -> Result<UserProfile> {
        self.update_profile_at(payload, Utc::now())
    }

    /// Same as [`Self::update_profile`], validating against the given clock.
    pub fn update_profile_at(
        &self,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> Result<UserProfile> {
        let update = validate_profile(payload, now)?;

        let (mut records, index) = self.load()?;
        check_age(update.date_of_birth, now.date_naive())?;
        records[index].apply(update);
        self.storage.save_all(&records)?;

        log::info!("Profile {} updated", self.user_id);
        Ok(records.swap_remove(index))
    }

    /// Point the profile at a freshly stored avatar and return its public path.
    pub fn update_avatar(&self, file: Option<StoredUpload>) -> Result<String> {
        let file = file
            .ok_or_else(|| ProfileError::Upload("No file uploaded".to_owned()))?;

        let (mut records, index) = self.load()?;
        let avatar = file.public_path();
        records[index].avatar = Some(avatar.clone());
        self.storage.save_all(&records)?;

        log::info!("Profile {} avatar set to {}", self.user_id, avatar);
        Ok(avatar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};
    use data_profile::BirthDate;
    use fs_storage::{FileStorage, MemoryStorage};
    use serde_json::json;
    use std::sync::{Arc, Barrier};
    use tempdir::TempDir;

    fn seeded() -> MemoryStorage<UserProfile> {
        let mut jane = UserProfile::new("1");
        jane.name = Some("Jane".to_owned());
        MemoryStorage::new("profiles", vec![jane])
    }

    fn payload() -> Value {
        json!({
            "name": "Jane Doe",
            "phone": "555-1234",
            "location": "NYC",
            "dateOfBirth": "1990-01-01",
            "socialLinks": ""
        })
    }

    fn birth_in(year: i32) -> String {
        NaiveDate::from_ymd_opt(year, 1, 1)
            .unwrap()
            .format("%Y-%m-%d")
            .to_string()
    }

    #[test]
    fn update_then_fetch_round_trip() {
        let service = ProfileService::new(seeded(), "1");

        let updated = service.update_profile(&payload()).unwrap();
        assert_eq!(updated.name.as_deref(), Some("Jane Doe"));
        assert_eq!(updated.phone.as_deref(), Some("555-1234"));
        assert_eq!(updated.location.as_deref(), Some("NYC"));
        assert_eq!(updated.social_links.as_deref(), Some(""));
        assert_eq!(
            updated.date_of_birth.as_ref().and_then(|birth| birth.date()),
            NaiveDate::from_ymd_opt(1990, 1, 1)
        );

        assert_eq!(service.fetch_profile().unwrap(), updated);
    }

    #[test]
    fn validation_failure_leaves_storage_untouched() {
        let service = ProfileService::new(seeded(), "1");
        let before = service.fetch_profile().unwrap();

        let mut without_name = payload();
        without_name.as_object_mut().unwrap().remove("name");
        let err = service.update_profile(&without_name).unwrap_err();
        assert_eq!(err.field(), Some("name"));

        assert_eq!(service.fetch_profile().unwrap(), before);
    }

    #[test]
    fn age_boundary_uses_calendar_years() {
        let service = ProfileService::new(seeded(), "1");
        let before = service.fetch_profile().unwrap();
        let this_year = Utc::now().year();

        let mut twelve = payload();
        twelve["dateOfBirth"] = json!(birth_in(this_year - 12));
        assert!(matches!(
            service.update_profile(&twelve),
            Err(ProfileError::AgeRestriction(_))
        ));
        assert_eq!(service.fetch_profile().unwrap(), before);

        let mut thirteen = payload();
        thirteen["dateOfBirth"] = json!(birth_in(this_year - 13));
        assert!(service.update_profile(&thirteen).is_ok());
    }

    #[test]
    fn missing_record_wins_over_age() {
        let service = ProfileService::new(seeded(), "2");
        let mut young = payload();
        young["dateOfBirth"] = json!(birth_in(Utc::now().year() - 5));
        assert!(matches!(
            service.update_profile(&young),
            Err(ProfileError::NotFound(_))
        ));
    }

    #[test]
    fn legacy_birth_dates_are_read_and_replaced() {
        let dir = TempDir::new("profile_service").unwrap();
        let path = dir.path().join("users.json");
        let legacy = [
            json!(631152000000_i64),
            json!("January 1, 1990"),
            json!("1990/01/01"),
        ];

        for raw in legacy {
            let seed = json!([
                {"id": "1", "name": "Jane", "dateOfBirth": raw.clone()}
            ]);
            std::fs::write(&path, serde_json::to_vec(&seed).unwrap()).unwrap();
            let service = ProfileService::new(
                FileStorage::new("profiles".to_owned(), &path),
                "1",
            );

            let fetched = service.fetch_profile().unwrap();
            assert_eq!(fetched.date_of_birth, Some(BirthDate::Unparsed(raw)));

            let updated = service.update_profile(&payload()).unwrap();
            assert_eq!(
                updated.date_of_birth.and_then(|birth| birth.date()),
                NaiveDate::from_ymd_opt(1990, 1, 1)
            );
            let stored: Value =
                serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
            assert_eq!(stored[0]["dateOfBirth"], "1990-01-01");
        }
    }

    #[test]
    fn update_keeps_existing_avatar() {
        let service = ProfileService::new(seeded(), "1");
        let avatar = service
            .update_avatar(Some(StoredUpload {
                filename: "avatar-1.png".to_owned(),
            }))
            .unwrap();
        assert_eq!(avatar, "/uploads/avatar-1.png");

        let updated = service.update_profile(&payload()).unwrap();
        assert_eq!(updated.avatar.as_deref(), Some("/uploads/avatar-1.png"));
    }

    #[test]
    fn avatar_requires_a_file() {
        let service = ProfileService::new(seeded(), "1");
        assert!(matches!(
            service.update_avatar(None),
            Err(ProfileError::Upload(_))
        ));
        assert_eq!(service.fetch_profile().unwrap().avatar, None);
    }

    #[test]
    fn missing_record_is_not_found() {
        let service = ProfileService::new(seeded(), "2");
        assert!(matches!(
            service.fetch_profile(),
            Err(ProfileError::NotFound(id)) if id == "2"
        ));
        assert!(matches!(
            service.update_profile(&payload()),
            Err(ProfileError::NotFound(_))
        ));
        assert!(matches!(
            service.update_avatar(Some(StoredUpload {
                filename: "a.png".to_owned()
            })),
            Err(ProfileError::NotFound(_))
        ));
    }

    #[test]
    fn missing_store_is_a_storage_error() {
        let service = ProfileService::new(MemoryStorage::missing("profiles"), "1");
        assert!(matches!(
            service.fetch_profile(),
            Err(ProfileError::Storage(_, _))
        ));
    }

    #[test]
    fn other_records_are_preserved() {
        let mut other = UserProfile::new("2");
        other.name = Some("Someone Else".to_owned());
        let mut jane = UserProfile::new("1");
        jane.name = Some("Jane".to_owned());
        let storage = Arc::new(MemoryStorage::new("profiles", vec![other.clone(), jane]));

        let service = ProfileService::new(SharedStore(storage.clone()), "1");
        service.update_profile(&payload()).unwrap();

        let records = storage.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], other);
    }

    /// Hands one store to several services.
    struct SharedStore(Arc<MemoryStorage<UserProfile>>);

    impl BaseStorage<UserProfile> for SharedStore {
        fn load_all(&self) -> Result<Vec<UserProfile>> {
            self.0.load_all()
        }

        fn save_all(&self, records: &[UserProfile]) -> Result<()> {
            self.0.save_all(records)
        }
    }

    /// Holds every reader until all of them have loaded.
    struct InterleavedStore {
        inner: Arc<MemoryStorage<UserProfile>>,
        loaded: Arc<Barrier>,
    }

    impl BaseStorage<UserProfile> for InterleavedStore {
        fn load_all(&self) -> Result<Vec<UserProfile>> {
            let records = self.inner.load_all()?;
            self.loaded.wait();
            Ok(records)
        }

        fn save_all(&self, records: &[UserProfile]) -> Result<()> {
            self.inner.save_all(records)
        }
    }

    #[test]
    fn concurrent_updates_lose_a_write() {
        let inner = Arc::new(seeded());
        let loaded = Arc::new(Barrier::new(2));

        let mut with_bio = payload();
        with_bio["bio"] = json!("written by A");
        let mut with_link = payload();
        with_link["socialLinks"] = json!("https://example.com/b");

        let handles: Vec<_> = [with_bio, with_link]
            .into_iter()
            .map(|body| {
                let service = ProfileService::new(
                    InterleavedStore {
                        inner: inner.clone(),
                        loaded: loaded.clone(),
                    },
                    "1",
                );
                std::thread::spawn(move || service.update_profile(&body))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        // Both requests succeeded, yet only one of them is visible.
        let stored = ProfileService::new(SharedStore(inner), "1")
            .fetch_profile()
            .unwrap();
        let bio_kept = stored.bio.as_deref() == Some("written by A");
        let link_kept =
            stored.social_links.as_deref() == Some("https://example.com/b");
        assert!(bio_kept != link_kept);
    }
}
