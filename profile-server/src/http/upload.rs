use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Multipart, Path as UrlPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::service::StoredUpload;
use data_error::{ProfileError, Result};

pub const AVATAR_FIELD: &str = "avatar";

/// Name an uploaded avatar: `avatar-<millis>-<random><.ext>`.
pub fn avatar_filename(original: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(6)
        .collect();
    let extension = Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    format!("avatar-{millis}-{suffix}{extension}")
}

/// Store the first `avatar` file of the form under `uploads_dir`.
///
/// Returns `Ok(None)` when the form carries no such file. Any content is
/// accepted as is: type and size are not checked.
pub async fn store_avatar(
    mut multipart: Multipart,
    uploads_dir: &Path,
) -> Result<Option<StoredUpload>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ProfileError::Upload(err.body_text()))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }
        let original = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ProfileError::Upload(err.body_text()))?;

        tokio::fs::create_dir_all(uploads_dir).await?;
        let filename = avatar_filename(&original);
        tokio::fs::write(uploads_dir.join(&filename), &bytes).await?;

        log::info!(
            "Stored avatar {} ({} bytes, uploaded as {})",
            filename,
            bytes.len(),
            original
        );
        return Ok(Some(StoredUpload { filename }));
    }
    Ok(None)
}

/// Remove a stored avatar whose record update failed.
pub async fn discard(uploads_dir: &Path, stored: &StoredUpload) {
    let path = uploads_dir.join(&stored.filename);
    if let Err(err) = tokio::fs::remove_file(&path).await {
        log::warn!("Could not remove {}: {}", path.display(), err);
    }
}

fn content_type(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        Some("ico") => "image/x-icon",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

pub async fn serve_upload(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Response {
    if !is_plain_filename(&filename) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(state.uploads_dir.join(&filename)).await {
        Ok(bytes) => {
            ([(header::CONTENT_TYPE, content_type(&filename))], bytes)
                .into_response()
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => {
            log::error!("Failed to read upload {}: {}", filename, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("me.PNG", ".png")]
    #[case("photo.final.jpeg", ".jpeg")]
    #[case("noextension", "")]
    #[case("weird.p/n\\g", "")]
    fn filename_keeps_extension(#[case] original: &str, #[case] ext: &str) {
        let name = avatar_filename(original);
        assert!(name.starts_with("avatar-"), "{name}");
        assert!(name.ends_with(ext), "{name}");
        assert!(is_plain_filename(&name));
    }

    #[test]
    fn filenames_do_not_collide() {
        let a = avatar_filename("a.png");
        let b = avatar_filename("a.png");
        assert_ne!(a, b);
    }

    #[rstest]
    #[case("../users.json", false)]
    #[case(".hidden", false)]
    #[case("a/b.png", false)]
    #[case("avatar-1-abc.png", true)]
    fn only_plain_names_are_served(#[case] name: &str, #[case] allowed: bool) {
        assert_eq!(is_plain_filename(name), allowed);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type("a.JPG"), "image/jpeg");
        assert_eq!(content_type("a.bin"), "application/octet-stream");
    }
}
