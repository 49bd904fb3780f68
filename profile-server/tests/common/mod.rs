#![allow(dead_code)]

use std::path::PathBuf;

use serde_json::Value;
use tempdir::TempDir;
use tokio::net::TcpListener;

use data_profile::UserProfile;
use fs_storage::FileStorage;
use profile_server::{build_router, AppState, ProfileService};

pub struct TestServer {
    pub base: String,
    pub data_file: PathBuf,
    pub uploads_dir: PathBuf,
    pub client: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn stored_bytes(&self) -> Vec<u8> {
        std::fs::read(&self.data_file).expect("read data file")
    }

    pub fn uploaded_files(&self) -> Vec<String> {
        match std::fs::read_dir(&self.uploads_dir) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Start the router on an ephemeral port, seeding the data file with `seed`
/// (or leaving it absent).
pub async fn start(seed: Option<Value>) -> TestServer {
    let dir = TempDir::new("profile_server").expect("tempdir");
    let data_file = dir.path().join("data").join("users.json");
    let uploads_dir = dir.path().join("uploads");

    if let Some(seed) = seed {
        std::fs::create_dir_all(data_file.parent().unwrap()).unwrap();
        std::fs::write(&data_file, serde_json::to_vec_pretty(&seed).unwrap())
            .unwrap();
    }

    let storage: FileStorage<UserProfile> =
        FileStorage::new("profiles".to_owned(), &data_file);
    let state = AppState::new(ProfileService::new(storage, "1"), &uploads_dir);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("server");
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client");

    TestServer {
        base: format!("http://{addr}"),
        data_file,
        uploads_dir,
        client,
        _dir: dir,
    }
}

pub fn jane() -> Value {
    serde_json::json!([{ "id": "1", "name": "Jane" }])
}

pub fn valid_payload() -> Value {
    serde_json::json!({
        "name": "Jane Doe",
        "phone": "555-1234",
        "location": "NYC",
        "dateOfBirth": "1990-01-01",
        "socialLinks": ""
    })
}
