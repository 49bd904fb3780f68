use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use data_profile::UserProfile;
use fs_storage::{BaseStorage, FileStorage};
use profile_server::{build_router, AppState, Cli, Command, ProfileService, Settings};

const STORAGE_LABEL: &str = "profiles";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let cli = Cli::parse();
    let storage: FileStorage<UserProfile> =
        FileStorage::new(STORAGE_LABEL.to_owned(), &cli.settings.data_file);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Seed { name } => seed(&storage, &cli.settings, name),
        Command::Serve => serve(storage, cli.settings).await,
    }
}

fn seed(
    storage: &FileStorage<UserProfile>,
    settings: &Settings,
    name: String,
) -> anyhow::Result<()> {
    if storage.exists() {
        log::warn!(
            "{} already exists, leaving it untouched",
            storage.path().display()
        );
        return Ok(());
    }

    let mut profile = UserProfile::new(settings.user_id.clone());
    profile.name = Some(name);
    storage
        .save_all(&[profile])
        .with_context(|| format!("seeding {}", storage.path().display()))?;

    log::info!("Seeded {}", storage.path().display());
    Ok(())
}

async fn serve(
    storage: FileStorage<UserProfile>,
    settings: Settings,
) -> anyhow::Result<()> {
    if !storage.exists() {
        log::warn!(
            "{} does not exist, requests will fail until it is seeded",
            storage.path().display()
        );
    }

    tokio::fs::create_dir_all(&settings.uploads_dir)
        .await
        .with_context(|| {
            format!("creating {}", settings.uploads_dir.display())
        })?;

    let service = ProfileService::new(storage, settings.user_id.clone());
    let app = build_router(AppState::new(service, settings.uploads_dir.clone()));

    let addr = settings.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    log::info!("Server is running on port {}", settings.port);

    axum::serve(listener, app).await?;
    Ok(())
}
