use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use data_profile::DEFAULT_USER_ID;
use fs_storage::DEFAULT_STORAGE_FILE;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

#[derive(Parser, Debug)]
#[command(name = "profile-server")]
#[command(about = "Serve and edit a single user profile", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "PROFILE_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// JSON file holding the profile records
    #[arg(long, env = "PROFILE_DATA_FILE", default_value = DEFAULT_STORAGE_FILE)]
    pub data_file: PathBuf,

    /// Directory where uploaded avatars are stored
    #[arg(long, env = "PROFILE_UPLOADS_DIR", default_value = DEFAULT_UPLOADS_DIR)]
    pub uploads_dir: PathBuf,

    /// Identifier of the profile served as `/users/me`
    #[arg(long, env = "PROFILE_USER_ID", default_value = DEFAULT_USER_ID)]
    pub user_id: String,
}

impl Settings {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Create the data file with a single profile if it does not exist yet
    Seed {
        #[arg(long, default_value = "Jane")]
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["profile-server"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.settings.data_file, PathBuf::from("data/users.json"));
        assert_eq!(cli.settings.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(cli.settings.user_id, "1");
        assert_eq!(cli.settings.listen_addr().ip().to_string(), "0.0.0.0");
    }

    #[test]
    fn flags_and_subcommand() {
        let cli = Cli::try_parse_from([
            "profile-server",
            "--port",
            "8080",
            "--data-file",
            "/tmp/users.json",
            "seed",
            "--name",
            "Jane Doe",
        ])
        .unwrap();
        assert_eq!(cli.settings.listen_addr().port(), 8080);
        assert_eq!(
            cli.command,
            Some(Command::Seed {
                name: "Jane Doe".to_owned()
            })
        );
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
