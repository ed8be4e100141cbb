use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::db::AdminAccount;

#[cfg(target_os = "macos")]
const DEFAULT_SHELL: &str = "/bin/zsh";
#[cfg(not(target_os = "macos"))]
const DEFAULT_SHELL: &str = "/bin/sh";

/// Runtime settings; every flag can also come from the environment or `.env`.
#[derive(Debug, Clone, Parser)]
#[command(name = "plant_space", version, about = "Garden plant tracker")]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// JSON snapshot of plants, gardens and layouts
    #[arg(long, env = "DATA_FILE", default_value = "data/plants.json")]
    pub data_file: PathBuf,

    /// Keep everything in memory and never write the snapshot
    #[arg(long, env = "NO_PERSIST")]
    pub no_persist: bool,

    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    #[arg(long, env = "UPLOAD_DIR", default_value = "public/uploads")]
    pub upload_dir: PathBuf,

    #[arg(
        long,
        env = "JAEGER_URL",
        default_value = "http://jaeger-query.garden.svc.cluster.local:16686"
    )]
    pub jaeger_url: String,

    #[arg(long, env = "ADVICE_API_URL", default_value = "https://api.adviceslip.com/advice")]
    pub advice_url: String,

    #[arg(long, env = "ZENQUOTES_API_URL", default_value = "https://zenquotes.io/api/random")]
    pub zenquote_url: String,

    #[arg(long, env = "ADMIN_USERNAME", default_value = "user")]
    pub admin_username: String,

    #[arg(long, env = "ADMIN_PASSWORD", default_value = "admin764", hide_env_values = true)]
    pub admin_password: String,

    /// Reported by the health endpoint
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,

    #[arg(long, env = "TERMINAL_SHELL", default_value = DEFAULT_SHELL)]
    pub terminal_shell: String,

    /// Exported as KUBECONFIG inside terminal sessions
    #[arg(long, env = "KUBECONFIG_PATH")]
    pub kubeconfig: Option<PathBuf>,

    #[arg(long, env = "CHANGELOG_PATH", default_value = "CHANGELOG.md")]
    pub changelog: PathBuf,
}

impl Config {
    /// HOST may be an IP literal or a name such as `localhost`; names take the
    /// first address the resolver returns.
    pub async fn bind_address(&self) -> anyhow::Result<SocketAddr> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("resolving HOST {:?}", self.host))?
            .next()
            .with_context(|| format!("HOST {:?} resolved to no address", self.host))
    }

    pub fn admin_account(&self) -> AdminAccount {
        AdminAccount {
            username: self.admin_username.clone(),
            password: self.admin_password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "plant_space",
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "--no-persist",
        ])
        .unwrap();

        assert_eq!(config.bind_address().await.unwrap().to_string(), "127.0.0.1:8080");
        assert!(config.no_persist);
        assert_eq!(config.admin_account().username, "user");
    }

    #[tokio::test]
    async fn hostnames_are_resolved() {
        let config =
            Config::try_parse_from(["plant_space", "--host", "localhost", "--port", "3100"])
                .unwrap();
        let addr = config.bind_address().await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 3100);
    }

    #[tokio::test]
    async fn unresolvable_host_is_an_error() {
        let config =
            Config::try_parse_from(["plant_space", "--host", "no such host!"]).unwrap();
        assert!(config.bind_address().await.is_err());
    }
}
