//! Service configuration
//!
//! Resolution priority per setting: command line flag, then environment
//! variable (both via clap), then the TOML file, then compiled defaults.
//! Endpoint paths and broader-exclusion overrides live only in the TOML file.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use suggest_common::config::{load_toml_or_default, ConfigFileResolver};
use suggest_common::logging::LoggingConfig;
use suggest_common::Result;

use crate::services::broader::{ExclusionDirection, ExclusionPolicy};

pub const CONFIG_ENV_VAR: &str = "SUGGEST_CONFIG";

/// Command-line arguments for suggest-api
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "suggest-api")]
#[command(about = "Aggregates concept suggestions for content from several providers")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "SUGGEST_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SUGGEST_PORT")]
    pub port: Option<u16>,

    /// Log level or EnvFilter directive (RUST_LOG still wins)
    #[arg(long, env = "SUGGEST_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[arg(long, env = "TME_SUGGESTION_API_BASE_URL")]
    pub tme_base_url: Option<String>,

    #[arg(long, env = "AUTHORS_SUGGESTION_API_BASE_URL")]
    pub authors_base_url: Option<String>,

    #[arg(long, env = "CONCORDANCES_API_BASE_URL")]
    pub concordance_base_url: Option<String>,

    #[arg(long, env = "PUBLIC_THINGS_API_BASE_URL")]
    pub broader_base_url: Option<String>,

    #[arg(long, env = "DENYLIST_API_BASE_URL")]
    pub denylist_base_url: Option<String>,

    /// Per-call timeout for every outbound request, in seconds
    #[arg(long, env = "SUGGEST_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: Option<u64>,

    /// Background denylist refresh period, in seconds
    #[arg(long, env = "DENYLIST_REFRESH_INTERVAL_SECS")]
    pub denylist_refresh_secs: Option<u64>,

    /// Age after which a request refreshes the denylist itself, in seconds
    #[arg(long, env = "DENYLIST_MAX_AGE_SECS")]
    pub denylist_max_age_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Where an upstream lives
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub endpoint: String,
}

impl UpstreamConfig {
    fn new(base_url: &str, endpoint: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DenylistConfig {
    pub base_url: String,
    pub endpoint: String,
    pub refresh_interval_secs: u64,
    /// 0 refreshes on every request
    pub max_age_secs: u64,
}

impl Default for DenylistConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8085".to_string(),
            endpoint: "/denylist".to_string(),
            refresh_interval_secs: 300,
            max_age_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BroaderPolicyConfig {
    pub default: ExclusionDirection,
    /// Relationship predicate URI → direction
    pub relationships: HashMap<String, ExclusionDirection>,
}

impl BroaderPolicyConfig {
    pub fn to_policy(&self) -> ExclusionPolicy {
        self.relationships
            .iter()
            .fold(ExclusionPolicy::new(self.default), |policy, (predicate, direction)| {
                policy.with_relationship(predicate.clone(), *direction)
            })
    }
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub http_timeout_secs: u64,
    pub tme: UpstreamConfig,
    pub authors: UpstreamConfig,
    pub concordance: UpstreamConfig,
    pub broader: UpstreamConfig,
    pub denylist: DenylistConfig,
    pub broader_policy: BroaderPolicyConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            http_timeout_secs: 10,
            tme: UpstreamConfig::new("http://localhost:8081", "/content/suggest"),
            authors: UpstreamConfig::new("http://localhost:8082", "/content/suggest"),
            concordance: UpstreamConfig::new("http://localhost:8083", "/internalconcordances"),
            broader: UpstreamConfig::new("http://localhost:8084", "/things"),
            denylist: DenylistConfig::default(),
            broader_policy: BroaderPolicyConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load the TOML layer then apply CLI/env overrides
    pub fn load(cli: &Cli) -> Result<Self> {
        let resolver = ConfigFileResolver::new("suggestions-api", CONFIG_ENV_VAR);
        let path = resolver.resolve(cli.config.as_deref());
        let file: ServiceConfig = load_toml_or_default(path.as_deref())?;
        Ok(file.merge_cli(cli))
    }

    /// Apply flags that were set on the command line or in the environment
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut self.server.host, &cli.host);
        set(&mut self.server.port, &cli.port);
        set(&mut self.logging.level, &cli.log_level);
        set(&mut self.tme.base_url, &cli.tme_base_url);
        set(&mut self.authors.base_url, &cli.authors_base_url);
        set(&mut self.concordance.base_url, &cli.concordance_base_url);
        set(&mut self.broader.base_url, &cli.broader_base_url);
        set(&mut self.denylist.base_url, &cli.denylist_base_url);
        set(&mut self.http_timeout_secs, &cli.http_timeout_secs);
        set(&mut self.denylist.refresh_interval_secs, &cli.denylist_refresh_secs);
        set(&mut self.denylist.max_age_secs, &cli.denylist_max_age_secs);
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn denylist_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.denylist.refresh_interval_secs)
    }

    pub fn denylist_max_age(&self) -> Duration {
        Duration::from_secs(self.denylist.max_age_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::broader::SKOS_BROADER;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            http_timeout_secs = 3

            [server]
            port = 9090

            [tme]
            base_url = "http://tme:8080"
            endpoint = "/suggest"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.http_timeout(), Duration::from_secs(3));
        assert_eq!(config.tme.base_url, "http://tme:8080");
        assert_eq!(config.authors, ServiceConfig::default().authors);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let file = ServiceConfig {
            http_timeout_secs: 3,
            ..Default::default()
        };
        let cli = Cli {
            port: Some(7000),
            tme_base_url: Some("http://override".to_string()),
            denylist_max_age_secs: Some(0),
            ..Default::default()
        };

        let merged = file.merge_cli(&cli);

        assert_eq!(merged.server.port, 7000);
        assert_eq!(merged.tme.base_url, "http://override");
        assert_eq!(merged.tme.endpoint, "/content/suggest");
        assert_eq!(merged.http_timeout_secs, 3);
        assert_eq!(merged.denylist_max_age(), Duration::ZERO);
    }

    #[test]
    fn test_broader_policy_from_toml() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [broader_policy]
            default = "keep_both"

            [broader_policy.relationships]
            "http://www.w3.org/2004/02/skos/core#broader" = "drop_narrower"
            "#,
        )
        .unwrap();

        let policy = config.broader_policy.to_policy();
        assert_eq!(policy.direction(SKOS_BROADER), ExclusionDirection::DropNarrower);
        assert_eq!(policy.direction("http://other"), ExclusionDirection::KeepBoth);
    }

    #[test]
    fn test_default_policy_drops_broader() {
        let policy = ServiceConfig::default().broader_policy.to_policy();
        assert_eq!(policy.direction(SKOS_BROADER), ExclusionDirection::DropBroader);
    }

    #[test]
    fn test_load_reads_file_named_on_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suggestions-api.toml");
        std::fs::write(&path, "[denylist]\nmax_age_secs = 5\n").unwrap();

        let cli = Cli {
            config: Some(path),
            port: Some(7001),
            ..Default::default()
        };
        let config = ServiceConfig::load(&cli).unwrap();

        assert_eq!(config.denylist_max_age(), Duration::from_secs(5));
        assert_eq!(config.denylist.refresh_interval_secs, 300);
        assert_eq!(config.server.port, 7001);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        assert!(ServiceConfig::load(&cli).is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from(["suggest-api", "--port", "9000", "--log-level", "debug"]);
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
