//! Configuration management for SpendWatch
//!
//! Every setting comes from a flat environment variable (`DB_HOST`, `KEY_NAME`, ...)
//! with a hardcoded fallback. The resulting [`Config`] is built once at startup and
//! handed to each component; nothing reads the environment after that.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Spend store configuration
    pub database: DatabaseConfig,

    /// Monitoring destination
    pub cloud: CloudConfig,

    /// Credential acquisition
    pub credentials: CredentialsConfig,

    /// Poll loop configuration
    pub exporter: ExporterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            cloud: CloudConfig::default(),
            credentials: CredentialsConfig::default(),
            exporter: ExporterConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub name: String,
    /// Login user
    pub user: String,
    /// Login password
    pub password: String,
    /// Table holding the spend column, quoted as it must appear in SQL
    pub table: String,
    /// Root certificate used to verify the server
    pub root_cert_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "litellm-users".to_string(),
            user: "your_username".to_string(),
            password: "your_password".to_string(),
            table: "\"LiteLLM_VerificationToken\"".to_string(),
            root_cert_path: "/root/.postgresql/root.crt".to_string(),
        }
    }
}

/// Monitoring destination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Folder the metrics are written into
    pub folder_id: String,
    /// Metrics write endpoint
    pub monitoring_url: String,
    /// Service classifier query parameter
    pub service: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            folder_id: "your_folder_id".to_string(),
            monitoring_url: "https://monitoring.api.cloud.yandex.net/monitoring/v2/data/write"
                .to_string(),
            service: "custom".to_string(),
        }
    }
}

/// How the bearer credential for publishing is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// Pre-issued token taken from configuration
    Static,
    /// Access/secret key pair signing a request to the identity endpoint
    Signed,
    /// Service-account JWT exchanged directly over HTTP
    Jwt,
    /// Service-account JWT exchanged through the token service client
    Sdk,
}

impl FromStr for CredentialMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "signed" => Ok(Self::Signed),
            "jwt" => Ok(Self::Jwt),
            "sdk" => Ok(Self::Sdk),
            other => Err(Error::config(format!(
                "unknown credentials mode '{other}' (expected static, signed, jwt or sdk)"
            ))),
        }
    }
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Static => "static",
            Self::Signed => "signed",
            Self::Jwt => "jwt",
            Self::Sdk => "sdk",
        };
        f.write_str(s)
    }
}

/// Credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Which provider variant to build
    pub mode: CredentialMode,
    /// Token returned by the static provider
    pub iam_token: String,
    /// Access key id for request signing
    pub access_key_id: String,
    /// Secret access key for request signing
    pub secret_access_key: String,
    /// Signing region
    pub region: String,
    /// Identity endpoint accepting signed requests
    pub signed_token_url: String,
    /// Service-account key file
    pub key_file_path: String,
    /// JWT-bearer token issuance endpoint
    pub token_url: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            mode: CredentialMode::Jwt,
            iam_token: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: "ru-central1".to_string(),
            signed_token_url: "https://iam.api.cloud.yandex.net/iam/v1/tokens".to_string(),
            key_file_path: "/root/.yc/key.json".to_string(),
            token_url: "https://iam.api.cloud.yandex.net/iam/v1/tokens".to_string(),
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Key whose spend is exported
    pub key_name: String,
    /// Name of the published metric
    pub metric_name: String,
    /// Fixed sleep between cycles in seconds
    pub poll_interval_secs: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            key_name: "test".to_string(),
            metric_name: "litellm_key_spend".to_string(),
            poll_interval_secs: 300,
        }
    }
}

/// Flat view of the environment, one field per variable
#[derive(Debug, Deserialize)]
struct EnvSettings {
    db_host: String,
    db_port: u16,
    db_name: String,
    db_user: String,
    db_password: String,
    db_table: String,
    db_root_cert: String,
    yandex_folder_id: String,
    monitoring_url: String,
    monitoring_service: String,
    credentials_mode: String,
    iam_token: String,
    access_key_id: String,
    secret_access_key: String,
    signing_region: String,
    signed_token_url: String,
    sa_key_file: String,
    iam_token_url: String,
    key_name: String,
    metric_name: String,
    poll_interval_seconds: u64,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from an explicit variable map instead of the environment
    pub fn from_source(vars: HashMap<String, String>) -> Result<Self> {
        Self::load(Some(vars.into_iter().collect()))
    }

    fn load(source: Option<::config::Map<String, String>>) -> Result<Self> {
        let d = Config::default();

        let settings = ::config::Config::builder()
            .set_default("db_host", d.database.host)?
            .set_default("db_port", i64::from(d.database.port))?
            .set_default("db_name", d.database.name)?
            .set_default("db_user", d.database.user)?
            .set_default("db_password", d.database.password)?
            .set_default("db_table", d.database.table)?
            .set_default("db_root_cert", d.database.root_cert_path)?
            .set_default("yandex_folder_id", d.cloud.folder_id)?
            .set_default("monitoring_url", d.cloud.monitoring_url)?
            .set_default("monitoring_service", d.cloud.service)?
            .set_default("credentials_mode", d.credentials.mode.to_string())?
            .set_default("iam_token", d.credentials.iam_token)?
            .set_default("access_key_id", d.credentials.access_key_id)?
            .set_default("secret_access_key", d.credentials.secret_access_key)?
            .set_default("signing_region", d.credentials.region)?
            .set_default("signed_token_url", d.credentials.signed_token_url)?
            .set_default("sa_key_file", d.credentials.key_file_path)?
            .set_default("iam_token_url", d.credentials.token_url)?
            .set_default("key_name", d.exporter.key_name)?
            .set_default("metric_name", d.exporter.metric_name)?
            .set_default(
                "poll_interval_seconds",
                i64::try_from(d.exporter.poll_interval_secs).unwrap_or(300),
            )?
            .add_source(::config::Environment::default().source(source))
            .build()?;

        let env: EnvSettings = settings.try_deserialize()?;

        let config = Self {
            database: DatabaseConfig {
                host: env.db_host,
                port: env.db_port,
                name: env.db_name,
                user: env.db_user,
                password: env.db_password,
                table: env.db_table,
                root_cert_path: env.db_root_cert,
            },
            cloud: CloudConfig {
                folder_id: env.yandex_folder_id,
                monitoring_url: env.monitoring_url,
                service: env.monitoring_service,
            },
            credentials: CredentialsConfig {
                mode: env.credentials_mode.parse()?,
                iam_token: env.iam_token,
                access_key_id: env.access_key_id,
                secret_access_key: env.secret_access_key,
                region: env.signing_region,
                signed_token_url: env.signed_token_url,
                key_file_path: env.sa_key_file,
                token_url: env.iam_token_url,
            },
            exporter: ExporterConfig {
                key_name: env.key_name,
                metric_name: env.metric_name,
                poll_interval_secs: env.poll_interval_seconds,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that the selected credential variant has what it needs
    pub fn validate(&self) -> Result<()> {
        if self.exporter.poll_interval_secs == 0 {
            return Err(Error::config("POLL_INTERVAL_SECONDS must be positive"));
        }

        let creds = &self.credentials;
        let missing = match creds.mode {
            CredentialMode::Static if creds.iam_token.is_empty() => Some("IAM_TOKEN"),
            CredentialMode::Signed if creds.access_key_id.is_empty() => Some("ACCESS_KEY_ID"),
            CredentialMode::Signed if creds.secret_access_key.is_empty() => {
                Some("SECRET_ACCESS_KEY")
            }
            CredentialMode::Jwt | CredentialMode::Sdk if creds.key_file_path.is_empty() => {
                Some("SA_KEY_FILE")
            }
            _ => None,
        };

        match missing {
            Some(var) => Err(Error::config(format!(
                "{var} is required for credentials mode '{}'",
                creds.mode
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = Config::from_source(HashMap::new()).unwrap();

        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.name, "litellm-users");
        assert_eq!(config.database.table, "\"LiteLLM_VerificationToken\"");
        assert_eq!(config.cloud.folder_id, "your_folder_id");
        assert_eq!(config.cloud.service, "custom");
        assert_eq!(config.credentials.mode, CredentialMode::Jwt);
        assert_eq!(config.exporter.key_name, "test");
        assert_eq!(config.exporter.poll_interval_secs, 300);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let config = Config::from_source(vars(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6432"),
            ("YANDEX_FOLDER_ID", "b1gfolder"),
            ("KEY_NAME", "sk-team-a"),
            ("POLL_INTERVAL_SECONDS", "60"),
            ("CREDENTIALS_MODE", "Static"),
            ("IAM_TOKEN", "t1.abc"),
        ]))
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6432);
        assert_eq!(config.cloud.folder_id, "b1gfolder");
        assert_eq!(config.exporter.key_name, "sk-team-a");
        assert_eq!(config.exporter.poll_interval_secs, 60);
        assert_eq!(config.credentials.mode, CredentialMode::Static);
        assert_eq!(config.credentials.iam_token, "t1.abc");
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = Config::from_source(vars(&[("CREDENTIALS_MODE", "kerberos")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("kerberos")));
    }

    #[test]
    fn test_static_mode_requires_token() {
        let err = Config::from_source(vars(&[("CREDENTIALS_MODE", "static")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("IAM_TOKEN")));
    }

    #[test]
    fn test_signed_mode_requires_key_pair() {
        let err = Config::from_source(vars(&[
            ("CREDENTIALS_MODE", "signed"),
            ("ACCESS_KEY_ID", "AKID"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("SECRET_ACCESS_KEY")));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = Config::from_source(vars(&[("POLL_INTERVAL_SECONDS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
