use diyivi_exchange::{TtlSettings, DEFAULT_EMAIL_ATTRIBUTE};
use diyivi_policy::Attribute;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

/// How session result JWTs from the attestation server are signed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultAlgorithm {
    /// Shared secret, the same one used for session requests.
    #[default]
    Hs256,
    /// The server's RSA key; requires `result_key_path`.
    Rs256,
}

/// Connection details for the Yivi/IRMA attestation server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationConfig {
    /// Issuer id in session request JWTs; the server picks the verification
    /// key by it.
    #[serde(default = "default_issuer_id")]
    pub issuer_id: String,

    /// Secret shared with the attestation server.
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    #[serde(default)]
    pub result_algorithm: ResultAlgorithm,

    /// PEM public key of the attestation server (RS256 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_key_path: Option<PathBuf>,

    /// Expected `iss` of session results. Unchecked when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_issuer: Option<String>,

    /// Clock skew tolerated when checking result expiry, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,

    /// Lifetime requested for session results, in seconds.
    #[serde(default = "default_request_validity")]
    pub request_validity_secs: u64,
}

fn default_issuer_id() -> String {
    "diyivi".to_string()
}

fn default_secret_key() -> String {
    "unsafe_secret_key".to_string()
}

fn default_leeway() -> u64 {
    diyivi_attest::DEFAULT_LEEWAY_SECS
}

fn default_request_validity() -> u64 {
    120
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            issuer_id: default_issuer_id(),
            secret_key: default_secret_key(),
            result_algorithm: ResultAlgorithm::default(),
            result_key_path: None,
            result_issuer: None,
            leeway_secs: default_leeway(),
            request_validity_secs: default_request_validity(),
        }
    }
}

/// Outgoing mail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Attribute initiators disclose to receive results by mail.
    #[serde(default = "default_email_attribute")]
    pub attribute: String,

    /// Mail is sent as `noreply@<from_domain>`.
    #[serde(default = "default_from_domain")]
    pub from_domain: String,
}

fn default_email_attribute() -> String {
    DEFAULT_EMAIL_ATTRIBUTE.to_string()
}

fn default_from_domain() -> String {
    "localhost".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            attribute: default_email_attribute(),
            from_domain: default_from_domain(),
        }
    }
}

/// Where records are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory; everything is lost on restart.
    #[default]
    Memory,
    /// A SQLite database file.
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Seconds between sweeps of expired records.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_purge_interval() -> u64 {
    300
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Top-level configuration for the DIYivi server.
///
/// Loaded from a TOML file (typically `~/.diyivi/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// Public URL of this API, with a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Origin of the web client, used in links sent by mail.
    #[serde(default = "default_client_origin")]
    pub client_origin: String,

    #[serde(default)]
    pub attestation: AttestationConfig,

    #[serde(default)]
    pub ttl: TtlSettings,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

fn default_base_url() -> String {
    "http://localhost:8000/".to_string()
}

fn default_client_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            client_origin: default_client_origin(),
            attestation: AttestationConfig::default(),
            ttl: TtlSettings::default(),
            email: EmailConfig::default(),
            store: StoreConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if !self.base_url.ends_with('/') {
            return Err(RootError::Config(format!(
                "base_url must end with '/', got '{}'",
                self.base_url
            )));
        }
        if self.attestation.secret_key.is_empty() {
            return Err(RootError::Config("attestation.secret_key must be set".into()));
        }
        if self.attestation.result_algorithm == ResultAlgorithm::Rs256
            && self.attestation.result_key_path.is_none()
        {
            return Err(RootError::Config(
                "attestation.result_key_path is required for rs256".into(),
            ));
        }
        if self.attestation.request_validity_secs == 0 {
            return Err(RootError::Config(
                "attestation.request_validity_secs must be > 0".into(),
            ));
        }
        self.email_attribute()?;
        if self.store.purge_interval_secs == 0 {
            return Err(RootError::Config("store.purge_interval_secs must be > 0".into()));
        }
        self.protocol_settings()?
            .validate()
            .map_err(|e| RootError::Config(e.to_string()))
    }

    pub fn email_attribute(&self) -> RootResult<Attribute> {
        Attribute::parse(&self.email.attribute).map_err(|e| {
            RootError::Config(format!("email.attribute: {}", e))
        })
    }

    /// Engine settings derived from this configuration.
    pub fn protocol_settings(&self) -> RootResult<diyivi_exchange::ProtocolSettings> {
        Ok(diyivi_exchange::ProtocolSettings::new(
            self.base_url.clone(),
            self.email_attribute()?,
            diyivi_notify::EmailSettings {
                from_domain: self.email.from_domain.clone(),
                client_origin: self.client_origin.clone(),
            },
        )
        .with_ttl(self.ttl))
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".diyivi/config.toml")
    }
}
