//! DIYivi Root Library
//!
//! Wires the workspace crates into a running service: configuration, the
//! TTL store backend, the attestation verifier and request signer, the
//! notifier, and the two protocol engines. `http` exposes them over axum.
//!
//! # Architecture
//!
//! The engines are synchronous and hold no state of their own; everything
//! lives in the store. `AppState` is built once and shared behind an `Arc`
//! by every request handler.

pub mod config;
pub mod error;
pub mod http;

pub use config::{
    AttestationConfig, EmailConfig, HttpConfig, ResultAlgorithm, RootConfig, StoreBackend,
    StoreConfig,
};
pub use error::{RootError, RootResult};

use diyivi_attest::{JwtResultVerifier, RequestSigner, ResultVerifier};
use diyivi_core::{CoreResult, TtlStore};
use diyivi_exchange::{ExchangeEngine, ExchangeStore, SignatureEngine, SignatureStore};
use diyivi_notify::{EmailMessage, LogNotifier, Notifier, NotifyResult};
use diyivi_store::InMemoryTtlStore;
use std::sync::Arc;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Store backend
// ---------------------------------------------------------------------------

/// The configured `TtlStore`, kept concrete so it can be swept.
#[derive(Clone)]
pub enum Backend {
    Memory(Arc<InMemoryTtlStore>),
    #[cfg(feature = "sqlite")]
    Sqlite(Arc<diyivi_store::SqliteTtlStore>),
}

impl Backend {
    pub fn open(config: &StoreBackend) -> RootResult<Self> {
        match config {
            StoreBackend::Memory => Ok(Backend::Memory(Arc::new(InMemoryTtlStore::new()))),
            #[cfg(feature = "sqlite")]
            StoreBackend::Sqlite { path } => {
                let path = path.to_str().ok_or_else(|| {
                    RootError::Config(format!("store path is not UTF-8: {}", path.display()))
                })?;
                Ok(Backend::Sqlite(Arc::new(diyivi_store::SqliteTtlStore::open(path)?)))
            }
            #[cfg(not(feature = "sqlite"))]
            StoreBackend::Sqlite { .. } => Err(RootError::Config(
                "built without the sqlite feature".into(),
            )),
        }
    }

    pub fn as_store(&self) -> Arc<dyn TtlStore> {
        match self {
            Backend::Memory(store) => store.clone() as Arc<dyn TtlStore>,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(store) => store.clone() as Arc<dyn TtlStore>,
        }
    }

    /// Drop expired records. Returns how many were removed.
    pub fn purge_expired(&self) -> CoreResult<usize> {
        match self {
            Backend::Memory(store) => store.purge_expired(),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(store) => store.purge_expired(),
        }
    }
}

// ---------------------------------------------------------------------------
// BackgroundNotifier
// ---------------------------------------------------------------------------

/// Hands each message to the blocking thread pool so delivery never holds
/// up the request that triggered it. Outside a tokio runtime it delivers
/// inline.
pub struct BackgroundNotifier {
    inner: Arc<dyn Notifier>,
}

impl BackgroundNotifier {
    pub fn new(inner: Arc<dyn Notifier>) -> Self {
        Self { inner }
    }
}

impl Notifier for BackgroundNotifier {
    fn notify(&self, message: &EmailMessage) -> NotifyResult<()> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return self.inner.notify(message);
        };
        let inner = self.inner.clone();
        let message = message.clone();
        handle.spawn_blocking(move || {
            if let Err(e) = inner.notify(&message) {
                warn!(error = %e, "background notification failed");
            }
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Everything a request handler needs.
pub struct AppState {
    pub config: RootConfig,
    pub backend: Backend,
    pub exchanges: ExchangeEngine,
    pub signatures: SignatureEngine,
}

/// Build the verifier for session results described by `config`.
pub fn build_verifier(config: &AttestationConfig) -> RootResult<JwtResultVerifier> {
    let verifier = match config.result_algorithm {
        ResultAlgorithm::Hs256 => JwtResultVerifier::from_secret(config.secret_key.as_bytes()),
        ResultAlgorithm::Rs256 => {
            let path = config.result_key_path.as_ref().ok_or_else(|| {
                RootError::Config("attestation.result_key_path is required for rs256".into())
            })?;
            let pem = std::fs::read(path)?;
            JwtResultVerifier::from_rsa_pem(&pem)?
        }
    };
    let verifier = verifier.with_leeway(config.leeway_secs);
    Ok(match &config.result_issuer {
        Some(issuer) => verifier.with_issuer(issuer),
        None => verifier,
    })
}

/// Initialize the service with mail going to the log, delivered off the
/// request path.
pub fn initialize(config: RootConfig) -> RootResult<AppState> {
    let notifier = Arc::new(BackgroundNotifier::new(Arc::new(LogNotifier)));
    initialize_with_notifier(config, notifier)
}

/// Initialize the service with a caller-supplied notifier.
pub fn initialize_with_notifier(
    config: RootConfig,
    notifier: Arc<dyn Notifier>,
) -> RootResult<AppState> {
    config.validate()?;

    info!(
        base_url = %config.base_url,
        store = ?config.store.backend,
        result_algorithm = ?config.attestation.result_algorithm,
        "initializing diyivi"
    );

    let backend = Backend::open(&config.store.backend)?;
    let verifier: Arc<dyn ResultVerifier> = Arc::new(build_verifier(&config.attestation)?);
    let signer = Arc::new(
        RequestSigner::new(
            config.attestation.issuer_id.clone(),
            config.attestation.secret_key.as_bytes(),
        )?
        .with_validity(config.attestation.request_validity_secs),
    );
    let settings = Arc::new(config.protocol_settings()?);

    let exchanges = ExchangeEngine::new(
        ExchangeStore::new(backend.as_store()),
        verifier.clone(),
        signer.clone(),
        notifier.clone(),
        settings.clone(),
    );
    let signatures = SignatureEngine::new(
        SignatureStore::new(backend.as_store()),
        verifier,
        signer,
        notifier,
        settings,
    );

    Ok(AppState {
        config,
        backend,
        exchanges,
        signatures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use diyivi_notify::OutboxNotifier;

    fn message() -> EmailMessage {
        EmailMessage {
            from: "noreply@localhost".into(),
            to: "alice@example.com".into(),
            subject: "Antwoord via DIYivi".into(),
            body: "hello".into(),
        }
    }

    #[test]
    fn test_initialize_default_config() {
        let state = initialize(RootConfig::default()).unwrap();
        assert!(matches!(state.backend, Backend::Memory(_)));
        assert_eq!(state.backend.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_initialize_rejects_invalid_config() {
        let mut config = RootConfig::default();
        config.base_url = "http://localhost:8000".into();
        assert!(matches!(initialize(config), Err(RootError::Config(_))));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_initialize_sqlite_backend() {
        let path = std::env::temp_dir().join(format!(
            "diyivi-root-test-{}.db",
            diyivi_core::random_hex(4)
        ));
        let mut config = RootConfig::default();
        config.store.backend = StoreBackend::Sqlite { path: path.clone() };
        let state = initialize(config).unwrap();
        assert!(matches!(state.backend, Backend::Sqlite(_)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_build_verifier_rs256_missing_file() {
        let config = AttestationConfig {
            result_algorithm: ResultAlgorithm::Rs256,
            result_key_path: Some("/nonexistent/irma_pub.pem".into()),
            ..AttestationConfig::default()
        };
        assert!(matches!(build_verifier(&config), Err(RootError::Io(_))));
    }

    #[test]
    fn test_background_notifier_inline_without_runtime() {
        let outbox = Arc::new(OutboxNotifier::new());
        let notifier = BackgroundNotifier::new(outbox.clone());
        notifier.notify(&message()).unwrap();
        assert_eq!(outbox.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_background_notifier_spawns_on_runtime() {
        let outbox = Arc::new(OutboxNotifier::new());
        let notifier = BackgroundNotifier::new(outbox.clone());
        notifier.notify(&message()).unwrap();

        for _ in 0..100 {
            if !outbox.sent().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(outbox.sent().len(), 1);
    }
}
