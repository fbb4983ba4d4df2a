//! Binary configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use receipt_vault::core::{MerchantContext, VerifierKey};
use receipt_vault::perms::{AuthorizationSet, Conditions, GrantScope, MasterKeyProvider};
use receipt_vault::store::SqliteStore;
use receipt_vault::{Backends, Vault, VaultConfig};

/// Default signature header name.
pub const DEFAULT_SIGNATURE_HEADER: &str = "payment-signature";

/// Configuration errors at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to open database: {0}")]
    Database(String),
}

/// Server configuration.
#[derive(Clone)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    /// SQLite database path; in-memory backends when unset.
    pub db_path: Option<PathBuf>,
    pub webhook_secret: String,
    pub master_key: [u8; 32],
    /// Bearer tokens granted full disclosure of every receipt.
    pub bearer_tokens: Vec<String>,
    /// Verifier keys granted full disclosure of every receipt.
    pub verifier_keys: Vec<VerifierKey>,
    pub merchant_name: String,
    /// Header carrying the webhook signature.
    pub signature_header: String,
    pub log_json: bool,
}

impl ApiConfig {
    /// Read configuration from `RECEIPT_VAULT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind = match var("RECEIPT_VAULT_BIND") {
            Some(addr) => addr.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    name: "RECEIPT_VAULT_BIND",
                    reason: e.to_string(),
                }
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let webhook_secret =
            var("RECEIPT_VAULT_WEBHOOK_SECRET").ok_or(ConfigError::Missing("RECEIPT_VAULT_WEBHOOK_SECRET"))?;

        let master_key_hex =
            var("RECEIPT_VAULT_MASTER_KEY").ok_or(ConfigError::Missing("RECEIPT_VAULT_MASTER_KEY"))?;
        let master_key = receipt_vault::core::types::decode_hex32(master_key_hex.trim()).map_err(|e| {
            ConfigError::Invalid {
                name: "RECEIPT_VAULT_MASTER_KEY",
                reason: e.to_string(),
            }
        })?;

        let bearer_tokens = list(var("RECEIPT_VAULT_BEARER_TOKENS"));

        let verifier_keys = list(var("RECEIPT_VAULT_VERIFIER_KEYS"))
            .iter()
            .map(|k| VerifierKey::from_hex(k))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Invalid {
                name: "RECEIPT_VAULT_VERIFIER_KEYS",
                reason: e.to_string(),
            })?;

        let log_json = var("RECEIPT_VAULT_LOG_JSON")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            bind,
            db_path: var("RECEIPT_VAULT_DB").map(PathBuf::from),
            webhook_secret,
            master_key,
            bearer_tokens,
            verifier_keys,
            merchant_name: var("RECEIPT_VAULT_MERCHANT_NAME").unwrap_or_else(|| "Merchant".into()),
            signature_header: var("RECEIPT_VAULT_SIGNATURE_HEADER")
                .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.into()),
            log_json,
        })
    }

    /// Assemble the vault this configuration describes.
    pub fn build_vault(&self) -> Result<Vault, ConfigError> {
        let backends = match &self.db_path {
            Some(path) => {
                let store = SqliteStore::open(path).map_err(|e| ConfigError::Database(e.to_string()))?;
                Backends::sqlite(store)
            }
            None => {
                tracing::warn!("RECEIPT_VAULT_DB not set, receipts will not survive restart");
                Backends::memory()
            }
        };

        let mut authorizations = AuthorizationSet::new();
        for token in &self.bearer_tokens {
            authorizations.grant_bearer(token, GrantScope::AllReceipts, Conditions::default());
        }
        for key in &self.verifier_keys {
            authorizations.grant_verifier(*key, GrantScope::AllReceipts, Conditions::default());
        }

        let config = VaultConfig::default().with_merchant(MerchantContext::new(&self.merchant_name));

        Ok(Vault::builder(config)
            .backends(backends)
            .key_provider(Arc::new(MasterKeyProvider::new(self.master_key)))
            .authorizations(authorizations.shared())
            .webhook_secret(&self.webhook_secret)
            .build())
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind", &self.bind)
            .field("db_path", &self.db_path)
            .field("bearer_tokens", &self.bearer_tokens.len())
            .field("verifier_keys", &self.verifier_keys.len())
            .field("merchant_name", &self.merchant_name)
            .field("signature_header", &self.signature_header)
            .field("log_json", &self.log_json)
            .finish_non_exhaustive()
    }
}

fn list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
