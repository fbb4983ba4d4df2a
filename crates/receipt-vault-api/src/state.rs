//! # Application State
//!
//! Shared state handed to every handler through the `State` extractor.

use axum::http::HeaderName;

use receipt_vault::Vault;

use crate::config::DEFAULT_SIGNATURE_HEADER;

/// Shared application state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub vault: Vault,
    /// Header the webhook signature is read from.
    pub signature_header: HeaderName,
}

impl AppState {
    /// State reading signatures from the default header.
    pub fn new(vault: Vault) -> Self {
        Self {
            vault,
            signature_header: HeaderName::from_static(DEFAULT_SIGNATURE_HEADER),
        }
    }

    /// Read signatures from `header` instead.
    pub fn with_signature_header(mut self, header: HeaderName) -> Self {
        self.signature_header = header;
        self
    }
}
