//! # Receipt Vault Permissions
//!
//! Payload encryption and disclosure authorization.
//!
//! ## Encryption Model
//!
//! Each receipt payload is sealed with ChaCha20-Poly1305 under a per-payload
//! key. The envelope stores only a [`KeyRef`]; a [`KeyProvider`] turns that
//! reference into key material. Nonces are synthetic (derived from the key
//! and plaintext), so sealing the same payload twice yields identical bytes
//! and therefore an identical content address.
//!
//! ## Authorization Model
//!
//! Full disclosure requires a [`VerificationCredential`] accepted by the
//! [`AuthorizationSet`]: either a bearer token whose digest has a live grant,
//! or an assertion signed by a verifier key with a live grant.

pub mod credential;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod grant;
pub mod keys;
pub mod state;

pub use credential::{SignedAssertion, VerificationCredential};
pub use crypto::{EncryptionKey, EncryptionNonce};
pub use envelope::{EncryptedPayload, EncryptionFormat};
pub use error::{PermsError, Result};
pub use grant::{BearerDigest, Conditions, Grant, GrantId, GrantScope, Principal};
pub use keys::{KeyProvider, KeyRef, MasterKeyProvider};
pub use state::{AuthorizationSet, SharedAuthorizations};
