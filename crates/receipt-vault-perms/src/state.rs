//! Authorization set: the grants a disclosure request is checked against.
//!
//! Grants are added and revoked by whoever administers verifiers; the
//! disclosure path only ever calls [`AuthorizationSet::authorize`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use receipt_vault_core::{TokenId, VerifierKey};

use crate::credential::VerificationCredential;
use crate::error::{PermsError, Result};
use crate::grant::{BearerDigest, Conditions, Grant, GrantId, GrantScope, Principal};

/// Authorization set shared between the admin surface and the verifier path.
pub type SharedAuthorizations = Arc<RwLock<AuthorizationSet>>;

/// Aggregated grant state.
#[derive(Debug, Default)]
pub struct AuthorizationSet {
    /// All grants indexed by id.
    grants: BTreeMap<GrantId, Grant>,

    /// Index: verifier key -> its grants.
    by_verifier: HashMap<VerifierKey, Vec<GrantId>>,

    next_id: u64,
}

impl AuthorizationSet {
    /// Create a new empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in a shared handle.
    pub fn shared(self) -> SharedAuthorizations {
        Arc::new(RwLock::new(self))
    }

    fn insert(&mut self, principal: Principal, scope: GrantScope, conditions: Conditions) -> GrantId {
        self.next_id += 1;
        let id = GrantId(self.next_id);

        if let Principal::Verifier(key) = principal {
            self.by_verifier.entry(key).or_default().push(id);
        }

        self.grants.insert(
            id,
            Grant {
                id,
                principal,
                scope,
                conditions,
                revoked: false,
            },
        );
        id
    }

    /// Grant access to whoever presents `token`.
    ///
    /// Only the token's digest is kept.
    pub fn grant_bearer(&mut self, token: &str, scope: GrantScope, conditions: Conditions) -> GrantId {
        self.insert(Principal::Bearer(BearerDigest::of(token)), scope, conditions)
    }

    /// Grant access to a verifier key.
    pub fn grant_verifier(
        &mut self,
        key: VerifierKey,
        scope: GrantScope,
        conditions: Conditions,
    ) -> GrantId {
        self.insert(Principal::Verifier(key), scope, conditions)
    }

    /// Revoke a grant. Revocation is permanent.
    pub fn revoke(&mut self, id: GrantId) -> Result<()> {
        let grant = self
            .grants
            .get_mut(&id)
            .ok_or_else(|| PermsError::GrantNotFound(id.to_string()))?;
        grant.revoked = true;
        Ok(())
    }

    /// Get a grant by id.
    pub fn get_grant(&self, id: GrantId) -> Option<&Grant> {
        self.grants.get(&id)
    }

    /// Number of grants, revoked included.
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether the set holds no grants.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Check a credential for full disclosure of `token_id`.
    ///
    /// Returns the grant that allowed it.
    pub fn authorize(
        &self,
        credential: &VerificationCredential,
        token_id: TokenId,
        now: i64,
    ) -> Result<GrantId> {
        match credential {
            VerificationCredential::Bearer(token) => self.authorize_bearer(token, token_id, now),
            VerificationCredential::Signed(assertion) => {
                assertion.verify(token_id, now)?;
                self.by_verifier
                    .get(&assertion.verifier)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| self.grants.get(id))
                    .find(|g| g.allows(token_id, now))
                    .map(|g| g.id)
                    .ok_or_else(|| {
                        PermsError::PermissionDenied(format!(
                            "no live grant for {:?}",
                            assertion.verifier
                        ))
                    })
            }
        }
    }

    fn authorize_bearer(&self, token: &str, token_id: TokenId, now: i64) -> Result<GrantId> {
        let presented = BearerDigest::of(token);

        // Compare against every bearer grant so timing does not reveal which
        // one matched.
        let mut allowed = None;
        for grant in self.grants.values() {
            if let Principal::Bearer(digest) = &grant.principal {
                if digest.ct_eq(&presented) && allowed.is_none() && grant.allows(token_id, now) {
                    allowed = Some(grant.id);
                }
            }
        }

        allowed.ok_or_else(|| PermsError::PermissionDenied("unknown bearer token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::SignedAssertion;
    use receipt_vault_core::VerifierKeypair;

    fn bearer(token: &str) -> VerificationCredential {
        VerificationCredential::Bearer(token.into())
    }

    #[test]
    fn test_bearer_grant_and_check() {
        let mut set = AuthorizationSet::new();
        let id = set.grant_bearer("s3cret", GrantScope::AllReceipts, Conditions::default());

        assert_eq!(set.authorize(&bearer("s3cret"), TokenId(1), 0).unwrap(), id);
        assert!(matches!(
            set.authorize(&bearer("wrong"), TokenId(1), 0),
            Err(PermsError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_revoke_removes_access() {
        let mut set = AuthorizationSet::new();
        let id = set.grant_bearer("s3cret", GrantScope::AllReceipts, Conditions::default());
        set.revoke(id).unwrap();

        assert!(set.authorize(&bearer("s3cret"), TokenId(1), 0).is_err());
        assert!(set.get_grant(id).unwrap().revoked);
        assert!(set.revoke(GrantId(99)).is_err());
    }

    #[test]
    fn test_expired_grant() {
        let mut set = AuthorizationSet::new();
        set.grant_bearer("s3cret", GrantScope::AllReceipts, Conditions::expires_at(1000));

        assert!(set.authorize(&bearer("s3cret"), TokenId(1), 500).is_ok());
        assert!(set.authorize(&bearer("s3cret"), TokenId(1), 1500).is_err());
    }

    #[test]
    fn test_single_receipt_scope() {
        let mut set = AuthorizationSet::new();
        set.grant_bearer("s3cret", GrantScope::Receipt(TokenId(2)), Conditions::default());

        assert!(set.authorize(&bearer("s3cret"), TokenId(2), 0).is_ok());
        assert!(set.authorize(&bearer("s3cret"), TokenId(3), 0).is_err());
    }

    #[test]
    fn test_signed_assertion() {
        let verifier = VerifierKeypair::from_seed(&[1; 32]);
        let stranger = VerifierKeypair::from_seed(&[2; 32]);

        let mut set = AuthorizationSet::new();
        let id = set.grant_verifier(verifier.public_key(), GrantScope::AllReceipts, Conditions::default());

        let ok = VerificationCredential::Signed(SignedAssertion::sign(&verifier, TokenId(1), 10_000));
        assert_eq!(set.authorize(&ok, TokenId(1), 0).unwrap(), id);

        // Valid signature, but for another receipt.
        assert!(matches!(
            set.authorize(&ok, TokenId(2), 0),
            Err(PermsError::InvalidCredential(_))
        ));

        // Well-formed assertion from a key with no grant.
        let unknown =
            VerificationCredential::Signed(SignedAssertion::sign(&stranger, TokenId(1), 10_000));
        assert!(matches!(
            set.authorize(&unknown, TokenId(1), 0),
            Err(PermsError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_shared_handle() {
        let shared = AuthorizationSet::new().shared();
        shared
            .write()
            .unwrap()
            .grant_bearer("t", GrantScope::AllReceipts, Conditions::default());
        assert_eq!(shared.read().unwrap().len(), 1);
    }
}
