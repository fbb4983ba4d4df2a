//! Webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex mac>[,v1=<hex mac>...]`.
//! The MAC is HMAC-SHA256 over `"{t}.{body}"` keyed with the shared secret,
//! as the provider computes it. Several `v1` entries may be present while
//! secrets rotate.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::IngestError;

type HmacSha256 = Hmac<Sha256>;

/// The scheme tag of the MAC entries this module understands.
pub const SCHEME: &str = "v1";

/// A parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signing time, Unix seconds.
    pub timestamp: i64,
    /// Candidate MACs.
    pub signatures: Vec<[u8; 32]>,
}

impl SignatureHeader {
    /// Parse a header value. Unknown schemes are skipped.
    pub fn parse(header: &str) -> Result<Self, IngestError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(IngestError::MalformedSignature(format!("bad element {part:?}")));
            };
            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|e| IngestError::MalformedSignature(format!("timestamp: {e}")))?;
                    timestamp = Some(t);
                }
                SCHEME => {
                    // Wrong-length or non-hex entries cannot match; skip them.
                    if let Ok(mac) = receipt_vault_core::types::decode_hex32(value) {
                        signatures.push(mac);
                    }
                }
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| IngestError::MalformedSignature("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(IngestError::MalformedSignature(format!("no {SCHEME} signature")));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verifies webhook signatures against one or more shared secrets.
#[derive(Clone)]
pub struct SignatureVerifier {
    secrets: Vec<Vec<u8>>,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    /// Create a verifier. Every secret in `secrets` is accepted.
    pub fn new<I, S>(secrets: I, tolerance_secs: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            secrets: secrets.into_iter().map(|s| s.as_ref().to_vec()).collect(),
            tolerance_secs,
        }
    }

    /// Verify `body` against the header at time `now` (Unix seconds).
    pub fn verify(&self, body: &[u8], header: Option<&str>, now: i64) -> Result<(), IngestError> {
        let header = header.ok_or(IngestError::MissingSignature)?;
        let parsed = SignatureHeader::parse(header)?;

        let age_secs = now.saturating_sub(parsed.timestamp);
        if age_secs.abs() > self.tolerance_secs {
            return Err(IngestError::StaleSignature { age_secs });
        }

        let mut matched = subtle::Choice::from(0u8);
        for secret in &self.secrets {
            let expected = mac(secret, parsed.timestamp, body);
            for candidate in &parsed.signatures {
                matched |= expected[..].ct_eq(&candidate[..]);
            }
        }

        if bool::from(matched) {
            Ok(())
        } else {
            Err(IngestError::SignatureMismatch)
        }
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secrets", &self.secrets.len())
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

fn mac(secret: &[u8], timestamp: i64, body: &[u8]) -> [u8; 32] {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("hmac accepts keys of any length"),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);

    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Produce a signature header for `body`, as the provider would.
pub fn sign(secret: &[u8], timestamp: i64, body: &[u8]) -> String {
    format!("t={timestamp},{SCHEME}={}", hex::encode(mac(secret, timestamp, body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new([b"whsec_test"], 300)
    }

    #[test]
    fn test_valid_signature() {
        let header = sign(b"whsec_test", NOW, b"{}");
        verifier().verify(b"{}", Some(&header), NOW).unwrap();
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            verifier().verify(b"{}", None, NOW),
            Err(IngestError::MissingSignature)
        ));
    }

    #[test]
    fn test_tampered_body() {
        let header = sign(b"whsec_test", NOW, b"{}");
        assert!(matches!(
            verifier().verify(b"{ }", Some(&header), NOW),
            Err(IngestError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign(b"whsec_other", NOW, b"{}");
        assert!(matches!(
            verifier().verify(b"{}", Some(&header), NOW),
            Err(IngestError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_replay_outside_tolerance() {
        let header = sign(b"whsec_test", NOW - 301, b"{}");
        assert!(matches!(
            verifier().verify(b"{}", Some(&header), NOW),
            Err(IngestError::StaleSignature { age_secs: 301 })
        ));

        let header = sign(b"whsec_test", NOW - 300, b"{}");
        assert!(verifier().verify(b"{}", Some(&header), NOW).is_ok());
    }

    #[test]
    fn test_rotated_secrets() {
        let verifier = SignatureVerifier::new([b"old".as_slice(), b"new".as_slice()], 300);
        for secret in [b"old".as_slice(), b"new".as_slice()] {
            let header = sign(secret, NOW, b"{}");
            assert!(verifier.verify(b"{}", Some(&header), NOW).is_ok());
        }
    }

    #[test]
    fn test_multiple_v1_entries() {
        let good = sign(b"whsec_test", NOW, b"{}");
        let mac = good.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v0=ignored,v1={mac}", "00".repeat(32));
        assert!(verifier().verify(b"{}", Some(&header), NOW).is_ok());
    }

    #[test]
    fn test_hmac_sha256_known_answer() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?".
        let mut mac = HmacSha256::new_from_slice(b"Jefe").unwrap();
        mac.update(b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac.finalize().into_bytes()),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_provider_signed_header_verifies() {
        // Header computed independently as HMAC-SHA256("whsec_test", "1700000000.{}").
        let mut mac = HmacSha256::new_from_slice(b"whsec_test").unwrap();
        mac.update(format!("{NOW}.{{}}").as_bytes());
        let header = format!("t={NOW},v1={}", hex::encode(mac.finalize().into_bytes()));

        assert_eq!(header, sign(b"whsec_test", NOW, b"{}"));
        assert!(verifier().verify(b"{}", Some(&header), NOW).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", &format!("t={NOW}")] {
            assert!(
                matches!(
                    verifier().verify(b"{}", Some(header), NOW),
                    Err(IngestError::MalformedSignature(_))
                ),
                "accepted {header:?}"
            );
        }
    }
}
