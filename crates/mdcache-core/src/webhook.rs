//! Webhook signature verification.
//!
//! GitHub signs each delivery twice: HMAC-SHA1 in `x-hub-signature` and
//! HMAC-SHA256 in `x-hub-signature-256`, both as `algorithm=hexdigest` over
//! the raw request body. Both digests must match before the body is parsed.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha1::Sha1;
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::metrics::METRICS;
use crate::obs::emit_webhook_rejected;

pub const SIGNATURE_SHA1_HEADER: &str = "x-hub-signature";
pub const SIGNATURE_SHA256_HEADER: &str = "x-hub-signature-256";

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// A request body whose signatures have been checked.
///
/// The only way to parse a webhook payload is through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload {
    body: Vec<u8>,
}

impl VerifiedPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Deserialize the verified body as JSON.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Header values for both signature algorithms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signatures {
    pub sha1: String,
    pub sha256: String,
}

fn keyed<M: Mac + KeyInit>(secret: &[u8]) -> Result<M> {
    <M as Mac>::new_from_slice(secret)
        .map_err(|_| Error::Rejected("unusable webhook secret".to_string()))
}

/// Compute both signature header values for `body`.
///
/// This is the sender side of [`verify`], for tools that replay or forward
/// deliveries to an mdcache server.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<Signatures> {
    let mut sha1: HmacSha1 = keyed(secret)?;
    sha1.update(body);
    let mut sha256: HmacSha256 = keyed(secret)?;
    sha256.update(body);
    Ok(Signatures {
        sha1: format!("sha1={}", hex::encode(sha1.finalize().into_bytes())),
        sha256: format!("sha256={}", hex::encode(sha256.finalize().into_bytes())),
    })
}

/// Drop the `algorithm=` label and decode the hex digest.
fn header_digest(header: &str, name: &str) -> Result<Vec<u8>> {
    let (_, digest) = header
        .split_once('=')
        .ok_or_else(|| Error::Rejected(format!("{name} header is not in algorithm=digest form")))?;
    hex::decode(digest.trim()).map_err(|_| Error::Rejected(format!("{name} digest is not hex")))
}

fn check<M: Mac>(mut mac: M, body: &[u8], header: &str, name: &str) -> Result<()> {
    let expected = header_digest(header, name)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| Error::Rejected(format!("{name} signature does not match")))
}

/// Verify both signatures of a raw webhook body.
///
/// Missing headers, malformed headers and digest mismatches all yield
/// [`Error::Rejected`]. Comparison is constant-time.
pub fn verify(
    raw_body: &[u8],
    sha1_header: Option<&str>,
    sha256_header: Option<&str>,
    secret: &[u8],
) -> Result<VerifiedPayload> {
    let sha1_header = sha1_header
        .ok_or_else(|| Error::Rejected(format!("missing {SIGNATURE_SHA1_HEADER} header")))?;
    let sha256_header = sha256_header
        .ok_or_else(|| Error::Rejected(format!("missing {SIGNATURE_SHA256_HEADER} header")))?;

    check(keyed::<HmacSha1>(secret)?, raw_body, sha1_header, SIGNATURE_SHA1_HEADER)?;
    check(keyed::<HmacSha256>(secret)?, raw_body, sha256_header, SIGNATURE_SHA256_HEADER)?;

    Ok(VerifiedPayload {
        body: raw_body.to_vec(),
    })
}

/// Holds the shared secret and verifies deliveries against it.
#[derive(Clone)]
pub struct WebhookGate {
    secret: Vec<u8>,
}

impl std::fmt::Debug for WebhookGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookGate").finish_non_exhaustive()
    }
}

impl WebhookGate {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// [`verify`] against this gate's secret, recording rejections.
    pub fn verify(
        &self,
        raw_body: &[u8],
        sha1_header: Option<&str>,
        sha256_header: Option<&str>,
    ) -> Result<VerifiedPayload> {
        verify(raw_body, sha1_header, sha256_header, &self.secret).map_err(|e| {
            if let Error::Rejected(reason) = &e {
                METRICS.inc_webhooks_rejected();
                emit_webhook_rejected(reason);
            }
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"It's a Secret to Everybody";
    const BODY: &[u8] = br#"{"ref":"refs/heads/master","head_commit":{"id":"abc"}}"#;

    #[test]
    fn test_known_vector() {
        // From GitHub's "Validating webhook deliveries" documentation.
        let sigs = sign(SECRET, b"Hello, World!").unwrap();
        assert_eq!(
            sigs.sha256,
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn test_valid_signatures_verify() {
        let sigs = sign(SECRET, BODY).unwrap();
        let payload = verify(BODY, Some(&sigs.sha1), Some(&sigs.sha256), SECRET).unwrap();
        assert_eq!(payload.as_bytes(), BODY);
    }

    #[test]
    fn test_flipped_byte_is_rejected_by_both() {
        let sigs = sign(SECRET, BODY).unwrap();
        let mut tampered = BODY.to_vec();
        tampered[3] ^= 0x01;

        let err = verify(&tampered, Some(&sigs.sha1), Some(&sigs.sha256), SECRET).unwrap_err();
        assert!(err.to_string().contains("x-hub-signature signature"), "{err}");

        // The SHA-256 check fails on its own as well.
        let fresh_sha1 = sign(SECRET, &tampered).unwrap().sha1;
        let err = verify(&tampered, Some(&fresh_sha1), Some(&sigs.sha256), SECRET).unwrap_err();
        assert!(err.to_string().contains("x-hub-signature-256"), "{err}");
    }

    #[test]
    fn test_label_is_ignored() {
        let sigs = sign(SECRET, BODY).unwrap();
        let sha1 = sigs.sha1.replace("sha1=", "md5=");
        let sha256 = sigs.sha256.replace("sha256=", "whatever=");
        assert!(verify(BODY, Some(&sha1), Some(&sha256), SECRET).is_ok());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let sigs = sign(b"other", BODY).unwrap();
        let err = verify(BODY, Some(&sigs.sha1), Some(&sigs.sha256), SECRET).unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
    }

    #[test]
    fn test_missing_or_malformed_headers_are_rejected() {
        let sigs = sign(SECRET, BODY).unwrap();
        assert!(matches!(
            verify(BODY, None, Some(&sigs.sha256), SECRET),
            Err(Error::Rejected(_))
        ));
        assert!(matches!(
            verify(BODY, Some(&sigs.sha1), None, SECRET),
            Err(Error::Rejected(_))
        ));
        let no_label = sigs.sha1.trim_start_matches("sha1=").to_string();
        assert!(matches!(
            verify(BODY, Some(&no_label), Some(&sigs.sha256), SECRET),
            Err(Error::Rejected(_))
        ));
        assert!(matches!(
            verify(BODY, Some("sha1=zz"), Some(&sigs.sha256), SECRET),
            Err(Error::Rejected(_))
        ));
    }

    #[test]
    fn test_gate_parses_only_after_verification() {
        #[derive(serde::Deserialize)]
        struct Push {
            #[serde(rename = "ref")]
            git_ref: String,
        }

        let gate = WebhookGate::new(SECRET);
        let sigs = sign(SECRET, BODY).unwrap();
        let payload = gate
            .verify(BODY, Some(&sigs.sha1), Some(&sigs.sha256))
            .unwrap();
        let push: Push = payload.parse().unwrap();
        assert_eq!(push.git_ref, "refs/heads/master");
    }
}
