//! GitHub webhook signature verification using HMAC-SHA1.
//!
//! GitHub signs each delivery with the shared secret and sends the result in
//! the `X-Hub-Signature` header as `sha1=<hex>`. Older deployments of this
//! relay used a bare base64 digest instead; that encoding is still accepted
//! when the config selects it.
//!
//! Verification never panics and never returns an error: every failure is a
//! [`Verification`] variant so the handler can log the cause and still answer
//! the caller with a uniform rejection.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::config::SharedSecret;

type HmacSha1 = Hmac<Sha1>;

const HEX_PREFIX: &str = "sha1=";

/// How the digest is encoded in the signature header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureFormat {
    /// `sha1=<lowercase hex>`, what GitHub sends.
    #[default]
    Hex,
    /// Legacy: standard base64 of the raw digest, no prefix.
    Base64,
}

/// Outcome of checking one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Valid,
    MissingSecret,
    MissingSignature,
    Malformed,
    Mismatch,
}

impl Verification {
    pub fn is_valid(self) -> bool {
        self == Verification::Valid
    }

    /// Short label used in logs and metrics.
    pub fn reason(self) -> &'static str {
        match self {
            Verification::Valid => "valid",
            Verification::MissingSecret => "missing_secret",
            Verification::MissingSignature => "missing_signature",
            Verification::Malformed => "malformed_signature",
            Verification::Mismatch => "mismatch",
        }
    }
}

fn compute_digest(secret: &[u8], payload: &[u8]) -> Option<HmacSha1> {
    let mut mac = match HmacSha1::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return None,
    };
    mac.update(payload);
    Some(mac)
}

/// Produces the header value GitHub would send for `payload`.
pub fn sign(secret: &[u8], payload: &[u8], format: SignatureFormat) -> Option<String> {
    let digest = compute_digest(secret, payload)?.finalize().into_bytes();
    Some(match format {
        SignatureFormat::Hex => format!("{HEX_PREFIX}{}", hex::encode(digest)),
        SignatureFormat::Base64 => BASE64.encode(digest),
    })
}

/// Decodes a header value into raw digest bytes. `None` for anything malformed.
pub fn parse_signature_header(header: &str, format: SignatureFormat) -> Option<Vec<u8>> {
    match format {
        SignatureFormat::Hex => hex::decode(header.trim().strip_prefix(HEX_PREFIX)?).ok(),
        SignatureFormat::Base64 => BASE64.decode(header.trim()).ok(),
    }
}

/// Checks a delivery against the shared secret in constant time.
pub fn verify(
    secret: Option<&SharedSecret>,
    payload: &[u8],
    signature_header: Option<&str>,
    format: SignatureFormat,
) -> Verification {
    let outcome = check(secret, payload, signature_header, format);
    match outcome {
        Verification::Valid => {}
        Verification::MissingSecret => {
            tracing::warn!("No shared secret configured, rejecting webhook")
        }
        Verification::MissingSignature => {
            tracing::warn!("Webhook carried no X-Hub-Signature header, is the hook given a secret?")
        }
        Verification::Malformed => {
            tracing::warn!(?format, "Webhook signature could not be decoded")
        }
        Verification::Mismatch => tracing::warn!("Webhook signature did not match our digest"),
    }
    outcome
}

fn check(
    secret: Option<&SharedSecret>,
    payload: &[u8],
    signature_header: Option<&str>,
    format: SignatureFormat,
) -> Verification {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return Verification::MissingSecret;
    };
    let Some(header) = signature_header.filter(|h| !h.trim().is_empty()) else {
        return Verification::MissingSignature;
    };
    let Some(expected) = parse_signature_header(header, format) else {
        return Verification::Malformed;
    };

    let Some(mac) = compute_digest(secret.as_bytes(), payload) else {
        return Verification::Mismatch;
    };

    // verify_slice compares in constant time and rejects wrong lengths.
    match mac.verify_slice(&expected) {
        Ok(()) => Verification::Valid,
        Err(_) => Verification::Mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secret(s: &[u8]) -> SharedSecret {
        SharedSecret::new(String::from_utf8_lossy(s).into_owned())
    }

    fn roundtrip(key: &str, payload: &[u8], format: SignatureFormat) -> Verification {
        let header = sign(key.as_bytes(), payload, format).unwrap();
        verify(Some(&SharedSecret::new(key)), payload, Some(&header), format)
    }

    #[test]
    fn known_vector_abc_hello() {
        // HMAC-SHA1(key="abc", msg="hello")
        let header = sign(b"abc", b"hello", SignatureFormat::Hex).unwrap();
        assert!(header.starts_with("sha1="));
        assert_eq!(header.len(), "sha1=".len() + 40);

        let key = SharedSecret::new("abc");
        assert_eq!(
            verify(Some(&key), b"hello", Some(&header), SignatureFormat::Hex),
            Verification::Valid
        );
        assert_eq!(
            verify(Some(&key), b"hello", Some("sha1=deadbeef"), SignatureFormat::Hex),
            Verification::Mismatch
        );
    }

    #[test]
    fn rfc2202_test_case_2() {
        let header = sign(b"Jefe", b"what do ya want for nothing?", SignatureFormat::Hex);
        assert_eq!(
            header.as_deref(),
            Some("sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79")
        );
    }

    #[test]
    fn keys_of_any_length_sign_and_verify() {
        for len in [1, 20, 64, 65, 300] {
            let key = "k".repeat(len);
            assert_eq!(roundtrip(&key, b"payload", SignatureFormat::Hex), Verification::Valid);
        }
        assert!(sign(b"", b"payload", SignatureFormat::Hex).is_some());
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let header = sign(b"abc", b"hello", SignatureFormat::Hex).unwrap().to_uppercase();
        let header = header.replacen("SHA1=", "sha1=", 1);
        let key = SharedSecret::new("abc");
        assert!(verify(Some(&key), b"hello", Some(&header), SignatureFormat::Hex).is_valid());
    }

    #[test]
    fn legacy_base64_roundtrip() {
        assert_eq!(roundtrip("abc", b"hello", SignatureFormat::Base64), Verification::Valid);
        let header = sign(b"abc", b"hello", SignatureFormat::Base64).unwrap();
        assert!(!header.starts_with("sha1="));
        assert_eq!(BASE64.decode(&header).unwrap().len(), 20);
    }

    #[test]
    fn hex_header_rejected_under_base64_format() {
        let header = sign(b"abc", b"hello", SignatureFormat::Hex).unwrap();
        let key = SharedSecret::new("abc");
        assert!(!verify(Some(&key), b"hello", Some(&header), SignatureFormat::Base64).is_valid());
    }

    #[test]
    fn missing_secret_is_rejected() {
        let header = sign(b"", b"hello", SignatureFormat::Hex).unwrap();
        assert_eq!(
            verify(None, b"hello", Some(&header), SignatureFormat::Hex),
            Verification::MissingSecret
        );
        assert_eq!(
            verify(Some(&SharedSecret::new("")), b"hello", Some(&header), SignatureFormat::Hex),
            Verification::MissingSecret
        );
    }

    #[test]
    fn missing_header_is_rejected() {
        let key = SharedSecret::new("abc");
        assert_eq!(
            verify(Some(&key), b"hello", None, SignatureFormat::Hex),
            Verification::MissingSignature
        );
        assert_eq!(
            verify(Some(&key), b"hello", Some("  "), SignatureFormat::Hex),
            Verification::MissingSignature
        );
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let key = SharedSecret::new("abc");
        for header in ["abcdef", "sha256=abcd", "sha1=xyz", "sha1=abc", "sha1"] {
            assert_eq!(
                verify(Some(&key), b"hello", Some(header), SignatureFormat::Hex),
                Verification::Malformed,
                "{header}"
            );
        }
        assert_eq!(
            verify(Some(&key), b"hello", Some("not base64!"), SignatureFormat::Base64),
            Verification::Malformed
        );
    }

    #[test]
    fn truncated_digest_is_a_mismatch() {
        let header = sign(b"abc", b"hello", SignatureFormat::Hex).unwrap();
        let truncated = &header[..header.len() - 2];
        let key = SharedSecret::new("abc");
        assert_eq!(
            verify(Some(&key), b"hello", Some(truncated), SignatureFormat::Hex),
            Verification::Mismatch
        );
    }

    proptest! {
        #[test]
        fn prop_sign_verify_roundtrip(payload: Vec<u8>, key in "[ -~]{1,32}") {
            prop_assert!(roundtrip(&key, &payload, SignatureFormat::Hex).is_valid());
            prop_assert!(roundtrip(&key, &payload, SignatureFormat::Base64).is_valid());
        }

        #[test]
        fn prop_bit_flip_in_payload_fails(
            payload in proptest::collection::vec(any::<u8>(), 1..256),
            key in "[a-z]{1,16}",
            index: usize,
            bit in 0u8..8,
        ) {
            let header = sign(key.as_bytes(), &payload, SignatureFormat::Hex).unwrap();
            let mut mutated = payload.clone();
            let i = index % mutated.len();
            mutated[i] ^= 1 << bit;
            prop_assert_eq!(
                verify(
                    Some(&SharedSecret::new(key)),
                    &mutated,
                    Some(&header),
                    SignatureFormat::Hex
                ),
                Verification::Mismatch
            );
        }

        #[test]
        fn prop_bit_flip_in_secret_fails(
            payload: Vec<u8>,
            key in proptest::collection::vec(0x20u8..0x7f, 1..32),
            index: usize,
            bit in 0u8..6,
        ) {
            let header = sign(&key, &payload, SignatureFormat::Hex).unwrap();
            let mut mutated = key.clone();
            let i = index % mutated.len();
            mutated[i] ^= 1 << bit;
            prop_assume!(mutated != key);
            let outcome =
                verify(Some(&secret(&mutated)), &payload, Some(&header), SignatureFormat::Hex);
            prop_assert!(!outcome.is_valid());
        }

        #[test]
        fn prop_arbitrary_header_never_panics(header: String, payload: Vec<u8>) {
            let key = SharedSecret::new("abc");
            let _ = verify(Some(&key), &payload, Some(&header), SignatureFormat::Hex);
            let _ = verify(Some(&key), &payload, Some(&header), SignatureFormat::Base64);
        }
    }
}
