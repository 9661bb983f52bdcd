//! Gateway request/webhook signature codec.
//!
//! Implements the provider's asymmetric signing protocol: a canonical
//! sorted `key=value` string over the request parameters, RSA-SHA256
//! (PKCS#1 v1.5) over its UTF-8 bytes, base64 transport encoding.
//!
//! Verification fails closed: any base64/key/signature decode error is
//! reported as a verification failure, never a panic that could bypass the
//! caller's rejection branch.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

/// Errors from key handling and signing.
///
/// Verification intentionally has no error type; it answers with a bool.
#[derive(Debug, Clone, Error)]
pub enum SignatureError {
    #[error("Invalid RSA key material: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Builds the canonical signing string from ordered key/value pairs.
///
/// Rules: drop `sign` and `sign_type`, URL-decode every key and value,
/// sort by key ascending (repeated keys keep their encounter order), join
/// as `key=value` with `&`.
pub fn build_canonical_string(pairs: &[(String, String)]) -> String {
    let mut decoded: Vec<(String, String)> = pairs
        .iter()
        .filter(|(key, _)| key != "sign" && key != "sign_type")
        .map(|(key, value)| (url_decode(key), url_decode(value)))
        .collect();
    // Stable sort: equal keys stay in encounter order.
    decoded.sort_by(|a, b| a.0.cmp(&b.0));

    decoded
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Form-style URL decoding: `+` means space, then percent-decoding.
///
/// Input that is not valid percent-encoding is kept as-is rather than
/// rejected; the signature check downstream decides validity.
pub fn url_decode(s: &str) -> String {
    let plus_decoded = s.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}

/// Wraps raw base64 key material with PEM armor at 64-character lines.
///
/// Idempotent: input that already carries a PEM header passes through
/// unchanged (modulo surrounding whitespace).
pub fn format_pem(key_material: &str, label: &str) -> String {
    let trimmed = key_material.trim();
    if trimmed.starts_with("-----BEGIN") {
        return trimmed.to_string();
    }

    let body: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = format!("-----BEGIN {}-----\n", label);
    for chunk in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {}-----\n", label));
    pem
}

/// Signs canonical strings with the merchant's RSA private key.
#[derive(Clone)]
pub struct RsaSigner {
    signing_key: SigningKey<Sha256>,
}

impl RsaSigner {
    /// Parses private key material, PEM-armored or raw base64.
    ///
    /// Accepts PKCS#8 (`PRIVATE KEY`) and PKCS#1 (`RSA PRIVATE KEY`)
    /// encodings.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidKey` if neither encoding parses.
    pub fn from_pem(key_material: &str) -> Result<Self, SignatureError> {
        let pkcs8 = format_pem(key_material, "PRIVATE KEY");
        let pkcs1 = format_pem(key_material, "RSA PRIVATE KEY");

        let key = RsaPrivateKey::from_pkcs8_pem(&pkcs8)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pkcs1))
            .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;

        Ok(Self {
            signing_key: SigningKey::new(key),
        })
    }

    /// Signs the content, returning the base64-encoded signature.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::Signing` if the RSA operation fails.
    pub fn sign(&self, content: &str) -> Result<String, SignatureError> {
        let signature = self
            .signing_key
            .try_sign(content.as_bytes())
            .map_err(|e| SignatureError::Signing(e.to_string()))?;
        Ok(BASE64.encode(signature.to_bytes()))
    }
}

/// Verifies gateway signatures with the provider's RSA public key.
#[derive(Clone)]
pub struct RsaVerifier {
    verifying_key: VerifyingKey<Sha256>,
}

impl RsaVerifier {
    /// Parses public key material, PEM-armored or raw base64.
    ///
    /// Accepts SPKI (`PUBLIC KEY`) and PKCS#1 (`RSA PUBLIC KEY`) encodings.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidKey` if neither encoding parses.
    pub fn from_pem(key_material: &str) -> Result<Self, SignatureError> {
        let spki = format_pem(key_material, "PUBLIC KEY");
        let pkcs1 = format_pem(key_material, "RSA PUBLIC KEY");

        let key = RsaPublicKey::from_public_key_pem(&spki)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(&pkcs1))
            .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;

        Ok(Self {
            verifying_key: VerifyingKey::new(key),
        })
    }

    /// Verifies a base64-encoded signature over the content.
    ///
    /// Fails closed: undecodable base64 or a malformed signature is a
    /// verification failure, not an error.
    pub fn verify(&self, content: &str, signature_b64: &str) -> bool {
        let Ok(bytes) = BASE64.decode(signature_b64.trim()) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
            return false;
        };
        self.verifying_key
            .verify(content.as_bytes(), &signature)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use std::sync::OnceLock;

    /// Key generation is expensive; share one pair across the module.
    fn test_key_pems() -> &'static (String, String) {
        static KEYS: OnceLock<(String, String)> = OnceLock::new();
        KEYS.get_or_init(|| {
            let mut rng = rand::thread_rng();
            let private = RsaPrivateKey::new(&mut rng, 2048).expect("keygen");
            let public = RsaPublicKey::from(&private);
            (
                private
                    .to_pkcs8_pem(LineEnding::LF)
                    .expect("pkcs8 pem")
                    .to_string(),
                public.to_public_key_pem(LineEnding::LF).expect("spki pem"),
            )
        })
    }

    fn test_signer() -> RsaSigner {
        RsaSigner::from_pem(&test_key_pems().0).unwrap()
    }

    fn test_verifier() -> RsaVerifier {
        RsaVerifier::from_pem(&test_key_pems().1).unwrap()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ══════════════════════════════════════════════════════════════
    // Canonical String Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn canonical_string_sorts_keys_ascending() {
        let input = pairs(&[("b", "2"), ("a", "1"), ("c", "3")]);
        assert_eq!(build_canonical_string(&input), "a=1&b=2&c=3");
    }

    #[test]
    fn canonical_string_excludes_sign_fields() {
        let input = pairs(&[
            ("out_trade_no", "123"),
            ("sign", "SIGVALUE"),
            ("sign_type", "RSA2"),
            ("total_amount", "9.99"),
        ]);
        assert_eq!(
            build_canonical_string(&input),
            "out_trade_no=123&total_amount=9.99"
        );
    }

    #[test]
    fn canonical_string_url_decodes_values() {
        let input = pairs(&[("subject", "Annual%20Plan"), ("buyer", "a%40b.com")]);
        assert_eq!(
            build_canonical_string(&input),
            "buyer=a@b.com&subject=Annual Plan"
        );
    }

    #[test]
    fn canonical_string_decodes_plus_as_space() {
        let input = pairs(&[("subject", "Annual+Plan")]);
        assert_eq!(build_canonical_string(&input), "subject=Annual Plan");
    }

    #[test]
    fn canonical_string_preserves_repeated_key_order() {
        let input = pairs(&[("k", "first"), ("a", "x"), ("k", "second")]);
        assert_eq!(build_canonical_string(&input), "a=x&k=first&k=second");
    }

    #[test]
    fn canonical_string_of_empty_input_is_empty() {
        assert_eq!(build_canonical_string(&[]), "");
    }

    proptest! {
        /// Order of distinct-keyed input pairs never changes the output.
        #[test]
        fn canonical_string_is_input_order_independent(
            mut entries in proptest::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9]{0,8}", 1..8)
        ) {
            entries.remove("sign");
            entries.remove("sign_type");
            let sorted: Vec<(String, String)> =
                entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let mut reversed = sorted.clone();
            reversed.reverse();
            prop_assert_eq!(
                build_canonical_string(&sorted),
                build_canonical_string(&reversed)
            );
        }
    }

    // ══════════════════════════════════════════════════════════════
    // PEM Formatting Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn format_pem_wraps_at_64_chars() {
        let raw = "A".repeat(100);
        let pem = format_pem(&raw, "PUBLIC KEY");
        let lines: Vec<&str> = pem.lines().collect();
        assert_eq!(lines[0], "-----BEGIN PUBLIC KEY-----");
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[2].len(), 36);
        assert_eq!(lines[3], "-----END PUBLIC KEY-----");
    }

    #[test]
    fn format_pem_is_idempotent() {
        let raw = "B".repeat(80);
        let once = format_pem(&raw, "PRIVATE KEY");
        let twice = format_pem(&once, "PRIVATE KEY");
        assert_eq!(once.trim(), twice.trim());
    }

    #[test]
    fn format_pem_strips_embedded_whitespace() {
        let pem = format_pem("AAAA\nBBBB CCCC", "PUBLIC KEY");
        assert!(pem.contains("AAAABBBBCCCC"));
    }

    // ══════════════════════════════════════════════════════════════
    // Sign / Verify Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn sign_then_verify_succeeds() {
        let signer = test_signer();
        let verifier = test_verifier();
        let content = "app_id=1001&out_trade_no=20240601123045&total_amount=88.88";

        let signature = signer.sign(content).unwrap();

        assert!(verifier.verify(content, &signature));
    }

    #[test]
    fn verify_fails_for_tampered_content() {
        let signer = test_signer();
        let verifier = test_verifier();
        let signature = signer.sign("total_amount=88.88").unwrap();

        assert!(!verifier.verify("total_amount=99.88", &signature));
    }

    #[test]
    fn verify_fails_for_tampered_signature() {
        let signer = test_signer();
        let verifier = test_verifier();
        let signature = signer.sign("out_trade_no=1").unwrap();

        let mut bytes = BASE64.decode(&signature).unwrap();
        bytes[0] ^= 0x01;
        let tampered = BASE64.encode(&bytes);

        assert!(!verifier.verify("out_trade_no=1", &tampered));
    }

    #[test]
    fn verify_fails_closed_on_invalid_base64() {
        let verifier = test_verifier();
        assert!(!verifier.verify("content", "not//valid==base64!!!"));
    }

    #[test]
    fn verify_fails_closed_on_truncated_signature() {
        let verifier = test_verifier();
        assert!(!verifier.verify("content", &BASE64.encode([1u8, 2, 3])));
    }

    #[test]
    fn signer_accepts_raw_base64_key_material() {
        let pem = &test_key_pems().0;
        let raw: String = pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();

        let signer = RsaSigner::from_pem(&raw).unwrap();
        let verifier = test_verifier();
        let signature = signer.sign("k=v").unwrap();

        assert!(verifier.verify("k=v", &signature));
    }

    #[test]
    fn signer_rejects_garbage_key() {
        let result = RsaSigner::from_pem("definitely not a key");
        assert!(matches!(result, Err(SignatureError::InvalidKey(_))));
    }

    #[test]
    fn verifier_rejects_garbage_key() {
        let result = RsaVerifier::from_pem("AAAA");
        assert!(matches!(result, Err(SignatureError::InvalidKey(_))));
    }

    #[test]
    fn signing_is_deterministic_for_same_content() {
        let signer = test_signer();
        assert_eq!(signer.sign("a=1").unwrap(), signer.sign("a=1").unwrap());
    }
}
