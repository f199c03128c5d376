//! HMAC-SHA256 payload signing for outbound deliveries.
//!
//! The signature covers the canonical form of the event payload: JSON with
//! object keys sorted lexicographically at every depth and no insignificant
//! whitespace. The dispatcher sends exactly the canonical bytes it signed,
//! so receivers verify by recomputing HMAC-SHA256 over the raw request body
//! with their webhook secret and comparing in constant time against the
//! `X-Webhook-Signature: sha256=<hexdigest>` header.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Scheme prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

/// Rebuild a JSON value with object keys sorted at every depth.
///
/// Arrays keep their order; scalars are untouched. Sorting is explicit so
/// the canonical form does not depend on the map backend serde_json was
/// compiled with.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut sorted = serde_json::Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key.clone(), canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize a payload to its canonical wire bytes.
///
/// These are both the signed bytes and the POSTed body bytes.
pub fn canonical_bytes(value: &Value) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&canonicalize(value))
}

/// Compute the HMAC-SHA256 signature over raw bytes.
///
/// Returns the lowercase hex digest.
#[must_use]
pub fn compute_signature(payload: &[u8], secret: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(payload);

    hex::encode(mac.finalize().into_bytes())
}

/// Sign a JSON payload over its canonical form.
pub fn sign(payload: &Value, secret: &str) -> serde_json::Result<String> {
    Ok(compute_signature(&canonical_bytes(payload)?, secret))
}

/// Verify a signature over raw body bytes using constant-time comparison.
///
/// Returns false on any mismatch; a bad signature is never an error.
#[must_use]
pub fn verify_bytes(body: &[u8], signature: &str, secret: &str) -> bool {
    let computed = compute_signature(body, secret);
    constant_time_eq(signature.as_bytes(), computed.as_bytes())
}

/// Verify a signature against a JSON payload's canonical form.
#[must_use]
pub fn verify(payload: &Value, signature: &str, secret: &str) -> bool {
    match canonical_bytes(payload) {
        Ok(bytes) => verify_bytes(&bytes, signature, secret),
        Err(_) => false,
    }
}

/// Build the signature header for a payload.
///
/// Returns `(name, value)` where value is `sha256=<hexdigest>`.
pub fn signature_header(payload: &Value, secret: &str) -> serde_json::Result<(&'static str, String)> {
    let signature = sign(payload, secret)?;
    Ok((SIGNATURE_HEADER, format!("{SIGNATURE_PREFIX}{signature}")))
}

/// Constant-time byte comparison to prevent timing attacks.
///
/// SECURITY: Uses the `subtle` crate for proper constant-time comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sign_verify_roundtrip() {
        let payload = json!({"user_id": "u-1", "action": "created"});
        let sig = sign(&payload, "secret").unwrap();
        assert!(verify(&payload, &sig, "secret"));
    }

    #[test]
    fn test_verify_rejects_mutated_payload() {
        let payload = json!({"user_id": "u-1", "action": "created"});
        let sig = sign(&payload, "secret").unwrap();

        let mutated = json!({"user_id": "u-2", "action": "created"});
        assert!(!verify(&mutated, &sig, "secret"));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let payload = json!({"user_id": "u-1"});
        let sig = sign(&payload, "secret").unwrap();
        assert!(!verify(&payload, &sig, "other-secret"));
    }

    #[test]
    fn test_verify_rejects_mutated_signature() {
        let payload = json!({"user_id": "u-1"});
        let mut sig = sign(&payload, "secret").unwrap();
        // Flip one hex digit
        let last = if sig.ends_with('0') { '1' } else { '0' };
        sig.pop();
        sig.push(last);
        assert!(!verify(&payload, &sig, "secret"));
    }

    #[test]
    fn test_verify_rejects_truncated_signature() {
        let payload = json!({"user_id": "u-1"});
        let sig = sign(&payload, "secret").unwrap();
        assert!(!verify(&payload, &sig[..32], "secret"));
    }

    #[test]
    fn test_signature_is_lowercase_hex() {
        let sig = sign(&json!({"a": 1}), "secret").unwrap();
        // SHA256 = 32 bytes = 64 hex chars
        assert_eq!(sig.len(), 64);
        assert!(sig
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_signature_deterministic() {
        let payload = json!({"a": 1, "b": [1, 2, 3]});
        assert_eq!(
            sign(&payload, "secret").unwrap(),
            sign(&payload, "secret").unwrap()
        );
    }

    #[test]
    fn test_canonical_form_sorts_keys_compactly() {
        let payload = json!({"b": 2, "a": 1});
        let bytes = canonical_bytes(&payload).unwrap();
        assert_eq!(bytes, br#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_canonicalize_sorts_nested_objects() {
        let payload = json!({"z": {"b": 1, "a": 2}, "m": [{"d": 1, "c": 2}]});
        let bytes = canonical_bytes(&payload).unwrap();
        assert_eq!(bytes, br#"{"m":[{"c":2,"d":1}],"z":{"a":2,"b":1}}"#);
    }

    #[test]
    fn test_canonicalize_preserves_array_order() {
        let payload = json!({"items": [3, 1, 2]});
        let bytes = canonical_bytes(&payload).unwrap();
        assert_eq!(bytes, br#"{"items":[3,1,2]}"#);
    }

    #[test]
    fn test_signature_independent_of_key_insertion_order() {
        let mut first = serde_json::Map::new();
        first.insert("alpha".to_string(), json!(1));
        first.insert("beta".to_string(), json!(2));

        let mut second = serde_json::Map::new();
        second.insert("beta".to_string(), json!(2));
        second.insert("alpha".to_string(), json!(1));

        assert_eq!(
            sign(&Value::Object(first), "secret").unwrap(),
            sign(&Value::Object(second), "secret").unwrap()
        );
    }

    #[test]
    fn test_signature_header_format() {
        let payload = json!({"a": 1});
        let (name, value) = signature_header(&payload, "secret").unwrap();
        assert_eq!(name, "X-Webhook-Signature");
        assert!(value.starts_with("sha256="));
        assert_eq!(value.len(), "sha256=".len() + 64);
    }

    #[test]
    fn test_verify_bytes_matches_header_value() {
        let payload = json!({"order_id": "o-77", "total": 12.5});
        let bytes = canonical_bytes(&payload).unwrap();
        let (_, value) = signature_header(&payload, "whsec_test").unwrap();

        let hex_digest = value.strip_prefix("sha256=").unwrap();
        assert!(verify_bytes(&bytes, hex_digest, "whsec_test"));
    }

    #[test]
    fn test_constant_time_eq_equal() {
        assert!(constant_time_eq(b"hello", b"hello"));
    }

    #[test]
    fn test_constant_time_eq_different_length() {
        assert!(!constant_time_eq(b"hello", b"hi"));
    }

    #[test]
    fn test_constant_time_eq_different_content() {
        assert!(!constant_time_eq(b"hello", b"world"));
    }
}
