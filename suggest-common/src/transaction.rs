//! Transaction id utilities
//!
//! Every inbound request carries a transaction id which is forwarded to all
//! upstream calls in the `X-Request-Id` header and attached to every log line.

use uuid::Uuid;

/// Header carrying the transaction id in both directions
pub const TRANSACTION_ID_HEADER: &str = "X-Request-Id";

/// Generate a fresh transaction id (`tid_` followed by a random suffix)
pub fn generate() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("tid_{}", &suffix[..10])
}

/// Use the inbound transaction id when present and non-blank, otherwise generate one
pub fn from_header(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(tid) if !tid.is_empty() => tid.to_string(),
        _ => generate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = generate();
        let b = generate();
        assert!(a.starts_with("tid_"));
        assert_eq!(a.len(), 14);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_header_keeps_inbound_id() {
        assert_eq!(from_header(Some("tid_abc")), "tid_abc");
        assert_eq!(from_header(Some("  tid_abc ")), "tid_abc");
    }

    #[test]
    fn test_from_header_generates_when_missing_or_blank() {
        assert!(from_header(None).starts_with("tid_"));
        assert!(from_header(Some("   ")).starts_with("tid_"));
    }
}
