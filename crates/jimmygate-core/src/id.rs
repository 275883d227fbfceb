//! Identifier minting for completions and normalized messages.

use uuid::Uuid;

/// Prefix for chat completion ids (`chatcmpl-...`).
pub const COMPLETION_ID_PREFIX: &str = "chatcmpl";

/// Prefix for message ids minted during normalization (`msg-...`).
pub const MESSAGE_ID_PREFIX: &str = "msg";

/// Mint `<prefix>-<24 hex chars>` from a fresh v4 UUID.
pub fn make_id(prefix: &str) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &simple[..24])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id_shape() {
        let id = make_id(COMPLETION_ID_PREFIX);
        let suffix = id.strip_prefix("chatcmpl-").unwrap();
        assert_eq!(suffix.len(), 24);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_make_id_unique() {
        assert_ne!(make_id(MESSAGE_ID_PREFIX), make_id(MESSAGE_ID_PREFIX));
    }
}
