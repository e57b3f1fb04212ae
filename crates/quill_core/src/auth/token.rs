//! Opaque token minting.

use uuid::Uuid;

/// Hex length of every minted token.
pub const TOKEN_LEN: usize = 64;

/// Mints an unguessable token: 244 random bits from two v4 UUIDs, as hex.
pub fn generate_token() -> String {
    let mut token = String::with_capacity(TOKEN_LEN);
    token.push_str(&Uuid::new_v4().simple().to_string());
    token.push_str(&Uuid::new_v4().simple().to_string());
    token
}

/// Cheap shape check so obviously malformed input skips the database.
pub fn looks_like_token(value: &str) -> bool {
    value.len() == TOKEN_LEN && value.bytes().all(|byte| byte.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::{generate_token, looks_like_token, TOKEN_LEN};

    #[test]
    fn tokens_are_hex_and_unique() {
        let first = generate_token();
        let second = generate_token();
        assert_eq!(first.len(), TOKEN_LEN);
        assert!(looks_like_token(&first));
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(!looks_like_token(""));
        assert!(!looks_like_token("not-a-token"));
        assert!(!looks_like_token(&"g".repeat(TOKEN_LEN)));
    }
}
