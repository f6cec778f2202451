use rand::{rngs::OsRng, RngCore};

use crate::error::EntropyError;

/// Raw session token size before hex encoding.
pub const SESSION_TOKEN_BYTES: usize = 24;

/// Length of an encoded session token.
pub const SESSION_TOKEN_LEN: usize = SESSION_TOKEN_BYTES * 2;

/// Draw a new session token from the OS random source.
pub fn generate_token() -> Result<String, EntropyError> {
    generate_token_with(&mut OsRng)
}

/// Draw a session token from `rng`. The buffer must be filled completely or the
/// call fails; a partial read is never turned into a token.
pub fn generate_token_with<R: RngCore + ?Sized>(rng: &mut R) -> Result<String, EntropyError> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| EntropyError(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Cheap shape check used before a token reaches the store.
pub fn looks_like_token(value: &str) -> bool {
    value.len() == SESSION_TOKEN_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0)
        }
        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "short read",
            )))
        }
    }

    #[test]
    fn tokens_are_unique_and_fixed_size() {
        let mut seen = HashSet::with_capacity(10_000);
        for _ in 0..10_000 {
            let token = generate_token().unwrap();
            assert_eq!(token.len(), SESSION_TOKEN_LEN);
            assert_eq!(hex::decode(&token).unwrap().len(), SESSION_TOKEN_BYTES);
            assert!(seen.insert(token));
        }
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn failing_source_is_an_error() {
        let err = generate_token_with(&mut BrokenRng).unwrap_err();
        assert!(err.to_string().contains("short read"));
    }

    #[test]
    fn token_shape_check() {
        assert!(looks_like_token(&generate_token().unwrap()));
        assert!(!looks_like_token("abc"));
        assert!(!looks_like_token(&"z".repeat(SESSION_TOKEN_LEN)));
    }
}
