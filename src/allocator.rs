use rand::Rng;

use crate::{db::LinkStore, error::LinkError};

/// Length of generated codes.
pub const GENERATED_CODE_LEN: usize = 6;

/// One initial draw plus ten retries.
pub const MAX_DRAWS: usize = 11;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// `true` if `code` is 6 to 8 ASCII alphanumerics.
pub fn is_valid_code(code: &str) -> bool {
    (6..=8).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Generate a random alphanumeric string of the given length.
pub fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn random_short_code() -> String {
    random_code(GENERATED_CODE_LEN)
}

/// Picks the code for a new link.
///
/// Existence checks here are advisory only. Two allocators can hand out the
/// same code concurrently; the insert that follows decides who wins.
#[derive(Clone, Copy, Debug)]
pub struct CodeAllocator {
    generate: fn() -> String,
}

impl CodeAllocator {
    pub fn new() -> Self {
        Self {
            generate: random_short_code,
        }
    }

    /// Swap the candidate source, e.g. for a deterministic sequence in tests.
    #[cfg(test)]
    pub fn with_generator(generate: fn() -> String) -> Self {
        Self { generate }
    }

    /// Honour `requested` if it is well-formed and free, otherwise draw random
    /// candidates until one is unused.
    pub async fn allocate(
        &self,
        store: &LinkStore,
        requested: Option<&str>,
    ) -> Result<String, LinkError> {
        if let Some(code) = requested {
            if !is_valid_code(code) {
                return Err(LinkError::InvalidFormat);
            }
            if store.code_exists(code).await? {
                return Err(LinkError::Conflict(code.to_owned()));
            }
            return Ok(code.to_owned());
        }

        for attempt in 1..=MAX_DRAWS {
            let candidate = (self.generate)();
            if !store.code_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!(attempt, code = %candidate, "Generated code already taken");
        }

        Err(LinkError::AllocationExhausted(MAX_DRAWS))
    }
}

impl Default for CodeAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn code_validation() {
        for ok in ["abc123", "ABCDEFG", "a1B2c3D4", "000000"] {
            assert!(is_valid_code(ok), "{ok} should be valid");
        }
        for bad in ["", "ab", "abc12", "abcdefghi", "abc-12", "abc 123", "abcdé1", "ab_123"] {
            assert!(!is_valid_code(bad), "{bad} should be invalid");
        }
    }

    #[test]
    fn random_codes_use_the_alphanumeric_alphabet() {
        for _ in 0..1000 {
            let code = random_code(GENERATED_CODE_LEN);
            assert_eq!(code.len(), GENERATED_CODE_LEN);
            assert!(is_valid_code(&code));
        }
    }

    #[test]
    fn random_codes_cover_every_character_class() {
        let sample: String = (0..200).map(|_| random_code(GENERATED_CODE_LEN)).collect();
        assert!(sample.bytes().any(|b| b.is_ascii_lowercase()));
        assert!(sample.bytes().any(|b| b.is_ascii_uppercase()));
        assert!(sample.bytes().any(|b| b.is_ascii_digit()));
    }

    #[tokio::test]
    async fn requested_code_is_returned_when_free() {
        let store = memory_store().await;
        let code = CodeAllocator::new()
            .allocate(&store, Some("myLink1"))
            .await
            .unwrap();
        assert_eq!(code, "myLink1");
    }

    #[tokio::test]
    async fn malformed_requested_code_is_rejected_before_lookup() {
        let store = memory_store().await;
        // Any query against a closed pool would fail with a database error.
        store.close().await;

        let err = CodeAllocator::new()
            .allocate(&store, Some("ab"))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::InvalidFormat));
    }

    #[tokio::test]
    async fn taken_requested_code_is_a_conflict() {
        let store = memory_store().await;
        store
            .insert("taken1", "https://example.com", Utc::now())
            .await
            .unwrap();

        let err = CodeAllocator::new()
            .allocate(&store, Some("taken1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Conflict(code) if code == "taken1"));
    }

    #[tokio::test]
    async fn generated_code_skips_collisions() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn sequence() -> String {
            match CALLS.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => "taken1".to_owned(),
                _ => "fresh1".to_owned(),
            }
        }

        let store = memory_store().await;
        store
            .insert("taken1", "https://example.com", Utc::now())
            .await
            .unwrap();

        let code = CodeAllocator::with_generator(sequence)
            .allocate(&store, None)
            .await
            .unwrap();
        assert_eq!(code, "fresh1");
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_eleven_collisions() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn always_taken() -> String {
            CALLS.fetch_add(1, Ordering::SeqCst);
            "taken1".to_owned()
        }

        let store = memory_store().await;
        store
            .insert("taken1", "https://example.com", Utc::now())
            .await
            .unwrap();

        let err = CodeAllocator::with_generator(always_taken)
            .allocate(&store, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::AllocationExhausted(MAX_DRAWS)));
        assert_eq!(CALLS.load(Ordering::SeqCst), MAX_DRAWS);
    }
}
