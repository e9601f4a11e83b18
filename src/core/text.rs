//! Answer Normalization
//!
//! Guesses and accepted answers are compared after trimming surrounding
//! whitespace and lowercasing, so `"  INCEPTION "` matches `"Inception"`.

/// Normalize free-form answer text for comparison.
pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Check whether a raw guess matches a raw accepted answer.
#[inline]
pub fn answers_match(guess: &str, accepted: &str) -> bool {
    normalize_answer(guess) == normalize_answer(accepted)
}
