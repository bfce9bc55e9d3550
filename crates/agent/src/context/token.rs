//! Token estimation utilities.
//!
//! A character-class heuristic, not a tokenizer: within each
//! whitespace-separated word, a run of letters/digits is one token and every
//! other character (punctuation, symbols, emoji) is a token of its own.
//! `"Hello, world!"` is four tokens: `Hello` `,` `world` `!`.
//!
//! Run characters are those with the Unicode `Alphabetic` or `Numeric`
//! property. That is wider than general-category letters and decimal digits:
//! superscripts, vulgar fractions and Roman numerals join a run, so `"x²"` is
//! one token.

use askollama_core::turn::Turn;

/// Floor for the per-request token budget sent to a local model.
pub const MIN_BUDGET_TOKENS: u32 = 32768;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> i32 {
    text.split_whitespace().map(estimate_word).sum()
}

fn estimate_word(word: &str) -> i32 {
    let mut tokens = 0;
    let mut in_run = false;
    for c in word.chars() {
        if c.is_alphabetic() || c.is_numeric() {
            in_run = true;
        } else {
            if in_run {
                tokens += 1;
                in_run = false;
            }
            tokens += 1;
        }
    }
    if in_run {
        tokens += 1;
    }
    tokens
}

/// Estimate tokens for prior turns as the backend sees them.
///
/// Each turn is rendered with a `User:` / `Assistant:` label, which costs two
/// tokens on top of the content.
pub fn estimate_turns_tokens(turns: &[Turn]) -> i32 {
    const LABEL_TOKENS: i32 = 2;
    turns
        .iter()
        .map(|t| LABEL_TOKENS + estimate_tokens(&t.content))
        .sum()
}

/// The `max_tokens` to request: estimated input plus the configured reply
/// allowance, never below [`MIN_BUDGET_TOKENS`].
pub fn max_tokens_budget(estimated_input: i32, reply_tokens: u32) -> u32 {
    let input = u32::try_from(estimated_input).unwrap_or(0);
    input.saturating_add(reply_tokens).max(MIN_BUDGET_TOKENS)
}
