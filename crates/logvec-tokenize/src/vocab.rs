//! Closed vocabulary of the word-level tokenizer.

use std::collections::HashMap;

use logvec_core::config::{CLS_TOKEN, MASK_TOKEN, PAD_TOKEN, SEP_TOKEN, UNK_TOKEN};

const SPECIALS: [&str; 5] = [PAD_TOKEN, UNK_TOKEN, CLS_TOKEN, SEP_TOKEN, MASK_TOKEN];

// Punctuation the whitespace pre-tokenizer splits out of log lines.
const PUNCTUATION: [&str; 16] = ["[", "]", "(", ")", "{", "}", ":", "-", ".", ",", "/", "=", "\"", "'", "|", "#"];

const LEVELS: [&str; 12] = [
    "TRACE", "DEBUG", "INFO", "NOTICE", "WARN", "WARNING", "ERROR", "ERR", "CRITICAL", "FATAL", "ALERT", "EMERG",
];

const WORDS: [&str; 24] = [
    "system", "service", "started", "stopped", "failed", "success", "successfully", "connection", "request",
    "response", "user", "session", "timeout", "error", "warning", "kernel", "process", "pid", "port", "host",
    "login", "logout", "denied", "accepted",
];

/// Ids are assigned in order: specials first (`[PAD]`=0, `[UNK]`=1), then
/// punctuation, log levels, and common words.
pub fn word_vocab() -> HashMap<String, u32> {
    SPECIALS
        .iter()
        .chain(PUNCTUATION.iter())
        .chain(LEVELS.iter())
        .chain(WORDS.iter())
        .enumerate()
        .map(|(id, token)| (token.to_string(), id as u32))
        .collect()
}
