//! Program loader - comma-separated integers into initial memory

use crate::error::{self, Result};
use crate::memory::{Memory, MemoryConfig};

/// Parse program text with the default memory layout.
///
/// Tokens are separated by commas; line breaks also separate tokens, and
/// whitespace around tokens is ignored. Blank lines and a trailing comma at
/// the end of a line are tolerated. An empty token between two commas is an
/// error.
///
/// ```rust
/// let memory = intcode_vm::loader::parse("1,0,0,0,99\n").unwrap();
/// assert_eq!(memory.slice(0, 5), vec![1, 0, 0, 0, 99]);
/// ```
pub fn parse(text: &str) -> Result<Memory> {
    parse_with_config(text, MemoryConfig::default())
}

/// Parse program text into memory with the given layout
pub fn parse_with_config(text: &str, config: MemoryConfig) -> Result<Memory> {
    config.validate()?;
    let words = parse_words(text)?;
    tracing::debug!(words = words.len(), "program loaded");
    Ok(Memory::from_words_with_config(words, config))
}

/// Parse program text into a plain vector of words
pub fn parse_words(text: &str) -> Result<Vec<i64>> {
    let mut words = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line = line.strip_suffix(',').unwrap_or(line);

        for token in line.split(',') {
            let token = token.trim();
            let value = token
                .parse::<i64>()
                .map_err(|e| error::invalid_token(token, words.len()).set_source(e))?;
            words.push(value);
        }
    }

    Ok(words)
}
