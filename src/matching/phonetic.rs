// src/matching/phonetic.rs
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use strsim::levenshtein;

use crate::utils::error::ScoringError;

pub const DEFAULT_SOUNDEX_LENGTH: usize = 10;
pub const DEFAULT_CACHE_SIZE: usize = 20000;

/// Soundex digit for an uppercase ASCII letter. Vowels (and y) separate runs
/// of equal digits; h and w do not.
fn soundex_digit(letter: char) -> Option<char> {
    match letter {
        'B' | 'F' | 'P' | 'V' => Some('1'),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
        'D' | 'T' => Some('3'),
        'L' => Some('4'),
        'M' | 'N' => Some('5'),
        'R' => Some('6'),
        'A' | 'E' | 'I' | 'O' | 'U' | 'Y' => Some('0'),
        _ => None,
    }
}

/// Soundex code of `name`, padded or truncated to `length`. A name without any
/// letters encodes to the empty string. Non-ASCII input is an error.
pub fn soundex(name: &str, length: usize) -> Result<String, ScoringError> {
    let mut code = String::with_capacity(length);
    let mut last_digit: Option<char> = None;

    for ch in name.chars() {
        if !ch.is_ascii() {
            return Err(ScoringError::Encoding {
                name: name.to_string(),
                ch,
            });
        }
        if !ch.is_ascii_alphabetic() || code.len() >= length {
            continue;
        }
        let letter = ch.to_ascii_uppercase();
        let digit = soundex_digit(letter);

        if code.is_empty() {
            code.push(letter);
            last_digit = digit;
            continue;
        }
        match digit {
            Some('0') => last_digit = Some('0'),
            Some(d) if last_digit != Some(d) => {
                code.push(d);
                last_digit = Some(d);
            }
            _ => {}
        }
    }

    if !code.is_empty() {
        while code.len() < length {
            code.push('0');
        }
    }
    Ok(code)
}

/// Soundex encoder with a bounded memo of previously computed codes.
pub struct PhoneticEncoder {
    code_length: usize,
    cache: LruCache<String, String>,
    pub hits: usize,
    pub misses: usize,
}

impl PhoneticEncoder {
    /// `code_length` and `cache_size` are validated by `DedupeConfig`; zero
    /// values fall back to the defaults.
    pub fn new(code_length: usize, cache_size: usize) -> Self {
        let code_length = if code_length == 0 {
            DEFAULT_SOUNDEX_LENGTH
        } else {
            code_length
        };
        let capacity = NonZeroUsize::new(cache_size)
            .or_else(|| NonZeroUsize::new(DEFAULT_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);
        debug!(
            "Initializing PhoneticEncoder (code length {}, cache size {})",
            code_length, capacity
        );
        Self {
            code_length,
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn code_length(&self) -> usize {
        self.code_length
    }

    pub fn encode(&mut self, name: &str) -> Result<String, ScoringError> {
        if let Some(code) = self.cache.get(name) {
            self.hits += 1;
            return Ok(code.clone());
        }
        self.misses += 1;
        let code = soundex(name, self.code_length)?;
        self.cache.put(name.to_string(), code.clone());
        Ok(code)
    }

    /// `1 - lev(code_a, code_b) / code_length`, in [0, 1].
    pub fn similarity(&mut self, a: &str, b: &str) -> Result<f64, ScoringError> {
        let code_a = self.encode(a)?;
        let code_b = self.encode(b)?;
        let distance = levenshtein(&code_a, &code_b) as f64;
        Ok((1.0 - distance / self.code_length as f64).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_soundex_codes() {
        assert_eq!(soundex("Robert", 4).unwrap(), "R163");
        assert_eq!(soundex("Rupert", 4).unwrap(), "R163");
        assert_eq!(soundex("Tymczak", 4).unwrap(), "T522");
        assert_eq!(soundex("Pfister", 4).unwrap(), "P236");
        assert_eq!(soundex("Ashcraft", 4).unwrap(), "A261");
        assert_eq!(soundex("Lee", 4).unwrap(), "L000");
    }

    #[test]
    fn test_padding_and_truncation() {
        assert_eq!(soundex("Smith", 10).unwrap(), "S530000000");
        assert_eq!(soundex("Smith", 1).unwrap(), "S");
        assert_eq!(soundex("", 10).unwrap(), "");
        assert_eq!(soundex("O'Neil", 4).unwrap(), "O540");
    }

    #[test]
    fn test_non_ascii_is_an_encoding_error() {
        let err = soundex("Müller", 10).unwrap_err();
        assert_eq!(
            err,
            ScoringError::Encoding {
                name: "Müller".into(),
                ch: 'ü'
            }
        );
    }

    #[test]
    fn test_similarity_and_cache() {
        let mut encoder = PhoneticEncoder::new(10, 16);
        assert_eq!(encoder.similarity("Smith", "Smyth").unwrap(), 1.0);
        let s = encoder.similarity("Smith", "Jones").unwrap();
        assert!(s < 1.0 && s >= 0.0);
        assert_eq!(encoder.misses, 3);
        assert_eq!(encoder.hits, 1);
    }
}
