//! Random password generation and strength classification

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;
use zeroize::Zeroizing;

use crate::errors::{PasswordPalError, Result};

pub const MIN_LENGTH: usize = 8;
pub const MAX_LENGTH: usize = 128;
pub const DEFAULT_LENGTH: usize = 16;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMBERS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Generator request. Absent flags default to enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct GenerateOptions {
    #[validate(range(min = 8, max = 128, message = "Length must be between 8 and 128"))]
    pub length: usize,
    pub uppercase: bool,
    pub lowercase: bool,
    pub numbers: bool,
    pub symbols: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            uppercase: true,
            lowercase: true,
            numbers: true,
            symbols: true,
        }
    }
}

impl GenerateOptions {
    fn charset(&self) -> Vec<u8> {
        let mut charset = Vec::with_capacity(88);
        if self.lowercase {
            charset.extend_from_slice(LOWERCASE);
        }
        if self.uppercase {
            charset.extend_from_slice(UPPERCASE);
        }
        if self.numbers {
            charset.extend_from_slice(NUMBERS);
        }
        if self.symbols {
            charset.extend_from_slice(SYMBOLS);
        }
        charset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Fair,
    Good,
    Strong,
}

impl Strength {
    /// Classify by entropy bits: `length * log2(charset_size)`
    pub fn classify(length: usize, charset_size: usize) -> Self {
        if length == 0 || charset_size < 2 {
            return Strength::Weak;
        }
        let entropy = length as f64 * (charset_size as f64).log2();
        if entropy >= 100.0 {
            Strength::Strong
        } else if entropy >= 75.0 {
            Strength::Good
        } else if entropy >= 50.0 {
            Strength::Fair
        } else {
            Strength::Weak
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Strength::Weak => "weak",
            Strength::Fair => "fair",
            Strength::Good => "good",
            Strength::Strong => "strong",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPassword {
    pub password: Zeroizing<String>,
    pub strength: Strength,
}

/// Generate a password, sampling each character uniformly from the selected
/// classes with the OS random source.
pub fn generate(options: &GenerateOptions) -> Result<GeneratedPassword> {
    options.validate()?;

    let charset = options.charset();
    if charset.is_empty() {
        return Err(PasswordPalError::validation("At least one character type must be selected"));
    }

    let mut rng = OsRng;
    let mut password = Zeroizing::new(String::with_capacity(options.length));
    for _ in 0..options.length {
        // `choose` samples with rejection, so no modulo bias
        if let Some(&byte) = charset.choose(&mut rng) {
            password.push(char::from(byte));
        }
    }

    Ok(GeneratedPassword { password, strength: Strength::classify(options.length, charset.len()) })
}
