use std::collections::HashSet;

use crate::config::ConfigError;

/// Ordered decode symbols plus one trailing blank.
///
/// Index `i < symbols` maps to the i-th character; index `symbols` is the
/// blank, which never appears in decoded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            symbols: Self::PLATE_SYMBOLS.chars().collect(),
        }
    }
}

impl Alphabet {
    /// Digits and uppercase latin letters, as emitted by plate recognizers.
    pub const PLATE_SYMBOLS: &'static str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    pub fn new(symbols: &str) -> Result<Self, ConfigError> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(ConfigError::InvalidAlphabet("no symbols".to_string()));
        }
        let mut seen = HashSet::new();
        for &c in &symbols {
            if !seen.insert(c) {
                return Err(ConfigError::InvalidAlphabet(format!("duplicate symbol {c:?}")));
            }
        }
        Ok(Self { symbols })
    }

    /// Number of classes per timestep, blank included.
    pub fn size(&self) -> usize {
        self.symbols.len() + 1
    }

    /// Index of the blank class.
    pub fn blank(&self) -> usize {
        self.symbols.len()
    }

    /// Character for a class index; `None` for the blank or out of range.
    pub fn symbol(&self, index: usize) -> Option<char> {
        self.symbols.get(index).copied()
    }
}
