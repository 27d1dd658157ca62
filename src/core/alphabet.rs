//! Stimulus alphabets.

use hashbrown::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NbackError, Result};

/// Letters that are easy to confuse visually or phonetically with digits or
/// each other.
pub const CONFUSABLE_LETTERS: [char; 3] = ['I', 'O', 'Q'];

/// Ordered, duplicate-free set of stimulus symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<char>", into = "Vec<char>"))]
pub struct Alphabet {
    symbols: Vec<char>,
    index: HashMap<char, usize>,
}

impl Alphabet {
    pub const MIN_SYMBOLS: usize = 2;

    pub fn new(symbols: impl IntoIterator<Item = char>) -> Result<Self> {
        let symbols: Vec<char> = symbols.into_iter().collect();
        if symbols.len() < Self::MIN_SYMBOLS {
            return Err(NbackError::InvalidAlphabet(format!(
                "need at least {} symbols, got {}",
                Self::MIN_SYMBOLS,
                symbols.len()
            )));
        }

        let mut index = HashMap::with_capacity(symbols.len());
        for (i, &c) in symbols.iter().enumerate() {
            if index.insert(c, i).is_some() {
                return Err(NbackError::InvalidAlphabet(format!(
                    "duplicate symbol '{c}'"
                )));
            }
        }

        Ok(Self { symbols, index })
    }

    /// A-Z without I, O and Q (23 letters).
    pub fn latin_unambiguous() -> Self {
        Self::from_known(('A'..='Z').filter(|c| !CONFUSABLE_LETTERS.contains(c)))
    }

    /// All 26 uppercase Latin letters.
    pub fn latin_full() -> Self {
        Self::from_known('A'..='Z')
    }

    fn from_known(symbols: impl Iterator<Item = char>) -> Self {
        let symbols: Vec<char> = symbols.collect();
        let index = symbols.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { symbols, index }
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.index.get(&symbol).copied()
    }

    pub fn contains(&self, symbol: char) -> bool {
        self.index.contains_key(&symbol)
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::latin_unambiguous()
    }
}

impl TryFrom<Vec<char>> for Alphabet {
    type Error = NbackError;

    fn try_from(symbols: Vec<char>) -> Result<Self> {
        Self::new(symbols)
    }
}

impl From<Alphabet> for Vec<char> {
    fn from(a: Alphabet) -> Self {
        a.symbols
    }
}
