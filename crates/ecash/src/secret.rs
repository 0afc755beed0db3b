//! Secret

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{hex, random_bytes};

/// The secret data that allows spending ecash
///
/// Chosen by the holder, hex encoded, and never revealed to the mint before
/// the proof is spent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

/// Secret error
#[derive(Debug, Error)]
pub enum Error {
    /// Secret is empty
    #[error("Secret is empty")]
    Empty,
}

impl Default for Secret {
    fn default() -> Self {
        Self::generate()
    }
}

impl Secret {
    /// Generate a new random secret as the recommended 32 byte hex
    pub fn generate() -> Self {
        Self(hex::encode(random_bytes()))
    }

    /// Secret as bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Secret as str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Secret {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::Empty);
        }
        Ok(Secret(s.to_string()))
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
