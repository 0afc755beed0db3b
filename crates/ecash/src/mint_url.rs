//! Mint URL
//!
//! Normalized form of a mint's base URL. Normalization matters because the
//! URL is the cache / trust / storage key for everything scoped to a mint:
//! `https://Mint.example/` and `https://mint.example` must compare equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{ParseError, Url};

/// Url error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Url parse error
    #[error(transparent)]
    Url(#[from] ParseError),
    /// Invalid URL structure
    #[error("Invalid URL")]
    InvalidUrl,
}

/// Mint base URL
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MintUrl(String);

impl MintUrl {
    fn format_url(url: &str) -> Result<String, Error> {
        if url.is_empty() {
            return Err(Error::InvalidUrl);
        }

        let url = url.trim_end_matches('/');
        // scheme and host are case-insensitive; the path is not
        let (protocol, rest) = url.split_once("://").ok_or(Error::InvalidUrl)?;
        let (host, path) = match rest.split_once('/') {
            Some((host, path)) => (host, Some(path)),
            None => (rest, None),
        };
        if host.is_empty() {
            return Err(Error::InvalidUrl);
        }

        let mut formatted = format!("{}://{}", protocol.to_lowercase(), host.to_lowercase());
        if let Some(path) = path {
            formatted.push('/');
            formatted.push_str(path);
        }

        // Must parse as a real URL
        let _: Url = Url::parse(&formatted)?;

        Ok(formatted)
    }

    /// Join path segments onto the mint URL
    pub fn join_paths(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.0)?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::InvalidUrl)?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }
}

impl FromStr for MintUrl {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        Ok(Self(Self::format_url(url)?))
    }
}

impl fmt::Display for MintUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for MintUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MintUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MintUrl::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let url = MintUrl::from_str("HTTPS://Mint.Example.Com/").unwrap();
        assert_eq!(url.to_string(), "https://mint.example.com");

        let trailing = MintUrl::from_str("https://mint.example.com///").unwrap();
        assert_eq!(url, trailing);

        // Path case is preserved
        let with_path = MintUrl::from_str("https://Mint.example.com/Cashu/api").unwrap();
        assert_eq!(with_path.to_string(), "https://mint.example.com/Cashu/api");
    }

    #[test]
    fn test_join_paths() {
        let url = MintUrl::from_str("https://mint.example.com").unwrap();
        let joined = url.join_paths(&["v1", "keysets"]).unwrap();
        assert_eq!(joined.as_str(), "https://mint.example.com/v1/keysets");

        let url = MintUrl::from_str("https://mint.example.com/base/").unwrap();
        let joined = url.join_paths(&["v1", "swap"]).unwrap();
        assert_eq!(joined.as_str(), "https://mint.example.com/base/v1/swap");
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(MintUrl::from_str("").is_err());
        assert!(MintUrl::from_str("not a url").is_err());
        assert!(MintUrl::from_str("://missing-scheme").is_err());
    }
}
