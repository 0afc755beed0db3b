//! Token transport format
//!
//! A token is a named bag of proofs handed from one party to another as a
//! single string: base64 (URL-safe) over JSON with a version prefix.

use std::fmt;
use std::str::FromStr;

use bitcoin::base64::engine::{general_purpose, GeneralPurpose};
use bitcoin::base64::{alphabet, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::{self, Amount};
use crate::mint_url::MintUrl;
use crate::proof::{CurrencyUnit, Proofs, ProofsMethods};

const TOKEN_PREFIX: &str = "cashuA";

/// Token error
#[derive(Debug, Error)]
pub enum Error {
    /// Token string prefix missing or unknown
    #[error("Unsupported token")]
    UnsupportedToken,
    /// Token with no proofs
    #[error("Proofs required in token")]
    ProofsRequired,
    /// Token spans more than one mint
    #[error("Multi-mint tokens are not supported")]
    MultiMintUnsupported,
    /// Base64 error
    #[error(transparent)]
    Base64(#[from] bitcoin::base64::DecodeError),
    /// Utf8 parse error
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    /// Serde json error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Amount error
    #[error(transparent)]
    Amount(#[from] amount::Error),
}

/// Proofs belonging to a single mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// The mint the proofs were issued by
    pub mint: MintUrl,
    /// The proofs
    pub proofs: Proofs,
}

/// Transport token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Proofs grouped by mint
    pub token: Vec<TokenEntry>,
    /// Unit the amounts are denominated in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<CurrencyUnit>,
    /// Memo for the receiver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl Token {
    /// Create a new single-mint [`Token`]
    pub fn new(
        mint: MintUrl,
        proofs: Proofs,
        unit: Option<CurrencyUnit>,
        memo: Option<String>,
    ) -> Result<Self, Error> {
        if proofs.is_empty() {
            return Err(Error::ProofsRequired);
        }

        Ok(Self {
            token: vec![TokenEntry { mint, proofs }],
            unit,
            memo,
        })
    }

    /// The unit amounts are denominated in, defaulting to sat
    pub fn unit(&self) -> CurrencyUnit {
        self.unit.clone().unwrap_or_default()
    }

    /// Total value across all proofs
    pub fn total_amount(&self) -> Result<Amount, Error> {
        let mut total = Amount::ZERO;
        for entry in &self.token {
            total = total
                .checked_add(entry.proofs.total_amount()?)
                .ok_or(amount::Error::AmountOverflow)?;
        }
        Ok(total)
    }

    /// The token's single mint and its proofs.
    ///
    /// All proofs in a token must share one mint origin; a token carrying
    /// entries for several mints is rejected before any processing.
    pub fn single_mint(&self) -> Result<(MintUrl, Proofs), Error> {
        match self.token.as_slice() {
            [] => Err(Error::ProofsRequired),
            [entry] => {
                if entry.proofs.is_empty() {
                    return Err(Error::ProofsRequired);
                }
                Ok((entry.mint.clone(), entry.proofs.clone()))
            }
            _ => Err(Error::MultiMintUnsupported),
        }
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix(TOKEN_PREFIX).ok_or(Error::UnsupportedToken)?;

        let decode_config = general_purpose::GeneralPurposeConfig::new()
            .with_decode_padding_mode(bitcoin::base64::engine::DecodePaddingMode::Indifferent);
        let decoded = GeneralPurpose::new(&alphabet::URL_SAFE, decode_config).decode(s)?;
        let decoded_str = String::from_utf8(decoded)?;
        Ok(serde_json::from_str(&decoded_str)?)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        let encoded = general_purpose::URL_SAFE.encode(json);
        write!(f, "{TOKEN_PREFIX}{encoded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyset::Id;
    use crate::proof::Proof;
    use crate::secret::Secret;
    use crate::PublicKey;

    fn test_proof(amount: u64) -> Proof {
        Proof::new(
            Amount::from(amount),
            Id::from_str("009a1f293253e41e").unwrap(),
            Secret::generate(),
            PublicKey::from_hex(
                "02bc9097997d81afb2cc7346b5e4345a9346bd2a506eb7958598a72f0cf85163ea",
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_token_round_trip() {
        let mint = MintUrl::from_str("https://mint.example.com").unwrap();
        let token = Token::new(
            mint.clone(),
            vec![test_proof(2), test_proof(8)],
            Some(CurrencyUnit::Sat),
            Some("Thank you.".to_string()),
        )
        .unwrap();

        let encoded = token.to_string();
        assert!(encoded.starts_with(TOKEN_PREFIX));

        let decoded = Token::from_str(&encoded).unwrap();
        assert_eq!(decoded, token);
        assert_eq!(decoded.total_amount().unwrap(), Amount::from(10));

        let (decoded_mint, proofs) = decoded.single_mint().unwrap();
        assert_eq!(decoded_mint, mint);
        assert_eq!(proofs.len(), 2);
    }

    #[test]
    fn test_known_token_decodes() {
        // Token produced by another wallet implementation
        let token_str = "cashuAeyJ0b2tlbiI6W3sibWludCI6Imh0dHBzOi8vODMzMy5zcGFjZTozMzM4IiwicHJvb2ZzIjpbeyJhbW91bnQiOjIsImlkIjoiMDA5YTFmMjkzMjUzZTQxZSIsInNlY3JldCI6IjQwNzkxNWJjMjEyYmU2MWE3N2UzZTZkMmFlYjRjNzI3OTgwYmRhNTFjZDA2YTZhZmMyOWUyODYxNzY4YTc4MzciLCJDIjoiMDJiYzkwOTc5OTdkODFhZmIyY2M3MzQ2YjVlNDM0NWE5MzQ2YmQyYTUwNmViNzk1ODU5OGE3MmYwY2Y4NTE2M2VhIn0seyJhbW91bnQiOjgsImlkIjoiMDA5YTFmMjkzMjUzZTQxZSIsInNlY3JldCI6ImZlMTUxMDkzMTRlNjFkNzc1NmIwZjhlZTBmMjNhNjI0YWNhYTNmNGUwNDJmNjE0MzNjNzI4YzcwNTdiOTMxYmUiLCJDIjoiMDI5ZThlNTA1MGI4OTBhN2Q2YzA5NjhkYjE2YmMxZDVkNWZhMDQwZWExZGUyODRmNmVjNjlkNjEyOTlmNjcxMDU5In1dfV0sInVuaXQiOiJzYXQiLCJtZW1vIjoiVGhhbmsgeW91LiJ9";

        let token = Token::from_str(token_str).unwrap();
        assert_eq!(
            token.token[0].mint,
            MintUrl::from_str("https://8333.space:3338").unwrap()
        );
        assert_eq!(token.unit(), CurrencyUnit::Sat);
        assert_eq!(token.total_amount().unwrap(), Amount::from(10));
    }

    #[test]
    fn test_rejects_bad_tokens() {
        assert!(Token::from_str("casshuA213123").is_err());
        assert!(Token::from_str("eyJ0b2tlbiI6").is_err());
        assert!(Token::from_str("cashuAnot-base64!!").is_err());
    }

    #[test]
    fn test_multi_mint_rejected() {
        let entry_a = TokenEntry {
            mint: MintUrl::from_str("https://mint-a.example.com").unwrap(),
            proofs: vec![test_proof(1)],
        };
        let entry_b = TokenEntry {
            mint: MintUrl::from_str("https://mint-b.example.com").unwrap(),
            proofs: vec![test_proof(2)],
        };

        let token = Token {
            token: vec![entry_a, entry_b],
            unit: None,
            memo: None,
        };

        assert!(matches!(
            token.single_mint(),
            Err(Error::MultiMintUnsupported)
        ));
    }
}
