use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

/// Chain identifier as understood by the quote providers (e.g. `"999"` for HyperEVM).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChainId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A token contract address.
///
/// Compared and hashed case-insensitively. The configured spelling is kept for
/// display and for requests sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAddress(String);

impl TokenAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased lookup key.
    pub fn key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl PartialEq for TokenAddress {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for TokenAddress {}

impl Hash for TokenAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TokenAddress {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}

impl From<&str> for TokenAddress {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub address: TokenAddress,
    pub symbol: String,
    pub decimals: u32,
}

impl TokenSpec {
    pub fn new(address: &str, symbol: &str, decimals: u32) -> Self {
        Self {
            address: TokenAddress::from(address),
            symbol: symbol.to_string(),
            decimals,
        }
    }
}

impl Display for TokenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.address)
    }
}

/// Tokens benchmarked on one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain id sent to providers
    pub id: ChainId,

    /// Blockchain name used by the exchange-rate service
    pub blockchain: String,

    /// USD-pegged reference token every other token is priced against
    pub normalization_token: TokenSpec,

    /// Tokens paired against the normalization token, in benchmark order
    pub trading_tokens: Vec<TokenSpec>,
}

impl ChainConfig {
    pub fn is_normalization_token(&self, address: &TokenAddress) -> bool {
        self.normalization_token.address == *address
    }

    /// Every token configured for the chain, normalization token first.
    pub fn tokens(&self) -> impl Iterator<Item = &TokenSpec> {
        std::iter::once(&self.normalization_token).chain(self.trading_tokens.iter())
    }
}

impl Display for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id={})", self.blockchain, self.id)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) const USDE: &str = "0x5d3a1ff2b6bab83b63cd9ad0787074081a52ef34";
    pub(crate) const USDT0: &str = "0xb8ce59fc3717ada4c02eadf9682a9e934f625ebb";
    pub(crate) const HYPE: &str = "0x2222222222222222222222222222222222222222";
    pub(crate) const KHYPE: &str = "0xfD739d4e423301CE9385c1fb8850539D657C296D";

    pub(crate) fn hyperevm() -> ChainConfig {
        ChainConfig {
            id: ChainId::from("999"),
            blockchain: "hyperevm".to_string(),
            normalization_token: TokenSpec::new(USDE, "USDe", 18),
            trading_tokens: vec![
                TokenSpec::new(USDT0, "USDT0", 6),
                TokenSpec::new(HYPE, "HYPE", 18),
                TokenSpec::new(KHYPE, "kHYPE", 18),
            ],
        }
    }

    /// Normalization token with 6 decimals, one 18-decimals tradable token.
    pub(crate) fn six_decimals_usd() -> ChainConfig {
        ChainConfig {
            id: ChainId::from("1"),
            blockchain: "ethereum".to_string(),
            normalization_token: TokenSpec::new(
                "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                "USDC",
                6,
            ),
            trading_tokens: vec![TokenSpec::new(
                "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
                "WETH",
                18,
            )],
        }
    }
}
