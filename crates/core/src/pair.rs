use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::chain::{ChainConfig, TokenSpec};

/// A directional trade between two tokens on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    pub name: String,
    pub input: TokenSpec,
    pub output: TokenSpec,
}

impl TradingPair {
    pub fn new(input: TokenSpec, output: TokenSpec) -> Self {
        Self {
            name: format!("{}->{}", input.symbol, output.symbol),
            input,
            output,
        }
    }
}

impl Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Every trading token sold into the normalization token, then the
/// normalization token bought back into every trading token.
pub fn pairs_for_chain(chain: &ChainConfig) -> Vec<TradingPair> {
    let norm = &chain.normalization_token;

    let sells = chain
        .trading_tokens
        .iter()
        .map(|token| TradingPair::new(token.clone(), norm.clone()));
    let buys = chain
        .trading_tokens
        .iter()
        .map(|token| TradingPair::new(norm.clone(), token.clone()));

    sells.chain(buys).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fixtures;

    #[test]
    fn sells_come_before_buys() {
        let pairs = pairs_for_chain(&fixtures::hyperevm());
        let names: Vec<&str> = pairs.iter().map(|p| p.name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "USDT0->USDe",
                "HYPE->USDe",
                "kHYPE->USDe",
                "USDe->USDT0",
                "USDe->HYPE",
                "USDe->kHYPE",
            ]
        );
    }

    #[test]
    fn never_pairs_normalization_token_with_itself() {
        let chain = fixtures::hyperevm();
        let pairs = pairs_for_chain(&chain);

        assert_eq!(pairs.len(), 2 * chain.trading_tokens.len());
        assert!(pairs.iter().all(|p| p.input.address != p.output.address));
    }

    #[test]
    fn chain_without_trading_tokens_has_no_pairs() {
        let mut chain = fixtures::hyperevm();
        chain.trading_tokens.clear();
        assert!(pairs_for_chain(&chain).is_empty());
    }
}
