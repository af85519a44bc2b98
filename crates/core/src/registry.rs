use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, info};

use crate::{
    chain::{ChainConfig, ChainId, TokenAddress, TokenSpec},
    error::Error,
    pair::{TradingPair, pairs_for_chain},
};

/// Lower-cased token address -> decimals, merged across every configured chain.
///
/// Built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct DecimalRegistry {
    decimals: HashMap<String, u32>,
}

impl DecimalRegistry {
    pub fn from_chains<'a>(chains: impl IntoIterator<Item = &'a ChainConfig>) -> Result<Self, Error> {
        let mut decimals: HashMap<String, u32> = HashMap::new();
        for chain in chains {
            for token in chain.tokens() {
                match decimals.insert(token.address.key(), token.decimals) {
                    Some(existing) if existing != token.decimals => {
                        return Err(Error::InvalidConfig(format!(
                            "token {} configured with {} and {} decimals",
                            token.address, existing, token.decimals
                        )));
                    }
                    _ => (),
                }
            }
        }

        Ok(Self { decimals })
    }

    pub fn lookup(&self, address: &TokenAddress) -> Result<u32, Error> {
        self.decimals
            .get(&address.key())
            .copied()
            .ok_or_else(|| Error::UnknownToken(address.clone()))
    }

    pub fn len(&self) -> usize {
        self.decimals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decimals.is_empty()
    }
}

/// Immutable chain -> token configuration lookup.
#[derive(Debug)]
pub struct ChainRegistry {
    chains: Vec<ChainConfig>,
    decimals: Arc<DecimalRegistry>,
}

impl ChainRegistry {
    /// Validates every chain and builds the registry.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if a chain id is duplicated, an address
    /// appears twice on the same chain (case-insensitively), the normalization
    /// token is also listed as tradable, or one address carries two decimal counts.
    pub fn new(chains: Vec<ChainConfig>) -> Result<Self, Error> {
        let mut ids = HashSet::new();
        for chain in &chains {
            if !ids.insert(chain.id.clone()) {
                return Err(Error::InvalidConfig(format!("chain {} configured twice", chain.id)));
            }
            validate_chain(chain)?;
        }

        let decimals = Arc::new(DecimalRegistry::from_chains(&chains)?);
        info!(
            chains = chains.len(),
            tokens = decimals.len(),
            "Built chain and decimal registries"
        );

        Ok(Self { chains, decimals })
    }

    pub fn chains(&self) -> &[ChainConfig] {
        &self.chains
    }

    pub fn chain(&self, id: &ChainId) -> Result<&ChainConfig, Error> {
        self.chains
            .iter()
            .find(|chain| chain.id == *id)
            .ok_or_else(|| Error::UnknownChain(id.clone()))
    }

    /// Directional pairs for `id`. Empty when the chain is not configured.
    pub fn pairs_for(&self, id: &ChainId) -> Vec<TradingPair> {
        match self.chain(id) {
            Ok(chain) => pairs_for_chain(chain),
            Err(_) => Vec::new(),
        }
    }

    pub fn decimals(&self) -> Arc<DecimalRegistry> {
        Arc::clone(&self.decimals)
    }

    pub fn token(&self, chain: &ChainId, address: &TokenAddress) -> Result<&TokenSpec, Error> {
        self.chain(chain)?
            .tokens()
            .find(|token| token.address == *address)
            .ok_or_else(|| Error::UnknownToken(address.clone()))
    }

    pub fn token_by_symbol(&self, chain: &ChainId, symbol: &str) -> Result<&TokenSpec, Error> {
        let chain = self.chain(chain)?;
        chain
            .tokens()
            .find(|token| token.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| {
                Error::InvalidConfig(format!("token symbol {symbol} not configured on chain {}", chain.id))
            })
    }
}

fn validate_chain(chain: &ChainConfig) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for token in chain.tokens() {
        if !seen.insert(token.address.clone()) {
            let reason = if chain.is_normalization_token(&token.address) {
                "normalization token is also listed as a trading token"
            } else {
                "duplicate token address"
            };
            return Err(Error::InvalidConfig(format!(
                "chain {}: {reason}: {}",
                chain.id, token.address
            )));
        }
    }

    debug!(chain = %chain, tokens = seen.len(), "Validated chain config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::chain::fixtures;

    #[test]
    fn builds_decimals_for_every_token() {
        let registry = ChainRegistry::new(vec![fixtures::hyperevm()]).unwrap();
        let decimals = registry.decimals();

        assert_eq!(decimals.len(), 4);
        assert_eq!(decimals.lookup(&TokenAddress::from(fixtures::USDT0)).unwrap(), 6);
        assert_eq!(decimals.lookup(&TokenAddress::from(fixtures::USDE)).unwrap(), 18);
    }

    #[test]
    fn decimals_lookup_miss_is_unknown_token() {
        let registry = ChainRegistry::new(vec![fixtures::hyperevm()]).unwrap();
        let err = registry
            .decimals()
            .lookup(&TokenAddress::from("0x0000000000000000000000000000000000000001"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownToken(_)));
    }

    #[test]
    fn rejects_normalization_token_among_trading_tokens() {
        let mut chain = fixtures::hyperevm();
        let mut dup = chain.normalization_token.clone();
        dup.address = TokenAddress::from(fixtures::USDE.to_ascii_uppercase());
        chain.trading_tokens.push(dup);

        let err = ChainRegistry::new(vec![chain]).unwrap_err();
        assert!(err.to_string().contains("normalization token"));
    }

    #[test]
    fn rejects_case_insensitive_duplicates() {
        let mut chain = fixtures::hyperevm();
        chain.trading_tokens.push(TokenSpec::new(
            &fixtures::KHYPE.to_ascii_lowercase(),
            "kHYPE2",
            18,
        ));

        let err = ChainRegistry::new(vec![chain]).unwrap_err();
        assert!(err.to_string().contains("duplicate token address"));
    }

    #[test]
    fn rejects_conflicting_decimals_across_chains() {
        let mut other = fixtures::six_decimals_usd();
        other.trading_tokens.push(TokenSpec::new(fixtures::USDT0, "USDT0", 18));

        let err = ChainRegistry::new(vec![fixtures::hyperevm(), other]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_duplicate_chain_ids() {
        let err = ChainRegistry::new(vec![fixtures::hyperevm(), fixtures::hyperevm()]).unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn looks_up_tokens_by_address_and_symbol() {
        let registry = ChainRegistry::new(vec![fixtures::hyperevm()]).unwrap();
        let chain = ChainId::from("999");

        let khype = registry
            .token(&chain, &TokenAddress::from(fixtures::KHYPE.to_ascii_lowercase()))
            .unwrap();
        assert_eq!(khype.symbol, "kHYPE");

        let usde = registry.token_by_symbol(&chain, "usde").unwrap();
        assert_eq!(usde.decimals, 18);

        assert!(matches!(
            registry.token_by_symbol(&ChainId::from("1"), "USDe"),
            Err(Error::UnknownChain(_))
        ));
    }

    #[test]
    fn pairs_for_unknown_chain_is_empty() {
        let registry = ChainRegistry::new(vec![fixtures::hyperevm()]).unwrap();
        assert!(registry.pairs_for(&ChainId::from("42")).is_empty());
        assert_eq!(registry.pairs_for(&ChainId::from("999")).len(), 6);
    }

    proptest! {
        #[test]
        fn decimals_lookup_is_case_insensitive(index in 0usize..4, upper in any::<bool>()) {
            let registry = ChainRegistry::new(vec![fixtures::hyperevm()]).unwrap();
            let decimals = registry.decimals();
            let chain = fixtures::hyperevm();
            let token = chain.tokens().nth(index).unwrap();

            let spelled = if upper {
                token.address.as_str().to_ascii_uppercase()
            } else {
                token.address.as_str().to_ascii_lowercase()
            };

            prop_assert_eq!(
                decimals.lookup(&TokenAddress::from(spelled)).unwrap(),
                decimals.lookup(&token.address).unwrap()
            );
        }
    }
}
