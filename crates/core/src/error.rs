use crate::chain::{ChainId, TokenAddress};

/// Errors raised by a single unit of benchmark work (a price lookup, an amount
/// conversion, a registry lookup).
///
/// None of these abort a run. The controller inspects [`Error::class`] and
/// skips the smallest enclosing unit of work.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown chain {0}")]
    UnknownChain(ChainId),

    #[error("unknown token {0}")]
    UnknownToken(TokenAddress),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("price unavailable for {token} on chain {chain}: {reason}")]
    PriceUnavailable {
        chain: ChainId,
        token: TokenAddress,
        reason: String,
    },

    #[error("invalid token price {0:?}")]
    InvalidPrice(Option<f64>),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unknown chain, unknown token, missing decimals.
    Configuration,
    /// Exchange-rate service or provider HTTP failure.
    Upstream,
    /// Amount conversion could not be performed.
    Calculation,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::UnknownChain(_) | Error::UnknownToken(_) | Error::InvalidConfig(_) => {
                ErrorClass::Configuration
            }
            Error::PriceUnavailable { .. } => ErrorClass::Upstream,
            Error::InvalidPrice(_) | Error::InvalidAmount(_) => ErrorClass::Calculation,
        }
    }

    pub(crate) fn price_unavailable(
        chain: &ChainId,
        token: &TokenAddress,
        reason: impl Into<String>,
    ) -> Self {
        Error::PriceUnavailable {
            chain: chain.clone(),
            token: token.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors_by_taxonomy() {
        assert_eq!(
            Error::UnknownChain(ChainId::from("1")).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            Error::price_unavailable(&ChainId::from("1"), &TokenAddress::from("0xabc"), "timeout")
                .class(),
            ErrorClass::Upstream
        );
        assert_eq!(Error::InvalidPrice(None).class(), ErrorClass::Calculation);
    }

    #[test]
    fn price_unavailable_message_names_token_and_chain() {
        let err = Error::price_unavailable(&ChainId::from("999"), &TokenAddress::from("0xAbC"), "HTTP 502");
        assert_eq!(
            err.to_string(),
            "price unavailable for 0xAbC on chain 999: HTTP 502"
        );
    }
}
