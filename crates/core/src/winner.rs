use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::orchestrator::QuoteSet;

pub const ALL_ERROR: &str = "All Error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Provider(String),
    AllError,
}

impl Winner {
    pub fn provider(&self) -> Option<&str> {
        match self {
            Winner::Provider(name) => Some(name),
            Winner::AllError => None,
        }
    }
}

impl Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Provider(name) => write!(f, "{name}"),
            Winner::AllError => write!(f, "{ALL_ERROR}"),
        }
    }
}

impl From<&str> for Winner {
    fn from(name: &str) -> Self {
        if name == ALL_ERROR {
            Winner::AllError
        } else {
            Winner::Provider(name.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub winner: Winner,
    /// Best minus second best output, 0 with a single valid quote
    pub spread: Option<f64>,
    /// `spread` priced in USD through the output token
    pub spread_usd: Option<f64>,
}

impl Verdict {
    fn all_error() -> Self {
        Self {
            winner: Winner::AllError,
            spread: None,
            spread_usd: None,
        }
    }
}

/// Ranks the valid results of a fan-out.
pub fn evaluate(results: &QuoteSet, output_usd_price: Option<f64>) -> Verdict {
    let valid = results
        .iter()
        .filter_map(|r| r.output_value().map(|value| (r.provider.as_str(), value)));

    let mut verdict = evaluate_outputs(valid);
    verdict.spread_usd = match (verdict.spread, output_usd_price) {
        (Some(spread), Some(price)) => Some(spread * price),
        _ => None,
    };
    verdict
}

/// Ranks already-valid outputs. The strictly greatest wins, so ties go to the
/// first one seen.
pub fn evaluate_outputs<'a>(outputs: impl IntoIterator<Item = (&'a str, f64)>) -> Verdict {
    let mut best: Option<(&str, f64)> = None;
    let mut second: Option<f64> = None;

    for (name, value) in outputs {
        match best {
            None => best = Some((name, value)),
            Some((_, top)) if value > top => {
                second = Some(top);
                best = Some((name, value));
            }
            Some(_) => {
                if second.is_none_or(|s| value > s) {
                    second = Some(value);
                }
            }
        }
    }

    match best {
        None => Verdict::all_error(),
        Some((name, top)) => Verdict {
            winner: Winner::Provider(name.to_string()),
            spread: Some(second.map_or(0.0, |s| top - s)),
            spread_usd: None,
        },
    }
}
