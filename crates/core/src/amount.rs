use num_bigint::BigUint;
use num_traits::{FromPrimitive as _, Zero as _};

use crate::error::Error;

/// Converts a USD notional into the token's smallest units.
///
/// Returns `floor(usd_amount / usd_price * 10^decimals)` as a decimal integer
/// string. The float product is converted through [`BigUint`] so large amounts
/// never go through exponent notation.
pub fn to_smallest_units(
    usd_amount: f64,
    usd_price: Option<f64>,
    decimals: u32,
) -> Result<String, Error> {
    let price = match usd_price {
        Some(price) if price.is_finite() && price > 0.0 => price,
        other => return Err(Error::InvalidPrice(other)),
    };

    if !usd_amount.is_finite() || usd_amount < 0.0 {
        return Err(Error::InvalidAmount(format!(
            "usd amount must be finite and non-negative, got {usd_amount}"
        )));
    }

    let scaled = usd_amount / price * 10f64.powi(decimals as i32);
    let raw = BigUint::from_f64(scaled.floor()).ok_or_else(|| {
        Error::InvalidAmount(format!(
            "{usd_amount} USD at {price} USD/token overflows {decimals} decimals"
        ))
    })?;

    Ok(raw.to_string())
}

/// Renders a smallest-unit integer string in human units, e.g.
/// `format_units("1234500", 6) == "1.2345"`.
pub fn format_units(raw: &str, decimals: u32) -> Result<String, Error> {
    let value = raw
        .trim()
        .parse::<BigUint>()
        .map_err(|e| Error::InvalidAmount(format!("{raw:?} is not an unsigned integer: {e}")))?;

    if value.is_zero() {
        return Ok("0".to_string());
    }

    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return Ok(digits);
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };

    let (whole, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        Ok(whole.to_string())
    } else {
        Ok(format!("{whole}.{frac}"))
    }
}
