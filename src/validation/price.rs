//! Price validation functions

use rust_decimal::prelude::*;
use crate::errors::FetchError;

/// Rejects prices no venue can quote: zero or negative.
pub fn validate_price(price: Decimal, source: &str) -> Result<(), FetchError> {
    if price.is_zero() || price.is_sign_negative() {
        return Err(FetchError::MalformedResponse(format!(
            "{} price is zero or negative: {}",
            source, price
        )));
    }
    Ok(())
}
