//! Price snapshot types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use super::NetworkId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSnapshot {
    pub network: NetworkId,
    pub asset: String,
    /// Price in the quote currency (USD).
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
    /// Per (network, asset) sequence, starting at 1.
    pub sequence: u64,
}

impl PriceSnapshot {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.observed_at
    }
}
