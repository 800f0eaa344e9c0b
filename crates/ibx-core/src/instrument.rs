//! Tradeable instrument identifiers.
//!
//! Supports stocks (routed SMART/USD) and forex pairs in `BASE.QUOTE`
//! notation (e.g. `EUR.USD`).

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Security type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecType {
    /// Stock.
    #[default]
    #[serde(rename = "STK")]
    Stock,
    /// Forex pair.
    #[serde(rename = "CASH")]
    Forex,
}

impl fmt::Display for SecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stock => write!(f, "STK"),
            Self::Forex => write!(f, "CASH"),
        }
    }
}

/// A resolved, concrete instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Symbol as the gateway knows it (e.g. "TSLA", "EURUSD").
    pub symbol: String,
    /// Security type.
    pub sec_type: SecType,
    /// Routing exchange.
    pub exchange: String,
    /// Quote currency.
    pub currency: String,
}

impl Instrument {
    /// Resolve a user-supplied symbol into a concrete instrument.
    ///
    /// `BASE.QUOTE` (two three-letter codes) resolves to a forex pair;
    /// anything else that looks like a ticker resolves to a stock on
    /// SMART/USD.
    pub fn resolve(symbol: &str) -> Result<Self, CoreError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(CoreError::InvalidInstrument("empty symbol".to_string()));
        }

        if let Some((base, quote)) = symbol.split_once('.') {
            if base.len() != 3
                || quote.len() != 3
                || !base.chars().all(|c| c.is_ascii_alphabetic())
                || !quote.chars().all(|c| c.is_ascii_alphabetic())
            {
                return Err(CoreError::InvalidInstrument(format!(
                    "malformed forex pair: {symbol}"
                )));
            }
            return Ok(Self {
                symbol: format!("{}{}", base.to_ascii_uppercase(), quote.to_ascii_uppercase()),
                sec_type: SecType::Forex,
                exchange: "IDEALPRO".to_string(),
                currency: quote.to_ascii_uppercase(),
            });
        }

        if symbol.len() > 12 || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidInstrument(format!(
                "malformed symbol: {symbol}"
            )));
        }

        Ok(Self {
            symbol: symbol.to_ascii_uppercase(),
            sec_type: SecType::Stock,
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
        })
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.sec_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_stock() {
        let inst = Instrument::resolve("tsla").unwrap();
        assert_eq!(inst.symbol, "TSLA");
        assert_eq!(inst.sec_type, SecType::Stock);
        assert_eq!(inst.exchange, "SMART");
        assert_eq!(inst.currency, "USD");
    }

    #[test]
    fn test_resolve_forex() {
        let inst = Instrument::resolve("EUR.USD").unwrap();
        assert_eq!(inst.symbol, "EURUSD");
        assert_eq!(inst.sec_type, SecType::Forex);
        assert_eq!(inst.exchange, "IDEALPRO");
        assert_eq!(inst.currency, "USD");
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        assert!(Instrument::resolve("").is_err());
        assert!(Instrument::resolve("EU.USD").is_err());
        assert!(Instrument::resolve("EUR.US").is_err());
        assert!(Instrument::resolve("not a symbol").is_err());
        assert!(Instrument::resolve("WAYTOOLONGSYMBOL").is_err());
    }
}
