//! Identifier types for instruments and feed-supplied trade prints

use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument symbol as published by the feed (e.g. "NSE:NIFTY24JANFUT")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol from a string
    ///
    /// # Panics
    /// Panics if the symbol is empty or only whitespace
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(!s.trim().is_empty(), "Symbol must not be empty");
        Self(s)
    }

    /// Try to create a Symbol, returning None if empty
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.trim().is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Trade identifier supplied by the exchange feed, when present
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(String);

impl TradeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_creation() {
        let symbol = Symbol::new("NSE:NIFTY24JANFUT");
        assert_eq!(symbol.as_str(), "NSE:NIFTY24JANFUT");
        assert_eq!(symbol.to_string(), "NSE:NIFTY24JANFUT");
    }

    #[test]
    fn test_symbol_try_new() {
        assert!(Symbol::try_new("NSE:SBIN-EQ").is_some());
        assert!(Symbol::try_new("   ").is_none());
    }

    #[test]
    #[should_panic(expected = "Symbol must not be empty")]
    fn test_symbol_empty() {
        Symbol::new("");
    }

    #[test]
    fn test_symbol_serialization() {
        let symbol = Symbol::new("NSE:SBIN-EQ");
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"NSE:SBIN-EQ\"");

        let deserialized: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(symbol, deserialized);
    }
}
