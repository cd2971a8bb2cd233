//! Order identifiers, sides and the deterministic idempotency key.
//!
//! `SignalId` is the digest that makes order submission idempotent:
//! the same trading decision (strategy, bar close, side) always maps to
//! the same key, so a network retry can never become a second order.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// The order side that opens a position in this direction.
    pub fn entry_side(&self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Buy,
            Self::Short => OrderSide::Sell,
        }
    }

    /// The order side that closes a position in this direction.
    pub fn exit_side(&self) -> OrderSide {
        self.entry_side().opposite()
    }

    /// Returns 1 for long, -1 for short (for signed quantities).
    pub fn sign(&self) -> i8 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Protective-stop status of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StopStatus {
    /// No stop order exists at the venue; one must be placed next cycle.
    Missing,
    /// Stop order confirmed live at the venue.
    Active,
    /// Stop trigger price has been crossed.
    Breached,
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "MISSING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Breached => write!(f, "BREACHED"),
        }
    }
}

/// Deterministic idempotency key identifying one trading decision.
///
/// Derived as SHA-256 over `"{strategy}|{bar_close_ms}|{side}"`, hex,
/// truncated to 16 characters to bound total order-reference length.
/// Identical inputs always yield identical keys; any differing input
/// yields a different key with overwhelming probability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalId(String);

impl SignalId {
    const DIGEST_LEN: usize = 16;

    /// Derive the key from the decision coordinates.
    pub fn derive(strategy: &str, bar_close: DateTime<Utc>, side: OrderSide) -> Self {
        let input = format!("{}|{}|{}", strategy, bar_close.timestamp_millis(), side);
        let digest = Sha256::digest(input.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(Self::DIGEST_LEN);
        Self(hex)
    }

    /// Derive a dependent key from this one, e.g. for the order that
    /// unwinds the position this key opened. Depends only on the parent
    /// key and the tag, so it survives restarts and record rebuilds.
    pub fn derive_related(&self, tag: &str) -> Self {
        let input = format!("{}|{}", self.0, tag);
        let digest = Sha256::digest(input.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(Self::DIGEST_LEN);
        Self(hex)
    }

    /// Wrap an existing key string (for parsing venue responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SignalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Role of a venue order derived from one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderRole {
    Entry,
    Stop,
}

impl OrderRole {
    /// Single-character suffix appended to the signal key.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Entry => "e",
            Self::Stop => "s",
        }
    }
}

impl fmt::Display for OrderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Venue-facing order reference: signal key plus role suffix.
///
/// Must satisfy the venue constraints: charset `[A-Za-z0-9_-]` and a
/// configurable maximum length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderRef(String);

impl OrderRef {
    /// Build and validate a reference.
    pub fn new(signal: &SignalId, role: OrderRole, max_len: usize) -> Result<Self> {
        let composed = format!("{}-{}", signal.as_str(), role.suffix());
        if composed.len() > max_len {
            return Err(CoreError::InvalidReference(format!(
                "reference '{}' exceeds {} chars",
                composed, max_len
            )));
        }
        if !composed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(CoreError::InvalidReference(format!(
                "reference '{}' contains characters outside [A-Za-z0-9_-]",
                composed
            )));
        }
        Ok(Self(composed))
    }

    /// Wrap a reference string received from the venue, unvalidated.
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// The signal key this reference was derived from, if well-formed.
    pub fn signal_part(&self) -> &str {
        self.0.rsplit_once('-').map(|(s, _)| s).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrderRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_close() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_signal_id_deterministic() {
        let a = SignalId::derive("grid_v2", bar_close(), OrderSide::Buy);
        let b = SignalId::derive("grid_v2", bar_close(), OrderSide::Buy);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_signal_id_differs_on_any_input() {
        let base = SignalId::derive("grid_v2", bar_close(), OrderSide::Buy);
        assert_ne!(base, SignalId::derive("grid_v3", bar_close(), OrderSide::Buy));
        assert_ne!(base, SignalId::derive("grid_v2", bar_close(), OrderSide::Sell));
        assert_ne!(
            base,
            SignalId::derive(
                "grid_v2",
                bar_close() + chrono::Duration::minutes(1),
                OrderSide::Buy
            )
        );
    }

    #[test]
    fn test_related_key_stable_and_distinct() {
        let parent = SignalId::derive("grid_v2", bar_close(), OrderSide::Buy);
        let flatten = parent.derive_related("flatten");

        assert_eq!(flatten, parent.derive_related("flatten"));
        assert_eq!(flatten.as_str().len(), 16);
        assert_ne!(flatten, parent);
        assert_ne!(flatten, parent.derive_related("exit"));
    }

    #[test]
    fn test_order_ref_suffix_and_charset() {
        let signal = SignalId::derive("grid_v2", bar_close(), OrderSide::Buy);
        let entry = OrderRef::new(&signal, OrderRole::Entry, 36).unwrap();
        let stop = OrderRef::new(&signal, OrderRole::Stop, 36).unwrap();

        assert!(entry.as_str().ends_with("-e"));
        assert!(stop.as_str().ends_with("-s"));
        assert_eq!(entry.signal_part(), signal.as_str());
        assert_ne!(entry, stop);
    }

    #[test]
    fn test_order_ref_length_rejected() {
        let signal = SignalId::derive("grid_v2", bar_close(), OrderSide::Buy);
        let err = OrderRef::new(&signal, OrderRole::Entry, 10).unwrap_err();
        assert!(matches!(err, CoreError::InvalidReference(_)));
    }

    #[test]
    fn test_direction_sides() {
        assert_eq!(Direction::Long.entry_side(), OrderSide::Buy);
        assert_eq!(Direction::Long.exit_side(), OrderSide::Sell);
        assert_eq!(Direction::Short.entry_side(), OrderSide::Sell);
        assert_eq!(Direction::Short.sign(), -1);
    }
}
