//! Structured transition records for the audit collaborator.
//!
//! Every state change, halt and cancellation is captured as a
//! `TransitionRecord`. Records are validated before being handed to the
//! logging layer: a record missing required fields indicates the core's own
//! bookkeeping is broken, so the write is aborted rather than repaired.

use crate::error::{CoreError, Result};
use crate::{Price, Size};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Free-form context captured alongside a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionContext {
    pub price: Price,
    pub equity: Decimal,
    /// Risk stage selected upstream.
    pub stage: u8,
    pub latency_ms: i64,
    /// Position fields, required whenever a position is attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_qty: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_status: Option<String>,
}

/// One audit record: a state change, halt or cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    /// State after the transition.
    pub state: String,
    pub context: TransitionContext,
}

impl TransitionRecord {
    pub fn new(reason: impl Into<String>, state: impl Into<String>, context: TransitionContext) -> Self {
        Self {
            timestamp: Utc::now(),
            reason: reason.into(),
            state: state.into(),
            context,
        }
    }

    /// Validate required fields before the record is persisted.
    ///
    /// `reason` and `state` must be non-empty, and a record that carries a
    /// position quantity must also carry a stop status (and vice versa).
    pub fn validate(&self) -> Result<()> {
        if self.reason.trim().is_empty() {
            return Err(CoreError::InvalidRecord("reason is empty".to_string()));
        }
        if self.state.trim().is_empty() {
            return Err(CoreError::InvalidRecord("state is empty".to_string()));
        }
        match (&self.context.position_qty, &self.context.stop_status) {
            (Some(_), None) => Err(CoreError::InvalidRecord(
                "position_qty present without stop_status".to_string(),
            )),
            (None, Some(_)) => Err(CoreError::InvalidRecord(
                "stop_status present without position_qty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Serialize to the JSON line format the audit collaborator consumes.
    pub fn to_json(&self) -> Result<String> {
        self.validate()?;
        serde_json::to_string(self)
            .map_err(|e| CoreError::InvalidRecord(format!("serialization failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn context() -> TransitionContext {
        TransitionContext {
            price: Price::new(dec!(50000)),
            equity: dec!(1000),
            stage: 1,
            latency_ms: 250,
            position_qty: None,
            stop_status: None,
        }
    }

    #[test]
    fn test_valid_record_serializes() {
        let rec = TransitionRecord::new("entry filled", "IN_POSITION", context());
        let json = rec.to_json().unwrap();
        assert!(json.contains("\"IN_POSITION\""));
    }

    #[test]
    fn test_empty_reason_rejected() {
        let rec = TransitionRecord::new("", "HALT", context());
        assert!(matches!(rec.validate(), Err(CoreError::InvalidRecord(_))));
    }

    #[test]
    fn test_partial_position_fields_rejected() {
        let mut ctx = context();
        ctx.position_qty = Some(Size::new(dec!(0.5)));
        let rec = TransitionRecord::new("stop placed", "IN_POSITION", ctx);
        assert!(rec.validate().is_err());
    }

    #[test]
    fn test_full_position_fields_accepted() {
        let mut ctx = context();
        ctx.position_qty = Some(Size::new(dec!(0.5)));
        ctx.stop_status = Some("ACTIVE".to_string());
        let rec = TransitionRecord::new("stop placed", "IN_POSITION", ctx);
        assert!(rec.validate().is_ok());
    }
}
