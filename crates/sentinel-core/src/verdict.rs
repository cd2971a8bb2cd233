//! Uniform safety-evaluator output.
//!
//! Verdicts are always derived, never stored as primary state: every tick
//! recomputes them from current inputs, which keeps the gate chain
//! auditable and replay-safe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a safety evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// No objection; trading may proceed.
    Pass,
    /// Entries suppressed, no state change.
    Block,
    /// Entries suppressed until sustained recovery; auto-clearing.
    Cooldown,
    /// Trading must stop; sticky until manual reset.
    Halt,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Block => write!(f, "BLOCK"),
            Self::Cooldown => write!(f, "COOLDOWN"),
            Self::Halt => write!(f, "HALT"),
        }
    }
}

/// A verdict with its machine-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub verdict: Verdict,
    /// Empty for PASS; names the breached condition otherwise.
    pub reason: String,
}

impl GateVerdict {
    pub fn pass() -> Self {
        Self {
            verdict: Verdict::Pass,
            reason: String::new(),
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Block,
            reason: reason.into(),
        }
    }

    pub fn cooldown(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Cooldown,
            reason: reason.into(),
        }
    }

    pub fn halt(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Halt,
            reason: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn is_block(&self) -> bool {
        self.verdict == Verdict::Block
    }

    pub fn is_cooldown(&self) -> bool {
        self.verdict == Verdict::Cooldown
    }

    pub fn is_halt(&self) -> bool {
        self.verdict == Verdict::Halt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(GateVerdict::pass().is_pass());
        assert!(GateVerdict::halt("daily loss cap").is_halt());
        assert!(GateVerdict::cooldown("price collapse").is_cooldown());

        let block = GateVerdict::block("latency");
        assert!(block.is_block());
        assert!(!block.is_pass());
        assert!(!block.is_halt());
        assert_eq!(block.reason, "latency");
    }
}
