//! Pre-trade entry gates.
//!
//! Runs before an entry order is submitted: the liquidation-distance gate
//! rejects or haircuts entries whose liquidation price sits too close to
//! the stop, and fee tightening raises the expected-value bar after the
//! venue's fees spike.

use crate::config::{RiskConfig, StageLimits};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Outcome of a pre-trade gate.
#[derive(Debug, Clone, PartialEq)]
pub enum PreTradeDecision {
    /// Entry proceeds at full size.
    Pass,
    /// Entry proceeds with size scaled by `factor`.
    Haircut { factor: Decimal, reason: String },
    /// Entry is rejected this tick.
    Block(String),
}

impl PreTradeDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block(_))
    }
}

/// Risk parameters of a candidate entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRisk {
    /// Stop distance from entry, as a fraction of entry price.
    pub stop_distance_pct: Decimal,
    /// Requested leverage.
    pub leverage: Decimal,
    /// Liquidation distance from entry as a fraction, when computable.
    pub liq_distance_pct: Option<Decimal>,
}

/// Liquidation-distance gate.
///
/// Requires the liquidation price to sit at least
/// `max(stop_distance * multiplier, min_absolute)` away from entry.
#[derive(Debug, Clone, Default)]
pub struct LiquidationGate;

impl LiquidationGate {
    const FALLBACK_MAX_LEVERAGE: Decimal = Decimal::from_parts(3, 0, 0, false, 0);
    const FALLBACK_WIDE_STOP: Decimal = Decimal::from_parts(5, 0, 0, false, 2); // 0.05
    const FALLBACK_HAIRCUT: Decimal = Decimal::from_parts(8, 0, 0, false, 1); // 0.8

    pub fn check(&self, entry: &EntryRisk, limits: &StageLimits) -> PreTradeDecision {
        let required = (entry.stop_distance_pct * limits.multiplier).max(limits.min_absolute);

        match entry.liq_distance_pct {
            Some(liq) => {
                if liq < required {
                    warn!(liq = %liq, required = %required, "entry blocked: liquidation too close");
                    PreTradeDecision::Block(format!(
                        "liquidation distance {} < required {}",
                        liq, required
                    ))
                } else {
                    PreTradeDecision::Pass
                }
            }
            // Liquidation price unavailable: fall back to conservative
            // proxies instead of trading blind.
            None => {
                if entry.leverage > Self::FALLBACK_MAX_LEVERAGE {
                    PreTradeDecision::Block(format!(
                        "liquidation unknown and leverage {} > {}",
                        entry.leverage,
                        Self::FALLBACK_MAX_LEVERAGE
                    ))
                } else if entry.stop_distance_pct > Self::FALLBACK_WIDE_STOP {
                    PreTradeDecision::Haircut {
                        factor: Self::FALLBACK_HAIRCUT,
                        reason: format!(
                            "liquidation unknown and stop {} > {}",
                            entry.stop_distance_pct,
                            Self::FALLBACK_WIDE_STOP
                        ),
                    }
                } else {
                    PreTradeDecision::Pass
                }
            }
        }
    }
}

/// Fee-spike tightening.
///
/// Once the session tracker reports a fee spike, the expected-value bar
/// for new entries is multiplied for a fixed duration. Re-noting a spike
/// while active restarts the clock.
#[derive(Debug, Clone, Default)]
pub struct FeeTightening {
    activated_at: Option<DateTime<Utc>>,
}

impl FeeTightening {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a detected fee spike at `now`.
    pub fn note_spike(&mut self, now: DateTime<Utc>) {
        info!("fee spike noted: tightening expected-value gate");
        self.activated_at = Some(now);
    }

    /// Whether tightening is active at `now`.
    pub fn is_active(&self, config: &RiskConfig, now: DateTime<Utc>) -> bool {
        self.activated_at
            .is_some_and(|at| now - at < Duration::hours(config.fee_tighten_hours))
    }

    /// Multiplier to apply to the base expected-value threshold.
    pub fn required_multiplier(&self, config: &RiskConfig, now: DateTime<Utc>) -> Decimal {
        if self.is_active(config, now) {
            config.fee_tighten_multiplier
        } else {
            Decimal::ONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limits() -> StageLimits {
        StageLimits::default() // multiplier 4.0, min_absolute 0.15
    }

    #[test]
    fn test_pass_when_liq_far_enough() {
        // Stop 3%: required = max(0.12, 0.15) = 0.15; liq at 20% passes.
        let entry = EntryRisk {
            stop_distance_pct: dec!(0.03),
            leverage: dec!(2),
            liq_distance_pct: Some(dec!(0.20)),
        };
        assert!(LiquidationGate.check(&entry, &limits()).is_pass());
    }

    #[test]
    fn test_block_when_liq_too_close() {
        // Entry 50000 at 5x leverage puts liquidation ~16.7% away; with a
        // 5% stop the requirement is max(0.20, 0.15) = 0.20, so blocked.
        let entry = EntryRisk {
            stop_distance_pct: dec!(0.05),
            leverage: dec!(5),
            liq_distance_pct: Some(dec!(0.167)),
        };
        let decision = LiquidationGate.check(&entry, &limits());
        assert!(decision.is_block());
    }

    #[test]
    fn test_floor_applies_for_tight_stops() {
        // Stop 1%: scaled requirement 0.04, floor 0.15 wins.
        let entry = EntryRisk {
            stop_distance_pct: dec!(0.01),
            leverage: dec!(2),
            liq_distance_pct: Some(dec!(0.10)),
        };
        assert!(LiquidationGate.check(&entry, &limits()).is_block());
    }

    #[test]
    fn test_liq_exactly_at_requirement_passes() {
        let entry = EntryRisk {
            stop_distance_pct: dec!(0.03),
            leverage: dec!(2),
            liq_distance_pct: Some(dec!(0.15)),
        };
        assert!(LiquidationGate.check(&entry, &limits()).is_pass());
    }

    #[test]
    fn test_fallback_blocks_high_leverage() {
        let entry = EntryRisk {
            stop_distance_pct: dec!(0.02),
            leverage: dec!(4),
            liq_distance_pct: None,
        };
        assert!(LiquidationGate.check(&entry, &limits()).is_block());
    }

    #[test]
    fn test_fallback_haircuts_wide_stop() {
        let entry = EntryRisk {
            stop_distance_pct: dec!(0.06),
            leverage: dec!(2),
            liq_distance_pct: None,
        };
        match LiquidationGate.check(&entry, &limits()) {
            PreTradeDecision::Haircut { factor, .. } => assert_eq!(factor, dec!(0.8)),
            other => panic!("expected haircut, got {:?}", other),
        }
    }

    #[test]
    fn test_fallback_passes_modest_entry() {
        let entry = EntryRisk {
            stop_distance_pct: dec!(0.03),
            leverage: dec!(2),
            liq_distance_pct: None,
        };
        assert!(LiquidationGate.check(&entry, &limits()).is_pass());
    }

    #[test]
    fn test_fee_tightening_lifecycle() {
        let config = RiskConfig::default();
        let now = Utc::now();
        let mut tightening = FeeTightening::new();

        assert!(!tightening.is_active(&config, now));
        assert_eq!(tightening.required_multiplier(&config, now), dec!(1));

        tightening.note_spike(now);
        assert!(tightening.is_active(&config, now + Duration::hours(23)));
        assert_eq!(
            tightening.required_multiplier(&config, now + Duration::hours(23)),
            dec!(1.5)
        );

        // Expires after 24h.
        assert!(!tightening.is_active(&config, now + Duration::hours(24)));
        assert_eq!(
            tightening.required_multiplier(&config, now + Duration::hours(24)),
            dec!(1)
        );
    }

    #[test]
    fn test_fee_tightening_respike_restarts_clock() {
        let config = RiskConfig::default();
        let now = Utc::now();
        let mut tightening = FeeTightening::new();

        tightening.note_spike(now);
        tightening.note_spike(now + Duration::hours(20));
        assert!(tightening.is_active(&config, now + Duration::hours(30)));
    }
}
