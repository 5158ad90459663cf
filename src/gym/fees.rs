//! Tiered taker fee schedule, modeled on Kraken's 30-day volume tiers.
//!
//! Rates are resolved against the notional value of the trade itself, not a
//! rolling volume window. Every notional resolves to a rate: the zero
//! threshold tier is the catch-all.

/// Fee tiers as `(minimum notional in USD, taker rate)`, highest tier first.
const FEE_TIERS: [(f64, f64); 12] = [
    (500_000_000.0, 0.0004),
    (250_000_000.0, 0.0006),
    (100_000_000.0, 0.0008),
    (10_000_000.0, 0.0010),
    (5_000_001.0, 0.0012),
    (2_500_001.0, 0.0014),
    (1_000_001.0, 0.0016),
    (500_001.0, 0.0018),
    (250_001.0, 0.0020),
    (100_001.0, 0.0022),
    (50_001.0, 0.0024),
    (0.0, 0.0026),
];

/// Resolves the taker fee rate for a trade of the given notional value.
pub fn fee_rate(notional: f64) -> f64 {
    FEE_TIERS
        .iter()
        .find(|(threshold, _)| notional >= *threshold)
        .map(|(_, rate)| *rate)
        .unwrap_or(0.0026)
}

/// Absolute fee charged for a trade of the given notional value.
pub fn fee(notional: f64) -> f64 {
    notional * fee_rate(notional)
}
