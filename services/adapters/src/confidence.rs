//! Per-update confidence: monotonically decreasing in latency and spread,
//! monotonically increasing in normalized volume, clamped to `[0, 1]`.

/// `latency_ms` is time since the exchange's own event timestamp.
/// `volume` is the trade/book size reported with the update; `median_volume`
/// is a rolling reference so confidence doesn't depend on a feed's absolute
/// units. `spread_fraction` is `(ask - bid) / mid`, or `0.0` when unknown.
pub fn compute_confidence(latency_ms: f64, volume: f64, median_volume: f64, spread_fraction: f64) -> f64 {
    const LATENCY_HALF_LIFE_MS: f64 = 500.0;
    const SPREAD_PENALTY_SCALE: f64 = 20.0;

    let latency_term = (-latency_ms.max(0.0) / LATENCY_HALF_LIFE_MS).exp();

    let volume_term = if median_volume > 0.0 {
        (volume.max(0.0) / (volume.max(0.0) + median_volume)).clamp(0.0, 1.0)
    } else {
        0.5
    };

    let spread_term = (1.0 - spread_fraction.max(0.0) * SPREAD_PENALTY_SCALE).clamp(0.0, 1.0);

    (0.5 * latency_term + 0.3 * volume_term + 0.2 * spread_term).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_stays_within_unit_interval() {
        let c = compute_confidence(50_000.0, 0.0, 100.0, 5.0);
        assert!((0.0..=1.0).contains(&c));
    }

    #[test]
    fn higher_latency_never_increases_confidence() {
        let low_latency = compute_confidence(10.0, 5.0, 5.0, 0.001);
        let high_latency = compute_confidence(5_000.0, 5.0, 5.0, 0.001);
        assert!(high_latency <= low_latency);
    }

    #[test]
    fn wider_spread_never_increases_confidence() {
        let tight = compute_confidence(10.0, 5.0, 5.0, 0.0001);
        let wide = compute_confidence(10.0, 5.0, 5.0, 0.05);
        assert!(wide <= tight);
    }

    #[test]
    fn more_volume_never_decreases_confidence() {
        let thin = compute_confidence(10.0, 0.1, 5.0, 0.001);
        let thick = compute_confidence(10.0, 50.0, 5.0, 0.001);
        assert!(thick >= thin);
    }
}
