//! 📊 Forecast scoring metrics
//!
//! Pure functions over merged records. Every function is defined on the
//! empty slice (returning zeros) and never divides by zero.

use serde::Serialize;

use crate::types::ScoredRecord;

/// Clip applied to probabilities before taking logs
pub const LOG_EPSILON: f64 = 1e-6;

pub const DEFAULT_CALIBRATION_BINS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExcessLogScore {
    pub els: f64,
    pub information_ratio: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KellyMetrics {
    pub kelly_pnl: f64,
    pub kelly_sharpe: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub count: usize,
    pub hit_rate: f64,
}

/// Predicted class, rounding half to even: exactly 0.5 predicts 0
pub fn predicted_outcome(probability: f64) -> u8 {
    if probability.round_ties_even() >= 1.0 {
        1
    } else {
        0
    }
}

pub fn is_hit(record: &ScoredRecord) -> bool {
    predicted_outcome(record.probability) == record.outcome
}

/// Squared error of one record; the per-record Brier term
pub fn brier_component(record: &ScoredRecord) -> f64 {
    (record.probability - record.outcome_f64()).powi(2)
}

pub fn accuracy(records: &[ScoredRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let hits = records.iter().filter(|r| is_hit(r)).count();
    hits as f64 / records.len() as f64
}

pub fn brier_score(records: &[ScoredRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(brier_component).sum::<f64>() / records.len() as f64
}

/// Log-likelihood advantage over the market baseline.
///
/// Only records whose baseline lies strictly inside (0, 1) contribute.
pub fn excess_log_score(records: &[ScoredRecord]) -> ExcessLogScore {
    let values: Vec<f64> = records
        .iter()
        .filter_map(|r| {
            let market = r.market_probability.filter(|m| *m > 0.0 && *m < 1.0)?;
            let p = clip(r.probability);
            let m = clip(market);
            Some(if r.outcome == 1 {
                p.ln() - m.ln()
            } else {
                (1.0 - p).ln() - (1.0 - m).ln()
            })
        })
        .collect();

    if values.is_empty() {
        return ExcessLogScore::default();
    }
    let (mean, std) = mean_pstdev(&values);
    ExcessLogScore {
        els: mean,
        information_ratio: ratio(mean, std, values.len()),
    }
}

/// Simulated stake-on-disagreement P&L against the market baseline.
///
/// Unlike the excess log score, baselines of exactly 0 or 1 are kept.
pub fn kelly_metrics(records: &[ScoredRecord]) -> KellyMetrics {
    let pnl: Vec<f64> = records
        .iter()
        .filter_map(|r| {
            let market = r.market_probability?;
            let stake = (r.probability - market).clamp(-1.0, 1.0);
            Some(stake * (r.outcome_f64() - market))
        })
        .collect();

    if pnl.is_empty() {
        return KellyMetrics::default();
    }
    let (mean, std) = mean_pstdev(&pnl);
    KellyMetrics {
        kelly_pnl: mean,
        kelly_sharpe: ratio(mean, std, pnl.len()),
    }
}

/// Equal-width reliability bins over [0, 1]; probability 1.0 lands in the last bin
pub fn calibration_bins(records: &[ScoredRecord], bins: usize) -> Vec<CalibrationBin> {
    if bins == 0 {
        return Vec::new();
    }
    let mut totals = vec![0usize; bins];
    let mut hits = vec![0usize; bins];

    for record in records {
        let idx = ((record.probability * bins as f64).floor() as usize).min(bins - 1);
        totals[idx] += 1;
        hits[idx] += record.outcome as usize;
    }

    (0..bins)
        .map(|i| CalibrationBin {
            bin_start: i as f64 / bins as f64,
            bin_end: (i + 1) as f64 / bins as f64,
            count: totals[i],
            hit_rate: if totals[i] > 0 {
                hits[i] as f64 / totals[i] as f64
            } else {
                0.0
            },
        })
        .collect()
}

fn clip(p: f64) -> f64 {
    p.clamp(LOG_EPSILON, 1.0 - LOG_EPSILON)
}

/// Mean and population standard deviation; std is 0 for fewer than 2 values
fn mean_pstdev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn ratio(mean: f64, std: f64, n: usize) -> f64 {
    if n < 2 || std == 0.0 {
        0.0
    } else {
        mean / std
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn rec(p: f64, o: u8) -> ScoredRecord {
        ScoredRecord::new("e", p, o)
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        assert_eq!(accuracy(&[]), 0.0);
        assert_eq!(brier_score(&[]), 0.0);
        assert_eq!(excess_log_score(&[]), ExcessLogScore::default());
        assert_eq!(kelly_metrics(&[]), KellyMetrics::default());
        let bins = calibration_bins(&[], 10);
        assert_eq!(bins.len(), 10);
        assert!(bins.iter().all(|b| b.count == 0 && b.hit_rate == 0.0));
    }

    #[test]
    fn test_brier_reference_values() {
        assert_eq!(brier_score(&[rec(1.0, 1)]), 0.0);
        assert_eq!(brier_score(&[rec(0.0, 1)]), 1.0);
        assert_eq!(brier_score(&[rec(0.5, 0), rec(0.5, 1)]), 0.25);
    }

    #[test]
    fn test_accuracy_half_rounds_to_zero() {
        assert_eq!(predicted_outcome(0.5), 0);
        assert_eq!(predicted_outcome(0.5000001), 1);
        assert_eq!(predicted_outcome(0.4999999), 0);
        assert_eq!(accuracy(&[rec(0.5, 0)]), 1.0);
        assert_eq!(accuracy(&[rec(0.5, 1)]), 0.0);
    }

    #[test]
    fn test_accuracy_order_invariant_and_bounded() {
        let mut records = vec![rec(0.9, 1), rec(0.2, 1), rec(0.7, 0), rec(0.1, 0), rec(0.6, 1)];
        let forward = accuracy(&records);
        records.reverse();
        assert_eq!(forward, accuracy(&records));
        records.swap(0, 3);
        assert_eq!(forward, accuracy(&records));
        assert!((forward - 0.6).abs() < EPS);
        let brier = brier_score(&records);
        assert!((0.0..=1.0).contains(&brier));
    }

    #[test]
    fn test_els_ignores_degenerate_baselines() {
        let records = vec![
            rec(0.8, 1).with_market(0.0),
            rec(0.8, 1).with_market(1.0),
            rec(0.8, 1),
        ];
        assert_eq!(
            excess_log_score(&records),
            ExcessLogScore { els: 0.0, information_ratio: 0.0 }
        );
    }

    #[test]
    fn test_els_single_record_has_zero_ratio() {
        let records = vec![rec(0.8, 1).with_market(0.5)];
        let out = excess_log_score(&records);
        assert!((out.els - (0.8f64.ln() - 0.5f64.ln())).abs() < EPS);
        assert_eq!(out.information_ratio, 0.0);
    }

    #[test]
    fn test_els_information_ratio() {
        let records = vec![rec(0.8, 1).with_market(0.5), rec(0.3, 0).with_market(0.5)];
        let a = 0.8f64.ln() - 0.5f64.ln();
        let b = 0.7f64.ln() - 0.5f64.ln();
        let mean = (a + b) / 2.0;
        let variance = ((a - mean).powi(2) + (b - mean).powi(2)) / 2.0;
        let out = excess_log_score(&records);
        assert!((out.els - mean).abs() < EPS);
        assert!((out.information_ratio - mean / variance.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_els_clips_certain_forecasts() {
        // A wrong certain forecast is finite thanks to the clip
        let out = excess_log_score(&[rec(1.0, 0).with_market(0.5)]);
        let expected = LOG_EPSILON.ln() - 0.5f64.ln();
        assert!(out.els.is_finite());
        assert!((out.els - expected).abs() < 1e-9);
    }

    #[test]
    fn test_identical_values_zero_ratio() {
        let records = vec![rec(0.8, 1).with_market(0.5), rec(0.8, 1).with_market(0.5)];
        assert_eq!(excess_log_score(&records).information_ratio, 0.0);
        assert_eq!(kelly_metrics(&records).kelly_sharpe, 0.0);
    }

    #[test]
    fn test_kelly_without_baseline_is_zero() {
        let records = vec![rec(0.8, 1), rec(0.2, 0)];
        assert_eq!(
            kelly_metrics(&records),
            KellyMetrics { kelly_pnl: 0.0, kelly_sharpe: 0.0 }
        );
    }

    #[test]
    fn test_kelly_keeps_extreme_baselines() {
        // stake = 0.3 - 0.0 = 0.3, pnl = 0.3 * (1 - 0) = 0.3
        let out = kelly_metrics(&[rec(0.3, 1).with_market(0.0)]);
        assert!((out.kelly_pnl - 0.3).abs() < EPS);
        assert_eq!(out.kelly_sharpe, 0.0);
    }

    #[test]
    fn test_kelly_pnl_and_sharpe() {
        // stakes of +/-0.3 against a 0.5 market; the third bet loses
        let records = vec![
            rec(0.8, 1).with_market(0.5),
            rec(0.2, 0).with_market(0.5),
            rec(0.8, 0).with_market(0.5),
        ];
        let pnl = [0.15, 0.15, -0.15];
        let mean = pnl.iter().sum::<f64>() / 3.0;
        let std = (pnl.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0).sqrt();
        let out = kelly_metrics(&records);
        assert!((out.kelly_pnl - mean).abs() < EPS);
        assert!((out.kelly_sharpe - mean / std).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_top_edge_in_last_bin() {
        let records = vec![rec(1.0, 1), rec(0.0, 0), rec(0.55, 1), rec(0.59, 0)];
        let bins = calibration_bins(&records, 10);
        assert_eq!(bins[9].count, 1);
        assert_eq!(bins[9].hit_rate, 1.0);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[5].count, 2);
        assert_eq!(bins[5].hit_rate, 0.5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), records.len());
        assert_eq!(bins[3].bin_start, 0.3);
        assert_eq!(bins[9].bin_end, 1.0);
    }

    #[test]
    fn test_calibration_zero_bins() {
        assert!(calibration_bins(&[rec(0.4, 1)], 0).is_empty());
    }
}
