use std::collections::HashSet;

use analysis_core::{Bar, IndicatorRow};

/// Bar-level half of the cleaning policy: drop duplicate timestamps, sort
/// ascending, forward-fill then backward-fill OHLC. Volume is left untouched.
pub fn clean_bars(bars: &[Bar]) -> Vec<Bar> {
    let mut sorted: Vec<Bar> = bars.to_vec();
    sorted.sort_by_key(|b| b.timestamp);

    let mut seen = HashSet::with_capacity(sorted.len());
    let mut deduped: Vec<Bar> = Vec::with_capacity(sorted.len());
    for bar in sorted {
        if seen.insert(bar.timestamp) {
            deduped.push(bar);
        }
    }

    forward_fill(&mut deduped);
    backward_fill(&mut deduped);
    deduped
}

fn forward_fill(bars: &mut [Bar]) {
    for i in 1..bars.len() {
        let (prev, cur) = (bars[i - 1], bars[i]);
        if !cur.open.is_finite() {
            bars[i].open = prev.open;
        }
        if !cur.high.is_finite() {
            bars[i].high = prev.high;
        }
        if !cur.low.is_finite() {
            bars[i].low = prev.low;
        }
        if !cur.close.is_finite() {
            bars[i].close = prev.close;
        }
    }
}

fn backward_fill(bars: &mut [Bar]) {
    for i in (0..bars.len().saturating_sub(1)).rev() {
        let next = bars[i + 1];
        if !bars[i].open.is_finite() {
            bars[i].open = next.open;
        }
        if !bars[i].high.is_finite() {
            bars[i].high = next.high;
        }
        if !bars[i].low.is_finite() {
            bars[i].low = next.low;
        }
        if !bars[i].close.is_finite() {
            bars[i].close = next.close;
        }
    }
}

/// Keeps only rows where every selected feature resolved to a value, i.e.
/// drops rows still in their indicator lookback/lookforward maturation window.
pub fn drop_incomplete_rows(rows: Vec<IndicatorRow>, selected_features: &[String]) -> Vec<IndicatorRow> {
    rows.into_iter()
        .filter(|row| selected_features.iter().all(|f| row.feature(f).is_some()))
        .collect()
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

/// Drops rows whose selected (non-volume) feature values fall outside
/// [Q1 - 3*IQR, Q3 + 3*IQR] for any feature.
pub fn remove_outliers_iqr(rows: Vec<IndicatorRow>, selected_features: &[String]) -> Vec<IndicatorRow> {
    if rows.is_empty() {
        return rows;
    }

    let non_volume: Vec<&String> = selected_features.iter().filter(|f| f.as_str() != "volume").collect();
    let mut bounds = Vec::with_capacity(non_volume.len());

    for feature in &non_volume {
        let mut col: Vec<f64> = rows.iter().filter_map(|r| r.feature(feature)).collect();
        if col.is_empty() {
            bounds.push(None);
            continue;
        }
        col.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let q1 = percentile(&col, 25.0);
        let q3 = percentile(&col, 75.0);
        let iqr = q3 - q1;
        bounds.push(Some((q1 - 3.0 * iqr, q3 + 3.0 * iqr)));
    }

    rows.into_iter()
        .filter(|row| {
            non_volume.iter().zip(bounds.iter()).all(|(feature, bound)| {
                match (row.feature(feature), bound) {
                    (Some(v), Some((lo, hi))) => v >= *lo && v <= *hi,
                    _ => true,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(ts: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            open: close,
            high: close + 0.001,
            low: close - 0.001,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn duplicate_timestamps_are_deduped() {
        let bars = vec![bar(100, 1.1), bar(100, 1.2), bar(200, 1.3)];
        let cleaned = clean_bars(&bars);
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn bars_are_sorted_ascending() {
        let bars = vec![bar(300, 1.3), bar(100, 1.1), bar(200, 1.2)];
        let cleaned = clean_bars(&bars);
        assert!(cleaned.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn nan_open_is_forward_filled() {
        let mut bars = vec![bar(100, 1.1), bar(200, 1.2)];
        bars[1].open = f64::NAN;
        let cleaned = clean_bars(&bars);
        assert_eq!(cleaned[1].open, cleaned[0].open);
    }
}
