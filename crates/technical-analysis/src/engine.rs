use analysis_core::{Bar, IndicatorEngine, IndicatorRow};

use crate::indicators::{
    adx, atr, bollinger_bands, cci, ema, macd, momentum, roc, rsi, sma, stochastic, williams_r,
};

/// C1: the frozen indicator family. Every row it emits matches
/// `analysis_core::ALL_FEATURE_NAMES` exactly in name and order.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedIndicatorEngine;

impl FixedIndicatorEngine {
    pub fn new() -> Self {
        Self
    }
}

impl IndicatorEngine for FixedIndicatorEngine {
    fn compute(&self, bars: &[Bar]) -> Vec<IndicatorRow> {
        if bars.is_empty() {
            return vec![];
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let n = bars.len();

        let sma_20 = sma(&closes, 20);
        let sma_50 = sma(&closes, 50);
        let sma_200 = sma(&closes, 200);
        let ema_12 = ema(&closes, 12);
        let ema_26 = ema(&closes, 26);
        let rsi_14 = rsi(&closes, 14);
        let macd_result = macd(&closes, 12, 26, 9);
        let bb = bollinger_bands(&closes, 20, 2.0);
        let atr_14 = atr(bars, 14);
        let stoch = stochastic(bars, 14, 3);
        let momentum_10 = momentum(&closes, 10);
        let roc_12 = roc(&closes, 12);
        let will_r = williams_r(bars, 14);
        let cci_20 = cci(bars, 20);
        let adx_result = adx(bars, 14);

        // Every series above is right-aligned (its last element corresponds to
        // bars[n-1]); offset(series) is how many leading bars that series has
        // not yet matured for.
        let offset = |len: usize| n.saturating_sub(len);

        let sma_20_off = offset(sma_20.len());
        let sma_50_off = offset(sma_50.len());
        let sma_200_off = offset(sma_200.len());
        let ema_12_off = offset(ema_12.len());
        let ema_26_off = offset(ema_26.len());
        let rsi_14_off = offset(rsi_14.len());
        let macd_off = offset(macd_result.macd_line.len());
        let macd_signal_off = offset(macd_result.signal_line.len());
        let bb_off = offset(bb.middle.len());
        let atr_14_off = offset(atr_14.len());
        let stoch_k_off = offset(stoch.k.len());
        let stoch_d_off = offset(stoch.d.len());
        let momentum_off = offset(momentum_10.len());
        let roc_off = offset(roc_12.len());
        let will_r_off = offset(will_r.len());
        let cci_off = offset(cci_20.len());
        let adx_off = offset(adx_result.adx.len());

        let at = |series: &[f64], off: usize, i: usize| -> Option<f64> {
            if i < off {
                None
            } else {
                series.get(i - off).copied()
            }
        };

        let mut rows = Vec::with_capacity(n);

        for i in 0..n {
            let bar = &bars[i];

            let bb_upper = at(&bb.upper, bb_off, i);
            let bb_middle = at(&bb.middle, bb_off, i);
            let bb_lower = at(&bb.lower, bb_off, i);
            let bb_width = match (bb_upper, bb_lower, bb_middle) {
                (Some(u), Some(l), Some(m)) if m != 0.0 => Some((u - l) / m),
                _ => None,
            };

            let price_change = if i > 0 {
                Some(bar.close - bars[i - 1].close)
            } else {
                None
            };
            let price_range = Some(bar.high - bar.low);
            let body_size = Some((bar.close - bar.open).abs());

            rows.push(IndicatorRow {
                timestamp: bar.timestamp,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                sma_20: at(&sma_20, sma_20_off, i),
                sma_50: at(&sma_50, sma_50_off, i),
                sma_200: at(&sma_200, sma_200_off, i),
                ema_12: at(&ema_12, ema_12_off, i),
                ema_26: at(&ema_26, ema_26_off, i),
                rsi_14: at(&rsi_14, rsi_14_off, i),
                macd: at(&macd_result.macd_line, macd_off, i),
                macd_signal: at(&macd_result.signal_line, macd_signal_off, i),
                macd_histogram: {
                    let hist_off = offset(macd_result.histogram.len());
                    at(&macd_result.histogram, hist_off, i)
                },
                bb_upper,
                bb_middle,
                bb_lower,
                bb_width,
                atr_14: at(&atr_14, atr_14_off, i),
                stoch_k: at(&stoch.k, stoch_k_off, i),
                stoch_d: at(&stoch.d, stoch_d_off, i),
                momentum_10: at(&momentum_10, momentum_off, i),
                roc_12: at(&roc_12, roc_off, i),
                williams_r: at(&will_r, will_r_off, i),
                cci_20: at(&cci_20, cci_off, i),
                adx_14: at(&adx_result.adx, adx_off, i),
                price_change,
                price_range,
                body_size,
            });
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn synthetic_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let base = 1.1000 + (i as f64) * 0.0001;
                Bar {
                    timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                    open: base,
                    high: base + 0.0005,
                    low: base - 0.0005,
                    close: base + 0.0002,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    #[test]
    fn compute_emits_one_row_per_bar() {
        let bars = synthetic_bars(250);
        let rows = FixedIndicatorEngine::new().compute(&bars);
        assert_eq!(rows.len(), bars.len());
    }

    #[test]
    fn early_rows_have_no_long_window_indicators() {
        let bars = synthetic_bars(250);
        let rows = FixedIndicatorEngine::new().compute(&bars);
        assert!(rows[0].sma_200.is_none());
        assert!(rows[199].sma_200.is_none());
        assert!(rows[199].sma_20.is_some());
    }

    #[test]
    fn late_rows_have_all_indicators_populated() {
        let bars = synthetic_bars(250);
        let rows = FixedIndicatorEngine::new().compute(&bars);
        let last = rows.last().unwrap();
        assert!(last.sma_200.is_some());
        assert!(last.adx_14.is_some());
        assert!(last.cci_20.is_some());
        assert!(last.williams_r.is_some());
        assert!(last.momentum_10.is_some());
        assert!(last.roc_12.is_some());
    }

    #[test]
    fn every_row_keeps_ohlc_consistency() {
        let bars = synthetic_bars(250);
        let rows = FixedIndicatorEngine::new().compute(&bars);
        for row in &rows {
            assert!(row.is_consistent());
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let rows = FixedIndicatorEngine::new().compute(&[]);
        assert!(rows.is_empty());
    }
}
