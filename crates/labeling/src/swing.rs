use analysis_core::{AnalysisError, IndicatorRow, Labeler, Mode1Label, Signal, TimeframeTag};

/// C2: marks local swing highs/lows and promotes them to directional labels
/// when the forward window realises at least `min_reversal_pips`. Yields a
/// heavily imbalanced (~3% positive) label set on daily data -- see
/// [`crate::ProfitableLabeler`] for the balanced alternative.
#[derive(Debug, Clone, Copy)]
pub struct SwingLabeler {
    pub pip_size: f64,
}

impl SwingLabeler {
    pub fn new(pip_size: f64) -> Self {
        Self { pip_size }
    }

    fn is_swing_low(rows: &[IndicatorRow], i: usize, lookback: usize) -> bool {
        let lo = i.saturating_sub(lookback);
        let hi = (i + lookback).min(rows.len() - 1);
        let window_min = rows[lo..=hi]
            .iter()
            .map(|r| r.low)
            .fold(f64::INFINITY, f64::min);
        rows[i].low <= window_min
    }

    fn is_swing_high(rows: &[IndicatorRow], i: usize, lookback: usize) -> bool {
        let lo = i.saturating_sub(lookback);
        let hi = (i + lookback).min(rows.len() - 1);
        let window_max = rows[lo..=hi]
            .iter()
            .map(|r| r.high)
            .fold(f64::NEG_INFINITY, f64::max);
        rows[i].high >= window_max
    }

    fn confidence(
        row: &IndicatorRow,
        move_pips: f64,
        min_reversal_pips: f64,
        direction: Signal,
    ) -> f64 {
        let move_ratio = (move_pips / min_reversal_pips).min(3.0).max(1.0);
        let mut confidence = 0.5 + 0.15 * (move_ratio - 1.0) / 2.0;

        if let Some(adx) = row.adx_14 {
            if adx >= 25.0 {
                confidence += 0.1;
            } else if adx >= 20.0 {
                confidence += 0.05;
            }
        }

        if let Some(rsi) = row.rsi_14 {
            let extreme = match direction {
                Signal::Long => rsi <= 30.0,
                Signal::Short => rsi >= 70.0,
                Signal::Hold => false,
            };
            if extreme {
                confidence += 0.1;
            }
        }

        if let Some(hist) = row.macd_histogram {
            let aligned = match direction {
                Signal::Long => hist > 0.0,
                Signal::Short => hist < 0.0,
                Signal::Hold => false,
            };
            if aligned {
                confidence += 0.1;
            }
        }

        if let (Some(atr), true) = (row.atr_14, row.close > 0.0) {
            let ratio = atr / row.close;
            if (0.0005..=0.02).contains(&ratio) {
                confidence += 0.05;
            }
        }

        confidence.clamp(0.0, 1.0)
    }
}

impl Labeler for SwingLabeler {
    type Params = ();

    fn label(
        &self,
        rows: &[IndicatorRow],
        timeframe_tag: TimeframeTag,
        _params: &Self::Params,
    ) -> Result<Vec<Mode1Label>, AnalysisError> {
        let n = rows.len();
        let cfg = timeframe_tag.swing_config();
        let (lookback, lookforward) = (cfg.lookback_bars, cfg.lookforward_bars);

        let mut labels = Vec::with_capacity(n);

        for i in 0..n {
            let has_lookback = i >= lookback && i + lookback < n;
            let has_lookforward = i + lookforward < n;

            if !has_lookback || !has_lookforward {
                labels.push(Mode1Label {
                    signal: Signal::Hold,
                    confidence: 0.0,
                    entry_price: rows[i].close,
                    timeframe_tag,
                    move_pips: None,
                    expected_profit_pips: None,
                    expected_loss_pips: None,
                    risk_reward: None,
                });
                continue;
            }

            let forward = &rows[i + 1..=i + lookforward];

            if Self::is_swing_low(rows, i, lookback) {
                let swing_low = rows[i].low;
                let best_high = forward
                    .iter()
                    .map(|r| r.high)
                    .fold(f64::NEG_INFINITY, f64::max);
                let move_pips = (best_high - swing_low) / self.pip_size;

                if move_pips >= cfg.min_reversal_pips {
                    let confidence =
                        Self::confidence(&rows[i], move_pips, cfg.min_reversal_pips, Signal::Long);
                    labels.push(Mode1Label {
                        signal: Signal::Long,
                        confidence,
                        entry_price: swing_low,
                        timeframe_tag,
                        move_pips: Some(move_pips),
                        expected_profit_pips: Some(move_pips),
                        expected_loss_pips: None,
                        risk_reward: None,
                    });
                    continue;
                }
            }

            if Self::is_swing_high(rows, i, lookback) {
                let swing_high = rows[i].high;
                let best_low = forward.iter().map(|r| r.low).fold(f64::INFINITY, f64::min);
                let move_pips = (swing_high - best_low) / self.pip_size;

                if move_pips >= cfg.min_reversal_pips {
                    let confidence = Self::confidence(
                        &rows[i],
                        move_pips,
                        cfg.min_reversal_pips,
                        Signal::Short,
                    );
                    labels.push(Mode1Label {
                        signal: Signal::Short,
                        confidence,
                        entry_price: swing_high,
                        timeframe_tag,
                        move_pips: Some(move_pips),
                        expected_profit_pips: Some(move_pips),
                        expected_loss_pips: None,
                        risk_reward: None,
                    });
                    continue;
                }
            }

            labels.push(Mode1Label {
                signal: Signal::Hold,
                confidence: 0.0,
                entry_price: rows[i].close,
                timeframe_tag,
                move_pips: None,
                expected_profit_pips: None,
                expected_loss_pips: None,
                risk_reward: None,
            });
        }

        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row_at(i: usize, low: f64, high: f64, close: f64) -> IndicatorRow {
        IndicatorRow {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86400, 0).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn bars_missing_lookforward_are_hold() {
        let rows: Vec<IndicatorRow> = (0..5).map(|i| row_at(i, 1.10, 1.11, 1.105)).collect();
        let labeler = SwingLabeler::new(0.0001);
        let labels = labeler
            .label(&rows, TimeframeTag::D1, &())
            .expect("labeling succeeds");
        assert!(labels.iter().all(|l| l.signal == Signal::Hold));
    }

    #[test]
    fn deep_swing_low_promotes_to_long() {
        let mut rows = Vec::new();
        for i in 0..80 {
            rows.push(row_at(i, 1.2000, 1.2010, 1.2005));
        }
        // carve a pronounced swing low at index 40
        rows[40] = row_at(40, 1.1000, 1.1010, 1.1005);
        // and a strong forward rally to realise the reversal
        for i in 41..60 {
            rows[i] = row_at(i, 1.1500 + (i as f64) * 0.001, 1.1600 + (i as f64) * 0.001, 1.1550 + (i as f64) * 0.001);
        }

        let labeler = SwingLabeler::new(0.0001);
        let labels = labeler
            .label(&rows, TimeframeTag::D1, &())
            .expect("labeling succeeds");
        assert_eq!(labels[40].signal, Signal::Long);
        assert!(labels[40].confidence > 0.0);
    }
}
