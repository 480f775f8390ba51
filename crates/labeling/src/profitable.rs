use analysis_core::{AnalysisError, IndicatorRow, Labeler, Mode1Label, Signal, TimeframeTag};

#[derive(Debug, Clone, Copy)]
pub struct ProfitableParams {
    pub lookforward_bars: usize,
    pub min_profit_pips: f64,
    pub min_rr: f64,
    pub max_loss_pips: f64,
}

/// C3: labels every bar with a full forward window by evaluating both trade
/// directions and keeping the one that clears the profit/RR/loss gates,
/// breaking ties toward LONG. Yields a near-balanced (~50% positive) label
/// set, directly addressing the imbalance [`crate::SwingLabeler`] produces.
#[derive(Debug, Clone, Copy)]
pub struct ProfitableLabeler {
    pub pip_size: f64,
}

impl ProfitableLabeler {
    pub fn new(pip_size: f64) -> Self {
        Self { pip_size }
    }

    fn direction_confidence(
        row: &IndicatorRow,
        direction: Signal,
        profit_pips: f64,
        rr: f64,
        params: &ProfitableParams,
    ) -> f64 {
        let mut confidence = 0.5;

        let profit_headroom = ((profit_pips - params.min_profit_pips) / params.min_profit_pips)
            .max(0.0)
            .min(1.0);
        confidence += 0.15 * profit_headroom;

        let rr_headroom = ((rr - params.min_rr) / params.min_rr).max(0.0).min(1.0);
        confidence += 0.15 * rr_headroom;

        if let Some(rsi) = row.rsi_14 {
            let aligned = match direction {
                Signal::Long => rsi <= 30.0,
                Signal::Short => rsi >= 70.0,
                Signal::Hold => false,
            };
            if aligned {
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
                confidence += 0.05;
            }
        }

        if let Some(adx) = row.adx_14 {
            if adx >= 25.0 {
                confidence += 0.05;
            }
        }

        confidence.clamp(0.0, 1.0)
    }
}

impl Labeler for ProfitableLabeler {
    type Params = ProfitableParams;

    fn label(
        &self,
        rows: &[IndicatorRow],
        timeframe_tag: TimeframeTag,
        params: &Self::Params,
    ) -> Result<Vec<Mode1Label>, AnalysisError> {
        if params.lookforward_bars == 0 {
            return Err(AnalysisError::ValidationError(
                "lookforward_bars must be positive".to_string(),
            ));
        }

        let n = rows.len();
        let mut labels = Vec::with_capacity(n);

        for i in 0..n {
            if i + params.lookforward_bars >= n {
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

            let entry = rows[i].close;
            let forward = &rows[i + 1..=i + params.lookforward_bars];
            let future_high = forward.iter().map(|r| r.high).fold(f64::NEG_INFINITY, f64::max);
            let future_low = forward.iter().map(|r| r.low).fold(f64::INFINITY, f64::min);

            let long_profit = (future_high - entry) / self.pip_size;
            let long_loss = ((entry - future_low) / self.pip_size).max(0.0);
            let long_rr = long_profit / long_loss.max(5.0);

            let short_profit = (entry - future_low) / self.pip_size;
            let short_loss = ((future_high - entry) / self.pip_size).max(0.0);
            let short_rr = short_profit / short_loss.max(5.0);

            let long_valid = long_profit >= params.min_profit_pips
                && long_rr >= params.min_rr
                && long_loss <= params.max_loss_pips;
            let short_valid = short_profit >= params.min_profit_pips
                && short_rr >= params.min_rr
                && short_loss <= params.max_loss_pips;

            let chosen = match (long_valid, short_valid) {
                (true, true) => {
                    if short_rr > long_rr {
                        Some((Signal::Short, short_profit, short_loss, short_rr))
                    } else {
                        Some((Signal::Long, long_profit, long_loss, long_rr))
                    }
                }
                (true, false) => Some((Signal::Long, long_profit, long_loss, long_rr)),
                (false, true) => Some((Signal::Short, short_profit, short_loss, short_rr)),
                (false, false) => None,
            };

            match chosen {
                Some((direction, profit, loss, rr)) => {
                    let confidence =
                        Self::direction_confidence(&rows[i], direction, profit, rr, params);
                    labels.push(Mode1Label {
                        signal: direction,
                        confidence,
                        entry_price: entry,
                        timeframe_tag,
                        move_pips: Some(profit),
                        expected_profit_pips: Some(profit),
                        expected_loss_pips: Some(loss),
                        risk_reward: Some(rr),
                    });
                }
                None => labels.push(Mode1Label {
                    signal: Signal::Hold,
                    confidence: 0.0,
                    entry_price: entry,
                    timeframe_tag,
                    move_pips: None,
                    expected_profit_pips: None,
                    expected_loss_pips: None,
                    risk_reward: None,
                }),
            }
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

    fn params() -> ProfitableParams {
        ProfitableParams {
            lookforward_bars: 10,
            min_profit_pips: 30.0,
            min_rr: 1.5,
            max_loss_pips: 100.0,
        }
    }

    #[test]
    fn tail_rows_without_forward_window_are_hold() {
        let rows: Vec<IndicatorRow> = (0..5).map(|i| row_at(i, 1.10, 1.11, 1.105)).collect();
        let labeler = ProfitableLabeler::new(0.0001);
        let labels = labeler.label(&rows, TimeframeTag::H1, &params()).unwrap();
        assert!(labels.iter().all(|l| l.signal == Signal::Hold));
    }

    #[test]
    fn strong_rally_with_shallow_pullback_is_labeled_long() {
        let mut rows = vec![row_at(0, 1.1990, 1.2010, 1.2000)];
        for i in 1..=10 {
            let level = 1.2000 + i as f64 * 0.0010;
            rows.push(row_at(i, level - 0.0005, level + 0.0005, level));
        }
        let labeler = ProfitableLabeler::new(0.0001);
        let labels = labeler.label(&rows, TimeframeTag::H1, &params()).unwrap();
        assert_eq!(labels[0].signal, Signal::Long);
        assert!(labels[0].risk_reward.unwrap() >= params().min_rr);
    }

    #[test]
    fn ties_break_toward_long() {
        // A perfectly symmetric range that clears neither gate should stay Hold,
        // but a deliberately tied RR with both directions valid favors long.
        let mut rows = vec![row_at(0, 1.1950, 1.2050, 1.2000)];
        for i in 1..=10 {
            rows.push(row_at(i, 1.1950, 1.2050, 1.2000));
        }
        let tight = ProfitableParams {
            lookforward_bars: 10,
            min_profit_pips: 40.0,
            min_rr: 0.9,
            max_loss_pips: 100.0,
        };
        let labeler = ProfitableLabeler::new(0.0001);
        let labels = labeler.label(&rows, TimeframeTag::H1, &tight).unwrap();
        assert_eq!(labels[0].signal, Signal::Long);
    }
}
