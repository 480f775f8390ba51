use analysis_core::{IndicatorRow, Mode1Label, Mode2Checkpoint, MonitorAction, RiskMonitor, Signal, TimeframeTag};

/// C4: walks forward from each Mode-1 entry and emits a per-bar checkpoint
/// describing running excursion and whether the remaining monitor window
/// would have deepened the drawdown or given back the open profit.
#[derive(Debug, Clone, Copy)]
pub struct RiskMonitorLabeler {
    pub pip_size: f64,
    /// Additional adverse/favourable excursion (percentage points) the
    /// forward window must realise to count as "extends" / "reverses".
    pub excursion_threshold_pct: f64,
}

impl RiskMonitorLabeler {
    pub fn new(pip_size: f64) -> Self {
        Self {
            pip_size,
            excursion_threshold_pct: 2.0,
        }
    }

    fn pct_change(entry: f64, current: f64, direction: Signal) -> f64 {
        match direction {
            Signal::Long => (current - entry) / entry * 100.0,
            Signal::Short => (entry - current) / entry * 100.0,
            Signal::Hold => 0.0,
        }
    }
}

impl RiskMonitor for RiskMonitorLabeler {
    fn monitor(
        &self,
        rows: &[IndicatorRow],
        entries: &[(usize, Mode1Label)],
        timeframe_tag: TimeframeTag,
    ) -> Vec<Mode2Checkpoint> {
        let n = rows.len();
        let duration = timeframe_tag.monitor_duration();
        let mut checkpoints = Vec::new();

        for (entry_index, label) in entries {
            let entry_index = *entry_index;
            if label.signal == Signal::Hold || entry_index >= n {
                continue;
            }

            let entry_price = label.entry_price;
            let direction = label.signal;
            let last = (entry_index + duration).min(n - 1);
            if last <= entry_index {
                continue;
            }

            let path: Vec<f64> = (entry_index..=last)
                .map(|k| Self::pct_change(entry_price, rows[k].close, direction))
                .collect();

            for offset in 1..path.len() {
                let j = entry_index + offset;
                let running = &path[..=offset];
                let max_favorable = running.iter().cloned().fold(f64::MIN, f64::max).max(0.0);
                let max_adverse = running.iter().cloned().fold(f64::MAX, f64::min).min(0.0);
                let drawdown_magnitude = -max_adverse;
                let profit_magnitude = max_favorable;

                let future = &path[offset..];
                let future_min = future.iter().cloned().fold(f64::MAX, f64::min);
                let future_max = future.iter().cloned().fold(f64::MIN, f64::max);

                let extends_drawdown =
                    (-future_min) >= drawdown_magnitude + self.excursion_threshold_pct;
                let reverses_profit = profit_magnitude > 0.0
                    && (profit_magnitude - future_min) >= self.excursion_threshold_pct
                    && future_max <= profit_magnitude;

                let mut misjudge_probability =
                    (drawdown_magnitude / 5.0).clamp(0.0, 1.0) * 0.6;
                if extends_drawdown {
                    misjudge_probability += 0.4;
                }
                misjudge_probability = misjudge_probability.clamp(0.0, 1.0);

                let mut reversal_probability = (profit_magnitude / 5.0).clamp(0.0, 1.0) * 0.6;
                if reverses_profit {
                    reversal_probability += 0.4;
                }
                reversal_probability = reversal_probability.clamp(0.0, 1.0);

                let action = if misjudge_probability > 0.5 {
                    MonitorAction::StopLoss
                } else if reversal_probability > 0.5 {
                    MonitorAction::TakeProfit
                } else {
                    MonitorAction::Hold
                };

                let current_price = rows[j].close;
                let pnl_pct = path[offset];
                let pnl_pips = match direction {
                    Signal::Long => (current_price - entry_price) / self.pip_size,
                    Signal::Short => (entry_price - current_price) / self.pip_size,
                    Signal::Hold => 0.0,
                };

                checkpoints.push(Mode2Checkpoint {
                    entry_index,
                    current_index: j,
                    bars_held: offset,
                    direction,
                    entry_price,
                    current_price,
                    pnl_pct,
                    pnl_pips,
                    misjudge_probability,
                    reversal_probability,
                    action,
                    timeframe_tag,
                });
            }
        }

        checkpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row_at(i: usize, close: f64) -> IndicatorRow {
        IndicatorRow {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
            open: close,
            high: close + 0.001,
            low: close - 0.001,
            close,
            volume: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn deep_adverse_excursion_triggers_stop_loss() {
        let mut rows = Vec::new();
        for i in 0..15 {
            let level = 1.2000 - i as f64 * 0.01; // steady decline against a long entry
            rows.push(row_at(i, level));
        }
        let entry = Mode1Label {
            signal: Signal::Long,
            confidence: 0.8,
            entry_price: rows[0].close,
            timeframe_tag: TimeframeTag::H1,
            move_pips: None,
            expected_profit_pips: None,
            expected_loss_pips: None,
            risk_reward: None,
        };
        let monitor = RiskMonitorLabeler::new(0.0001);
        let checkpoints = monitor.monitor(&rows, &[(0, entry)], TimeframeTag::H1);
        assert!(!checkpoints.is_empty());
        assert!(checkpoints
            .iter()
            .any(|c| c.action == MonitorAction::StopLoss));
    }

    #[test]
    fn hold_entries_are_skipped() {
        let rows: Vec<IndicatorRow> = (0..10).map(|i| row_at(i, 1.2)).collect();
        let entry = Mode1Label {
            signal: Signal::Hold,
            confidence: 0.0,
            entry_price: 1.2,
            timeframe_tag: TimeframeTag::H1,
            move_pips: None,
            expected_profit_pips: None,
            expected_loss_pips: None,
            risk_reward: None,
        };
        let monitor = RiskMonitorLabeler::new(0.0001);
        let checkpoints = monitor.monitor(&rows, &[(0, entry)], TimeframeTag::H1);
        assert!(checkpoints.is_empty());
    }
}
