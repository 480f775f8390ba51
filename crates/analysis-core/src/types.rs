use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLC(V) candle for one pair/timeframe.
///
/// Invariant: `low <= min(open, close) <= max(open, close) <= high`. Volume may be
/// zero for FX pairs where no reliable tick-volume feed exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
            && self.low <= self.high
    }
}

/// The three timeframe tags the reversal cascade is trained and served on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeframeTag {
    D1,
    H4,
    H1,
}

impl TimeframeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeframeTag::D1 => "D1",
            TimeframeTag::H4 => "H4",
            TimeframeTag::H1 => "H1",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "D1" | "1D" | "DAILY" => Some(TimeframeTag::D1),
            "H4" | "4H" => Some(TimeframeTag::H4),
            "H1" | "1H" => Some(TimeframeTag::H1),
            _ => None,
        }
    }

    /// Swing-labeler config: lookback bars, min reversal pips, lookforward bars.
    pub fn swing_config(&self) -> SwingConfig {
        match self {
            TimeframeTag::D1 => SwingConfig {
                lookback_bars: 20,
                min_reversal_pips: 100.0,
                lookforward_bars: 20,
            },
            TimeframeTag::H4 => SwingConfig {
                lookback_bars: 30,
                min_reversal_pips: 50.0,
                lookforward_bars: 60,
            },
            TimeframeTag::H1 => SwingConfig {
                lookback_bars: 48,
                min_reversal_pips: 30.0,
                lookforward_bars: 120,
            },
        }
    }

    /// Risk-monitor labeler config: monitor duration in bars.
    pub fn monitor_duration(&self) -> usize {
        match self {
            TimeframeTag::D1 => 10,
            TimeframeTag::H4 => 30,
            TimeframeTag::H1 => 72,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SwingConfig {
    pub lookback_bars: usize,
    pub min_reversal_pips: f64,
    pub lookforward_bars: usize,
}

/// The predictor's public-contract signal. Collapses the overlapping numeric
/// (0/1/2), string (none/long/short/hold) and boolean encodings used across the
/// labelers and the serving layer into one tagged variant. `Hold` subsumes the
/// older `none`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Hold,
    Long,
    Short,
}

impl Signal {
    /// Numeric label-code encoding used by the two labelers (`0=none/hold, 1=long, 2=short`).
    pub fn to_label_code(self) -> u8 {
        match self {
            Signal::Hold => 0,
            Signal::Long => 1,
            Signal::Short => 2,
        }
    }

    pub fn from_label_code(code: u8) -> Self {
        match code {
            1 => Signal::Long,
            2 => Signal::Short,
            _ => Signal::Hold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Hold => "hold",
            Signal::Long => "long",
            Signal::Short => "short",
        }
    }
}

/// Pip size for a currency pair: 0.01 for JPY crosses, 0.0001 otherwise.
pub fn pip_size(pair: &str) -> f64 {
    if pair.to_ascii_uppercase().contains("JPY") {
        0.01
    } else {
        0.0001
    }
}

/// Convert a raw price delta into pips for the given pair.
pub fn price_delta_to_pips(delta: f64, pair: &str) -> f64 {
    delta / pip_size(pair)
}

/// A bar augmented with the fixed technical-indicator feature family (indicator row).
/// Columns not yet defined (insufficient lookback) are `None`; the preprocessor is
/// responsible for dropping rows that still contain `None` in a selected feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
    pub atr_14: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub momentum_10: Option<f64>,
    pub roc_12: Option<f64>,
    pub williams_r: Option<f64>,
    pub cci_20: Option<f64>,
    pub adx_14: Option<f64>,
    pub price_change: Option<f64>,
    pub price_range: Option<f64>,
    pub body_size: Option<f64>,
}

/// Canonical ordered feature names (the full 28-column family). The persisted
/// selected-feature list for a given model version is a subset/reordering of these.
pub const ALL_FEATURE_NAMES: &[&str] = &[
    "open",
    "high",
    "low",
    "close",
    "sma_20",
    "sma_50",
    "sma_200",
    "ema_12",
    "ema_26",
    "rsi_14",
    "macd",
    "macd_signal",
    "macd_histogram",
    "bb_upper",
    "bb_middle",
    "bb_lower",
    "bb_width",
    "atr_14",
    "stoch_k",
    "stoch_d",
    "momentum_10",
    "roc_12",
    "williams_r",
    "cci_20",
    "adx_14",
    "price_change",
    "price_range",
    "body_size",
];

impl IndicatorRow {
    /// Look up a named feature column. Returns `None` if the column is undefined
    /// (lookback not yet matured) or the name is unknown.
    pub fn feature(&self, name: &str) -> Option<f64> {
        match name {
            "open" => Some(self.open),
            "high" => Some(self.high),
            "low" => Some(self.low),
            "close" => Some(self.close),
            "volume" => Some(self.volume),
            "sma_20" => self.sma_20,
            "sma_50" => self.sma_50,
            "sma_200" => self.sma_200,
            "ema_12" => self.ema_12,
            "ema_26" => self.ema_26,
            "rsi_14" => self.rsi_14,
            "macd" => self.macd,
            "macd_signal" => self.macd_signal,
            "macd_histogram" => self.macd_histogram,
            "bb_upper" => self.bb_upper,
            "bb_middle" => self.bb_middle,
            "bb_lower" => self.bb_lower,
            "bb_width" => self.bb_width,
            "atr_14" => self.atr_14,
            "stoch_k" => self.stoch_k,
            "stoch_d" => self.stoch_d,
            "momentum_10" => self.momentum_10,
            "roc_12" => self.roc_12,
            "williams_r" => self.williams_r,
            "cci_20" => self.cci_20,
            "adx_14" => self.adx_14,
            "price_change" => self.price_change,
            "price_range" => self.price_range,
            "body_size" => self.body_size,
            _ => None,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }
}

/// Mode-1 label, produced by either the Swing (C2) or Profitable (C3) labeler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mode1Label {
    pub signal: Signal,
    pub confidence: f64,
    pub entry_price: f64,
    pub timeframe_tag: TimeframeTag,
    /// Set by the Swing labeler.
    pub move_pips: Option<f64>,
    /// Set by the Profitable labeler.
    pub expected_profit_pips: Option<f64>,
    pub expected_loss_pips: Option<f64>,
    pub risk_reward: Option<f64>,
}

/// Mode-2 risk-monitoring action recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorAction {
    Hold,
    StopLoss,
    TakeProfit,
}

/// Mode-2 risk-monitoring checkpoint (C4), one per in-trade bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mode2Checkpoint {
    pub entry_index: usize,
    pub current_index: usize,
    pub bars_held: usize,
    pub direction: Signal,
    pub entry_price: f64,
    pub current_price: f64,
    pub pnl_pct: f64,
    pub pnl_pips: f64,
    pub misjudge_probability: f64,
    pub reversal_probability: f64,
    pub action: MonitorAction,
    pub timeframe_tag: TimeframeTag,
}
