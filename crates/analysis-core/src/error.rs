use thiserror::Error;

/// The error taxonomy for the reversal-detection pipeline.
///
/// `Stage2Unavailable` is deliberately absent here: Stage-2-missing is recovered
/// locally by the predictor (emits `signal=hold` with a warning) and is never
/// surfaced as an error.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Request malformed: pair missing `/`, too few bars, wrong feature count.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// After cleaning/indicator maturation, fewer than the required window of rows remain.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The feature array, the scaler, and the registered feature list disagree in count or order.
    #[error("feature mismatch: {0}")]
    FeatureMismatch(String),

    /// The requested model version is unknown or not loaded. No implicit load is attempted.
    #[error("version not available: {0}")]
    VersionNotAvailable(String),

    /// A model artefact file was missing or unreadable during load.
    #[error("artefact io error: {0}")]
    ArtefactIoError(String),

    /// Post-training validation failed (collapsed predictions or near-zero layer weights).
    #[error("training integrity error: {0}")]
    TrainingIntegrityError(String),

    #[error("calculation error: {0}")]
    CalculationError(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
