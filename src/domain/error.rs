//! Domain error types.
//!
//! Business-logic failures (one instrument's data missing, an order bounced)
//! are reported per instrument and never abort a cycle; only config errors
//! and total venue outage are fatal to the caller.

/// Top-level error type for swingtrader.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SwingtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no price data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient data for {symbol}: have {have} closes, need {need}")]
    InsufficientData {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("insufficient budget: {spendable:.2} spendable across {candidates} candidates")]
    InsufficientBudget { spendable: f64, candidates: usize },

    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error("execution venue unavailable: {reason}")]
    VenueUnavailable { reason: String },

    #[error("insufficient funds: need {required:.2}, have {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("order {id} is not cancelable")]
    OrderNotCancelable { id: String },

    #[error("io error: {reason}")]
    Io { reason: String },
}

impl From<std::io::Error> for SwingtraderError {
    fn from(err: std::io::Error) -> Self {
        SwingtraderError::Io {
            reason: err.to_string(),
        }
    }
}

impl SwingtraderError {
    /// True for failures scoped to a single instrument: the cycle logs them,
    /// records them in the failure list, and continues with the rest.
    pub fn is_per_instrument(&self) -> bool {
        matches!(
            self,
            SwingtraderError::DataUnavailable { .. }
                | SwingtraderError::InsufficientData { .. }
                | SwingtraderError::OrderRejected { .. }
                | SwingtraderError::InsufficientFunds { .. }
                | SwingtraderError::OrderNotCancelable { .. }
        )
    }
}

impl From<&SwingtraderError> for std::process::ExitCode {
    fn from(err: &SwingtraderError) -> Self {
        let code: u8 = match err {
            SwingtraderError::Io { .. } => 1,
            SwingtraderError::ConfigParse { .. }
            | SwingtraderError::ConfigMissing { .. }
            | SwingtraderError::ConfigInvalid { .. } => 2,
            SwingtraderError::VenueUnavailable { .. } => 3,
            SwingtraderError::OrderRejected { .. }
            | SwingtraderError::InsufficientFunds { .. }
            | SwingtraderError::OrderNotCancelable { .. } => 4,
            SwingtraderError::DataUnavailable { .. }
            | SwingtraderError::InsufficientData { .. }
            | SwingtraderError::InsufficientBudget { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
