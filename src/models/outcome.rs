use crate::errors::ChartDataError;
use serde::Serialize;
use std::fmt;

/// Why a stage produced no series. None of these are faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NoDataReason {
    NotFound,
    InsufficientData { rows: usize, required: usize },
    MalformedData(String),
}

impl fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoDataReason::NotFound => write!(f, "no data found for this symbol and period"),
            NoDataReason::InsufficientData { rows, required } => write!(
                f,
                "only {} data points after cleaning (at least {} needed), probably too few for indicators",
                rows, required
            ),
            NoDataReason::MalformedData(detail) => write!(f, "unexpected data layout: {}", detail),
        }
    }
}

/// An upstream failure that was caught at a provider boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub source: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(source: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            message: message.into(),
        }
    }

    pub fn from_error(source: &str, error: &ChartDataError) -> Self {
        Self::new(source, error.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Tagged result of a pipeline stage: data, a legitimate absence of data,
/// or a caught failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Data(T),
    NoData(NoDataReason),
    Failed(Diagnostic),
}

impl<T> Outcome<T> {
    pub fn is_data(&self) -> bool {
        matches!(self, Outcome::Data(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Outcome::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Outcome::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Data(value) => Outcome::Data(f(value)),
            Outcome::NoData(reason) => Outcome::NoData(reason),
            Outcome::Failed(diagnostic) => Outcome::Failed(diagnostic),
        }
    }

    pub fn and_then<U, F: FnOnce(T) -> Outcome<U>>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Data(value) => f(value),
            Outcome::NoData(reason) => Outcome::NoData(reason),
            Outcome::Failed(diagnostic) => Outcome::Failed(diagnostic),
        }
    }

    /// Message meant for the end user when there is nothing to show.
    pub fn message(&self) -> Option<String> {
        match self {
            Outcome::Data(_) => None,
            Outcome::NoData(reason) => Some(reason.to_string()),
            Outcome::Failed(diagnostic) => Some(diagnostic.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_keeps_reason() {
        let outcome: Outcome<i32> = Outcome::NoData(NoDataReason::NotFound);
        assert_eq!(outcome.map(|v| v * 2), Outcome::NoData(NoDataReason::NotFound));

        let outcome = Outcome::Data(21);
        assert_eq!(outcome.map(|v| v * 2), Outcome::Data(42));
    }

    #[test]
    fn test_insufficient_message_mentions_counts() {
        let reason = NoDataReason::InsufficientData { rows: 12, required: 30 };
        let text = reason.to_string();
        assert!(text.contains("12"));
        assert!(text.contains("30"));
    }
}
