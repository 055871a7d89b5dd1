//! Best-effort side calls
//!
//! A side call runs after a primary operation has already succeeded. Its
//! outcome is reported as a value, never as an error, so the caller cannot
//! propagate it into the primary result by accident.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// What happened to a best-effort side call
#[derive(Debug, Clone, PartialEq)]
pub enum SideCallOutcome<T> {
    Completed(T),
    Failed(String),
    TimedOut(Duration),
}

impl<T> SideCallOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Human-readable warning for anything other than success
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(reason) => Some(reason.clone()),
            Self::TimedOut(limit) => Some(format!("timed out after {:?}", limit)),
        }
    }
}

/// Await `call` for at most `limit`, logging and swallowing any failure
pub async fn run_best_effort<T, E, F>(name: &str, limit: Duration, call: F) -> SideCallOutcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => {
            debug!(side_call = name, "Side call completed");
            SideCallOutcome::Completed(value)
        }
        Ok(Err(e)) => {
            warn!(side_call = name, error = %e, "Side call failed");
            SideCallOutcome::Failed(e.to_string())
        }
        Err(_) => {
            warn!(side_call = name, timeout_ms = limit.as_millis() as u64, "Side call timed out");
            SideCallOutcome::TimedOut(limit)
        }
    }
}
