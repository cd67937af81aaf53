//! Error types for selection and termination.

use std::fmt;

use kube::Error as KubeError;
use thiserror::Error;

use crate::selector::Operator;

/// Errors produced while parsing or evaluating the namespace scope.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("invalid selector {selector:?}: {reason}")]
    Parse { selector: String, reason: String },

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(Operator),
}

/// Errors returned by an [`InstanceStore`](crate::store::InstanceStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] KubeError),

    #[error("{0}")]
    Other(String),
}

/// Failure to terminate a single victim.
#[derive(Debug, Error)]
pub enum TerminationError {
    #[error("failed to delete pod {namespace}/{name}: {source}")]
    Delete {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },

    /// The pod is gone but no object reference could be built for the event.
    #[error("pod {namespace}/{name} deleted but reference could not be resolved: {reason}")]
    Reference {
        namespace: String,
        name: String,
        reason: String,
    },
}

/// Errors that abort victim selection for a cycle.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("failed to list pods: {0}")]
    List(#[source] StoreError),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Per-victim failures collected over one cycle.
#[derive(Debug, Default)]
pub struct TerminationFailures {
    pub attempted: usize,
    pub failures: Vec<TerminationError>,
}

impl TerminationFailures {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for TerminationFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} terminations failed",
            self.failures.len(),
            self.attempted
        )?;
        for (i, err) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TerminationFailures {}

/// Outcome of a failed cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Terminations(TerminationFailures),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_failures_display_lists_every_victim() {
        let failures = TerminationFailures {
            attempted: 3,
            failures: vec![
                TerminationError::Delete {
                    namespace: "prod".to_string(),
                    name: "api-0".to_string(),
                    source: StoreError::Other("forbidden".to_string()),
                },
                TerminationError::Reference {
                    namespace: "prod".to_string(),
                    name: "api-2".to_string(),
                    reason: "missing uid".to_string(),
                },
            ],
        };

        let msg = failures.to_string();
        assert!(msg.starts_with("2 of 3 terminations failed: "));
        assert!(msg.contains("prod/api-0"));
        assert!(msg.contains("forbidden"));
        assert!(msg.contains("prod/api-2"));
    }

    #[test]
    fn test_unsupported_operator_message() {
        let err = ScopeError::UnsupportedOperator(Operator::In);
        assert_eq!(err.to_string(), "unsupported operator: in");
    }
}
