use crate::error::{ErrorKind, TransferError};

/// Retry behavior the host engine should apply to a failed task attempt.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryDirective {
    /// A fresh task attempt may be scheduled.
    ///
    /// The bridge never restarts a loader itself; retries always happen at attempt granularity.
    AttemptRetry,
    /// The failure is deterministic or intentional and must not be retried.
    NoRetry,
}

/// Policy describing how a [`TransferError`] should be handled by the host engine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ErrorHandlingPolicy {
    retry_directive: RetryDirective,
    solution: Option<&'static str>,
}

impl ErrorHandlingPolicy {
    const fn new(retry_directive: RetryDirective, solution: Option<&'static str>) -> Self {
        Self {
            retry_directive,
            solution,
        }
    }

    /// Returns the retry directive for this policy.
    pub fn retry_directive(&self) -> RetryDirective {
        self.retry_directive
    }

    /// Returns an optional operator-facing hint.
    pub fn solution(&self) -> Option<&'static str> {
        self.solution
    }
}

/// Builds the [`ErrorHandlingPolicy`] for an error.
///
/// Aggregated errors are classified by their most restrictive member: a single non-retriable
/// kind makes the whole error non-retriable.
pub fn build_error_handling_policy(error: &TransferError) -> ErrorHandlingPolicy {
    error
        .kinds()
        .into_iter()
        .map(policy_for_kind)
        .find(|policy| policy.retry_directive == RetryDirective::NoRetry)
        .unwrap_or_else(|| policy_for_kind(error.kind()))
}

fn policy_for_kind(kind: ErrorKind) -> ErrorHandlingPolicy {
    match kind {
        ErrorKind::ProtocolViolation | ErrorKind::InvalidState => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("Fix the connector or host integration: the bridge protocol was violated."),
        ),
        ErrorKind::ConfigError | ErrorKind::ConnectorNotFound => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("Verify the job configuration and the registered connector identifiers."),
        ),
        ErrorKind::Cancelled => ErrorHandlingPolicy::new(RetryDirective::NoRetry, None),
        ErrorKind::InvalidData | ErrorKind::ConversionError => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("Inspect the source data: a record could not be encoded or decoded."),
        ),

        #[cfg(feature = "failpoints")]
        ErrorKind::InjectedFailure => ErrorHandlingPolicy::new(RetryDirective::NoRetry, None),

        _ => ErrorHandlingPolicy::new(RetryDirective::AttemptRetry, None),
    }
}
