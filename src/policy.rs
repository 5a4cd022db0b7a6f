use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{DacError, ErrorKind};

/// Per-call switches deciding which failure categories are raised.
///
/// A category whose flag is `false` is swallowed: the failure is logged and the operation
/// returns its default value instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionPolicy {
    /// SQL execution failures and non-zero return codes.
    pub throw_db_exception: bool,
    /// Generic failures.
    pub throw_generic_exception: bool,
    /// System failures.
    pub throw_system_exception: bool,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::RAISE_ALL
    }
}

impl ExecutionPolicy {
    pub const RAISE_ALL: ExecutionPolicy = ExecutionPolicy::new(true, true, true);
    pub const SUPPRESS_ALL: ExecutionPolicy = ExecutionPolicy::new(false, false, false);

    #[must_use]
    pub const fn new(throw_db: bool, throw_generic: bool, throw_system: bool) -> Self {
        Self {
            throw_db_exception: throw_db,
            throw_generic_exception: throw_generic,
            throw_system_exception: throw_system,
        }
    }

    #[must_use]
    pub fn throw_db(mut self, raise: bool) -> Self {
        self.throw_db_exception = raise;
        self
    }

    #[must_use]
    pub fn throw_generic(mut self, raise: bool) -> Self {
        self.throw_generic_exception = raise;
        self
    }

    #[must_use]
    pub fn throw_system(mut self, raise: bool) -> Self {
        self.throw_system_exception = raise;
        self
    }

    /// Whether `err` propagates under this policy.
    #[must_use]
    pub fn raises(&self, err: &DacError) -> bool {
        match err.kind() {
            ErrorKind::SqlExecution | ErrorKind::NonZeroReturnCode => self.throw_db_exception,
            ErrorKind::Generic => self.throw_generic_exception,
            ErrorKind::System => self.throw_system_exception,
        }
    }

    /// Propagate or swallow a failed outcome.
    ///
    /// # Errors
    ///
    /// Returns the original error when its category is raised by this policy.
    pub fn apply<T>(
        &self,
        outcome: Result<T, DacError>,
        operation: &str,
        fallback: impl FnOnce() -> T,
    ) -> Result<T, DacError> {
        match outcome {
            Ok(value) => Ok(value),
            Err(err) if self.raises(&err) => Err(err),
            Err(err) => {
                warn!(
                    operation,
                    kind = ?err.kind(),
                    error = %err,
                    "failure suppressed by execution policy"
                );
                Ok(fallback())
            }
        }
    }
}

/// Cancellation and deadline handed to the driver for each command.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub cancel: Option<CancellationToken>,
    pub timeout: Option<Duration>,
}

impl CallContext {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Options accepted by every façade operation.
///
/// ```rust
/// use std::time::Duration;
/// use sql_dac::prelude::*;
///
/// let options = ExecOptions::new()
///     .policy(ExecutionPolicy::default().throw_db(false))
///     .timeout(Duration::from_secs(5));
/// assert!(!options.policy.throw_db_exception);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub policy: ExecutionPolicy,
    pub context: CallContext,
}

impl ExecOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: ExecutionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.context.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.context.timeout = Some(timeout);
        self
    }
}

impl From<ExecutionPolicy> for ExecOptions {
    fn from(policy: ExecutionPolicy) -> Self {
        Self::with_policy(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use crate::params::SqlParameters;

    fn sample(kind: ErrorKind) -> DacError {
        match kind {
            ErrorKind::Generic => DacError::generic("misuse"),
            ErrorKind::SqlExecution => DacError::sql(DriverError::ExecutionError("x".into())),
            ErrorKind::NonZeroReturnCode => DacError::non_zero_return_code(1, SqlParameters::new()),
            ErrorKind::System => DacError::system(std::io::Error::other("os")),
        }
    }

    #[test]
    fn each_flag_governs_its_own_category() {
        let kinds = [
            ErrorKind::Generic,
            ErrorKind::SqlExecution,
            ErrorKind::NonZeroReturnCode,
            ErrorKind::System,
        ];
        for db in [true, false] {
            for generic in [true, false] {
                for system in [true, false] {
                    let policy = ExecutionPolicy::new(db, generic, system);
                    for kind in kinds {
                        let expected = match kind {
                            ErrorKind::Generic => generic,
                            ErrorKind::System => system,
                            _ => db,
                        };
                        assert_eq!(policy.raises(&sample(kind)), expected, "{policy:?} {kind:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn apply_returns_fallback_when_suppressed() {
        let policy = ExecutionPolicy::default().throw_db(false);
        let outcome: Result<u64, DacError> = Err(sample(ErrorKind::SqlExecution));
        assert_eq!(policy.apply(outcome, "test", || 0).ok(), Some(0));

        let outcome: Result<u64, DacError> = Err(sample(ErrorKind::Generic));
        assert!(policy.apply(outcome, "test", || 0).is_err());
    }

    #[test]
    fn default_raises_everything() {
        let policy = ExecutionPolicy::default();
        assert_eq!(policy, ExecutionPolicy::RAISE_ALL);
        assert!(policy.raises(&sample(ErrorKind::System)));
    }
}
