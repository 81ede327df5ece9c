//! Error reporting for one-shot commands

use anyhow::bail;
use parking_lot::Mutex;
use radar_core::{ErrorReporter, Operation, ReconcilerError, TracingReporter};

/// Logs every failure and remembers them so a command can exit non-zero
#[derive(Debug, Default)]
pub struct CliReporter {
    errors: Mutex<Vec<ReconcilerError>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the failures recorded so far
    pub fn take(&self) -> Vec<ReconcilerError> {
        std::mem::take(&mut *self.errors.lock())
    }

    /// Fail if `operation` reported anything
    ///
    /// Drains every recorded failure. Failures of other operations were
    /// already logged and do not affect the result.
    pub fn check(&self, operation: Operation) -> anyhow::Result<()> {
        let errors: Vec<_> = self
            .take()
            .into_iter()
            .filter(|error| error.operation == operation)
            .collect();

        let Some(first) = errors.first() else {
            return Ok(());
        };
        if first.is_setup_required() {
            bail!("{first}\nThe backend is missing the messaging functions; deploy them first.");
        }
        match errors.len() {
            1 => bail!("{first}"),
            n => bail!("{first} (and {} more)", n - 1),
        }
    }
}

impl ErrorReporter for CliReporter {
    fn report(&self, error: &ReconcilerError) {
        TracingReporter.report(error);
        self.errors.lock().push(error.clone());
    }
}
