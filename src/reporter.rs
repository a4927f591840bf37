//! Side channel for errors the SDK swallows
//!
//! Context capture problems and failed deliveries never reach the host
//! application. They are handed to an [`ErrorReporter`] instead.

use crate::error::RavenError;

/// Receives errors that were recovered from internally
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &RavenError);
}

/// Default reporter, logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &RavenError) {
        tracing::error!(error = %error, "[Raven] internal error");
    }
}

impl<F> ErrorReporter for F
where
    F: Fn(&RavenError) + Send + Sync,
{
    fn report(&self, error: &RavenError) {
        self(error)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingReporter;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_reporter() {
        let count = AtomicUsize::new(0);
        let reporter = |_: &RavenError| {
            count.fetch_add(1, Ordering::SeqCst);
        };

        reporter.report(&RavenError::MissingConfig);
        reporter.report(&RavenError::from_string("x"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_recording_reporter() {
        let reporter = RecordingReporter::default();
        reporter.report(&RavenError::MissingConfig);
        assert_eq!(reporter.messages().len(), 1);
    }

    #[test]
    fn test_tracing_reporter_does_not_panic() {
        TracingReporter.report(&RavenError::from_string("ignored"));
    }
}
