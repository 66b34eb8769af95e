//! User-facing progress lines.
//!
//! These are the messages a user of `vibrate` reads; they go to stdout and
//! stderr directly and are independent of the `tracing` log output.

use std::io::{self, Write};

use vibrator::{DurationMs, InterfaceDialect, SessionEvents, VibratorError};

/// Prints session progress to a pair of writers.
#[derive(Debug)]
pub struct Console<O, E> {
    out: O,
    err: E,
}

impl Console<io::Stdout, io::Stderr> {
    /// Console on the process's stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Console<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    /// Writes one line to stderr.
    pub fn error(&mut self, line: &str) {
        // Nothing useful can be done if stderr is gone.
        let _ = writeln!(self.err, "{line}");
    }

    fn info(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
    }

    #[cfg(test)]
    fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> SessionEvents for Console<O, E> {
    fn bound(&mut self, dialect: InterfaceDialect) {
        match dialect {
            InterfaceDialect::LegacyHidl => self.info("Using HIDL vibrator interface"),
            InterfaceDialect::ModernAidl => self.info("Using AIDL vibrator interface"),
            InterfaceDialect::None => {}
        }
    }

    fn started(&mut self, duration: DurationMs) {
        self.info(&format!("Vibrating for {} ms", duration.as_i32()));
    }

    fn start_failed(&mut self, error: Option<&VibratorError>) {
        if error.is_some() {
            self.error("Failed to turn on vibrator");
        }
        self.error("Failed to start vibration");
    }

    fn stopped(&mut self) {
        self.info("Vibration stopped");
    }

    fn stop_failed(&mut self, error: Option<&VibratorError>) {
        if error.is_some() {
            self.error("Failed to turn off vibrator");
        }
        self.error("Failed to stop vibration");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibrator::{OperationKind, TransportError};

    fn console() -> Console<Vec<u8>, Vec<u8>> {
        Console::new(Vec::new(), Vec::new())
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn successful_run_prints_to_stdout_only() {
        let mut c = console();
        c.bound(InterfaceDialect::LegacyHidl);
        c.started(DurationMs::new(500).unwrap());
        c.stopped();

        let (out, err) = c.into_inner();
        assert_eq!(
            text(out),
            "Using HIDL vibrator interface\nVibrating for 500 ms\nVibration stopped\n"
        );
        assert!(err.is_empty());
    }

    #[test]
    fn aidl_binding_is_announced() {
        let mut c = console();
        c.bound(InterfaceDialect::ModernAidl);
        let (out, _) = c.into_inner();
        assert_eq!(text(out), "Using AIDL vibrator interface\n");
    }

    #[test]
    fn rejected_start_reports_only_the_start_failure() {
        let mut c = console();
        c.start_failed(None);
        let (out, err) = c.into_inner();
        assert!(out.is_empty());
        assert_eq!(text(err), "Failed to start vibration\n");
    }

    #[test]
    fn transport_failure_on_stop_is_reported_twice() {
        let error = VibratorError::TransactionFailed {
            operation: OperationKind::Off,
            source: TransportError::DeadObject,
        };
        let mut c = console();
        c.stop_failed(Some(&error));
        let (_, err) = c.into_inner();
        assert_eq!(
            text(err),
            "Failed to turn off vibrator\nFailed to stop vibration\n"
        );
    }
}
