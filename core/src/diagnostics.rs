//! Injected logging capability.
//!
//! The receiver reports sync locks, rejected candidates and frame failures
//! through a [`Diagnostics`] sink handed to it by the caller. The default
//! sink discards everything; [`LogDiagnostics`] forwards to the `log`
//! facade so the embedding application decides where output goes.

use std::fmt;

use log::Level;

/// Log target used by [`LogDiagnostics`].
pub const LOG_TARGET: &str = "sonicwire";

pub trait Diagnostics: Send {
    fn record(&self, level: Level, args: fmt::Arguments<'_>);

    fn debug(&self, args: fmt::Arguments<'_>) {
        self.record(Level::Debug, args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        self.record(Level::Info, args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.record(Level::Warn, args);
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn record(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Forwards messages to the `log` crate under [`LOG_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn record(&self, level: Level, args: fmt::Arguments<'_>) {
        log::log!(target: LOG_TARGET, level, "{}", args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Collect(Arc<Mutex<Vec<(Level, String)>>>);

    impl Diagnostics for Collect {
        fn record(&self, level: Level, args: fmt::Arguments<'_>) {
            self.0.lock().unwrap().push((level, args.to_string()));
        }
    }

    #[test]
    fn test_helpers_forward_level() {
        let sink = Collect::default();
        sink.debug(format_args!("locked at {}", 42));
        sink.warn(format_args!("checksum failure"));

        let seen = sink.0.lock().unwrap();
        assert_eq!(seen[0], (Level::Debug, "locked at 42".to_string()));
        assert_eq!(seen[1].0, Level::Warn);
    }

    #[test]
    fn test_log_sink_does_not_panic() {
        let _ = env_logger::builder().is_test(true).try_init();
        LogDiagnostics.info(format_args!("frame decoded ({} bytes)", 3));
        NoopDiagnostics.warn(format_args!("ignored"));
    }
}
