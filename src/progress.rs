use tracing::debug;

/// Receives stage-completion updates during a scan run.
///
/// The orchestrator reports percentages in non-decreasing order, ending at
/// 100 on a successful run. Implementations decide how (or whether) to show
/// them; interrupting a run is the presenter's concern, never acted on here.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, percent: u8, message: &str);
}

/// Prints progress lines to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn report(&self, percent: u8, message: &str) {
        println!("[{percent:>3}%] {message}");
    }
}

/// Discards progress updates, keeping them visible only in logs.
#[derive(Debug, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&self, percent: u8, message: &str) {
        debug!(percent, message, "scan progress");
    }
}
