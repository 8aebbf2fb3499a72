use tracing::error;

/// Reports a fault to the log, including every underlying cause.
/// The worker pool and the scheduler both funnel per-iteration failures
/// through here and then carry on.
pub fn print_error_chain(e: &dyn std::error::Error) {
    let mut report = e.to_string();

    let mut source = e.source();
    while let Some(cause) = source {
        report.push_str("\ncaused by: ");
        report.push_str(&cause.to_string());
        source = cause.source();
    }

    error!("{}", report);
}
