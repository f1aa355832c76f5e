//! CLI subcommands

pub mod apply;
pub mod delete;
pub mod validate;

use tokio_util::sync::CancellationToken;

use stevedore_engine::ApplyReport;

/// Cancellation token wired to Ctrl-C.
///
/// The orchestrator stops issuing further steps on cancellation and returns
/// whatever partial result has accumulated.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });
    cancel
}

/// Render a pass report, one line per step
pub(crate) fn render_report(report: &ApplyReport) {
    println!(
        "{} of release '{}' in namespace '{}':",
        report.operation, report.release, report.namespace
    );
    for step in &report.steps {
        println!("  {step}");
    }
    if report.cancelled {
        println!("  (cancelled before completion)");
    }
}
