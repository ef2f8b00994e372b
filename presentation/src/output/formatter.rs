//! Output formatter trait

use plenum_application::{OutcomeReport, VotingView};

/// Trait for rendering views and outcome reports
pub trait OutputFormatter {
    /// Format the full meeting view
    fn format_view(&self, view: &VotingView) -> String;

    /// Format an outcome report
    fn format_report(&self, report: &OutcomeReport) -> String;
}
