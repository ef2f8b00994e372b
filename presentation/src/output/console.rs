//! Console and JSON output for views and outcome reports

use crate::cli::commands::OutputFormat;
use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use plenum_application::{OutcomeReport, VotingView};
use plenum_domain::{Outcome, SessionView};

/// Formats views and reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the full meeting view
    pub fn format_view(view: &VotingView) -> String {
        let mut output = String::new();

        let title = match &view.meeting_id {
            Some(meeting_id) => format!("Meeting {}", meeting_id),
            None => "No meeting selected".to_string(),
        };
        output.push_str(&Self::header(&title));
        output.push('\n');

        if view.loading {
            output.push_str(&format!("{}\n", "Loading voting sessions...".dimmed()));
        }
        if let Some(error) = &view.error {
            output.push_str(&format!("{} {}\n", "Sync error:".red().bold(), error));
        }

        output.push_str(&Self::section_header("Open sessions"));
        if view.open_sessions.is_empty() {
            output.push_str(&format!("{}\n", "  (none)".dimmed()));
        }
        for session in &view.open_sessions {
            output.push_str(&Self::format_session(session));
        }

        output.push_str(&Self::section_header("Closed sessions"));
        if view.closed_sessions.is_empty() {
            output.push_str(&format!("{}\n", "  (none)".dimmed()));
        }
        for session in &view.closed_sessions {
            output.push_str(&Self::format_session(session));
        }

        output
    }

    /// Format one hydrated session
    pub fn format_session(view: &SessionView) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{} {} {}\n",
            format!("── {} ──", view.session.label).yellow().bold(),
            format!("[{}]", view.state).dimmed(),
            view.session_type()
        ));
        output.push_str(&format!("  {} {}\n", "id:".dimmed(), view.id()));

        let mine = view.my_vote_option_id.as_ref();
        let status = match mine {
            Some(option_id) => {
                let label = view
                    .options
                    .iter()
                    .find(|o| &o.id == option_id)
                    .map(|o| o.display_label())
                    .unwrap_or_else(|| option_id.to_string());
                format!("You voted: {}", label).green().to_string()
            }
            // Private vote cast elsewhere, or the receipt is gone.
            None if view.has_voted => "You voted (choice not visible on this device)"
                .green()
                .to_string(),
            None if view.is_open() => "You have not voted".to_string(),
            None => "You did not vote".dimmed().to_string(),
        };
        output.push_str(&format!("  {}\n", status));

        for option in &view.options {
            let marker = if Some(&option.id) == mine { "*" } else { " " };
            let mut line = format!(
                "  {} {:<12} {}",
                marker,
                option.id.as_str(),
                option.display_label()
            );
            if view.votes.is_some() {
                line.push_str(&format!("  {}", format!("{} votes", view.tally(&option.id)).cyan()));
            }
            output.push_str(&line);
            output.push('\n');
        }

        let names: Vec<&str> = view.voters.iter().map(|v| v.voter_name.as_str()).collect();
        output.push_str(&format!(
            "  {} {}{}\n",
            format!("Voters ({}):", names.len()).dimmed(),
            names.join(", "),
            if view.votes.is_some() {
                format!("  total votes: {}", view.total_votes)
            } else {
                String::new()
            }
        ));

        output
    }

    /// Format an outcome report
    pub fn format_report(report: &OutcomeReport) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} {}\n",
            "Outcome of session".cyan().bold(),
            report.session_id
        ));

        let summary = match &report.outcome {
            Outcome::Decided(decision) => format!(
                "Decided: {} {}",
                decision.proposal_id, decision.closed_as
            )
            .green()
            .bold()
            .to_string(),
            Outcome::Tie(_) => format!("{}. Needs a human decision.", report.outcome)
                .yellow()
                .bold()
                .to_string(),
            Outcome::NoVotes => "No votes counted. Nothing to close."
                .dimmed()
                .to_string(),
        };
        output.push_str(&format!("  {}\n", summary));

        for close in &report.applied {
            output.push_str(&format!("  {} {}\n", "closed".green(), close));
        }
        for failure in &report.failures {
            output.push_str(&format!(
                "  {} {}: {}\n",
                "failed".red().bold(),
                failure.close,
                failure.error
            ));
        }

        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_view(&self, view: &VotingView) -> String {
        ConsoleFormatter::format_view(view)
    }

    fn format_report(&self, report: &OutcomeReport) -> String {
        ConsoleFormatter::format_report(report)
    }
}

/// Pretty-printed JSON, one document per call
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_view(&self, view: &VotingView) -> String {
        serde_json::to_string_pretty(view).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_report(&self, report: &OutcomeReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }
}

pub fn formatter_for(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}
