use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{self, CommandReport};

/// Extract daily assistant activity and render it as a report
#[derive(Parser, Debug)]
#[command(name = "daylog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Aggregate one day of project logs into a stored summary
    Extract {
        /// Date to extract (YYYY-MM-DD, default today)
        date: Option<String>,
        /// Aggregate and report without writing the summary
        #[arg(long)]
        dry_run: bool,
    },
    /// Render a stored summary through a template
    Report {
        /// Date to report on (YYYY-MM-DD, default today)
        date: Option<String>,
        /// Template name under the templates directory
        template: Option<String>,
        /// Print the rendered report instead of writing it
        #[arg(long)]
        stdout: bool,
    },
    /// List installed templates
    Templates,
    /// Create the directory layout and install bundled templates
    Init {
        /// Replace templates that already exist
        #[arg(long)]
        force: bool,
    },
    /// Show resolved paths, configuration and summarizer availability
    Status,
}

fn render_text(report: &CommandReport) -> String {
    let mut out = format!(
        "{}: {}\n",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    for detail in &report.details {
        out.push_str(&format!("  {detail}\n"));
    }
    for issue in &report.issues {
        out.push_str(&format!("  issue: {issue}\n"));
    }
    out
}

fn render_report(report: &CommandReport, json: bool) -> Result<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(report)?));
    }
    Ok(render_text(report))
}

/// Run the parsed command. `Ok(false)` means the command reported issues.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();

    let report = match &cli.command {
        Command::Extract { date, dry_run } => {
            commands::extract::run(&commands::extract::ExtractOptions {
                date: date.clone(),
                dry_run: *dry_run,
            })?
        }
        Command::Report {
            date,
            template,
            stdout,
        } => {
            let run = commands::report::run(&commands::report::ReportOptions {
                date: date.clone(),
                template: template.clone(),
                stdout: *stdout,
            })?;
            if let Some(rendered) = run.rendered {
                print!("{rendered}");
                eprint!("{}", render_report(&run.report, cli.json)?);
                return Ok(run.report.ok);
            }
            run.report
        }
        Command::Templates => commands::templates::run()?,
        Command::Init { force } => {
            commands::init::run(&commands::init::InitOptions { force: *force })?
        }
        Command::Status => commands::status::run()?,
    };

    print!("{}", render_report(&report, cli.json)?);
    Ok(report.ok)
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, render_text};
    use crate::commands::CommandReport;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_takes_positional_date_and_template() {
        let cli = Cli::parse_from(["daylog", "--json", "report", "2024-01-15", "detailed"]);
        assert!(cli.json);
        match cli.command {
            Command::Report {
                date,
                template,
                stdout,
            } => {
                assert_eq!(date.as_deref(), Some("2024-01-15"));
                assert_eq!(template.as_deref(), Some("detailed"));
                assert!(!stdout);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn text_rendering_lists_details_then_issues() {
        let mut report = CommandReport::new("extract");
        report.detail("date=2024-01-15");
        report.issue("SOURCE_NOT_FOUND: missing");
        assert_eq!(
            render_text(&report),
            "extract: failed\n  date=2024-01-15\n  issue: SOURCE_NOT_FOUND: missing\n"
        );
    }
}
