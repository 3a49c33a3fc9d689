//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use screenplay::{ScenarioOutcome, ScenarioReport, SuiteReport};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// One planned scenario run, as `--list` shows it
#[derive(Debug, Clone, Serialize)]
pub struct PlannedRun {
    pub scenario: String,
    pub browser: Option<String>,
    pub abilities: Vec<String>,
    pub tags: Vec<String>,
    pub selected: bool,
}

impl TableDisplay for PlannedRun {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Browser", "Abilities", "Tags", "Selected"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.scenario.clone(),
            self.browser.clone().unwrap_or_else(|| "-".to_string()),
            self.abilities.join(", "),
            self.tags.join(" "),
            if self.selected { "yes" } else { "no" }.to_string(),
        ]
    }
}

impl TableDisplay for ScenarioReport {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Browser", "Status", "Duration", "Evidence", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        let (status, detail) = status_and_detail(&self.outcome);
        vec![
            self.title.clone(),
            self.browser
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
            status.to_string(),
            format!("{} ms", self.duration_ms),
            self.evidence.len().to_string(),
            detail,
        ]
    }
}

fn status_and_detail(outcome: &ScenarioOutcome) -> (&'static str, String) {
    match outcome {
        ScenarioOutcome::Passed => ("passed", String::new()),
        ScenarioOutcome::Failed { error } => ("failed", error.clone()),
        ScenarioOutcome::Skipped { reason } => ("skipped", reason.clone()),
    }
}

fn status_color(outcome: &ScenarioOutcome) -> Color {
    match outcome {
        ScenarioOutcome::Passed => Color::Green,
        ScenarioOutcome::Failed { .. } => Color::Red,
        ScenarioOutcome::Skipped { .. } => Color::Yellow,
    }
}

fn new_table(headers: Vec<&'static str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers);
    table
}

fn print_serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Yaml => match serde_yaml::to_string(value) {
            Ok(yaml) => println!("{}", yaml),
            Err(e) => print_error(&format!("Failed to render YAML: {}", e)),
        },
        _ => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&format!("Failed to render JSON: {}", e)),
        },
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = new_table(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Json | OutputFormat::Yaml => print_serialized(items, format),
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print every scenario result and the totals
pub fn print_report(report: &SuiteReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = new_table(ScenarioReport::headers());
            for result in &report.results {
                let mut cells: Vec<Cell> = result.row().into_iter().map(Cell::new).collect();
                cells[2] = Cell::new(status_and_detail(&result.outcome).0).fg(status_color(&result.outcome));
                table.add_row(cells);
            }
            println!("{table}");
            print_totals(report);
        }
        OutputFormat::Json | OutputFormat::Yaml => print_serialized(report, format),
        OutputFormat::Plain => {
            for result in &report.results {
                let row = result.row();
                println!("{}", row.join(" | "));
            }
            print_totals(report);
        }
    }
}

fn print_totals(report: &SuiteReport) {
    let summary = format!(
        "{} passed, {} failed, {} skipped in {} ms",
        report.passed, report.failed, report.skipped, report.duration_ms
    );
    if report.success() {
        print_success(&summary);
    } else {
        print_error(&summary);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_row() {
        let report = ScenarioReport {
            title: "Search".to_string(),
            browser: None,
            outcome: ScenarioOutcome::Failed {
                error: "Element not found: #q".to_string(),
            },
            duration_ms: 12,
            evidence: Vec::new(),
        };
        assert_eq!(
            report.row(),
            vec!["Search", "-", "failed", "12 ms", "0", "Element not found: #q"]
        );
    }

    #[test]
    fn test_planned_row() {
        let run = PlannedRun {
            scenario: "Search".to_string(),
            browser: Some("firefox".to_string()),
            abilities: vec!["WebAbility".to_string()],
            tags: vec!["@smoke".to_string()],
            selected: false,
        };
        assert_eq!(run.row()[4], "no");
        assert_eq!(run.row().len(), PlannedRun::headers().len());
    }
}
