//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde_json::{json, Value};

use livesync_core::{ConnectionStatus, Dataset, Game, Record, SyncView};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
    /// Identifier field of a record
    key_field: String,
}

impl Output {
    pub fn new(format: OutputFormat, key_field: impl Into<String>) -> Self {
        Self {
            format,
            key_field: key_field.into(),
        }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print the whole dataset
    pub fn print_dataset(&self, dataset: &Dataset) {
        match self.format {
            OutputFormat::Human => {
                if dataset.is_empty() {
                    println!("No games.");
                    return;
                }
                for record in dataset {
                    println!("{}", self.record_line(record));
                }
                println!("\n{} game(s)", dataset.len());
            }
            OutputFormat::Json => {
                println!("{}", dataset_json(dataset));
            }
            OutputFormat::Quiet => {
                for record in dataset {
                    if let Some(id) = record.id(&self.key_field) {
                        println!("{}", id);
                    }
                }
            }
        }
    }

    /// Print a view published by the sync client
    ///
    /// JSON output is one object per line so it can be piped.
    pub fn print_view(&self, view: &SyncView) {
        match self.format {
            OutputFormat::Human => {
                println!("── {} ──", status_line(view));
                self.print_dataset(&view.dataset);
            }
            OutputFormat::Json => {
                println!("{}", view_json(view));
            }
            OutputFormat::Quiet => self.print_dataset(&view.dataset),
        }
    }

    /// Print a status change without the dataset
    pub fn print_status(&self, view: &SyncView) {
        match self.format {
            OutputFormat::Human => println!("── {} ──", status_line(view)),
            OutputFormat::Json => println!("{}", view_json(view)),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!("{}", json!({"status": "success", "message": message}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// One line per record: the game scoreline when it has that shape,
    /// otherwise the identifier and raw fields
    fn record_line(&self, record: &Record) -> String {
        match record.to_typed::<Game>() {
            Some(game) => game_line(&game),
            None => {
                let id = record
                    .id(&self.key_field)
                    .unwrap_or_else(|| "(no id)".to_string());
                format!(
                    "{} | {}",
                    truncate(&id, 12),
                    truncate(&Value::Object(record.fields().clone()).to_string(), 60)
                )
            }
        }
    }
}

fn game_line(game: &Game) -> String {
    let mut line = format!("{} | {}", truncate(&game.game_id, 12), game);
    if let (Some(home), Some(away)) = (game.home_win_percent(), game.away_win_percent()) {
        line.push_str(&format!(
            " | win {} {}% / {} {}%",
            game.away_team, away, game.home_team, home
        ));
    }
    line
}

fn status_line(view: &SyncView) -> String {
    let mut line = view.status.to_string();
    if view.status != ConnectionStatus::Connected && view.retry_attempts > 0 {
        line.push_str(&format!(" (attempt {})", view.retry_attempts));
    }
    if let Some(ref error) = view.last_error {
        line.push_str(&format!(": {}", error));
    }
    if let Some(updated) = view.updated_at {
        line.push_str(&format!(" | updated {}", updated.format("%H:%M:%S")));
    }
    line
}

fn dataset_json(dataset: &Dataset) -> Value {
    Value::Array(dataset.iter().cloned().map(Record::into_value).collect())
}

fn view_json(view: &SyncView) -> Value {
    json!({
        "status": view.status,
        "last_error": view.last_error,
        "retry_attempts": view.retry_attempts,
        "exhausted": view.exhausted,
        "updated_at": view.updated_at.map(|t| t.to_rfc3339()),
        "games": dataset_json(&view.dataset),
    })
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
