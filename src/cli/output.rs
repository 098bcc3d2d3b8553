use std::io::{self, Write};

use chrono::{DateTime, Utc};
use colored::Colorize;
use console::style;
use serde::Serialize;

use crate::core::bulk::BatchReport;
use crate::error::{Result, WaError};

#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub status: JsonStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonStatus {
    Ok,
    Error { code: String, message: String },
    Partial { completed: usize, failed: usize },
}

pub fn json_ok<T: Serialize>(data: T) -> JsonResponse<T> {
    JsonResponse {
        status: JsonStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
    }
}

pub fn json_error(err: &WaError) -> JsonResponse<serde_json::Value> {
    JsonResponse {
        status: JsonStatus::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        },
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data: serde_json::Value::Null,
    }
}

pub fn json_batch(report: &BatchReport) -> JsonResponse<&BatchReport> {
    let status = if report.success() {
        JsonStatus::Ok
    } else {
        JsonStatus::Partial {
            completed: report.succeeded.len(),
            failed: report.failed.len(),
        }
    };
    JsonResponse {
        status,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data: report,
    }
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    println!("{payload}");
    Ok(())
}

/// `Success: true|false`, the closing line of every mutating command.
pub fn success_line(success: bool) {
    let value = if success {
        "true".green().bold()
    } else {
        "false".red().bold()
    };
    println!("Success: {value}");
}

pub fn done() {
    println!("{}", "Done!".green());
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl HumanLayout {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 14,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let key_style = style(format!("{key:width$}", width = self.key_width))
            .dim()
            .to_string();
        self.lines.push(format!("{key_style} {value}"));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

/// Print a batch report the way a person wants to read it.
pub fn emit_batch(title: &str, report: &BatchReport) {
    let mut layout = HumanLayout::new();
    layout.title(title);
    for skill in &report.succeeded {
        layout.bullet(&format!("{} {skill}", "ok".green()));
    }
    for skill in &report.skipped {
        layout.bullet(&format!("{} {skill}", "skipped".yellow()));
    }
    for failure in &report.failed {
        layout.bullet(&format!("{} {}: {}", "failed".red(), failure.skill, failure.error));
    }
    emit_human(layout);
    success_line(report.success());
}

/// Ask a yes/no question on stderr. Anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let answer = input.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// Ask for a value on stderr, falling back to `default` on an empty answer.
pub fn prompt(question: &str, default: &str) -> Result<String> {
    if default.is_empty() {
        eprint!("{question}: ");
    } else {
        eprint!("{question} [{default}]: ");
    }
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let answer = input.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}
