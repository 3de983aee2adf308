use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::rules::{summarize, AppliedFix, RepairReport, Role, Severity, ValidationError};
use crate::utils::truncate;

/// A finding flattened for output. `line` is 1-based, `None` for the whole document.
#[derive(Debug, Clone, Serialize)]
pub struct FindingRecord {
    pub line: Option<usize>,
    pub role: Role,
    pub kind: &'static str,
    pub message: String,
    pub severity: Severity,
}

impl From<&ValidationError> for FindingRecord {
    fn from(e: &ValidationError) -> Self {
        FindingRecord {
            line: e.line_number(),
            role: e.role(),
            kind: e.kind.code(),
            message: e.message.clone(),
            severity: e.severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No findings left.
    Clean,
    /// Findings remain (after repair, for `fix`).
    Findings,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Findings as first validated.
    pub findings: Vec<FindingRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fixes: Vec<AppliedFix>,
    /// Findings after repair; same as `findings` for a plain check.
    pub residual: Vec<FindingRecord>,
    pub summary: BTreeMap<Role, usize>,
    pub processed_at: DateTime<Local>,
}

fn records(errors: &[ValidationError]) -> Vec<FindingRecord> {
    errors.iter().map(FindingRecord::from).collect()
}

impl FileReport {
    fn new(input: &Path, status: Status) -> Self {
        FileReport {
            input: input.to_path_buf(),
            output: None,
            status,
            message: None,
            findings: Vec::new(),
            fixes: Vec::new(),
            residual: Vec::new(),
            summary: BTreeMap::new(),
            processed_at: Local::now(),
        }
    }

    pub fn checked(input: &Path, errors: &[ValidationError]) -> Self {
        let status = if errors.is_empty() {
            Status::Clean
        } else {
            Status::Findings
        };
        FileReport {
            findings: records(errors),
            residual: records(errors),
            summary: summarize(errors),
            ..Self::new(input, status)
        }
    }

    pub fn repaired(input: &Path, output: Option<PathBuf>, report: &RepairReport) -> Self {
        let status = if report.residual.is_empty() {
            Status::Clean
        } else {
            Status::Findings
        };
        FileReport {
            output,
            findings: records(&report.found),
            fixes: report.fixes.clone(),
            residual: records(&report.residual),
            summary: summarize(&report.residual),
            ..Self::new(input, status)
        }
    }

    pub fn failed(input: &Path, message: impl Into<String>) -> Self {
        FileReport {
            message: Some(message.into()),
            ..Self::new(input, Status::Failed)
        }
    }

    pub fn skipped(input: &Path, message: impl Into<String>) -> Self {
        FileReport {
            message: Some(message.into()),
            ..Self::new(input, Status::Skipped)
        }
    }

    pub fn has_problems(&self) -> bool {
        matches!(self.status, Status::Findings | Status::Failed)
    }

    pub fn print(&self, max_listed: usize) {
        let name = self.input.display();
        match self.status {
            Status::Failed => {
                println!("\n{}: FAILED: {}", name, self.message.as_deref().unwrap_or(""));
                return;
            }
            Status::Skipped => {
                println!("\n{}: skipped ({})", name, self.message.as_deref().unwrap_or(""));
                return;
            }
            Status::Clean if self.fixes.is_empty() => {
                println!("\n{}: OK", name);
            }
            _ => {
                let by_role: Vec<String> = self
                    .summary
                    .iter()
                    .map(|(role, n)| format!("{} {}", role, n))
                    .collect();
                println!(
                    "\n{}: {} finding(s){}",
                    name,
                    self.residual.len(),
                    if by_role.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", by_role.join(", "))
                    }
                );
            }
        }

        if !self.fixes.is_empty() {
            println!("  Applied {} fix(es):", self.fixes.len());
            for f in self.fixes.iter().take(max_listed) {
                println!(
                    "  {:>5} | {:<16} | {}",
                    f.block_index + 1,
                    f.kind,
                    truncate(&f.detail, 90)
                );
            }
            if self.fixes.len() > max_listed {
                println!("  … {} more", self.fixes.len() - max_listed);
            }
        }

        if !self.residual.is_empty() {
            println!("  {:>5} | {:<9} | {}", "Line", "Role", "Message");
            println!("  {}", "-".repeat(80));
            for r in self.residual.iter().take(max_listed) {
                let line = r.line.map(|l| l.to_string()).unwrap_or_else(|| "-".into());
                println!("  {:>5} | {:<9} | {}", line, r.role, truncate(&r.message, 90));
            }
            if self.residual.len() > max_listed {
                println!("  … {} more", self.residual.len() - max_listed);
            }
        }

        if let Some(out) = &self.output {
            println!("  Saved to {}", out.display());
        }
    }
}

pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("writing {}", path.display()))?;
    writer.flush()?;
    Ok(())
}
