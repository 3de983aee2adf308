mod config;
mod docx;
mod report;
mod rules;
mod utils;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::config::{Settings, TitleMode};
use crate::docx::{DocxError, DocxPackage};
use crate::report::FileReport;
use crate::rules::{extract_groups, Rule, ThreeLineGroupRule};
use crate::utils::format_duration;

#[derive(Parser)]
#[command(
    name = "triplet_fix",
    about = "Check and repair title / URL / image paragraph groups in .docx files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Title check: standard (n.opinion_source：title) or simple (n.title)
    #[arg(short, long, value_enum)]
    mode: Option<TitleMode>,
    /// Report damaged documents as skipped instead of failed
    #[arg(long)]
    skip_corrupted: bool,
    /// Also write a JSON report to this path
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate documents and list findings
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Repair documents into a copy (<stem><suffix>.docx), never touching the input
    Fix {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Directory for repaired copies (default: next to each input)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// File-name suffix for repaired copies (default: _fixed)
        #[arg(long)]
        suffix: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Export title/URL/image groups as JSON
    Export {
        file: PathBuf,
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum)]
        mode: Option<TitleMode>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load().context("loading settings")?;

    let result = match cli.command {
        Commands::Check { files, common } => {
            common.apply(&mut settings);
            let rule = ThreeLineGroupRule::from_settings(&settings);
            info!(
                "Checking {} file(s) with rule {} ({} titles)",
                files.len(),
                rule.name(),
                rule.title_mode()
            );
            let reports = run_batch(&files, |path| check_file(path, &rule, &settings))?;
            finish(&reports, &settings, common.json.as_deref())
        }
        Commands::Fix {
            files,
            out_dir,
            suffix,
            common,
        } => {
            common.apply(&mut settings);
            if let Some(suffix) = suffix {
                settings.output_suffix = suffix;
            }
            settings.validate()?;
            if let Some(dir) = &out_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
            let rule = ThreeLineGroupRule::from_settings(&settings);
            info!("Repairing {} file(s) ({} titles)", files.len(), rule.title_mode());
            let reports = run_batch(&files, |path| {
                fix_file(path, &rule, &settings, out_dir.as_deref())
            })?;
            finish(&reports, &settings, common.json.as_deref())
        }
        Commands::Export { file, output, mode } => {
            let mode = mode.unwrap_or(settings.title_mode);
            let (_, document) = DocxPackage::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let groups = extract_groups(&document, mode);
            match output {
                Some(path) => {
                    report::write_json(&groups, &path)?;
                    println!("Exported {} groups to {}", groups.len(), path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&groups)?),
            }
            Ok(ExitCode::SUCCESS)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

impl CommonArgs {
    /// Flags win over file and environment settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(mode) = self.mode {
            settings.title_mode = mode;
        }
        if self.skip_corrupted {
            settings.skip_corrupted = true;
        }
    }
}

/// Run `process` over every file, in parallel with a progress bar when
/// there is more than one. Reports keep input order.
fn run_batch<F>(files: &[PathBuf], process: F) -> anyhow::Result<Vec<FileReport>>
where
    F: Fn(&Path) -> FileReport + Sync,
{
    if let [only] = files {
        return Ok(vec![process(only.as_path())]);
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let reports: Vec<FileReport> = files
        .par_iter()
        .map(|path| {
            let report = process(path.as_path());
            pb.inc(1);
            report
        })
        .collect();

    pb.finish_and_clear();
    Ok(reports)
}

fn finish(
    reports: &[FileReport],
    settings: &Settings,
    json: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    for r in reports {
        r.print(settings.max_listed);
    }

    let problems = reports.iter().filter(|r| r.has_problems()).count();
    println!(
        "\n{} file(s): {} clean, {} with problems",
        reports.len(),
        reports.len() - problems,
        problems
    );

    if let Some(path) = json {
        report::write_json(reports, path)?;
        println!("Report written to {}", path.display());
    }

    Ok(if problems > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

// ── Per-file work ──

fn check_file(path: &Path, rule: &dyn Rule, settings: &Settings) -> FileReport {
    info!("Checking {}", path.display());
    match DocxPackage::open(path) {
        Ok((_, document)) => {
            let errors = rule.validate(&document);
            info!("{}: {} finding(s)", path.display(), errors.len());
            FileReport::checked(path, &errors)
        }
        Err(e) => open_failure(path, e, settings.skip_corrupted),
    }
}

fn fix_file(
    path: &Path,
    rule: &dyn Rule,
    settings: &Settings,
    out_dir: Option<&Path>,
) -> FileReport {
    info!("Repairing {}", path.display());
    let (package, mut document) = match DocxPackage::open(path) {
        Ok(opened) => opened,
        Err(e) => return open_failure(path, e, settings.skip_corrupted),
    };

    // the input file stays untouched and serves as the snapshot
    let report = rule.fix(&mut document);
    if !report.changed() {
        info!("{}: nothing to repair", path.display());
        return FileReport::repaired(path, None, &report);
    }

    let out = output_path(package.source(), out_dir, &settings.output_suffix);
    if let Err(e) = package.save(&document, &out) {
        error!("{}: could not save {}: {}", path.display(), out.display(), e);
        return FileReport::failed(path, format!("saving {}: {}", out.display(), e));
    }
    info!(
        "{}: {} fix(es) applied, {} finding(s) left, saved {}",
        path.display(),
        report.fixes.len(),
        report.residual.len(),
        out.display()
    );
    FileReport::repaired(path, Some(out), &report)
}

fn open_failure(path: &Path, err: DocxError, skip_corrupted: bool) -> FileReport {
    if !err.is_corrupted() {
        error!("{}: {}", path.display(), err);
        return FileReport::failed(path, err.to_string());
    }
    if skip_corrupted {
        warn!("Skipping damaged document {}: {}", path.display(), err);
        return FileReport::skipped(path, format!("damaged document: {err}"));
    }
    error!("Damaged document {}: {}", path.display(), err);
    FileReport::failed(
        path,
        format!("document package is damaged ({err}); try re-saving it in Word"),
    )
}

/// `<dir>/<stem><suffix>.<ext>`, where `dir` defaults to the input's directory.
fn output_path(input: &Path, out_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "docx".to_string());
    let name = format!("{stem}{suffix}.{ext}");
    match out_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::*;
    use crate::report::Status;

    fn settings(mode: TitleMode) -> Settings {
        Settings {
            title_mode: mode,
            ..Settings::default()
        }
    }

    #[test]
    fn output_names() {
        assert_eq!(
            output_path(Path::new("/data/digest.docx"), None, "_fixed"),
            PathBuf::from("/data/digest_fixed.docx")
        );
        assert_eq!(
            output_path(Path::new("/data/digest.docx"), Some(Path::new("/out")), "-ok"),
            PathBuf::from("/out/digest-ok.docx")
        );
        assert_eq!(
            output_path(Path::new("notes"), None, "_fixed"),
            PathBuf::from("notes_fixed.docx")
        );
    }

    #[test]
    fn cli_accepts_numeric_mode_aliases() {
        let cli = Cli::try_parse_from(["triplet_fix", "check", "--mode", "2", "a.docx"]).unwrap();
        match cli.command {
            Commands::Check { common, files } => {
                assert_eq!(common.mode, Some(TitleMode::Simple));
                assert_eq!(files, vec![PathBuf::from("a.docx")]);
            }
            _ => panic!("expected check"),
        }
        assert!(Cli::try_parse_from(["triplet_fix", "check"]).is_err());
    }

    #[test]
    fn fix_writes_a_copy_and_leaves_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("digest.docx");
        let mut paragraphs = valid_group(1);
        paragraphs[0] = text_paragraph("1Weibo_Daily：Headline");
        write_docx(&input, &document_xml(&paragraphs));
        let original = std::fs::read(&input).unwrap();

        let settings = settings(TitleMode::Standard);
        let rule = ThreeLineGroupRule::from_settings(&settings);
        let report = fix_file(&input, &rule, &settings, None);

        assert_eq!(report.status, Status::Clean);
        let out = report.output.clone().unwrap();
        assert_eq!(out, dir.path().join("digest_fixed.docx"));
        assert_eq!(std::fs::read(&input).unwrap(), original);

        let (_, repaired) = DocxPackage::open(&out).unwrap();
        assert_eq!(repaired.block(0).unwrap().text(), "1.Weibo_Daily：Headline");
        assert!(check_file(&out, &rule, &settings).residual.is_empty());
    }

    #[test]
    fn check_reports_findings_without_touching_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("digest.docx");
        let mut paragraphs = valid_group(1);
        paragraphs[1] = text_paragraph("not a link");
        write_docx(&input, &document_xml(&paragraphs));
        let original = std::fs::read(&input).unwrap();

        let settings = settings(TitleMode::Standard);
        let rule = ThreeLineGroupRule::from_settings(&settings);
        let report = check_file(&input, &rule, &settings);

        assert_eq!(report.status, Status::Findings);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].line, Some(2));
        assert_eq!(report.residual.len(), report.findings.len());
        assert!(report.fixes.is_empty() && report.output.is_none());
        assert_eq!(std::fs::read(&input).unwrap(), original);
    }

    #[test]
    fn clean_input_is_not_copied() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clean.docx");
        write_docx(&input, &document_xml(&valid_group(1)));

        let settings = settings(TitleMode::Standard);
        let rule = ThreeLineGroupRule::from_settings(&settings);
        let report = fix_file(&input, &rule, &settings, None);
        assert_eq!(report.status, Status::Clean);
        assert!(report.output.is_none());
        assert!(!dir.path().join("clean_fixed.docx").exists());
    }

    #[test]
    fn damaged_input_fails_or_skips() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.docx");
        std::fs::write(&input, b"PK\x03\x04 truncated").unwrap();
        let rule = ThreeLineGroupRule::new(TitleMode::Standard);

        let strict = settings(TitleMode::Standard);
        let report = check_file(&input, &rule, &strict);
        assert_eq!(report.status, Status::Failed);
        assert!(report.message.unwrap().contains("re-saving"));

        let lenient = Settings {
            skip_corrupted: true,
            ..strict
        };
        let report = check_file(&input, &rule, &lenient);
        assert_eq!(report.status, Status::Skipped);
        assert!(!report.has_problems());
    }

    #[test]
    fn batch_keeps_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..4)
            .map(|i| {
                let path = dir.path().join(format!("doc{i}.docx"));
                let paragraphs = if i % 2 == 0 {
                    valid_group(1)
                } else {
                    vec![text_paragraph("only a title")]
                };
                write_docx(&path, &document_xml(&paragraphs));
                path
            })
            .collect();

        let settings = settings(TitleMode::Standard);
        let rule = ThreeLineGroupRule::from_settings(&settings);
        let reports = run_batch(&files, |p| check_file(p, &rule, &settings)).unwrap();
        let inputs: Vec<&PathBuf> = reports.iter().map(|r| &r.input).collect();
        assert_eq!(inputs, files.iter().collect::<Vec<_>>());
        let problems: Vec<bool> = reports.iter().map(|r| r.has_problems()).collect();
        assert_eq!(problems, vec![false, true, false, true]);
    }
}
