use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ChapterResult, PlanResult};
use crate::batch::BatchReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_plan(result: &PlanResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_report(report: &BatchReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_chapter(result: &ChapterResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_plan(result: &PlanResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", render_plan(result))
    }

    pub fn print_report(report: &BatchReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", render_report(report))
    }
}

pub fn render_plan(result: &PlanResult) -> String {
    if result.chapters.is_empty() {
        return "No chapter matches the given filters.".to_string();
    }
    let mut lines = vec!["These chapters will be downloaded:".to_string()];
    for entry in &result.chapters {
        let mut line = format!("{} - chapter {}", entry.position + 1, entry.chapter);
        if !entry.volume.is_empty() {
            line.push_str(&format!(" (vol. {})", entry.volume));
        }
        if let Some(group) = &entry.group {
            line.push_str(&format!(" [{group}]"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn render_report(report: &BatchReport) -> String {
    let ok = report.succeeded().count();
    let failed: Vec<String> = report
        .failed()
        .map(|outcome| {
            format!(
                "  chapter {}: {}",
                outcome.name,
                outcome.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();

    let mut lines = vec![format!("Downloaded {ok} of {} chapters.", report.outcomes.len())];
    if !failed.is_empty() {
        lines.push("Failure in downloading one or more chapters!".to_string());
        lines.extend(failed);
    }
    lines.join("\n")
}
