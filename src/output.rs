use std::cell::Cell;
use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CheckResult, ProgressEvent, ProgressKind, ProgressSink, UploadResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_check(result: &CheckResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_upload(result: &UploadResult) -> io::Result<()> {
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

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
pub struct ConsoleSink {
    mid_line: Cell<bool>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_event<W: Write>(&self, out: &mut W, event: &ProgressEvent) -> io::Result<()> {
        if event.kind == ProgressKind::ArchiveEntry {
            self.mid_line.set(true);
            write!(out, "\r{}    ", event.message)?;
            return out.flush();
        }
        if self.mid_line.replace(false) {
            writeln!(out)?;
        }
        match event.elapsed {
            Some(elapsed) => writeln!(out, "{} ({:.1}s)", event.message, elapsed.as_secs_f64())?,
            None => writeln!(out, "{}", event.message)?,
        }
        out.flush()
    }
}

impl ProgressSink for ConsoleSink {
    fn event(&self, event: ProgressEvent) {
        let mut stderr = io::stderr().lock();
        let _ = self.write_event(&mut stderr, &event);
    }
}

pub fn print_check_summary(result: &CheckResult) {
    println!("Checked {} rows; all scan directories present", result.rows_checked);
}

pub fn print_upload_summary(result: &UploadResult) {
    println!("Uploaded items: {}", result.uploaded.len());
    for item in &result.uploaded {
        println!("  {} -> {} ({})", item.folder, item.identifier, item.remote_name);
    }
    if result.skipped > 0 {
        println!("Skipped rows past the upload limit: {}", result.skipped);
    }
}
