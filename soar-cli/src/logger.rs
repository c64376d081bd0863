use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;

/// Diagnostics sink handed to the HTTP engine and command handlers.
pub trait Logger {
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Debug,
    Warn,
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    fn colored_label(self, color: bool) -> String {
        if !color {
            return self.label().to_string();
        }

        match self {
            Level::Info => self.label().blue().to_string(),
            Level::Debug => self.label().magenta().to_string(),
            Level::Warn => self.label().yellow().to_string(),
            Level::Error => self.label().red().bold().to_string(),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub time: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

impl Entry {
    fn format(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.time.format("%d %b %y %H:%M %Z"),
            self.level,
            self.message
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSettings {
    pub color: bool,
    pub debug: bool,
    pub quiet: bool,
    pub ignore_warnings: bool,
}

/// Writes colored diagnostics to stderr and remembers every entry so the
/// session can be saved with `--save-logs`.
#[derive(Debug)]
pub struct ConsoleLogger {
    settings: LogSettings,
    entries: Mutex<Vec<Entry>>,
}

impl ConsoleLogger {
    pub fn new(settings: LogSettings) -> Self {
        Self {
            settings,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn visible(&self, level: Level) -> bool {
        match level {
            Level::Error => true,
            Level::Debug => self.settings.debug,
            Level::Warn => !self.settings.quiet && !self.settings.ignore_warnings,
            Level::Info => !self.settings.quiet,
        }
    }

    fn log(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(Entry {
                time: Local::now(),
                level,
                message: message.to_string(),
            });
        }

        if !self.visible(level) {
            return;
        }

        let mut stderr = std::io::stderr().lock();
        for line in message.lines() {
            let _ = writeln!(stderr, "{}: {}", level.colored_label(self.settings.color), line);
        }
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Writes the recorded entries to `<dir>/<timestamp>.log` and returns the path.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        let entries = self.entries();
        if entries.is_empty() {
            anyhow::bail!("no logs to save");
        }

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create logs directory {}", dir.display()))?;

        let name = Local::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let path = dir.join(format!("{name}.log"));
        let content: String = entries
            .iter()
            .map(|entry| entry.format() + "\n")
            .collect();
        fs::write(&path, content)
            .with_context(|| format!("Failed to write log file {}", path.display()))?;

        Ok(path)
    }

    /// Saves to the default logs directory under the user config dir.
    pub fn save(&self) -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .map(|d| d.join("soar").join("logs"))
            .context("Failed to determine logs directory")?;
        self.save_to(&dir)
    }
}

impl Logger for ConsoleLogger {
    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Records lines in memory; used by tests to inspect engine diagnostics.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    fn push(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

impl Logger for MemoryLogger {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }

    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}
