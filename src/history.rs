use anyhow::Result;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogCategory;
use crate::log_warning;

/// Maximum number of entries kept on disk
pub const MAX_HISTORY_ENTRIES: usize = 50;
/// Answers longer than this many characters are cut and marked with `...`
pub const ANSWER_EXCERPT_CHARS: usize = 200;

const ENTRY_SEPARATOR: &str = "---";
const ANSWER_MARKER: &str = "→ ";
const TIMESTAMP_FORMAT: &str = "%d/%m %H:%M";
const DAY_FORMAT: &str = "%d/%m";

/// One past question with a short excerpt of the answer
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub question: String,
    pub answer_excerpt: String,
}

impl HistoryEntry {
    pub fn new(at: DateTime<Local>, question: &str, answer: &str) -> Self {
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            question: flatten(question),
            answer_excerpt: excerpt(answer),
        }
    }

    /// Two-line on-disk form: `[timestamp] question` then `→ answer`
    pub fn format(&self) -> String {
        format!("[{}] {}\n{}{}", self.timestamp, self.question, ANSWER_MARKER, self.answer_excerpt)
    }

    /// Parse the on-disk form; anything else is rejected
    pub fn parse(block: &str) -> Option<Self> {
        let mut lines = block.trim().lines();

        let header = lines.next()?.trim();
        let rest = header.strip_prefix('[')?;
        let (timestamp, question) = rest.split_once(']')?;

        let answer_excerpt = match lines.next() {
            Some(line) => line.trim().strip_prefix(ANSWER_MARKER.trim_end())?.trim().to_string(),
            None => String::new(),
        };

        Some(Self {
            timestamp: timestamp.trim().to_string(),
            question: question.trim().to_string(),
            answer_excerpt,
        })
    }

    /// Whether the entry was written on the given day (matched on the `dd/mm` prefix)
    pub fn is_on(&self, day: DateTime<Local>) -> bool {
        self.timestamp.starts_with(&day.format(DAY_FORMAT).to_string())
    }
}

fn flatten(text: &str) -> String {
    text.replace('\n', " ").trim().to_string()
}

/// Cut to the excerpt length (in characters) then flatten newlines
fn excerpt(answer: &str) -> String {
    let cut = if answer.chars().count() > ANSWER_EXCERPT_CHARS {
        let head: String = answer.chars().take(ANSWER_EXCERPT_CHARS).collect();
        format!("{}...", head)
    } else {
        answer.to_string()
    };
    flatten(&cut)
}

/// Split file content into entries on lines that are exactly `---`
pub fn parse_entries(content: &str) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    let mut block = String::new();

    for line in content.lines() {
        if line.trim() == ENTRY_SEPARATOR {
            entries.extend(HistoryEntry::parse(&block));
            block.clear();
        } else {
            block.push_str(line);
            block.push('\n');
        }
    }
    entries.extend(HistoryEntry::parse(&block));

    entries
}

pub fn format_entries(entries: &[HistoryEntry]) -> String {
    entries
        .iter()
        .map(HistoryEntry::format)
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", ENTRY_SEPARATOR))
}

/// Flat-file log of recent questions, rewritten in full on every append
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a question and its answer.
    ///
    /// History is best-effort: failures are written to the error log and
    /// otherwise ignored.
    pub fn append(&self, question: &str, answer: &str) {
        if let Err(e) = self.append_at(Local::now(), question, answer) {
            log_warning!(LogCategory::History, format!("Failed to update history: {}", e));
        }
    }

    /// Read, add, keep the newest `MAX_HISTORY_ENTRIES`, rewrite the whole file
    pub fn append_at(&self, at: DateTime<Local>, question: &str, answer: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.push(HistoryEntry::new(at, question, answer));

        if entries.len() > MAX_HISTORY_ENTRIES {
            entries.drain(..entries.len() - MAX_HISTORY_ENTRIES);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format_entries(&entries))?;
        Ok(())
    }

    /// All entries, oldest first; a missing file is an empty history
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(parse_entries(&content))
    }

    /// The last `n` entries, oldest first
    pub fn read_recent(&self, n: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all()?;
        let start = entries.len().saturating_sub(n);
        Ok(entries.split_off(start))
    }

    /// Number of entries written on the given day
    pub fn count_on(&self, day: DateTime<Local>) -> usize {
        self.read_all()
            .map(|entries| entries.iter().filter(|e| e.is_on(day)).count())
            .unwrap_or(0)
    }
}
