use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::Environment;

const LISTING_SAMPLE_SIZE: usize = 10;
const UNKNOWN: &str = "unknown";

/// What the assistant gets told about the machine it is helping with.
///
/// Gathered fresh on every run and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSnapshot {
    pub datetime: String,
    pub weekday: String,
    pub os_name: String,
    pub kernel: String,
    pub working_directory: String,
    pub directory_sample: String,
    pub desktop: String,
    pub session_type: String,
    pub shell: String,
    pub user: String,
}

impl SystemSnapshot {
    /// Inspect the running system. Every probe falls back to a placeholder on failure.
    pub fn collect(env: &Environment) -> Self {
        let now = Local::now();
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self::assemble(
            now,
            read_os_name(Path::new("/etc/os-release")),
            kernel_release(),
            &cwd,
            directory_sample(&cwd),
            env,
        )
    }

    fn assemble(
        now: DateTime<Local>,
        os_name: String,
        kernel: String,
        cwd: &Path,
        directory_sample: String,
        env: &Environment,
    ) -> Self {
        let shell = env
            .get_non_empty("SHELL")
            .unwrap_or("/bin/bash")
            .rsplit('/')
            .next()
            .unwrap_or("bash")
            .to_string();

        Self {
            datetime: now.format("%d/%m/%Y %H:%M:%S").to_string(),
            weekday: now.format("%A").to_string(),
            os_name,
            kernel,
            working_directory: cwd.display().to_string(),
            directory_sample,
            desktop: env.get_non_empty("XDG_CURRENT_DESKTOP").unwrap_or(UNKNOWN).to_string(),
            session_type: env.get_non_empty("XDG_SESSION_TYPE").unwrap_or(UNKNOWN).to_string(),
            shell,
            user: env.get_non_empty("USER").unwrap_or("user").to_string(),
        }
    }
}

/// `PRETTY_NAME` from an os-release file, or plain "Linux"
pub fn read_os_name(os_release: &Path) -> String {
    fs::read_to_string(os_release)
        .ok()
        .and_then(|content| parse_pretty_name(&content))
        .unwrap_or_else(|| "Linux".to_string())
}

pub fn parse_pretty_name(os_release: &str) -> Option<String> {
    os_release
        .lines()
        .find_map(|line| line.trim().strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|name| !name.is_empty())
}

fn kernel_release() -> String {
    Command::new("uname")
        .arg("-r")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|release| !release.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn directory_sample(dir: &Path) -> String {
    match fs::read_dir(dir) {
        Ok(entries) => {
            let names: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            summarize_listing(&names)
        }
        Err(_) => String::new(),
    }
}

/// First ten names joined by commas, with `...` when there are more
pub fn summarize_listing(names: &[String]) -> String {
    let mut sample = names
        .iter()
        .take(LISTING_SAMPLE_SIZE)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    if names.len() > LISTING_SAMPLE_SIZE {
        sample.push_str("...");
    }
    sample
}
