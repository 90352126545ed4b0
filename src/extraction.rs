use regex::Regex;
use std::sync::OnceLock;

/// Command names that mark a line or inline span as a shell command rather than prose
pub const COMMAND_ALLOW_LIST: &[&str] = &[
    "sudo", "dnf", "apt", "flatpak", "ls", "cd", "cat", "grep", "find", "chmod",
    "chown", "mkdir", "rm", "cp", "mv", "systemctl", "journalctl", "docker",
    "podman", "git", "pip", "pip3", "python", "python3", "echo",
];

static FENCED_BLOCK: OnceLock<Regex> = OnceLock::new();
static INLINE_SPAN: OnceLock<Regex> = OnceLock::new();

fn fenced_block() -> &'static Regex {
    // `shell` has to come before `sh`, otherwise the tag is split and "ell" leaks into the command
    FENCED_BLOCK.get_or_init(|| Regex::new(r"(?s)```(?:bash|shell|sh)?\n?(.*?)```").unwrap())
}

fn inline_span() -> &'static Regex {
    INLINE_SPAN.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap())
}

/// Extract the first plausible shell command from a model reply.
///
/// Three strategies are tried in order and the first hit wins:
/// a fenced code block, an inline code span that looks like a command,
/// and finally a line that starts with `$ ` or with a known command name.
pub fn extract_command(reply: &str) -> Option<String> {
    from_fenced_block(reply)
        .or_else(|| from_inline_span(reply))
        .or_else(|| from_lines(reply))
}

fn from_fenced_block(reply: &str) -> Option<String> {
    let captures = fenced_block().captures(reply)?;
    Some(captures.get(1)?.as_str().trim().to_string())
}

fn from_inline_span(reply: &str) -> Option<String> {
    let captures = inline_span().captures(reply)?;
    let span = captures.get(1)?.as_str().trim();

    if span.is_empty() {
        return None;
    }

    let single_token = !span.contains(char::is_whitespace);
    if single_token || starts_with_known_command(span) {
        Some(span.to_string())
    } else {
        None
    }
}

fn from_lines(reply: &str) -> Option<String> {
    for line in reply.lines() {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("$ ") {
            return Some(rest.to_string());
        }

        if line.is_empty() || line.starts_with('#') || line.starts_with('*') {
            continue;
        }

        if starts_with_known_command(line) {
            return Some(line.to_string());
        }
    }

    None
}

/// Check whether the first whitespace-delimited token is on the allow-list
pub fn starts_with_known_command(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .map(|first| COMMAND_ALLOW_LIST.contains(&first))
        .unwrap_or(false)
}
