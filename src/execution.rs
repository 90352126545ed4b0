use anyhow::{Context, Result};
use colored::*;
use std::io::{self, BufRead, Write};
use std::process::Command;

use crate::logging::LogCategory;
use crate::{log_info, log_warning};

/// Answers that count as "yes" at the confirmation prompt (compared lowercased)
pub const AFFIRMATIVE_ANSWERS: &[&str] = &["y", "yes", "s", "sim"];

const SEPARATOR_WIDTH: usize = 40;

/// Runs a command line on behalf of the execution gate
pub trait CommandRunner {
    /// Run the command to completion and report whether it exited successfully
    fn run(&mut self, command: &str) -> Result<bool>;
}

/// Runs commands through the host shell with the terminal's stdio inherited
#[derive(Debug, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&mut self, command: &str) -> Result<bool> {
        let status = if cfg!(target_os = "windows") {
            Command::new("cmd").args(["/C", command]).status()
        } else {
            Command::new("sh").args(["-c", command]).status()
        }
        .context("failed to start the shell")?;

        Ok(status.success())
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    AFFIRMATIVE_ANSWERS.contains(&answer.as_str())
}

/// Ask the user on the terminal before running `command` through the shell.
///
/// Returns `true` when the command was run, whatever its exit status.
pub fn confirm_and_run(command: &str) -> Result<bool> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    confirm_and_run_with(command, &mut input, &mut output, &mut ShellRunner)
}

/// Gate with injectable input, output and runner.
///
/// Anything other than an affirmative answer, including an empty line or EOF,
/// cancels without touching the runner. There is no timeout on the prompt.
pub fn confirm_and_run_with<R, W>(
    command: &str,
    input: &mut R,
    output: &mut W,
    runner: &mut dyn CommandRunner,
) -> Result<bool>
where
    R: BufRead,
    W: Write,
{
    writeln!(output)?;
    writeln!(output, "{} {}", "⚡ Command to run:".bold().yellow(), command.green())?;
    write!(output, "   {} ", "Run it? [y/N]:".bold())?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    if !is_affirmative(&answer) {
        writeln!(output, "   {}", "Cancelled.".dimmed())?;
        log_info!(LogCategory::Execution, "Command execution declined by user");
        return Ok(false);
    }

    let separator = "─".repeat(SEPARATOR_WIDTH);
    writeln!(output, "\n{}", separator.dimmed())?;
    output.flush()?;

    let succeeded = runner.run(command)?;

    writeln!(output, "{}\n", separator.dimmed())?;
    if succeeded {
        log_info!(LogCategory::Execution, "Confirmed command finished successfully");
    } else {
        writeln!(output, "{}", "Command failed.".red())?;
        log_warning!(LogCategory::Execution, "Confirmed command exited with a failure status");
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Default)]
    struct RecordingRunner {
        commands: Vec<String>,
        succeed: bool,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&mut self, command: &str) -> Result<bool> {
            self.commands.push(command.to_string());
            Ok(self.succeed)
        }
    }

    fn run_gate(answer: &str, runner: &mut RecordingRunner) -> (bool, String) {
        let mut input = Cursor::new(answer.as_bytes().to_vec());
        let mut output = Vec::new();
        let executed = confirm_and_run_with("ls -la", &mut input, &mut output, runner).unwrap();
        (executed, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_no_does_not_run() {
        let mut runner = RecordingRunner::default();
        let (executed, output) = run_gate("n\n", &mut runner);

        assert!(!executed);
        assert!(runner.commands.is_empty());
        assert!(output.contains("Cancelled."));
    }

    #[test]
    fn test_affirmative_answers_run_exactly_once() {
        for answer in ["s\n", "y\n", "yes\n", "YES\n", "Sim\n", "  Y  \n"] {
            let mut runner = RecordingRunner { succeed: true, ..Default::default() };
            let (executed, _) = run_gate(answer, &mut runner);

            assert!(executed, "answer {:?} should run the command", answer);
            assert_eq!(runner.commands, vec!["ls -la".to_string()]);
        }
    }

    #[test]
    fn test_empty_input_and_eof_cancel() {
        for answer in ["\n", ""] {
            let mut runner = RecordingRunner::default();
            let (executed, _) = run_gate(answer, &mut runner);

            assert!(!executed);
            assert!(runner.commands.is_empty());
        }
    }

    #[test]
    fn test_other_words_cancel() {
        for answer in ["no\n", "maybe\n", "yess\n", "nao\n"] {
            let mut runner = RecordingRunner::default();
            let (executed, _) = run_gate(answer, &mut runner);
            assert!(!executed, "answer {:?} should cancel", answer);
            assert!(runner.commands.is_empty());
        }
    }

    #[test]
    fn test_failed_command_still_counts_as_executed() {
        let mut runner = RecordingRunner { succeed: false, ..Default::default() };
        let (executed, output) = run_gate("y\n", &mut runner);

        assert!(executed);
        assert_eq!(runner.commands.len(), 1);
        assert!(output.contains("Command failed."));
    }

    #[test]
    fn test_prompt_shows_command() {
        let mut runner = RecordingRunner::default();
        let (_, output) = run_gate("n\n", &mut runner);
        assert!(output.contains("ls -la"));
        assert!(output.contains("[y/N]"));
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative("SIM\n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_reports_exit_status() {
        let mut runner = ShellRunner;
        assert!(runner.run("true").unwrap());
        assert!(!runner.run("exit 3").unwrap());
    }
}
