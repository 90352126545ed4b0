use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};

use crate::logging::LogCategory;
use crate::{log_debug, log_warning};

/// An external program able to put text on the system clipboard
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardBackend {
    pub program: &'static str,
    pub args: &'static [&'static str],
    /// Feed the text on stdin instead of passing it as the last argument
    pub via_stdin: bool,
}

/// Wayland first, then X11
pub const DEFAULT_BACKENDS: &[ClipboardBackend] = &[
    ClipboardBackend {
        program: "wl-copy",
        args: &[],
        via_stdin: false,
    },
    ClipboardBackend {
        program: "xclip",
        args: &["-selection", "clipboard"],
        via_stdin: true,
    },
];

impl ClipboardBackend {
    fn copy(&self, text: &str) -> Result<()> {
        let mut command = Command::new(self.program);
        command.args(self.args).stdout(Stdio::null()).stderr(Stdio::null());

        let status = if self.via_stdin {
            let mut child = command
                .stdin(Stdio::piped())
                .spawn()
                .with_context(|| format!("failed to start {}", self.program))?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(text.as_bytes())?;
            }
            child.wait()?
        } else {
            command
                .arg(text)
                .stdin(Stdio::null())
                .status()
                .with_context(|| format!("failed to start {}", self.program))?
        };

        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("{} exited with {}", self.program, status))
        }
    }
}

/// Try each backend in order; true as soon as one succeeds
pub fn copy_with(backends: &[ClipboardBackend], text: &str) -> bool {
    for backend in backends {
        match backend.copy(text) {
            Ok(()) => {
                log_debug!(LogCategory::Clipboard, format!("Copied with {}", backend.program));
                return true;
            }
            Err(e) => {
                log_debug!(LogCategory::Clipboard, format!("{:#}", e));
            }
        }
    }

    log_warning!(LogCategory::Clipboard, "No clipboard backend succeeded");
    false
}

/// Best-effort copy to the desktop clipboard
pub fn copy_to_clipboard(text: &str) -> bool {
    copy_with(DEFAULT_BACKENDS, text)
}
