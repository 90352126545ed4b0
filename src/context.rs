use std::fs;
use std::path::Path;

use crate::os_context::SystemSnapshot;

/// Free-form notes the user keeps in `context.txt`, appended to every instruction
pub fn load_user_context(path: &Path) -> String {
    fs::read_to_string(path)
        .map(|content| content.trim().to_string())
        .unwrap_or_default()
}

/// Render the system instruction sent alongside each question.
///
/// Kept deliberately compact since it is paid for on every request.
pub fn build_system_instruction(snapshot: &SystemSnapshot, user_context: &str, language: &str) -> String {
    let mut instruction = format!(
        "Linux assistant. {os} (kernel {kernel}), {desktop}, {session}, shell {shell}, user {user}.\n\
         Date: {datetime} ({weekday}). Dir: {cwd}\n\
         Files here: {files}\n\
         RULES:\n\
         - Answer in {language}, keep it short\n\
         - Format: `command` + a one-sentence explanation\n\
         - Use the SIMPLEST command. Only add flags when the user explicitly asks (e.g. \"with details\", \"including hidden\")\n",
        os = snapshot.os_name,
        kernel = snapshot.kernel,
        desktop = snapshot.desktop,
        session = snapshot.session_type,
        shell = snapshot.shell,
        user = snapshot.user,
        datetime = snapshot.datetime,
        weekday = snapshot.weekday,
        cwd = snapshot.working_directory,
        files = if snapshot.directory_sample.is_empty() { "(none)" } else { snapshot.directory_sample.as_str() },
        language = language,
    );

    if !user_context.is_empty() {
        instruction.push_str(user_context);
        instruction.push('\n');
    }

    instruction
}
