use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const PROVIDER_VAR: &str = "AI_PROVIDER";
pub const MODEL_VAR: &str = "AI_MODEL";
pub const LANGUAGE_VAR: &str = "AI_LANGUAGE";
pub const TIMEOUT_VAR: &str = "AI_TIMEOUT";
pub const DEBUG_VAR: &str = "AI_DEBUG";
/// Only honoured from the real process environment, since it decides where `.env` lives
pub const CONFIG_DIR_VAR: &str = "LINAI_CONFIG_DIR";

const MIN_API_KEY_LEN: usize = 10;
const PLACEHOLDER_MARKERS: &[&str] = &["cole_sua", "paste_your", "your_api_key"];

fn default_language() -> String {
    "English".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// The four supported language-model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProviderKind {
    #[default]
    Google,
    OpenAI,
    Anthropic,
    Groq,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Google,
        ProviderKind::OpenAI,
        ProviderKind::Anthropic,
        ProviderKind::Groq,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Groq => "groq",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::Google => "GOOGLE_API_KEY",
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Google => "gemini-2.0-flash",
            ProviderKind::OpenAI => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
            ProviderKind::Groq => "llama-3.1-8b-instant",
        }
    }

    /// Where the user can look up their real usage and quota
    pub fn usage_url(&self) -> &'static str {
        match self {
            ProviderKind::Google => "https://aistudio.google.com/app/usage",
            ProviderKind::OpenAI => "https://platform.openai.com/usage",
            ProviderKind::Anthropic => "https://console.anthropic.com/settings/usage",
            ProviderKind::Groq => "https://console.groq.com/settings/usage",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.id() == wanted)
            .ok_or_else(|| {
                anyhow!(
                    "Provider '{}' is not supported. Use one of: google, openai, anthropic, groq",
                    s.trim()
                )
            })
    }
}

/// Everything a provider client needs, resolved once at startup
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &"********")
            .field("model", &self.model)
            .finish()
    }
}

/// Files linai reads and writes, all inside one config directory
#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub env_file: PathBuf,
    pub context_file: PathBuf,
    pub history_file: PathBuf,
    pub log_file: PathBuf,
}

impl AppPaths {
    pub fn in_dir(config_dir: PathBuf) -> Self {
        Self {
            env_file: config_dir.join(".env"),
            context_file: config_dir.join("context.txt"),
            history_file: config_dir.join("history.log"),
            log_file: config_dir.join("error.log"),
            config_dir,
        }
    }

    /// `$LINAI_CONFIG_DIR`, else the platform config dir (`~/.config/linai` on Linux)
    pub fn resolve(process_env: &HashMap<String, String>) -> Result<Self> {
        if let Some(dir) = process_env.get(CONFIG_DIR_VAR).filter(|d| !d.trim().is_empty()) {
            return Ok(Self::in_dir(PathBuf::from(dir)));
        }

        let mut dir = dirs::config_dir().ok_or_else(|| anyhow!("Could not find config directory"))?;
        dir.push("linai");
        Ok(Self::in_dir(dir))
    }
}

/// Read-only view of the merged environment (process variables over `.env` values)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Merge `.env` values under the process environment: a key already set
    /// in the process keeps its value, the file only fills the gaps.
    pub fn layered(process_env: HashMap<String, String>, file_values: HashMap<String, String>) -> Self {
        let mut vars = file_values;
        vars.extend(process_env);
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Value of `key`, treating empty strings as unset
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Parse dotenv-style `KEY=VALUE` text.
///
/// Blank lines, `#` comments and lines without `=` are skipped. Only the first
/// `=` splits, so `FOO=bar=baz` yields `bar=baz`. Later duplicates win.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                values.insert(key.to_string(), value.trim().to_string());
            }
        }
    }

    values
}

/// The process environment, skipping variables whose name or value is not UTF-8
pub fn process_environment() -> HashMap<String, String> {
    utf8_pairs(std::env::vars_os())
}

fn utf8_pairs<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Load a dotenv file; a missing or unreadable file is treated as empty
pub fn load_env_file(path: &Path) -> HashMap<String, String> {
    fs::read_to_string(path)
        .map(|content| parse_env_file(&content))
        .unwrap_or_default()
}

/// Immutable configuration for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Result<ProviderKind, String>,
    pub api_key: Option<String>,
    pub model: String,
    pub language: String,
    pub request_timeout: Duration,
    pub debug_logging: bool,
    pub paths: AppPaths,
    pub env: Environment,
}

impl Settings {
    /// Read the process environment and the `.env` file once
    pub fn load() -> Result<Self> {
        let process_env = process_environment();
        let paths = AppPaths::resolve(&process_env)?;
        Self::load_with(process_env, paths)
    }

    /// Layer the `.env` file found in `paths` under an already captured process environment
    pub fn load_with(process_env: HashMap<String, String>, paths: AppPaths) -> Result<Self> {
        let file_values = load_env_file(&paths.env_file);
        Self::from_environment(Environment::layered(process_env, file_values), paths)
    }

    /// Build settings from an already merged environment.
    ///
    /// An unknown provider name is kept as an error value rather than failing
    /// here, so that commands which never talk to a provider (like the history
    /// listing) still work.
    pub fn from_environment(env: Environment, paths: AppPaths) -> Result<Self> {
        let provider = env
            .get_non_empty(PROVIDER_VAR)
            .map(|name| ProviderKind::from_str(name).map_err(|e| e.to_string()))
            .unwrap_or(Ok(ProviderKind::default()));

        let api_key = provider
            .as_ref()
            .ok()
            .and_then(|kind| env.get_non_empty(kind.api_key_var()))
            .map(str::to_string);

        let model = match (env.get_non_empty(MODEL_VAR), &provider) {
            (Some(model), _) => model.to_string(),
            (None, Ok(kind)) => kind.default_model().to_string(),
            (None, Err(_)) => String::new(),
        };

        let language = env
            .get_non_empty(LANGUAGE_VAR)
            .map(str::to_string)
            .unwrap_or_else(default_language);

        let timeout_secs = match env.get_non_empty(TIMEOUT_VAR) {
            Some(raw) => parse_timeout(raw)?,
            None => default_timeout_secs(),
        };

        let debug_logging = env
            .get_non_empty(DEBUG_VAR)
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Ok(Self {
            provider,
            api_key,
            model,
            language,
            request_timeout: Duration::from_secs(timeout_secs),
            debug_logging,
            paths,
            env,
        })
    }

    /// The selected provider, or the configuration error explaining why there is none
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        self.provider.clone().map_err(|e| anyhow!(e))
    }

    /// Resolve the provider configuration, validating the API key
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let provider = self.provider_kind()?;
        let api_key = validate_api_key(provider, self.api_key.as_deref())?;

        Ok(ProviderConfig {
            provider,
            api_key,
            model: self.model.clone(),
        })
    }
}

fn parse_timeout(raw: &str) -> Result<u64> {
    let secs: u64 = raw
        .parse()
        .map_err(|_| anyhow!("{} must be a whole number of seconds, got '{}'", TIMEOUT_VAR, raw))?;

    if secs == 0 || secs > 600 {
        return Err(anyhow!("{} must be between 1 and 600 seconds", TIMEOUT_VAR));
    }

    Ok(secs)
}

/// Reject missing, short or placeholder API keys
pub fn validate_api_key(provider: ProviderKind, key: Option<&str>) -> Result<String> {
    let var = provider.api_key_var();
    let key = key.map(str::trim).unwrap_or("");

    if key.is_empty() {
        return Err(anyhow!("{} is not configured", var));
    }

    if key.chars().count() < MIN_API_KEY_LEN {
        return Err(anyhow!("{} is not configured: the value is too short to be a real key", var));
    }

    let lowered = key.to_lowercase();
    if PLACEHOLDER_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return Err(anyhow!("{} is not configured: it still holds the example placeholder", var));
    }

    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths() -> AppPaths {
        AppPaths::in_dir(PathBuf::from("/tmp/linai-test"))
    }

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        Settings::from_environment(Environment::from_pairs(pairs.iter().copied()), test_paths()).unwrap()
    }

    #[test]
    fn test_parse_env_file_splits_on_first_equals() {
        let values = parse_env_file("FOO=bar=baz\n");
        assert_eq!(values.get("FOO").map(String::as_str), Some("bar=baz"));
    }

    #[test]
    fn test_parse_env_file_skips_comments_and_blanks() {
        let content = "# comment\n\n   \nAI_PROVIDER = groq \nNOEQUALS\n=orphan\n";
        let values = parse_env_file(content);

        assert_eq!(values.len(), 1);
        assert_eq!(values.get("AI_PROVIDER").map(String::as_str), Some("groq"));
    }

    #[test]
    fn test_parse_env_file_later_duplicates_win() {
        let values = parse_env_file("A=1\nA=2\n");
        assert_eq!(values.get("A").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_process_environment_wins_over_file() {
        let process: HashMap<String, String> = [("AI_PROVIDER".to_string(), "openai".to_string())].into();
        let file: HashMap<String, String> = [
            ("AI_PROVIDER".to_string(), "groq".to_string()),
            ("GROQ_API_KEY".to_string(), "gsk_from_file_123".to_string()),
        ]
        .into();

        let env = Environment::layered(process, file);
        assert_eq!(env.get("AI_PROVIDER"), Some("openai"));
        assert_eq!(env.get("GROQ_API_KEY"), Some("gsk_from_file_123"));
    }

    #[test]
    fn test_load_env_file_missing_is_empty() {
        let values = load_env_file(Path::new("/definitely/not/here/.env"));
        assert!(values.is_empty());
    }

    #[test]
    fn test_load_env_file_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "GOOGLE_API_KEY=AIzaSomethingLong\n").unwrap();

        let values = load_env_file(&path);
        assert_eq!(values.get("GOOGLE_API_KEY").map(String::as_str), Some("AIzaSomethingLong"));
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]);

        assert_eq!(settings.provider, Ok(ProviderKind::Google));
        assert_eq!(settings.model, "gemini-2.0-flash");
        assert_eq!(settings.language, "English");
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
        assert!(!settings.debug_logging);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_provider_selection_is_case_insensitive() {
        let settings = settings_from(&[("AI_PROVIDER", "Anthropic"), ("ANTHROPIC_API_KEY", "sk-ant-1234567890")]);

        assert_eq!(settings.provider, Ok(ProviderKind::Anthropic));
        assert_eq!(settings.model, "claude-3-haiku-20240307");
        assert_eq!(settings.api_key.as_deref(), Some("sk-ant-1234567890"));
    }

    #[test]
    fn test_api_key_comes_from_selected_provider_only() {
        let settings = settings_from(&[("AI_PROVIDER", "groq"), ("OPENAI_API_KEY", "sk-1234567890abc")]);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_model_override() {
        let settings = settings_from(&[("AI_MODEL", "gemini-2.5-flash")]);
        assert_eq!(settings.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_unknown_provider_is_deferred() {
        let settings = settings_from(&[("AI_PROVIDER", "cohere")]);

        let err = settings.provider_kind().unwrap_err();
        assert!(err.to_string().contains("'cohere' is not supported"));
        assert!(settings.provider_config().is_err());
    }

    #[test]
    fn test_timeout_and_debug() {
        let settings = settings_from(&[("AI_TIMEOUT", "15"), ("AI_DEBUG", "yes")]);
        assert_eq!(settings.request_timeout, Duration::from_secs(15));
        assert!(settings.debug_logging);

        let env = Environment::from_pairs([("AI_TIMEOUT", "0")]);
        assert!(Settings::from_environment(env, test_paths()).is_err());

        let env = Environment::from_pairs([("AI_TIMEOUT", "soon")]);
        assert!(Settings::from_environment(env, test_paths()).is_err());
    }

    #[test]
    fn test_provider_config_resolves() {
        let settings = settings_from(&[("GOOGLE_API_KEY", "AIzaSyRealLookingKey")]);
        let config = settings.provider_config().unwrap();

        assert_eq!(config.provider, ProviderKind::Google);
        assert_eq!(config.api_key, "AIzaSyRealLookingKey");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert!(!format!("{:?}", config).contains("AIzaSyRealLookingKey"));
    }

    #[test]
    fn test_validate_api_key_rejects_bad_values() {
        let missing = validate_api_key(ProviderKind::Groq, None).unwrap_err();
        assert!(missing.to_string().contains("GROQ_API_KEY is not configured"));

        assert!(validate_api_key(ProviderKind::Google, Some("   ")).is_err());
        assert!(validate_api_key(ProviderKind::Google, Some("short")).is_err());
        assert!(validate_api_key(ProviderKind::Google, Some("cole_sua_chave_aqui")).is_err());
        assert!(validate_api_key(ProviderKind::OpenAI, Some("PASTE_YOUR_KEY_HERE")).is_err());
        assert_eq!(
            validate_api_key(ProviderKind::OpenAI, Some(" sk-abcdefghijkl ")).unwrap(),
            "sk-abcdefghijkl"
        );
    }

    #[test]
    fn test_config_dir_override() {
        let process: HashMap<String, String> = [(CONFIG_DIR_VAR.to_string(), "/srv/linai".to_string())].into();
        let paths = AppPaths::resolve(&process).unwrap();

        assert_eq!(paths.config_dir, PathBuf::from("/srv/linai"));
        assert_eq!(paths.env_file, PathBuf::from("/srv/linai/.env"));
        assert_eq!(paths.history_file, PathBuf::from("/srv/linai/history.log"));
    }

    #[test]
    fn test_provider_kind_round_trip_names() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.id().parse::<ProviderKind>().unwrap(), kind);
            assert!(kind.api_key_var().ends_with("_API_KEY"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("AI_PROVIDER"), OsString::from("groq")),
            (OsString::from("BROKEN_VALUE"), OsString::from_vec(vec![0x66, 0xff, 0x6f])),
            (OsString::from_vec(vec![0xfe, 0x41]), OsString::from("x")),
        ];

        let env = utf8_pairs(vars);
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("AI_PROVIDER").map(String::as_str), Some("groq"));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_survives_non_utf8_process_environment() {
        use std::os::unix::ffi::OsStrExt;

        let name = "LINAI_TEST_NON_UTF8_VALUE";
        std::env::set_var(name, std::ffi::OsStr::from_bytes(&[0x66, 0xff, 0x6f]));

        let env = process_environment();
        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings::load_with(env.clone(), AppPaths::in_dir(dir.path().to_path_buf()));

        std::env::remove_var(name);

        assert!(!env.contains_key(name));
        assert!(settings.is_ok());
    }

    #[test]
    fn test_load_with_reads_env_file_from_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = AppPaths::in_dir(dir.path().to_path_buf());
        fs::write(&paths.env_file, "AI_PROVIDER=anthropic\nAI_LANGUAGE=German\n").unwrap();

        let process: HashMap<String, String> = [("AI_LANGUAGE".to_string(), "French".to_string())].into();
        let settings = Settings::load_with(process, paths).unwrap();

        assert_eq!(settings.provider, Ok(ProviderKind::Anthropic));
        assert_eq!(settings.language, "French");
    }
}
