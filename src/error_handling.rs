use colored::*;
use std::fmt;
use std::path::Path;

use crate::config::ProviderKind;
use crate::logging::{get_logger, LogCategory, LogContext};

/// Error with actionable suggestions, ready to be shown to the user
#[derive(Debug, Clone)]
pub struct UserFriendlyError {
    pub error_type: ErrorType,
    pub message: String,
    pub suggestions: Vec<String>,
    pub technical_details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Configuration,
    RateLimit,
    Authentication,
    Timeout,
    Connection,
    ModelNotFound,
    General,
}

impl ErrorType {
    fn icon(&self) -> &'static str {
        match self {
            ErrorType::Configuration => "⚙️",
            ErrorType::RateLimit => "🚦",
            ErrorType::Authentication => "🔐",
            ErrorType::Timeout => "⏱️",
            ErrorType::Connection => "🔌",
            ErrorType::ModelNotFound => "🔍",
            ErrorType::General => "❌",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ErrorType::Configuration => "Configuration Error",
            ErrorType::RateLimit => "Rate Limit Reached",
            ErrorType::Authentication => "Authentication Error",
            ErrorType::Timeout => "Timeout Error",
            ErrorType::Connection => "Connection Error",
            ErrorType::ModelNotFound => "Model Not Available",
            ErrorType::General => "Error",
        }
    }
}

impl UserFriendlyError {
    pub fn new(error_type: ErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            suggestions: Vec::new(),
            technical_details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions.extend(suggestions);
        self
    }

    pub fn with_technical_details(mut self, details: String) -> Self {
        self.technical_details = Some(details);
        self
    }

    /// Print the error with its suggestions to stderr and record it in the error log
    pub fn display(&self) {
        if let Ok(logger) = get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let context = LogContext::new()
                    .with_component("error_handling")
                    .with_operation("display_error")
                    .with_success(false);

                let category = match self.error_type {
                    ErrorType::Configuration => LogCategory::Configuration,
                    _ => LogCategory::Provider,
                };

                let detail = self.technical_details.as_deref().unwrap_or(&self.message);
                let _ = logger_guard.log_error(
                    category,
                    format!("{:?}: {}", self.error_type, detail),
                    Some(context),
                );
            }
        }

        eprintln!(
            "{} {}: {}",
            self.error_type.icon(),
            self.error_type.title().bold().red(),
            self.message
        );

        if !self.suggestions.is_empty() {
            eprintln!();
            eprintln!("{} {}", "💡".cyan(), "Suggested solutions:".bold().yellow());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", (i + 1).to_string().green(), suggestion);
            }
        }

        if let Some(details) = &self.technical_details {
            eprintln!();
            eprintln!("{} {}", "🔧".dimmed(), "Technical details:".dimmed());
            eprintln!("   {}", details.dimmed());
        }
    }
}

impl fmt::Display for UserFriendlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UserFriendlyError {}

/// Classify a failed provider call into a user-facing error.
///
/// Matching is done on the lowercased error text, first hit wins.
pub fn enhance_error(error: &anyhow::Error, provider: ProviderKind) -> UserFriendlyError {
    let error_msg = format!("{:#}", error).to_lowercase();
    let details = format!("{:#}", error);
    let key_var = provider.api_key_var();

    if error_msg.contains("quota")
        || error_msg.contains("rate limit")
        || error_msg.contains("rate_limit")
        || error_msg.contains("too many requests")
    {
        return UserFriendlyError::new(
            ErrorType::RateLimit,
            format!("The {} request limit has been reached", provider),
        )
        .with_suggestions(vec![
            "Wait a minute and try again".to_string(),
            "Check today's usage with: linai --status".to_string(),
            format!("See your quota at {}", provider.usage_url()),
            "Switch to another provider with AI_PROVIDER in your .env".to_string(),
        ])
        .with_technical_details(details);
    }

    if error_msg.contains("api_key")
        || error_msg.contains("api key")
        || error_msg.contains("invalid")
        || error_msg.contains("unauthorized")
    {
        return UserFriendlyError::new(
            ErrorType::Authentication,
            format!("{} rejected the API key", provider),
        )
        .with_suggestions(vec![
            format!("Check the value of {} in your .env", key_var),
            "Make sure the key has not been revoked or expired".to_string(),
            format!("Make sure AI_PROVIDER matches the key you configured ({})", provider),
        ])
        .with_technical_details(details);
    }

    if error_msg.contains("timed out") || error_msg.contains("timeout") {
        return UserFriendlyError::new(
            ErrorType::Timeout,
            "The request timed out while waiting for an answer".to_string(),
        )
        .with_suggestions(vec![
            "Try again, the provider might be temporarily busy".to_string(),
            "Raise AI_TIMEOUT (seconds) in your .env".to_string(),
            "Check your internet connection".to_string(),
        ])
        .with_technical_details(details);
    }

    if error_msg.contains("network") || error_msg.contains("connection") {
        return UserFriendlyError::new(
            ErrorType::Connection,
            format!("Unable to reach {}", provider),
        )
        .with_suggestions(vec![
            "Check your internet connection".to_string(),
            "Check proxy or firewall settings that might block HTTPS".to_string(),
            "Try again in a moment".to_string(),
        ])
        .with_technical_details(details);
    }

    if error_msg.contains("model") && error_msg.contains("not found") {
        return UserFriendlyError::new(
            ErrorType::ModelNotFound,
            format!("The configured model is not available on {}", provider),
        )
        .with_suggestions(vec![
            "List the models your key can use: linai --models".to_string(),
            format!("Set AI_MODEL in your .env, or remove it to use {}", provider.default_model()),
        ])
        .with_technical_details(details);
    }

    UserFriendlyError::new(
        ErrorType::General,
        format!("{} returned an unexpected error", provider),
    )
    .with_suggestions(vec![
        "Try the question again".to_string(),
        "Set AI_DEBUG=1 and check error.log in the config directory".to_string(),
    ])
    .with_technical_details(details)
}

/// Wrap a configuration failure with the remediation the user needs
pub fn configuration_error(error: &anyhow::Error, env_file: &Path) -> UserFriendlyError {
    let message = format!("{:#}", error);
    let lowered = message.to_lowercase();

    let key_var = ProviderKind::ALL
        .iter()
        .map(|p| p.api_key_var())
        .find(|var| message.contains(var));

    let mut err = UserFriendlyError::new(ErrorType::Configuration, message);

    if lowered.contains("_api_key") {
        let var = key_var.unwrap_or("GOOGLE_API_KEY");
        err = err.with_suggestions(vec![
            format!("Add a line {}=<your key> to {}", var, env_file.display()),
            format!("Or export {} in your shell", var),
        ]);
    } else if lowered.contains("not supported") {
        err = err.with_suggestion(format!(
            "Set AI_PROVIDER in {} to google, openai, anthropic or groq",
            env_file.display()
        ));
    } else {
        err = err.with_suggestion(format!("Review the settings in {}", env_file.display()));
    }

    err
}

/// Display success messages with consistent formatting
pub fn display_success(message: &str) {
    println!("{} {}", "✅".green(), message);
}

/// Display warning messages with consistent formatting
pub fn display_warning(message: &str) {
    println!("{} {}", "⚠️".yellow(), message.yellow());
}

/// Display info messages with consistent formatting
pub fn display_info(message: &str) {
    println!("{} {}", "💡".cyan(), message.dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::path::PathBuf;

    fn classify(text: &str) -> UserFriendlyError {
        enhance_error(&anyhow!(text.to_string()), ProviderKind::Google)
    }

    #[test]
    fn test_user_friendly_error_builders() {
        let error = UserFriendlyError::new(ErrorType::General, "Broken".to_string())
            .with_suggestion("Try this".to_string())
            .with_suggestions(vec!["Or this".to_string()])
            .with_technical_details("details".to_string());

        assert_eq!(error.suggestions, vec!["Try this", "Or this"]);
        assert_eq!(error.technical_details, Some("details".to_string()));
        assert_eq!(format!("{}", error), "Broken");
    }

    #[test]
    fn test_rate_limit() {
        let enhanced = classify("Google rate limit or quota exceeded (HTTP 429): Resource exhausted");
        assert_eq!(enhanced.error_type, ErrorType::RateLimit);
        assert!(enhanced.suggestions.iter().any(|s| s.contains("aistudio.google.com")));
    }

    #[test]
    fn test_generate_is_not_mistaken_for_rate() {
        let enhanced = classify("failed to generate a reply");
        assert_eq!(enhanced.error_type, ErrorType::General);
    }

    #[test]
    fn test_authentication() {
        assert_eq!(classify("API key not valid. Please pass a valid API key.").error_type, ErrorType::Authentication);
        assert_eq!(classify("OpenAI rejected the API key: unauthorized (HTTP 401)").error_type, ErrorType::Authentication);
        assert_eq!(classify("invalid x-api-key").error_type, ErrorType::Authentication);

        let enhanced = enhance_error(&anyhow!("unauthorized"), ProviderKind::Groq);
        assert!(enhanced.suggestions[0].contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_quota_wins_over_authentication() {
        let enhanced = classify("quota exceeded for this api key");
        assert_eq!(enhanced.error_type, ErrorType::RateLimit);
    }

    #[test]
    fn test_timeout() {
        let enhanced = classify("Request to Google timed out: operation timed out");
        assert_eq!(enhanced.error_type, ErrorType::Timeout);
        assert!(enhanced.message.contains("timed out"));
    }

    #[test]
    fn test_connection() {
        let enhanced = classify("Network error: connection to Groq failed: dns error");
        assert_eq!(enhanced.error_type, ErrorType::Connection);
    }

    #[test]
    fn test_model_not_found() {
        let enhanced = classify("Google model 'gemini-9' not found (HTTP 404)");
        assert_eq!(enhanced.error_type, ErrorType::ModelNotFound);
        assert!(enhanced.suggestions.iter().any(|s| s.contains("--models")));
    }

    #[test]
    fn test_general_fallback() {
        let enhanced = classify("Anthropic returned HTTP 500: overloaded");
        assert_eq!(enhanced.error_type, ErrorType::General);
        assert_eq!(
            enhanced.technical_details.as_deref(),
            Some("Anthropic returned HTTP 500: overloaded")
        );
    }

    #[test]
    fn test_configuration_error_for_missing_key() {
        let env_file = PathBuf::from("/home/u/.config/linai/.env");
        let err = configuration_error(&anyhow!("OPENAI_API_KEY is not configured"), &env_file);

        assert_eq!(err.error_type, ErrorType::Configuration);
        assert!(err.suggestions[0].contains("OPENAI_API_KEY=<your key>"));
        assert!(err.suggestions[0].contains("/home/u/.config/linai/.env"));
    }

    #[test]
    fn test_configuration_error_keeps_message_and_names_variable() {
        let env_file = PathBuf::from("/srv/linai/.env");
        let err = configuration_error(
            &anyhow!("ANTHROPIC_API_KEY is not configured: the value is too short to be a real key"),
            &env_file,
        );

        assert_eq!(
            err.message,
            "ANTHROPIC_API_KEY is not configured: the value is too short to be a real key"
        );
        assert!(err.suggestions[0].starts_with("Add a line ANTHROPIC_API_KEY=<your key> to /srv/linai/.env"));
        assert_eq!(err.suggestions[1], "Or export ANTHROPIC_API_KEY in your shell");
    }

    #[test]
    fn test_configuration_error_for_unknown_provider() {
        let env_file = PathBuf::from("/tmp/.env");
        let err = configuration_error(
            &anyhow!("Provider 'mistral' is not supported. Use one of: google, openai, anthropic, groq"),
            &env_file,
        );
        assert!(err.suggestions[0].contains("AI_PROVIDER"));
    }

    #[test]
    fn test_display_does_not_panic_without_logger() {
        classify("something odd").display();
    }
}
