use chrono::Local;
use clap::{CommandFactory, Parser};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;

use linai::clipboard::copy_to_clipboard;
use linai::config::{process_environment, AppPaths, ProviderConfig, ProviderKind, Settings, CONFIG_DIR_VAR};
use linai::context::{build_system_instruction, load_user_context};
use linai::error_handling::{
    configuration_error, display_info, display_success, display_warning, enhance_error,
};
use linai::execution::confirm_and_run;
use linai::extraction::extract_command;
use linai::history::HistoryStore;
use linai::logging::{get_logger, init_logger, LogCategory};
use linai::os_context::SystemSnapshot;
use linai::providers::{ask, build_provider, known_limits, AIProvider};
use linai::spinner::with_spinner;
use linai::{log_debug, log_error};

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 1;
const EXIT_PROVIDER_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "linai")]
#[command(version)]
#[command(
    about = "🐧 linai: ask how to do something on Linux",
    long_about = "Sends your question to a language model, shows the answer and pulls out the shell command so you can copy or run it."
)]
struct Cli {
    /// Your question, no quotes needed (flags may come before or after it)
    question: Vec<String>,

    /// Offer to run the suggested command after confirmation
    #[arg(short = 'x', long)]
    execute: bool,

    /// Copy the suggested command to the clipboard
    #[arg(short, long)]
    copy: bool,

    /// Show recent questions
    #[arg(long)]
    history: bool,

    /// Number of history entries to show
    #[arg(short = 'n', default_value_t = 10, requires = "history")]
    count: usize,

    /// Show provider, model, known limits and today's usage
    #[arg(long)]
    status: bool,

    /// List the models available for the configured key
    #[arg(long)]
    models: bool,
}

impl Cli {
    fn wants_help(&self) -> bool {
        self.question.is_empty() && !self.history && !self.status && !self.models
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.wants_help() {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    }

    let process_env = process_environment();
    let paths = match AppPaths::resolve(&process_env) {
        Ok(paths) => paths,
        Err(e) => {
            let hint = PathBuf::from(format!("${}/.env", CONFIG_DIR_VAR));
            configuration_error(&e, &hint).display();
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let settings = match Settings::load_with(process_env, paths.clone()) {
        Ok(settings) => settings,
        Err(e) => {
            configuration_error(&e, &paths.env_file).display();
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if let Err(e) = init_logger(settings.paths.log_file.clone(), settings.debug_logging) {
        eprintln!("{} Failed to initialize logger: {}", "Warning:".yellow(), e);
    }

    if let Ok(logger) = get_logger() {
        if let Ok(logger_guard) = logger.lock() {
            let provider = settings
                .provider
                .as_ref()
                .map(|p| p.id())
                .unwrap_or("unsupported");
            let _ = logger_guard.log_startup(env!("CARGO_PKG_VERSION"), provider);
        }
    }

    let timeout = settings.request_timeout;
    let code = run(&cli, &settings, |config: &ProviderConfig| build_provider(config, timeout)).await;
    ExitCode::from(code)
}

/// Dispatch one invocation and return its exit code.
///
/// The provider is only built once the configuration has been validated.
async fn run<F>(cli: &Cli, settings: &Settings, make_provider: F) -> u8
where
    F: Fn(&ProviderConfig) -> Box<dyn AIProvider>,
{
    let history = HistoryStore::new(settings.paths.history_file.clone());

    if cli.history {
        show_history(&history, cli.count);
        return EXIT_OK;
    }

    if cli.status {
        show_status(settings, &history);
        return EXIT_OK;
    }

    let provider_config = match settings.provider_config() {
        Ok(config) => config,
        Err(e) => {
            log_error!(LogCategory::Configuration, format!("{:#}", e));
            configuration_error(&e, &settings.paths.env_file).display();
            return EXIT_CONFIG_ERROR;
        }
    };

    let provider = make_provider(&provider_config);

    if cli.models {
        return show_models(provider.as_ref(), provider_config.provider).await;
    }

    let question = cli.question.join(" ");
    answer_question(
        settings,
        provider.as_ref(),
        provider_config.provider,
        &history,
        &question,
        cli.copy,
        cli.execute,
    )
    .await
}

async fn answer_question(
    settings: &Settings,
    provider: &dyn AIProvider,
    provider_kind: ProviderKind,
    history: &HistoryStore,
    question: &str,
    copy: bool,
    execute: bool,
) -> u8 {
    let snapshot = SystemSnapshot::collect(&settings.env);
    let user_context = load_user_context(&settings.paths.context_file);
    let instruction = build_system_instruction(&snapshot, &user_context, &settings.language);
    log_debug!(
        LogCategory::System,
        format!("System instruction is {} characters", instruction.chars().count())
    );

    let reply = match with_spinner("Thinking...", ask(provider, question, &instruction)).await {
        Ok(reply) => reply,
        Err(e) => {
            enhance_error(&e, provider_kind).display();
            return EXIT_PROVIDER_ERROR;
        }
    };

    println!("\n{} {}\n", "❯".cyan().bold(), reply.trim());
    history.append(question, &reply);

    let Some(command) = extract_command(&reply) else {
        if copy || execute {
            display_info("No command found in the answer");
        }
        return EXIT_OK;
    };

    if copy {
        if copy_to_clipboard(&command) {
            display_success("Copied to clipboard");
        } else {
            display_warning("Could not copy: install wl-clipboard (Wayland) or xclip (X11)");
        }
    }

    if execute {
        if let Err(e) = confirm_and_run(&command) {
            log_error!(LogCategory::Execution, format!("{:#}", e));
            display_warning(&format!("Could not run the command: {}", e));
        }
    }

    EXIT_OK
}

fn show_history(history: &HistoryStore, count: usize) {
    let entries = match history.read_recent(count) {
        Ok(entries) => entries,
        Err(e) => {
            display_warning(&format!("Could not read history: {}", e));
            return;
        }
    };

    if entries.is_empty() {
        display_info("No history yet");
        return;
    }

    println!("{}", format!("📜 Last {} questions", entries.len()).bold().cyan());
    for entry in entries {
        println!();
        println!("{} {}", format!("[{}]", entry.timestamp).dimmed(), entry.question.bold());
        println!("  {} {}", "→".cyan(), entry.answer_excerpt);
    }
}

fn show_status(settings: &Settings, history: &HistoryStore) {
    println!("{}", "📊 linai status".bold().cyan());

    let provider = match settings.provider_kind() {
        Ok(provider) => provider,
        Err(e) => {
            display_warning(&e.to_string());
            return;
        }
    };

    let key_state = if settings.provider_config().is_ok() {
        "configured".green()
    } else {
        "missing".red()
    };

    let (rpm, rpd) = match known_limits(&settings.model) {
        Some((rpm, rpd)) => (rpm.to_string(), rpd.to_string()),
        None => ("?".to_string(), "?".to_string()),
    };

    println!("  {}: {}", "Provider".bold(), provider.id().green());
    println!("  {}: {}", "Model".bold(), settings.model.green());
    println!("  {}: {} ({})", "API key".bold(), key_state, provider.api_key_var().dimmed());
    println!("  {}: {} per minute, {} per day", "Free-tier limits".bold(), rpm, rpd);
    println!(
        "  {}: {}",
        "Requests today (local count)".bold(),
        history.count_on(Local::now())
    );
    println!("  {}: {}", "Config".bold(), settings.paths.env_file.display().to_string().dimmed());
    println!();
    display_info(&format!("Real usage: {}", provider.usage_url()));
}

async fn show_models(provider: &dyn AIProvider, provider_kind: ProviderKind) -> u8 {
    let models = match with_spinner("Fetching models...", provider.list_models()).await {
        Ok(models) => models,
        Err(e) => {
            enhance_error(&e, provider_kind).display();
            return EXIT_PROVIDER_ERROR;
        }
    };

    if models.is_empty() {
        display_info(&format!("{} reported no models for this key", provider.get_name()));
        return EXIT_OK;
    }

    println!("{}", format!("Models available on {}:", provider.get_name()).bold().cyan());
    for model in &models {
        let marker = if model == provider.model() { "●".green() } else { "○".dimmed() };
        let limits = known_limits(model)
            .map(|(rpm, rpd)| format!("{} RPM, {} RPD", rpm, rpd).dimmed().to_string())
            .unwrap_or_default();
        println!("  {} {} {}", marker, model, limits);
    }
    println!();
    display_info("Pick one with AI_MODEL in your .env");

    EXIT_OK
}
