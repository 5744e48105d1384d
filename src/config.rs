use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "ACADEMIA_WORKSPACE";
pub const LOG_LEVEL_ENV: &str = "ACADEMIA_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Workspace opened at start-up; clients may still call `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = lookup(WORKSPACE_ENV)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let log_level = lookup(LOG_LEVEL_ENV)
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "info".to_string());
        Self {
            workspace,
            log_level,
        }
    }
}

/// Loads `.env` from the working directory when present.
pub fn load_environment_variables() {
    // The logger is not up yet; report after init instead.
    let _ = dotenv::dotenv();
}

fn level_filter(level: &str) -> log::LevelFilter {
    match level {
        "off" => log::LevelFilter::Off,
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    }
}

/// stdout carries protocol lines only, so the logger writes to stderr.
pub fn initialize_logging(config: &AppConfig) {
    let _ = env_logger::Builder::new()
        .filter_level(level_filter(&config.log_level))
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp_secs()
        .format_module_path(false)
        .try_init();

    log::info!(
        "logging initialized: level={}, workspace={}",
        config.log_level,
        config
            .workspace
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
}
