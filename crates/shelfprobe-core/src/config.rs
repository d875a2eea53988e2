use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed, or if the
/// settle bounds are inverted.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can feed a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
        }
    };

    let env = parse_environment(&or_default("SHELFPROBE_ENV", "development"))?;
    let log_level = or_default("SHELFPROBE_LOG_LEVEL", "info");

    let max_steps = parse_u32("SHELFPROBE_MAX_STEPS", "10")?;
    if max_steps == 0 {
        return Err(invalid("SHELFPROBE_MAX_STEPS", "must be at least 1".into()));
    }

    let min_settle_ms = parse_u64("SHELFPROBE_MIN_SETTLE_MS", "300")?;
    let max_settle_ms = parse_u64("SHELFPROBE_MAX_SETTLE_MS", "1000")?;
    if min_settle_ms > max_settle_ms {
        return Err(invalid(
            "SHELFPROBE_MIN_SETTLE_MS",
            format!("{min_settle_ms} exceeds SHELFPROBE_MAX_SETTLE_MS ({max_settle_ms})"),
        ));
    }

    let run_timeout_secs = parse_u64("SHELFPROBE_RUN_TIMEOUT_SECS", "120")?;
    let request_timeout_secs = parse_u64("SHELFPROBE_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("SHELFPROBE_USER_AGENT", "shelfprobe/0.1 (price-survey)");
    let respect_robots = parse_bool("SHELFPROBE_RESPECT_ROBOTS", "true")?;
    let max_concurrent_runs = parse_usize("SHELFPROBE_MAX_CONCURRENT_RUNS", "1")?;
    let dismiss_consent = parse_bool("SHELFPROBE_DISMISS_CONSENT", "false")?;

    Ok(AppConfig {
        env,
        log_level,
        max_steps,
        min_settle_ms,
        max_settle_ms,
        run_timeout_secs,
        request_timeout_secs,
        user_agent,
        respect_robots,
        max_concurrent_runs,
        dismiss_consent,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than the three
/// known environment names.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHELFPROBE_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
