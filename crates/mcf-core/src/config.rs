use std::{env, fs, path::Path, str::FromStr, time::Duration};

use crate::{domain::GuildId, errors::Error, Result};

const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v9";

/// What to do with an id whose fetch failed for an unknown reason.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownErrorPolicy {
    /// Cache the id as attempted so it is never retried this session.
    #[default]
    FailOpen,
    /// Leave the id eligible for the next hover.
    LeaveUnresolved,
}

impl FromStr for UnknownErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-open" | "cache" => Ok(Self::FailOpen),
            "leave-unresolved" | "retry" => Ok(Self::LeaveUnresolved),
            other => Err(Error::Config(format!(
                "unknown MCF_UNKNOWN_ERROR_POLICY value: {other}"
            ))),
        }
    }
}

/// The part of the configuration the engine itself consumes.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub unknown_error_policy: UnknownErrorPolicy,
    /// Refuse network work until a 429's retry-after hint has elapsed.
    pub honor_retry_after: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unknown_error_policy: UnknownErrorPolicy::FailOpen,
            honor_retry_after: true,
        }
    }
}

/// Typed configuration for a host process.
#[derive(Clone, Debug)]
pub struct Config {
    pub token: String,
    pub api_base_url: String,
    pub guild_id: Option<GuildId>,
    pub engine: EngineConfig,

    // HTTP transport
    pub request_timeout: Duration,
    pub global_min_interval: Duration,
    pub guild_min_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let token = env_str("MCF_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("MCF_TOKEN environment variable is required".to_string())
        })?;

        let api_base_url = env_str("MCF_API_BASE_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let guild_id = env_str("MCF_GUILD_ID").and_then(non_empty).map(GuildId);

        let unknown_error_policy = match env_str("MCF_UNKNOWN_ERROR_POLICY").and_then(non_empty) {
            Some(v) => v.parse()?,
            None => UnknownErrorPolicy::default(),
        };
        let honor_retry_after = env_bool("MCF_HONOR_RETRY_AFTER").unwrap_or(true);

        let request_timeout =
            Duration::from_millis(env_u64("MCF_REQUEST_TIMEOUT_MS").unwrap_or(10_000));
        let global_min_interval =
            Duration::from_millis(env_u64("MCF_GLOBAL_MIN_INTERVAL_MS").unwrap_or(250));
        let guild_min_interval =
            Duration::from_millis(env_u64("MCF_GUILD_MIN_INTERVAL_MS").unwrap_or(500));

        Ok(Self {
            token,
            api_base_url,
            guild_id,
            engine: EngineConfig {
                unknown_error_policy,
                honor_retry_after,
            },
            request_timeout,
            global_min_interval,
            guild_min_interval,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
