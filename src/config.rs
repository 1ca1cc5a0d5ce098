use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    pub api_base_url: String,
    pub cookies: String,
    pub debounce: Duration,
    pub keepalive_timeout: Duration,
    pub bind_addr: String,
    /// Sessions without any viewer event for this long are unloaded.
    pub session_idle_timeout: Duration,
}

const DEFAULT_DEBOUNCE_MS: u64 = 800;
const DEFAULT_KEEPALIVE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 1800;

impl Config {
    pub fn load() -> Self {
        let api_base_url = std::env::var("STUDYDOCS_API_URL").unwrap_or_default();
        let cookies = std::env::var("STUDYDOCS_COOKIES").unwrap_or_default();
        let debounce_ms = env_u64("PROGRESS_DEBOUNCE_MS").unwrap_or(DEFAULT_DEBOUNCE_MS);
        let keepalive_secs =
            env_u64("KEEPALIVE_TIMEOUT_SECS").unwrap_or(DEFAULT_KEEPALIVE_TIMEOUT_SECS);
        let bind_addr = std::env::var("BRIDGE_BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.into());
        let idle_secs =
            env_u64("SESSION_IDLE_TIMEOUT_SECS").unwrap_or(DEFAULT_SESSION_IDLE_TIMEOUT_SECS);
        Config {
            api_base_url,
            cookies,
            debounce: Duration::from_millis(debounce_ms),
            keepalive_timeout: Duration::from_secs(keepalive_secs),
            bind_addr,
            session_idle_timeout: Duration::from_secs(idle_secs),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api_base_url.is_empty() {
            return Err("STUDYDOCS_API_URL is missing".into());
        }
        if self.debounce.is_zero() {
            return Err("PROGRESS_DEBOUNCE_MS must be greater than zero".into());
        }
        if self.session_idle_timeout.is_zero() {
            return Err("SESSION_IDLE_TIMEOUT_SECS must be greater than zero".into());
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(%key, value = %raw, error = %e, "ignoring unparsable setting");
            None
        }
    }
}
