use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_WEATHER_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";

#[derive(Clone)]
pub struct Config {
    pub weather_api_key: String,
    pub weather_base_url: String,
    pub weather_content_type: String,
    pub weather_unit_group: String,
    pub redis_url: String,
    pub cache_ttl: Duration,
    pub origin_timeout: Duration,
    pub store_timeout: Duration,
    pub request_timeout: Duration,
    pub origin_max_retries: u32,
    pub origin_retry_base: Duration,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_ttl_secs: u64 = parse_or(&lookup, "CACHE_TTL_SECS", 24 * 60 * 60)?;
        if cache_ttl_secs == 0 {
            anyhow::bail!("CACHE_TTL_SECS must be greater than zero");
        }

        Ok(Config {
            weather_api_key: required(&lookup, "WEATHER_API_KEY")?,
            weather_base_url: lookup("WEATHER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_WEATHER_BASE_URL.to_string()),
            weather_content_type: lookup("WEATHER_CONTENT_TYPE")
                .unwrap_or_else(|| "json".to_string()),
            weather_unit_group: lookup("WEATHER_UNIT_GROUP")
                .unwrap_or_else(|| "metric".to_string()),
            redis_url: redis_url(&required(&lookup, "REDIS_ADDR")?),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            origin_timeout: Duration::from_secs(parse_or(&lookup, "ORIGIN_TIMEOUT_SECS", 10)?),
            store_timeout: Duration::from_millis(parse_or(&lookup, "STORE_TIMEOUT_MS", 500)?),
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?),
            origin_max_retries: parse_or(&lookup, "ORIGIN_MAX_RETRIES", 2)?,
            origin_retry_base: Duration::from_millis(parse_or(&lookup, "ORIGIN_RETRY_BASE_MS", 200)?),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        })
    }
}

// Credentials must never show up in logs, so Debug is written by hand.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("weather_api_key", &"<redacted>")
            .field("weather_base_url", &self.weather_base_url)
            .field("weather_content_type", &self.weather_content_type)
            .field("weather_unit_group", &self.weather_unit_group)
            .field("redis_url", &redact_password(&self.redis_url))
            .field("cache_ttl", &self.cache_ttl)
            .field("origin_timeout", &self.origin_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("origin_max_retries", &self.origin_max_retries)
            .field("origin_retry_base", &self.origin_retry_base)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

fn required<F>(lookup: &F, name: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} not set", name))
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid ({:?}): {}", name, raw, e)),
        None => Ok(default),
    }
}

/// Accepts either a full `redis://` URL or a bare `host:port`.
fn redis_url(addr: &str) -> String {
    let addr = addr.trim();
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("redis://{}", addr)
    }
}

/// Masks the password in a URL's userinfo, e.g. `redis://:secret@host`.
fn redact_password(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("redacted")).is_err() {
                return "<redacted>".to_string();
            }
            parsed.to_string()
        }
        Ok(_) => url.to_string(),
        Err(_) => "<unparseable>".to_string(),
    }
}
