use anyhow::{Result, anyhow};

/// Runtime configuration for the leadgate gateway.
///
/// All values come from the environment; `main` loads a `.env` file first so
/// local runs work without exporting anything. Secrets never travel through
/// CLI flags — the listen address is a flag on `serve`, everything else
/// lives here.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the hosted platform, without the `/rest/v1` suffix.
    pub platform_url: String,
    /// Service-role key sent as both `apikey` and bearer token.
    pub platform_service_key: String,
    pub platform_timeout_secs: u64,
    /// Shared webhook token; `None` leaves the endpoints open.
    pub webhook_token: Option<String>,
    /// Country code prepended to national phone numbers.
    pub default_country_code: String,
    pub automation_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Tests pass a closure over a map instead of mutating the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let platform_url = required(&lookup, "PLATFORM_URL")?
            .trim_end_matches('/')
            .to_string();
        let platform_service_key = required(&lookup, "PLATFORM_SERVICE_KEY")?;
        let platform_timeout_secs = seconds(&lookup, "PLATFORM_TIMEOUT_SECS", 10)?;
        let webhook_token = optional(&lookup, "WEBHOOK_TOKEN");
        let default_country_code =
            optional(&lookup, "DEFAULT_COUNTRY_CODE").unwrap_or_else(|| "55".to_string());
        let automation_timeout_secs = seconds(&lookup, "AUTOMATION_TIMEOUT_SECS", 5)?;

        Ok(Self {
            platform_url,
            platform_service_key,
            platform_timeout_secs,
            webhook_token,
            default_country_code,
            automation_timeout_secs,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| anyhow!("{key} is not set; export it or add it to .env"))
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| anyhow!("{key} must be a whole number of seconds (got {raw:?})")),
    }
}
