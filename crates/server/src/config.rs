use herald_shared::constants::*;
use std::collections::HashSet;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub discord_token: String,
    pub default_channel_id: Option<String>,
    pub api_key_hash: String,
    pub api_key_salt: String,
    pub cors_origins: Vec<String>,
    pub dispatch_interval_secs: u64,
    pub sync_chunk_size: usize,
    pub sync_pacing_ms: u64,
    pub sync_retry_attempts: u32,
    pub sync_retry_base_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let port = parse_var("PORT", 3000);

        let extra: Vec<Option<String>> = ["BACKEND_URL", "FRONTEND_URL"]
            .iter()
            .map(|var| env::var(var).ok())
            .collect();
        let cors_origins = collect_origins(&env::var("CORS_ORIGINS").unwrap_or_default(), port, &extra);

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./herald.db".into()),
            discord_token: env::var("DISCORD_TOKEN").expect("DISCORD_TOKEN must be set"),
            default_channel_id: env::var("DEFAULT_CHANNEL_ID")
                .ok()
                .filter(|id| !id.is_empty()),
            api_key_hash: env::var("API_KEY").expect("API_KEY must be set"),
            api_key_salt: env::var("API_KEY_SALT").expect("API_KEY_SALT must be set"),
            cors_origins,
            dispatch_interval_secs: parse_var("DISPATCH_INTERVAL_SECS", DISPATCH_INTERVAL_SECS),
            sync_chunk_size: parse_var("SYNC_CHUNK_SIZE", SYNC_CHUNK_SIZE).max(1),
            sync_pacing_ms: parse_var("SYNC_PACING_MS", SYNC_PACING_MS),
            sync_retry_attempts: parse_var("SYNC_RETRY_ATTEMPTS", SYNC_RETRY_ATTEMPTS).max(1),
            sync_retry_base_ms: parse_var("SYNC_RETRY_BASE_MS", SYNC_RETRY_BASE_MS),
        }
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs.max(1))
    }
}

/// CORS allow-list: the comma-separated `configured` origins, the local
/// frontends, then any non-empty `extra` URLs. Later repeats are dropped.
fn collect_origins(configured: &str, port: u16, extra: &[Option<String>]) -> Vec<String> {
    let mut origins: Vec<String> = configured
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    origins.push(format!("http://localhost:{}", port));
    origins.push("http://localhost:3000".into());
    origins.extend(extra.iter().flatten().filter(|url| !url.is_empty()).cloned());

    let mut seen = HashSet::new();
    origins.retain(|o| seen.insert(o.clone()));
    origins
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
