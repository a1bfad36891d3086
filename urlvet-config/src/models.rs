//! Configuration models, one struct per concern.

/// Development-only fallback signing key. Startup emits a warning when
/// it is in effect; production deployments must set `JWT_SECRET`.
pub const DEFAULT_JWT_SECRET: &str = "urlvet-dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub worker: WorkerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub token_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_secs: 86_400,
        }
    }
}

/// External scanning provider connection settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://urlscan.io/api/v1".to_string(),
            api_key: String::new(),
            max_retries: 3,
            retry_initial_delay_ms: 5_000,
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Window in which earlier scans satisfy dedup/cache lookups.
    pub ttl_hours: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

/// Batch worker pass scheduling and sizing.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub submission_delay_ms: u64,
    pub result_delay_ms: u64,
    pub submission_batch_size: usize,
    pub result_batch_size: usize,
    pub per_user_batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            submission_delay_ms: 10_000,
            result_delay_ms: 15_000,
            submission_batch_size: 100,
            result_batch_size: 100,
            per_user_batch_size: 5,
        }
    }
}
