use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

pub const ALGORITHM_HMAC_SHA256: &str = "hmac-sha256";
pub const ALGORITHM_ARGON2: &str = "argon2";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Where record files live. `data_dir` is the store root; each collection
/// becomes a subdirectory of it.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_password_algorithm")]
    pub password_algorithm: String,
    #[serde(default)]
    pub hashing_secret: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { password_algorithm: default_password_algorithm(), hashing_secret: String::new() }
    }
}

fn is_missing_file(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

fn default_data_dir() -> String { ".data".into() }
fn default_password_algorithm() -> String { ALGORITHM_HMAC_SHA256.into() }

/// `CONFIG_PATH`, or `config.toml` in the working directory.
pub fn default_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Config file when present, otherwise defaults filled from env vars.
    pub fn load_or_env() -> Result<Self> {
        let mut cfg = Self::read_or_env(&default_path())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Only a missing file falls back to env; a file that exists must parse.
    fn read_or_env(path: &str) -> Result<Self> {
        match load_from_file(path) {
            Ok(cfg) => Ok(cfg),
            Err(e) if is_missing_file(&e) => Ok(Self::from_env()),
            Err(e) => Err(e.context(format!("failed to load config file {path}"))),
        }
    }

    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(host) = std::env::var("SERVER_HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            cfg.server.port = port;
        }
        cfg.server.worker_threads = std::env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .or(cfg.server.worker_threads);
        cfg
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.normalize_from_env();
        self.storage.validate()?;
        self.security.normalize_from_env();
        self.security.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl StorageConfig {
    pub fn normalize_from_env(&mut self) {
        if let Ok(dir) = std::env::var("DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = dir;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir is empty; set it in config.toml or DATA_DIR"));
        }
        Ok(())
    }
}

impl SecurityConfig {
    pub fn normalize_from_env(&mut self) {
        if self.hashing_secret.trim().is_empty() {
            if let Ok(secret) = std::env::var("HASHING_SECRET") {
                self.hashing_secret = secret;
            }
        }
        if let Ok(algo) = std::env::var("PASSWORD_ALGORITHM") {
            if !algo.trim().is_empty() {
                self.password_algorithm = algo;
            }
        }
        self.password_algorithm = self.password_algorithm.trim().to_lowercase();
    }

    pub fn validate(&self) -> Result<()> {
        match self.password_algorithm.as_str() {
            ALGORITHM_HMAC_SHA256 => {
                if self.hashing_secret.trim().is_empty() {
                    return Err(anyhow!(
                        "security.hashing_secret is required for {ALGORITHM_HMAC_SHA256}; set it in config.toml or HASHING_SECRET"
                    ));
                }
                Ok(())
            }
            ALGORITHM_ARGON2 => Ok(()),
            other => Err(anyhow!("security.password_algorithm `{other}` is not supported")),
        }
    }
}
