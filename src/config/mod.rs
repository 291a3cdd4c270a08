use std::env;
use std::fmt;
use std::path::PathBuf;
use anyhow::{Result, Context};
use tracing::{info, warn};

pub const DEFAULT_LLM_MODEL: &str = "qwen-max-longcontext";
pub const DEFAULT_LLM_API_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Room for multipart boundaries, part headers and small form fields on
/// top of the file payloads themselves.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_file_size_mb: usize,
    pub max_file_uploads: usize,
    pub max_concurrent_requests: usize,
    pub request_timeout_seconds: u64,
    pub max_prompt_chars: usize,
    pub llm: LlmConfig,
    pub templates_dir: Option<PathBuf>,
    pub static_index_path: PathBuf,
}

/// Settings handed to the LLM gateway client when it is built.
#[derive(Clone)]
pub struct LlmConfig {
    pub model: String,
    pub api_base_url: String,
    /// Explicit proxy for outbound model calls. Takes precedence over the
    /// system proxy variables.
    pub proxy: Option<String>,
    pub use_system_proxy: bool,
    pub timeout_seconds: u64,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("proxy", &self.proxy.as_deref().map(redact_proxy))
            .field("use_system_proxy", &self.use_system_proxy)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Masks any `user:password@` credentials in a proxy URL so it can be logged.
pub fn redact_proxy(proxy: &str) -> String {
    match reqwest::Url::parse(proxy) {
        Ok(mut url) => {
            if !url.username().is_empty() || url.password().is_some() {
                let _ = url.set_password(None);
                let _ = url.set_username("***");
            }
            url.to_string()
        }
        Err(_) => "<unparseable proxy url>".to_string(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            max_file_size_mb: 20,
            max_file_uploads: 5,
            max_concurrent_requests: 16,
            request_timeout_seconds: 300,
            max_prompt_chars: 35_000,
            llm: LlmConfig {
                model: DEFAULT_LLM_MODEL.to_string(),
                api_base_url: DEFAULT_LLM_API_BASE_URL.to_string(),
                proxy: None,
                use_system_proxy: true,
                timeout_seconds: 300,
            },
            templates_dir: None,
            static_index_path: PathBuf::from("static/index.html"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        let defaults = Config::default();

        let request_timeout_seconds = Self::parse_env_var("REQUEST_TIMEOUT_SECONDS", defaults.request_timeout_seconds)
            .context("Failed to parse REQUEST_TIMEOUT_SECONDS")?;

        let config = Config {
            server_host: Self::string_env_var("SERVER_HOST", &defaults.server_host),
            server_port: Self::parse_env_var("SERVER_PORT", defaults.server_port)
                .context("Failed to parse SERVER_PORT")?,
            max_file_size_mb: Self::parse_env_var("MAX_FILE_SIZE_MB", defaults.max_file_size_mb)
                .context("Failed to parse MAX_FILE_SIZE_MB")?,
            max_file_uploads: Self::parse_env_var("MAX_FILE_UPLOADS", defaults.max_file_uploads)
                .context("Failed to parse MAX_FILE_UPLOADS")?,
            max_concurrent_requests: Self::parse_env_var("MAX_CONCURRENT_REQUESTS", defaults.max_concurrent_requests)
                .context("Failed to parse MAX_CONCURRENT_REQUESTS")?,
            request_timeout_seconds,
            max_prompt_chars: Self::parse_env_var("MAX_PROMPT_CHARS", defaults.max_prompt_chars)
                .context("Failed to parse MAX_PROMPT_CHARS")?,
            llm: LlmConfig {
                model: Self::string_env_var("LLM_MODEL", &defaults.llm.model),
                api_base_url: Self::string_env_var("LLM_API_BASE_URL", &defaults.llm.api_base_url),
                proxy: env::var("LLM_PROXY").ok().filter(|p| !p.trim().is_empty()),
                use_system_proxy: Self::parse_env_var("LLM_USE_SYSTEM_PROXY", defaults.llm.use_system_proxy)
                    .context("Failed to parse LLM_USE_SYSTEM_PROXY")?,
                timeout_seconds: request_timeout_seconds,
            },
            templates_dir: env::var("PROMPT_TEMPLATES_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
            static_index_path: env::var("STATIC_INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_index_path),
        };

        config.validate()?;

        match &config.llm.proxy {
            Some(proxy) => info!("LLM calls will use explicit proxy: {}", redact_proxy(proxy)),
            None if config.llm.use_system_proxy => info!("LLM calls will honour system proxy variables"),
            None => info!("LLM calls will connect directly"),
        }

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    /// Port to bind: Railway-style `PORT` overrides `SERVER_PORT`.
    pub fn bind_port(&self) -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(self.server_port)
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Body limit for one request carrying the maximum number of files,
    /// each at the size limit, plus multipart framing.
    pub fn max_body_bytes(&self) -> usize {
        self.max_file_size_bytes() * self.max_file_uploads + MULTIPART_OVERHEAD_BYTES
    }

    fn string_env_var(var_name: &str, default: &str) -> String {
        env::var(var_name).unwrap_or_else(|_| {
            info!("{} not set, using default: {}", var_name, default);
            default.to_string()
        })
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {} (using default: {:?})", var_name, e, default);
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must be greater than 0"));
        }
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_file_uploads == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_UPLOADS must be greater than 0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_REQUESTS must be greater than 0"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("REQUEST_TIMEOUT_SECONDS must be greater than 0"));
        }
        if self.max_prompt_chars == 0 {
            return Err(anyhow::anyhow!("MAX_PROMPT_CHARS must be greater than 0"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(anyhow::anyhow!("LLM_MODEL must not be empty"));
        }
        Ok(())
    }
}
