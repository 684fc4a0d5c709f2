use anyhow::Result;
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use validator::{Validate, ValidationError};

/// Command-line overrides, named after the runner flags the container passes
#[derive(Debug, Clone, Parser)]
#[command(name = "comtrade-viewer", version, about = "COMTRADE disturbance record viewer")]
pub struct Cli {
    /// Configuration file
    #[arg(long, env = "COMTRADE_CONFIG", default_value = "config/default.toml")]
    pub config: PathBuf,

    #[arg(long = "server.port")]
    pub server_port: Option<u16>,

    #[arg(long = "server.address")]
    pub server_address: Option<String>,

    #[arg(long = "server.headless")]
    pub server_headless: Option<bool>,

    #[arg(long = "server.enableCORS")]
    pub server_enable_cors: Option<bool>,

    #[arg(long = "server.enableXsrfProtection")]
    pub server_enable_xsrf_protection: Option<bool>,

    /// Upload limit in megabytes
    #[arg(long = "server.maxUploadSize")]
    pub server_max_upload_size: Option<u64>,

    #[arg(long = "browser.gatherUsageStats")]
    pub browser_gather_usage_stats: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    #[validate(nested)]
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    pub address: String,
    #[validate(range(min = 1))]
    pub port: u16,
    /// Do not announce a browser URL on startup
    pub headless: bool,
    pub enable_cors: bool,
    pub enable_xsrf_protection: bool,
    /// Upload limit (MB)
    #[validate(range(min = 1, max = 10_000))]
    pub max_upload_size: u64,
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 8501,
            headless: false,
            enable_cors: true,
            enable_xsrf_protection: true,
            max_upload_size: 200,
            request_timeout_secs: 120,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.address, self.port).parse()?)
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size as usize).saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Accepted for compatibility; no usage statistics are ever sent
    pub gather_usage_stats: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_frequency_axis"))]
pub struct ViewerConfig {
    /// Nominal system frequency, sets the RMS window to one cycle
    #[validate(range(min = 1.0, max = 1000.0))]
    pub nominal_frequency_hz: f64,
    /// Preferred index of the frequency reference channel
    pub frequency_reference_index: usize,
    pub default_analog_channels: usize,
    pub default_digital_channels: usize,
    pub frequency_axis_min: f64,
    pub frequency_axis_max: f64,
    /// Processed recordings kept in memory
    #[validate(range(min = 1))]
    pub cache_capacity: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            nominal_frequency_hz: 50.0,
            frequency_reference_index: 4,
            default_analog_channels: 3,
            default_digital_channels: 8,
            frequency_axis_min: 48.0,
            frequency_axis_max: 52.0,
            cache_capacity: 16,
        }
    }
}

fn validate_frequency_axis(viewer: &ViewerConfig) -> Result<(), ValidationError> {
    if viewer.frequency_axis_min < viewer.frequency_axis_max {
        Ok(())
    } else {
        Err(ValidationError::new("frequency_axis_range"))
    }
}

const SERVER_KEYS: &[&str] = &[
    "address",
    "port",
    "headless",
    "enable_cors",
    "enable_xsrf_protection",
    "max_upload_size",
    "request_timeout_secs",
];

const BROWSER_KEYS: &[&str] = &["gather_usage_stats"];

/// Map `ENABLECORS`, `enable_cors` or `enableCORS` onto the field name
fn canonical_key(known: &[&str], raw: &str) -> String {
    let squashed = raw.replace('_', "").to_ascii_lowercase();
    known
        .iter()
        .find(|k| k.replace('_', "") == squashed)
        .map(|k| k.to_string())
        .unwrap_or_else(|| raw.to_ascii_lowercase())
}

fn set_if<T: Serialize>(figment: Figment, key: &str, value: &Option<T>) -> Figment {
    match value {
        Some(v) => figment.merge(Serialized::default(key, v)),
        None => figment,
    }
}

impl Config {
    /// Layered sources: defaults, TOML file, runner environment, own
    /// environment, then command-line flags.
    pub fn figment(cli: &Cli) -> Figment {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(
                Env::prefixed("STREAMLIT_SERVER_")
                    .map(|k| format!("server.{}", canonical_key(SERVER_KEYS, k.as_str())).into()),
            )
            .merge(
                Env::prefixed("STREAMLIT_BROWSER_")
                    .map(|k| format!("browser.{}", canonical_key(BROWSER_KEYS, k.as_str())).into()),
            )
            .merge(Env::prefixed("COMTRADE__").split("__"));

        let figment = set_if(figment, "server.port", &cli.server_port);
        let figment = set_if(figment, "server.address", &cli.server_address);
        let figment = set_if(figment, "server.headless", &cli.server_headless);
        let figment = set_if(figment, "server.enable_cors", &cli.server_enable_cors);
        let figment = set_if(
            figment,
            "server.enable_xsrf_protection",
            &cli.server_enable_xsrf_protection,
        );
        let figment = set_if(figment, "server.max_upload_size", &cli.server_max_upload_size);
        set_if(figment, "browser.gather_usage_stats", &cli.browser_gather_usage_stats)
    }

    pub fn load(cli: &Cli) -> Result<Self> {
        let cfg: Config = Self::figment(cli).extract()?;
        cfg.validate()?;
        Ok(cfg)
    }
}
