use bigdecimal::{BigDecimal, Zero};
use common_money::RoundingMode;
use common_pricing::{PricingConfig, ProfitMode, ProrationPolicy, DEFAULT_IVA_RATE};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8086;
pub const DEFAULT_JOB_RESULT_TTL_SECS: u64 = 3600;
pub const DEFAULT_JOB_SWEEP_SECS: u64 = 60;
pub const DEFAULT_TASK_POLL_INTERVAL_MS: u64 = 1000;

const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = ["http://localhost:3000", "http://localhost:3001", "http://localhost:5173"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is required")]
    Missing { var: &'static str },
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub pricing: PricingConfig,
    pub job_result_ttl: Duration,
    pub job_sweep_interval: Duration,
    pub task_poll_interval: Duration,
    pub allowed_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            store: StoreBackend::Memory,
            database_url: None,
            pricing: PricingConfig::default(),
            job_result_ttl: Duration::from_secs(DEFAULT_JOB_RESULT_TTL_SECS),
            job_sweep_interval: Duration::from_secs(DEFAULT_JOB_SWEEP_SECS),
            task_poll_interval: Duration::from_millis(DEFAULT_TASK_POLL_INTERVAL_MS),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

fn parse_var<T, E>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = E>,
    E: std::fmt::Display,
{
    match lookup(var).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: E| ConfigError::Invalid { var, value: raw.clone(), reason: e.to_string() }),
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").filter(|h| !h.trim().is_empty()).unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var(&lookup, "PORT", DEFAULT_PORT)?;
        let store = parse_var(&lookup, "STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty());
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing { var: "DATABASE_URL" });
        }

        let iva_rate: BigDecimal = parse_var(&lookup, "IVA_RATE", BigDecimal::from(DEFAULT_IVA_RATE))?;
        if iva_rate < BigDecimal::zero() {
            return Err(ConfigError::Invalid {
                var: "IVA_RATE",
                value: iva_rate.to_string(),
                reason: "must not be negative".into(),
            });
        }
        let pricing = PricingConfig {
            proration: parse_var(&lookup, "PRORATION_POLICY", ProrationPolicy::default())?,
            profit_mode: parse_var(&lookup, "PROFIT_MODE", ProfitMode::default())?,
            iva_rate,
            rounding: parse_var(&lookup, "MONEY_ROUNDING", RoundingMode::default())?,
        };

        let job_result_ttl = Duration::from_secs(parse_var(&lookup, "JOB_RESULT_TTL_SECS", DEFAULT_JOB_RESULT_TTL_SECS)?);
        let sweep_secs: u64 = parse_var(&lookup, "JOB_SWEEP_SECS", DEFAULT_JOB_SWEEP_SECS)?;
        if sweep_secs == 0 {
            return Err(ConfigError::Invalid { var: "JOB_SWEEP_SECS", value: "0".into(), reason: "must be positive".into() });
        }
        let poll_ms: u64 = parse_var(&lookup, "TASK_POLL_INTERVAL_MS", DEFAULT_TASK_POLL_INTERVAL_MS)?;
        if poll_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "TASK_POLL_INTERVAL_MS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        let allowed_origins = match lookup("CORS_ALLOWED_ORIGINS") {
            Some(raw) if !raw.trim().is_empty() => {
                raw.split(',').map(str::trim).filter(|o| !o.is_empty()).map(str::to_string).collect()
            }
            _ => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            host,
            port,
            store,
            database_url,
            pricing,
            job_result_ttl,
            job_sweep_interval: Duration::from_secs(sweep_secs),
            task_poll_interval: Duration::from_millis(poll_ms),
            allowed_origins,
        })
    }
}
