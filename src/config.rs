use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub nearby_max_km: f64,
    pub store_latency_min_ms: u64,
    pub store_latency_max_ms: u64,
    pub simulated_step_fraction: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            nearby_max_km: 10.0,
            store_latency_min_ms: 0,
            store_latency_max_ms: 0,
            simulated_step_fraction: 0.1,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            nearby_max_km: parse_or_default("NEARBY_MAX_KM", defaults.nearby_max_km)?,
            store_latency_min_ms: parse_or_default(
                "STORE_LATENCY_MIN_MS",
                defaults.store_latency_min_ms,
            )?,
            store_latency_max_ms: parse_or_default(
                "STORE_LATENCY_MAX_MS",
                defaults.store_latency_max_ms,
            )?,
            simulated_step_fraction: parse_or_default(
                "SIMULATED_STEP_FRACTION",
                defaults.simulated_step_fraction,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.event_buffer_size == 0 {
            return Err(AppError::Internal(
                "EVENT_BUFFER_SIZE must be > 0".to_string(),
            ));
        }

        if !self.nearby_max_km.is_finite() || self.nearby_max_km < 0.0 {
            return Err(AppError::Internal(
                "NEARBY_MAX_KM must be a non-negative number".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.simulated_step_fraction) {
            return Err(AppError::Internal(
                "SIMULATED_STEP_FRACTION must be between 0 and 1".to_string(),
            ));
        }

        if self.store_latency_min_ms > self.store_latency_max_ms {
            return Err(AppError::Internal(
                "STORE_LATENCY_MIN_MS must not exceed STORE_LATENCY_MAX_MS".to_string(),
            ));
        }

        Ok(())
    }

    pub fn store_latency_enabled(&self) -> bool {
        self.store_latency_max_ms > 0
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
