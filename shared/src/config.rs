use std::time::Duration;

use anyhow::{Context, Result};

pub struct AppConfig {
    pub database: DatabaseConfig,
    pub circulation: CirculationConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} is not set"));
        let database = DatabaseConfig {
            host: required("DATABASE_HOST")?,
            port: required("DATABASE_PORT")?
                .parse()
                .context("DATABASE_PORT must be a port number")?,
            username: required("DATABASE_USERNAME")?,
            password: required("DATABASE_PASSWORD")?,
            database: required("DATABASE_NAME")?,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
        };
        let circulation = CirculationConfig::from_lookup(&lookup)?;
        Ok(Self {
            database,
            circulation,
        })
    }
}

pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

/// 貸出ポリシーの設定値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CirculationConfig {
    /// 予約した本を受け取るまでの猶予
    pub pickup_window: chrono::Duration,
    /// ユーザーごとの保留中の予約と貸出中の件数の合計の上限
    pub max_active_items: usize,
    /// 貸出処理の各操作にかける時間の上限
    pub operation_timeout: Duration,
    /// `None` のときは定期的な期限切れ処理を行わない
    pub expiry_sweep_interval: Option<Duration>,
}

impl Default for CirculationConfig {
    fn default() -> Self {
        Self {
            pickup_window: chrono::Duration::hours(72),
            max_active_items: 5,
            operation_timeout: Duration::from_millis(5_000),
            expiry_sweep_interval: Some(Duration::from_secs(300)),
        }
    }
}

impl CirculationConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pickup_hours: i64 = parse_or(&lookup, "CIRCULATION_PICKUP_WINDOW_HOURS", 72)?;
        if pickup_hours <= 0 {
            anyhow::bail!("CIRCULATION_PICKUP_WINDOW_HOURS must be positive");
        }
        let max_active_items = parse_or(&lookup, "CIRCULATION_MAX_ACTIVE_ITEMS", 5)?;
        let timeout_ms = parse_or(&lookup, "CIRCULATION_OPERATION_TIMEOUT_MS", 5_000)?;
        let sweep_secs: u64 = parse_or(&lookup, "CIRCULATION_EXPIRY_SWEEP_SECS", 300)?;

        Ok(Self {
            pickup_window: chrono::Duration::hours(pickup_hours),
            max_active_items,
            operation_timeout: Duration::from_millis(timeout_ms),
            expiry_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn circulation_defaults_apply_when_unset() {
        let config = CirculationConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, CirculationConfig::default());
    }

    #[test]
    fn zero_sweep_interval_disables_the_sweeper() {
        let config = CirculationConfig::from_lookup(lookup_from(&[
            ("CIRCULATION_EXPIRY_SWEEP_SECS", "0"),
            ("CIRCULATION_PICKUP_WINDOW_HOURS", "24"),
        ]))
        .unwrap();
        assert_eq!(config.expiry_sweep_interval, None);
        assert_eq!(config.pickup_window, chrono::Duration::hours(24));
    }

    #[test]
    fn rejects_non_positive_pickup_window() {
        let result =
            CirculationConfig::from_lookup(lookup_from(&[("CIRCULATION_PICKUP_WINDOW_HOURS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn database_settings_are_required() {
        assert!(AppConfig::from_lookup(lookup_from(&[("DATABASE_HOST", "localhost")])).is_err());

        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_HOST", "localhost"),
            ("DATABASE_PORT", "5432"),
            ("DATABASE_USERNAME", "app"),
            ("DATABASE_PASSWORD", "passwd"),
            ("DATABASE_NAME", "library"),
        ]))
        .unwrap();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.max_connections, 10);
    }
}
