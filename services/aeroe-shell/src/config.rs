use ae_stores::StoreConfig;
use ae_transport_http::DEFAULT_BACKEND_URL;
use anyhow::Context;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub(crate) const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:1431";

#[derive(Debug, Clone)]
pub(crate) struct ShellConfig {
    pub(crate) listen_addr: SocketAddr,
    pub(crate) backend_url: String,
    /// Serve the in-memory backend instead of the native process.
    pub(crate) mock_backend: bool,
    pub(crate) stores: StoreConfig,
}

impl ShellConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let listen_addr = var("AEROE_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned());
        let listen_addr = SocketAddr::from_str(listen_addr.trim())
            .with_context(|| format!("AEROE_LISTEN_ADDR is not a socket address: {listen_addr}"))?;

        let backend_url = var("AEROE_BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_owned());
        let mock_backend = var("AEROE_MOCK_BACKEND")
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let defaults = StoreConfig::default();
        let stores = StoreConfig {
            balance_poll_interval: parse_duration(&var, "AEROE_BALANCE_POLL_MS", Duration::from_millis)?
                .unwrap_or(defaults.balance_poll_interval),
            balance_max_wait: parse_duration(&var, "AEROE_BALANCE_MAX_WAIT_MS", Duration::from_millis)?
                .unwrap_or(defaults.balance_max_wait),
            height_poll_interval: parse_duration(&var, "AEROE_HEIGHT_POLL_SECS", Duration::from_secs)?
                .unwrap_or(defaults.height_poll_interval),
            ..defaults
        };
        if stores.height_poll_interval.is_zero() || stores.balance_poll_interval.is_zero() {
            anyhow::bail!("poll intervals must be greater than zero");
        }

        Ok(Self {
            listen_addr,
            backend_url,
            mock_backend,
            stores,
        })
    }
}

fn parse_duration(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    unit: fn(u64) -> Duration,
) -> anyhow::Result<Option<Duration>> {
    var(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(unit)
                .with_context(|| format!("{key} must be a whole number, got {value}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ShellConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        ShellConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() -> anyhow::Result<()> {
        let config = config(&[])?;
        assert_eq!(config.listen_addr.to_string(), DEFAULT_LISTEN_ADDR);
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert!(!config.mock_backend);
        assert_eq!(config.stores.balance_max_wait, Duration::from_secs(60));
        Ok(())
    }

    #[test]
    fn overrides_are_applied() -> anyhow::Result<()> {
        let config = config(&[
            ("AEROE_LISTEN_ADDR", "0.0.0.0:9000"),
            ("AEROE_MOCK_BACKEND", "TRUE"),
            ("AEROE_BALANCE_POLL_MS", "250"),
            ("AEROE_HEIGHT_POLL_SECS", "5"),
        ])?;
        assert_eq!(config.listen_addr.port(), 9000);
        assert!(config.mock_backend);
        assert_eq!(config.stores.balance_poll_interval, Duration::from_millis(250));
        assert_eq!(config.stores.height_poll_interval, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(config(&[("AEROE_LISTEN_ADDR", "nowhere")]).is_err());
        assert!(config(&[("AEROE_BALANCE_MAX_WAIT_MS", "soon")]).is_err());
        assert!(config(&[("AEROE_HEIGHT_POLL_SECS", "0")]).is_err());
    }
}
