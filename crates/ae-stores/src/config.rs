use std::time::Duration;

/// Timing knobs shared by the stores.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Delay between balance attempts while a wallet loads.
    pub balance_poll_interval: Duration,
    /// How long a first load keeps retrying the balance before giving up.
    pub balance_max_wait: Duration,
    pub height_poll_interval: Duration,
    pub seed_phrase_words: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            balance_poll_interval: Duration::from_secs(2),
            balance_max_wait: Duration::from_secs(60),
            height_poll_interval: Duration::from_secs(60),
            seed_phrase_words: 24,
        }
    }
}
