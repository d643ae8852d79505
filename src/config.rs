use std::time::Duration;

/// Runtime-wide knobs threaded from the `serve` CLI into the Session
/// Manager at construction (§10.3). No file-based format: nothing here
/// is persisted state.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_timeout_ms: u64,
    pub hang_timeout_ms: u64,
    pub sample_interval_ms: u64,
    pub log_level: String,
}

impl Config {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn hang_timeout(&self) -> Duration {
        Duration::from_millis(self.hang_timeout_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            hang_timeout_ms: 5_000,
            sample_interval_ms: 100,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.default_timeout_ms, 10_000);
        assert_eq!(cfg.hang_timeout_ms, 5_000);
        assert_eq!(cfg.sample_interval_ms, 100);
    }

    #[test]
    fn durations_convert_from_millis() {
        let cfg = Config::default();
        assert_eq!(cfg.default_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.hang_timeout(), Duration::from_secs(5));
    }
}
