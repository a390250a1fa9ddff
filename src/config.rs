use std::time::Duration;

/// Tuning knobs for the entity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Lifetime of a row cached on read.
    pub object_ttl: Duration,

    /// Lifetime of a cached search id list.
    pub search_ttl: Duration,

    /// Lifetime of the row cached right after a commit.
    pub commit_ttl: Duration,

    /// Unmodified entities kept per model before eviction starts.
    pub registry_capacity: usize,
}

impl ModelConfig {
    pub fn new() -> Self {
        Self {
            object_ttl: Duration::from_secs(7200),
            search_ttl: Duration::from_secs(900),
            commit_ttl: Duration::from_secs(1),
            registry_capacity: 99,
        }
    }

    pub fn object_ttl(mut self, ttl: Duration) -> Self {
        self.object_ttl = ttl;
        self
    }

    pub fn search_ttl(mut self, ttl: Duration) -> Self {
        self.search_ttl = ttl;
        self
    }

    pub fn commit_ttl(mut self, ttl: Duration) -> Self {
        self.commit_ttl = ttl;
        self
    }

    pub fn registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.object_ttl, Duration::from_secs(7200));
        assert_eq!(config.search_ttl, Duration::from_secs(900));
        assert_eq!(config.commit_ttl, Duration::from_secs(1));
        assert_eq!(config.registry_capacity, 99);
    }

    #[test]
    fn test_builder() {
        let config = ModelConfig::new()
            .search_ttl(Duration::from_secs(60))
            .registry_capacity(10);
        assert_eq!(config.search_ttl, Duration::from_secs(60));
        assert_eq!(config.registry_capacity, 10);
        assert_eq!(config.object_ttl, Duration::from_secs(7200));
    }
}
