//! Cache configuration.

/// Tunables for a [`crate::ResourceCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound on transport iterations a synchronous load may spend
    /// waiting; past it the load fails instead of spinning.
    pub immediate_iteration_cap: usize,
    /// Fetch every bundle into memory over the web transport instead of
    /// downloading to disk.
    pub streaming_web: bool,
    /// Location schemes that make a bundle use the download strategy.
    pub download_schemes: Vec<String>,
    /// Location schemes that make an asset use the web strategy.
    pub web_schemes: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            immediate_iteration_cap: 10_000,
            streaming_web: false,
            download_schemes: vec!["http://".into(), "https://".into(), "ftp://".into()],
            web_schemes: vec!["http://".into(), "https://".into()],
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_immediate_iteration_cap(mut self, cap: usize) -> Self {
        self.immediate_iteration_cap = cap;
        self
    }

    pub fn with_streaming_web(mut self, enabled: bool) -> Self {
        self.streaming_web = enabled;
        self
    }

    pub fn is_download_location(&self, location: &str) -> bool {
        has_scheme(&self.download_schemes, location)
    }

    pub fn is_web_location(&self, location: &str) -> bool {
        has_scheme(&self.web_schemes, location)
    }
}

fn has_scheme(schemes: &[String], location: &str) -> bool {
    schemes.iter().any(|scheme| location.starts_with(scheme.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schemes() {
        let config = CacheConfig::default();
        assert!(config.is_download_location("ftp://mirror/a_1"));
        assert!(config.is_download_location("https://cdn/a_1"));
        assert!(!config.is_download_location("bundles/a_1"));

        assert!(config.is_web_location("http://cdn/a.txt"));
        assert!(!config.is_web_location("ftp://mirror/a.txt"));
    }
}
