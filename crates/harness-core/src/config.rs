//! Harness configuration

use std::path::PathBuf;

/// Name of the sandbox directory under the system temp dir
pub const DEFAULT_SANDBOX_NAME: &str = "catalog-harness";

/// Logical label of the per-test database
pub const DEFAULT_CLIENT_LABEL: &str = "client";

/// Environment variable overriding [`HarnessConfig::sandbox_root`]
pub const ENV_SANDBOX_ROOT: &str = "CATALOG_HARNESS_ROOT";

/// Environment variable overriding [`HarnessConfig::client_label`]
pub const ENV_CLIENT_LABEL: &str = "CATALOG_HARNESS_LABEL";

/// Environment variable overriding [`HarnessConfig::compact_on_teardown`]
pub const ENV_COMPACT: &str = "CATALOG_HARNESS_COMPACT";

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Sandbox root; `None` means `<temp dir>/catalog-harness`
    pub sandbox_root: Option<PathBuf>,
    /// Logical database label; the file is `<label>.redb`
    pub client_label: String,
    /// Whether teardown compacts the database file
    pub compact_on_teardown: bool,
}

impl HarnessConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup(ENV_SANDBOX_ROOT).filter(|v| !v.is_empty()) {
            config.sandbox_root = Some(PathBuf::from(root));
        }
        if let Some(label) = lookup(ENV_CLIENT_LABEL).filter(|v| !v.is_empty()) {
            config.client_label = label;
        }
        if let Some(compact) = lookup(ENV_COMPACT) {
            config.compact_on_teardown = !matches!(compact.trim(), "0" | "false" | "no" | "off");
        }
        config
    }

    /// With sandbox root
    #[inline]
    #[must_use]
    pub fn with_sandbox_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sandbox_root = Some(root.into());
        self
    }

    /// With client label
    #[inline]
    #[must_use]
    pub fn with_client_label(mut self, label: impl Into<String>) -> Self {
        self.client_label = label.into();
        self
    }

    /// With or without teardown compaction
    #[inline]
    #[must_use]
    pub fn with_compaction(mut self, enabled: bool) -> Self {
        self.compact_on_teardown = enabled;
        self
    }

    /// Sandbox root with the default applied
    #[must_use]
    pub fn resolved_sandbox_root(&self) -> PathBuf {
        self.sandbox_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_SANDBOX_NAME))
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sandbox_root: None,
            client_label: DEFAULT_CLIENT_LABEL.to_owned(),
            compact_on_teardown: true,
        }
    }
}
