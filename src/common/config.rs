use std::time::Duration;

use crate::device::intel_md::SelectionPolicy;

/// Probe configuration constants
pub struct ProbeConfig;

impl ProbeConfig {
    // GPU sampling
    pub const REPORT_WAIT_TIMEOUT_MS: u64 = 200;
    pub const REPORTS_PER_SAMPLE: u32 = 1;

    // Metric set selection
    pub const SELECTION_EARLY_EXIT_SCORE: u32 = 4;
    pub const MAX_CHANNEL_SCORE: u32 = 5;

    // System controller
    pub const SMC_SERVICE_NAME: &'static str = "AppleSMC";
    pub const SMC_KEY_LENGTH: usize = 4;
    pub const SMC_MIN_TEMPERATURE_BYTES: u32 = 2;

    /// File names tried, in order, when loading the Metrics Discovery library.
    pub fn metrics_library_names() -> &'static [&'static str] {
        #[cfg(target_os = "windows")]
        {
            &["igdmd64.dll"]
        }
        #[cfg(not(target_os = "windows"))]
        {
            &["libigdmd.so.1", "libigdmd.so"]
        }
    }
}

/// Configuration options for [`IntelGpuProvider`](crate::IntelGpuProvider).
#[derive(Debug, Clone)]
pub struct GpuProviderConfig {
    /// How long one sample waits for the hardware to produce a report.
    /// Default: 200ms
    pub report_wait_timeout: Duration,
    /// Library paths tried in order at `init`.
    /// Default: [`ProbeConfig::metrics_library_names`]
    pub library_paths: Vec<String>,
    /// How the metric set for each adapter is chosen.
    /// Default: stop at the first set resolving four channels
    pub selection_policy: SelectionPolicy,
}

impl Default for GpuProviderConfig {
    fn default() -> Self {
        Self {
            report_wait_timeout: Duration::from_millis(ProbeConfig::REPORT_WAIT_TIMEOUT_MS),
            library_paths: ProbeConfig::metrics_library_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            selection_policy: SelectionPolicy::default(),
        }
    }
}

impl GpuProviderConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the report wait timeout.
    pub fn report_wait_timeout(mut self, timeout: Duration) -> Self {
        self.report_wait_timeout = timeout;
        self
    }

    /// Replace the library search list.
    pub fn library_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.library_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the metric set selection policy.
    pub fn selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.selection_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GpuProviderConfig::default();
        assert_eq!(config.report_wait_timeout, Duration::from_millis(200));
        assert!(!config.library_paths.is_empty());
        assert_eq!(
            config.selection_policy,
            SelectionPolicy::FirstToThreshold { threshold: 4 }
        );
    }

    #[test]
    fn test_builder_overrides() {
        let config = GpuProviderConfig::new()
            .report_wait_timeout(Duration::from_millis(50))
            .library_paths(["/opt/intel/libigdmd.so"])
            .selection_policy(SelectionPolicy::Exhaustive);
        assert_eq!(config.report_wait_timeout, Duration::from_millis(50));
        assert_eq!(config.library_paths, vec!["/opt/intel/libigdmd.so"]);
        assert_eq!(config.selection_policy, SelectionPolicy::Exhaustive);
    }
}
