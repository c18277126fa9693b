//! Pipeline configuration.

use canvas_core::BufferPolicy;
use canvas_renderer::{MissingImagePolicy, TextConfig};

/// Environment variable selecting the buffer policy (`clear` or `retain`).
pub const ENV_BUFFER_POLICY: &str = "CANVAS_BUFFER_POLICY";

/// Environment variable selecting the missing image policy (`fail` or `skip`).
pub const ENV_MISSING_IMAGES: &str = "CANVAS_MISSING_IMAGES";

/// Configuration shared by every surface of a registry.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Whether a flush empties the command buffer.
    pub buffer_policy: BufferPolicy,
    /// What a flush does about unresolvable images.
    pub missing_images: MissingImagePolicy,
    /// Rasterize on the blocking pool instead of the surface worker task.
    pub blocking_raster: bool,
    /// Fonts available to `fillText`.
    pub text: TextConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_policy: BufferPolicy::ClearOnFlush,
            missing_images: MissingImagePolicy::Fail,
            blocking_raster: true,
            text: TextConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `CANVAS_BUFFER_POLICY` and `CANVAS_MISSING_IMAGES`.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(ENV_BUFFER_POLICY) {
            match value.parse() {
                Ok(policy) => self.buffer_policy = policy,
                Err(e) => tracing::warn!(var = ENV_BUFFER_POLICY, error = %e, "ignoring"),
            }
        }
        if let Some(value) = lookup(ENV_MISSING_IMAGES) {
            match value.parse() {
                Ok(policy) => self.missing_images = policy,
                Err(e) => tracing::warn!(var = ENV_MISSING_IMAGES, error = %e, "ignoring"),
            }
        }
        self
    }

    /// Set the buffer policy.
    #[must_use]
    pub fn with_buffer_policy(mut self, policy: BufferPolicy) -> Self {
        self.buffer_policy = policy;
        self
    }

    /// Set the missing image policy.
    #[must_use]
    pub fn with_missing_images(mut self, policy: MissingImagePolicy) -> Self {
        self.missing_images = policy;
        self
    }

    /// Choose where rasterization runs.
    #[must_use]
    pub fn with_blocking_raster(mut self, blocking: bool) -> Self {
        self.blocking_raster = blocking;
        self
    }

    /// Set the font configuration.
    #[must_use]
    pub fn with_text(mut self, text: TextConfig) -> Self {
        self.text = text;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_policy, BufferPolicy::ClearOnFlush);
        assert_eq!(config.missing_images, MissingImagePolicy::Fail);
        assert!(config.blocking_raster);
    }

    #[test]
    fn test_env_overrides() {
        let config = PipelineConfig::default().with_env_overrides(|key| match key {
            ENV_BUFFER_POLICY => Some("retain".to_string()),
            ENV_MISSING_IMAGES => Some("Skip".to_string()),
            _ => None,
        });
        assert_eq!(config.buffer_policy, BufferPolicy::Retain);
        assert_eq!(config.missing_images, MissingImagePolicy::Skip);
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let config = PipelineConfig::default()
            .with_env_overrides(|_| Some("sometimes".to_string()));
        assert_eq!(config.buffer_policy, BufferPolicy::ClearOnFlush);
        assert_eq!(config.missing_images, MissingImagePolicy::Fail);
    }
}
