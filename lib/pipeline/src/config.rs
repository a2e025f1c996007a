use receiptx_core::{Error, Result, DEFAULT_MAX_QUANTITY};
use std::time::Duration;

/// Default bound on a whole pipeline run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a receipt pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on one `process_receipt` call
    pub timeout: Duration,
    /// Largest quantity accepted for a single line item
    pub max_quantity: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_quantity: DEFAULT_MAX_QUANTITY,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be greater than zero".to_string()));
        }
        if !self.max_quantity.is_finite() || self.max_quantity <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_quantity must be a positive number, got {}",
                self.max_quantity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = PipelineConfig {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = PipelineConfig {
            max_quantity: f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
