//! Construction entry point used by hosts.

use super::{Config, ExpvarExtension};
use crate::component::TelemetrySettings;

/// Creates expvar extensions and their default configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct Factory;

impl Factory {
    /// Component kind of the extension.
    pub const TYPE: &'static str = "expvar";

    /// Returns the configuration used when the user supplies none.
    #[must_use]
    pub fn create_default_config(&self) -> Config {
        Config::default()
    }

    /// Creates a stopped extension.
    #[must_use]
    pub fn create(&self, telemetry: TelemetrySettings, config: Config) -> ExpvarExtension {
        ExpvarExtension::new(config, telemetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentId;

    #[test]
    fn test_type_is_valid_component_kind() {
        assert!(ComponentId::new(Factory::TYPE).is_ok());
    }

    #[test]
    fn test_create_is_stopped() {
        let id = ComponentId::new(Factory::TYPE).unwrap();
        let factory = Factory;
        let ext = factory.create(TelemetrySettings::new(&id), factory.create_default_config());
        assert!(!ext.is_running());
        assert!(ext.local_addr().is_none());
        assert_eq!(ext.config(), &Config::default());
    }
}
