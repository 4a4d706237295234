//! Property graph configuration.

use std::env;
use std::num::NonZeroUsize;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const ENV_NUM_WORKERS: &str = "PROPGRAPH_NUM_WORKERS";
pub const ENV_REQUIRE_RENUMBER: &str = "PROPGRAPH_REQUIRE_RENUMBER";

/// Settings fixed when a `PropertyGraph` is constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropertyGraphConfig {
    /// Partition count of every table the graph creates. `None` uses the
    /// available parallelism of the host.
    pub num_workers: Option<usize>,
    /// Refuse to extract subgraphs without renumbering.
    pub require_renumber: bool,
}

impl PropertyGraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_workers(mut self, n: usize) -> Self {
        self.num_workers = Some(n);
        self
    }

    pub fn with_require_renumber(mut self, required: bool) -> Self {
        self.require_renumber = required;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Defaults overridden by `PROPGRAPH_NUM_WORKERS` and
    /// `PROPGRAPH_REQUIRE_RENUMBER` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_NUM_WORKERS) {
            let n = raw.trim().parse::<usize>().map_err(|_| {
                Error::Config(format!("{ENV_NUM_WORKERS}='{}' is not a worker count", raw.trim()))
            })?;
            config.num_workers = Some(n);
        }
        if let Some(raw) = lookup(ENV_REQUIRE_RENUMBER) {
            config.require_renumber = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(Error::Config(format!("{ENV_REQUIRE_RENUMBER}='{other}' is not a boolean")));
                }
            };
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_workers == Some(0) {
            return Err(Error::Config("num_workers must be at least 1".into()));
        }
        Ok(())
    }

    /// The partition count to use.
    pub fn resolved_num_workers(&self) -> Result<usize> {
        self.validate()?;
        Ok(self
            .num_workers
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, NonZeroUsize::get)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let config = PropertyGraphConfig::new().with_num_workers(4).with_require_renumber(true);
        let json = config.to_json().unwrap();
        assert_eq!(PropertyGraphConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_json_defaults_and_errors() {
        let config = PropertyGraphConfig::from_json("{}").unwrap();
        assert_eq!(config, PropertyGraphConfig::default());
        assert!(matches!(PropertyGraphConfig::from_json(r#"{"num_workers": 0}"#), Err(Error::Config(_))));
        assert!(matches!(PropertyGraphConfig::from_json(r#"{"workers": 2}"#), Err(Error::Json(_))));
    }

    #[test]
    fn test_env_lookup() {
        let config = PropertyGraphConfig::from_lookup(|name| match name {
            ENV_NUM_WORKERS => Some(" 3 ".into()),
            ENV_REQUIRE_RENUMBER => Some("TRUE".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.num_workers, Some(3));
        assert!(config.require_renumber);

        let bad = PropertyGraphConfig::from_lookup(|name| (name == ENV_NUM_WORKERS).then(|| "many".into()));
        assert!(matches!(bad, Err(Error::Config(_))));
    }

    #[test]
    fn test_resolved_workers() {
        assert!(PropertyGraphConfig::new().resolved_num_workers().unwrap() >= 1);
        assert_eq!(PropertyGraphConfig::new().with_num_workers(2).resolved_num_workers().unwrap(), 2);
    }
}
