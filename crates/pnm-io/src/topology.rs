//! Topology and configuration files.
//!
//! A topology file is the serde form of [`Network`]:
//!
//! ```json
//! {
//!   "buses":    [{"id": 1, "name": "Bus 1", "kind": "ref"}, {"id": 2}],
//!   "branches": [{"id": 1, "name": "L1", "from_bus": 1, "to_bus": 2, "reactance": 0.1}]
//! }
//! ```
//!
//! A configuration file is TOML:
//!
//! ```toml
//! linear_solver = "dense"
//! tolerance = 1e-5
//! distributed_slack = [0.5, 0.5]
//! reference_policy = "auto-assign"
//! ```

use anyhow::{Context, Result};
use pnm_algo::SensitivityConfig;
use pnm_core::Network;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load a network from a JSON topology file.
pub fn load_network(path: &Path) -> Result<Network> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading topology '{}'", path.display()))?;
    let network: Network = serde_json::from_str(&text)
        .with_context(|| format!("parsing topology '{}'", path.display()))?;
    debug!(path = %path.display(), stats = %network.stats(), "topology loaded");
    Ok(network)
}

/// Write a network as pretty-printed JSON.
pub fn save_network(network: &Network, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(network).context("serializing topology")?;
    fs::write(path, text).with_context(|| format!("writing topology '{}'", path.display()))
}

/// Load and validate a TOML sensitivity configuration. Missing keys take
/// their defaults.
pub fn load_config(path: &Path) -> Result<SensitivityConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config '{}'", path.display()))?;
    parse_config(&text).with_context(|| format!("parsing config '{}'", path.display()))
}

pub fn parse_config(text: &str) -> Result<SensitivityConfig> {
    let config: SensitivityConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnm_algo::ReferenceBusPolicy;
    use pnm_core::LinearSolverKind;

    #[test]
    fn test_parse_config() {
        let config = parse_config(
            r#"
            linear_solver = "dense"
            tolerance = 1e-5
            reference_policy = "auto-assign"
            "#,
        )
        .unwrap();
        assert_eq!(config.linear_solver, LinearSolverKind::Dense);
        assert_eq!(config.tolerance, 1e-5);
        assert_eq!(config.reference_policy, ReferenceBusPolicy::AutoAssign);
        assert!(config.distributed_slack.is_empty());
    }

    #[test]
    fn test_parse_config_rejects_bad_values() {
        assert!(parse_config(r#"linear_solver = "pardiso""#).is_err());
        assert!(parse_config("tolerance = -1.0").is_err());
        assert!(parse_config("solver = \"dense\"").is_err());
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse_config("").unwrap(), SensitivityConfig::default());
    }
}
