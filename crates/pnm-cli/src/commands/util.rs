use anyhow::{Context, Result};
use pnm_algo::{ReferenceBusPolicy, SensitivityConfig};
use pnm_cli::MatrixArgs;

/// Parse a comma-separated weight list; blank entries are skipped.
pub fn parse_weights(list: &str) -> Result<Vec<f64>> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("invalid slack weight '{s}'"))
        })
        .collect()
}

/// Configuration file (if any) with command-line overrides applied.
pub fn build_config(args: &MatrixArgs) -> Result<SensitivityConfig> {
    let mut config = match &args.config {
        Some(path) => pnm_io::load_config(path)?,
        None => SensitivityConfig::default(),
    };
    if let Some(solver) = &args.solver {
        config = config.with_solver_name(solver)?;
    }
    if let Some(list) = &args.slack_weights {
        config = config.with_distributed_slack(parse_weights(list)?);
    }
    if let Some(tol) = args.tol {
        config = config.with_tolerance(tol);
    }
    if args.auto_reference {
        config = config.with_reference_policy(ReferenceBusPolicy::AutoAssign);
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weights() {
        assert_eq!(parse_weights("1, 2,,0.5").unwrap(), vec![1.0, 2.0, 0.5]);
        assert!(parse_weights("1,x").is_err());
        assert!(parse_weights("").unwrap().is_empty());
    }
}
