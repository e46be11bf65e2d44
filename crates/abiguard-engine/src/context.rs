//! Run context and target selection

use abiguard_core::errors::Result;
use abiguard_core::{Config, TargetConfig};
use abiguard_core_types::RunId;
use chrono::{DateTime, Utc};

/// Switches shared by the commands of one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub skip_binary: bool,
    /// Fail instead of falling back to the heuristic parser
    pub no_fallback: bool,
    pub fail_on_expired: bool,
    pub fail_on_missing_metadata: bool,
}

/// Everything an invocation fixes up front
///
/// `now` is read once by the caller so waiver expiry and timestamps stay
/// consistent across every target of the run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub now: DateTime<Utc>,
    pub run_id: RunId,
    pub flags: RunFlags,
}

impl RunContext {
    pub fn new(now: DateTime<Utc>, flags: RunFlags) -> Self {
        Self {
            now,
            run_id: RunId::new(),
            flags,
        }
    }
}

/// Targets to process, in name order
///
/// # Errors
///
/// `NotFound` when `only` names a target that is not configured.
pub fn select_targets<'a>(
    config: &'a Config,
    only: Option<&'a str>,
) -> Result<Vec<(&'a str, &'a TargetConfig)>> {
    match only {
        Some(name) => Ok(vec![(name, config.target(name)?)]),
        None => Ok(config
            .targets
            .iter()
            .map(|(name, target)| (name.as_str(), target))
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::default();
        for name in ["zeta", "alpha", "mid"] {
            config
                .targets
                .insert(name.to_string(), TargetConfig::default());
        }
        config
    }

    #[test]
    fn test_all_targets_in_name_order() {
        let config = config();
        let names: Vec<&str> = select_targets(&config, None)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_single_target_selection() {
        let config = config();
        let selected = select_targets(&config, Some("mid")).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, "mid");
    }

    #[test]
    fn test_unknown_target_is_not_found() {
        let err = select_targets(&config(), Some("nope")).unwrap_err();
        assert_eq!(err.kind(), abiguard_core::ExErrorKind::NotFound);
    }
}
