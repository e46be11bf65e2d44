//! Waiver compilation, matching and lifecycle.
//!
//! A waiver is consulted against the single wall-clock value of the run. It
//! is inert once `now > expires_utc`, and (when metadata is enforced) inert
//! while any attribution field is missing.

use crate::config::{validate_waiver, WaiverConfig, WaiverRequirements, WaiverSeverity};
use crate::errors::{ExError, ExErrorKind, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default look-ahead for "expires soon" warnings
pub const DEFAULT_WARN_EXPIRING_WITHIN_DAYS: u32 = 30;

/// Parse an RFC 3339 timestamp, a naive `YYYY-MM-DDTHH:MM:SS` (taken as
/// UTC) or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_utc_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Class of the item a waiver is being matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchClass {
    Breaking,
    Additive,
    Error,
    Warning,
}

impl MatchClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchClass::Breaking => "breaking",
            MatchClass::Additive => "additive",
            MatchClass::Error => "error",
            MatchClass::Warning => "warning",
        }
    }

    fn allowed_by(&self, severity: WaiverSeverity) -> bool {
        matches!(
            (severity, self),
            (WaiverSeverity::Any, _)
                | (WaiverSeverity::Breaking, MatchClass::Breaking)
                | (WaiverSeverity::Additive, MatchClass::Additive)
                | (WaiverSeverity::Error, MatchClass::Error)
                | (WaiverSeverity::Warning, MatchClass::Warning)
        )
    }
}

/// Lifecycle state of a waiver at the run's `now`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaiverState {
    Active,
    Expired { expires_utc: String },
    MissingMetadata { fields: Vec<&'static str> },
}

/// A waiver with its regexes compiled and timestamps parsed
#[derive(Debug, Clone)]
pub struct CompiledWaiver {
    pub config: WaiverConfig,
    pattern: Regex,
    targets: Vec<Regex>,
    expires: Option<DateTime<Utc>>,
}

impl CompiledWaiver {
    /// Compile a waiver; `key` names it in errors
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for bad regexes or timestamps.
    pub fn compile(config: &WaiverConfig, key: &str) -> Result<Self> {
        validate_waiver(config, &WaiverRequirements::default(), key)?;
        let pattern = crate::config::compile_patterns(
            std::slice::from_ref(&config.applies_to.pattern),
            &format!("{}.applies_to.pattern", key),
        )?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ExError::new(ExErrorKind::Internal)
                .with_op("compile_waiver")
                .with_key(key.to_string())
                .with_message("waiver pattern did not compile to a regex")
        })?;
        let targets = crate::config::compile_patterns(
            &config.applies_to.targets,
            &format!("{}.applies_to.targets", key),
        )?;
        Ok(Self {
            config: config.clone(),
            pattern,
            targets,
            expires: config.expires_utc.as_deref().and_then(parse_utc_timestamp),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn applies_to_target(&self, target: &str) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|re| re.is_match(target))
    }

    /// Target, severity class and description all match
    pub fn matches(&self, target: &str, class: MatchClass, description: &str) -> bool {
        class.allowed_by(self.config.applies_to.severity)
            && self.applies_to_target(target)
            && self.pattern.is_match(description)
    }

    pub fn state(&self, now: DateTime<Utc>, enforce_metadata: bool) -> WaiverState {
        if let Some(expires) = self.expires {
            if now > expires {
                return WaiverState::Expired {
                    expires_utc: self.config.expires_utc.clone().unwrap_or_default(),
                };
            }
        }
        if enforce_metadata {
            let fields = self.config.missing_metadata();
            if !fields.is_empty() {
                return WaiverState::MissingMetadata { fields };
            }
        }
        WaiverState::Active
    }

    /// Days until expiry when that is within `within_days`
    pub fn expires_within(&self, now: DateTime<Utc>, within_days: u32) -> Option<i64> {
        let expires = self.expires?;
        let remaining = expires - now;
        (remaining >= chrono::Duration::zero()
            && remaining <= chrono::Duration::days(i64::from(within_days)))
        .then(|| remaining.num_days())
    }
}

/// Compile every waiver of an effective policy
///
/// # Errors
///
/// See [`CompiledWaiver::compile`].
pub fn compile_waivers(waivers: &[WaiverConfig]) -> Result<Vec<CompiledWaiver>> {
    waivers
        .iter()
        .enumerate()
        .map(|(i, w)| CompiledWaiver::compile(w, &format!("waivers[{}]", i)))
        .collect()
}

/// One use of a waiver, reported in `waivers_applied`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaiverApplication {
    pub waiver_id: String,
    /// `breaking`, `additive`, `error` or `warning`
    pub severity: String,
    /// Description of the waived change or diagnostic
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_utc: Option<String>,
}

impl WaiverApplication {
    pub fn new(waiver: &CompiledWaiver, class: MatchClass, message: &str, subject: Option<&str>) -> Self {
        let c = &waiver.config;
        Self {
            waiver_id: c.id.clone(),
            severity: class.as_str().to_string(),
            message: message.to_string(),
            subject: subject.map(str::to_string),
            owner: c.owner.clone(),
            approved_by: c.approved_by.clone(),
            ticket: c.ticket.clone(),
            reason: c.reason.clone(),
            expires_utc: c.expires_utc.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaiverMatcher;
    use chrono::TimeZone;

    fn waiver(expires: &str, severity: WaiverSeverity) -> WaiverConfig {
        WaiverConfig {
            id: "W-1".to_string(),
            owner: Some("abi-team".to_string()),
            reason: Some("planned removal".to_string()),
            approved_by: Some("lead".to_string()),
            ticket: Some("ABI-42".to_string()),
            created_utc: Some("2026-01-01T00:00:00Z".to_string()),
            expires_utc: Some(expires.to_string()),
            applies_to: WaiverMatcher {
                pattern: "lrtc_bar".to_string(),
                targets: vec!["^lumen".to_string()],
                severity,
            },
        }
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_utc_timestamp("2026-03-01"), Some(expected));
        assert_eq!(parse_utc_timestamp("2026-03-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_utc_timestamp("2026-03-01T01:00:00+01:00"), Some(expected));
        assert_eq!(parse_utc_timestamp("2026-03-01T00:00:00"), Some(expected));
        assert_eq!(parse_utc_timestamp("next tuesday"), None);
    }

    #[test]
    fn test_matching_respects_target_and_severity() {
        let w = CompiledWaiver::compile(&waiver("2027-01-01", WaiverSeverity::Breaking), "w").unwrap();
        assert!(w.matches("lumenrtc", MatchClass::Breaking, "function lrtc_bar removed"));
        assert!(!w.matches("other", MatchClass::Breaking, "function lrtc_bar removed"));
        assert!(!w.matches("lumenrtc", MatchClass::Additive, "function lrtc_bar added"));
        assert!(!w.matches("lumenrtc", MatchClass::Breaking, "function lrtc_baz removed"));
    }

    #[test]
    fn test_expiry_state() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let past = CompiledWaiver::compile(&waiver("2026-05-01", WaiverSeverity::Any), "w").unwrap();
        assert!(matches!(past.state(now, false), WaiverState::Expired { .. }));

        let future = CompiledWaiver::compile(&waiver("2026-06-10", WaiverSeverity::Any), "w").unwrap();
        assert_eq!(future.state(now, true), WaiverState::Active);
        assert_eq!(future.expires_within(now, 30), Some(9));
        assert_eq!(future.expires_within(now, 5), None);
    }

    #[test]
    fn test_missing_metadata_only_when_enforced() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let mut config = waiver("2027-01-01", WaiverSeverity::Any);
        config.ticket = None;
        let w = CompiledWaiver::compile(&config, "w").unwrap();
        assert_eq!(w.state(now, false), WaiverState::Active);
        assert_eq!(
            w.state(now, true),
            WaiverState::MissingMetadata {
                fields: vec!["ticket"]
            }
        );
    }
}
