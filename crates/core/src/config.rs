//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the workflow and the
//! backend as an `Arc<CoreConfig>`. Nothing in the core reads environment variables while a
//! workflow is running; binaries collect the raw values and hand them to
//! [`CoreConfig::from_env_values`].

use std::time::Duration;

use crate::constants::{
    ANSWER_COMPLETE_CHARS, DEFAULT_ANSWER_AUTOSAVE_MS, DEFAULT_NARRATIVE_AUTOSAVE_MS,
    MAX_AUTOSAVE_MS, MIN_PHASE_CHARS,
};
use crate::error::{CaptureError, CaptureResult};

/// Thresholds consulted by the step validators and the answer completeness check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationRules {
    /// Minimum trimmed characters in at least one phase.
    pub min_phase_chars: usize,
    /// Answers longer than this (trimmed) count as complete.
    pub answer_complete_chars: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_phase_chars: MIN_PHASE_CHARS,
            answer_complete_chars: ANSWER_COMPLETE_CHARS,
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    narrative_autosave_delay: Duration,
    answer_autosave_delay: Duration,
    rules: ValidationRules,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// Both delays must be non-zero and no longer than `MAX_AUTOSAVE_MS`, and
    /// `rules.min_phase_chars` must be at least one.
    pub fn new(
        narrative_autosave_delay: Duration,
        answer_autosave_delay: Duration,
        rules: ValidationRules,
    ) -> CaptureResult<Self> {
        validate_delay("narrative auto-save delay", narrative_autosave_delay)?;
        validate_delay("answer auto-save delay", answer_autosave_delay)?;
        if rules.min_phase_chars == 0 {
            return Err(CaptureError::InvalidInput(
                "min_phase_chars must be at least 1".into(),
            ));
        }

        Ok(Self {
            narrative_autosave_delay,
            answer_autosave_delay,
            rules,
        })
    }

    /// Build a configuration from optional raw values, falling back to defaults.
    ///
    /// Empty or whitespace-only values are treated as absent.
    pub fn from_env_values(
        narrative_autosave_ms: Option<String>,
        answer_autosave_ms: Option<String>,
        min_phase_chars: Option<String>,
        answer_complete_chars: Option<String>,
    ) -> CaptureResult<Self> {
        let narrative_ms = parse_number(
            "ICA_NARRATIVE_AUTOSAVE_MS",
            narrative_autosave_ms,
            DEFAULT_NARRATIVE_AUTOSAVE_MS,
        )?;
        let answer_ms = parse_number(
            "ICA_ANSWER_AUTOSAVE_MS",
            answer_autosave_ms,
            DEFAULT_ANSWER_AUTOSAVE_MS,
        )?;
        let rules = ValidationRules {
            min_phase_chars: parse_number("ICA_MIN_PHASE_CHARS", min_phase_chars, MIN_PHASE_CHARS)?,
            answer_complete_chars: parse_number(
                "ICA_ANSWER_COMPLETE_CHARS",
                answer_complete_chars,
                ANSWER_COMPLETE_CHARS,
            )?,
        };

        Self::new(
            Duration::from_millis(narrative_ms),
            Duration::from_millis(answer_ms),
            rules,
        )
    }

    pub fn narrative_autosave_delay(&self) -> Duration {
        self.narrative_autosave_delay
    }

    pub fn answer_autosave_delay(&self) -> Duration {
        self.answer_autosave_delay
    }

    pub fn rules(&self) -> ValidationRules {
        self.rules
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            narrative_autosave_delay: Duration::from_millis(DEFAULT_NARRATIVE_AUTOSAVE_MS),
            answer_autosave_delay: Duration::from_millis(DEFAULT_ANSWER_AUTOSAVE_MS),
            rules: ValidationRules::default(),
        }
    }
}

fn validate_delay(name: &str, delay: Duration) -> CaptureResult<()> {
    if delay.is_zero() {
        return Err(CaptureError::InvalidInput(format!("{name} must be non-zero")));
    }
    if delay > Duration::from_millis(MAX_AUTOSAVE_MS) {
        return Err(CaptureError::InvalidInput(format!(
            "{name} exceeds maximum of {MAX_AUTOSAVE_MS} ms"
        )));
    }
    Ok(())
}

fn parse_number<T>(name: &str, value: Option<String>, default: T) -> CaptureResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| CaptureError::InvalidInput(format!("{name}={raw:?} is invalid: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_values_uses_defaults_for_missing_values() {
        let cfg = CoreConfig::from_env_values(None, Some("  ".into()), None, None)
            .expect("defaults should be valid");
        assert_eq!(cfg.narrative_autosave_delay(), Duration::from_millis(3_000));
        assert_eq!(cfg.answer_autosave_delay(), Duration::from_millis(2_000));
        assert_eq!(cfg.rules(), ValidationRules::default());
    }

    #[test]
    fn test_from_env_values_parses_overrides() {
        let cfg = CoreConfig::from_env_values(
            Some("2500".into()),
            Some("100".into()),
            Some("20".into()),
            Some("5".into()),
        )
        .expect("overrides should be valid");
        assert_eq!(cfg.narrative_autosave_delay(), Duration::from_millis(2_500));
        assert_eq!(cfg.answer_autosave_delay(), Duration::from_millis(100));
        assert_eq!(cfg.rules().min_phase_chars, 20);
        assert_eq!(cfg.rules().answer_complete_chars, 5);
    }

    #[test]
    fn test_rejects_zero_and_oversized_delays() {
        assert!(CoreConfig::from_env_values(Some("0".into()), None, None, None).is_err());
        assert!(CoreConfig::from_env_values(None, Some("600000".into()), None, None).is_err());
        assert!(CoreConfig::from_env_values(Some("soon".into()), None, None, None).is_err());
    }

    #[test]
    fn test_rejects_zero_min_phase_chars() {
        let result = CoreConfig::new(
            Duration::from_millis(10),
            Duration::from_millis(10),
            ValidationRules {
                min_phase_chars: 0,
                answer_complete_chars: 10,
            },
        );
        assert!(matches!(result, Err(CaptureError::InvalidInput(_))));
    }
}
