use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const FREE_MAX_GROUPS: usize = 5;
pub const PRO_MAX_GROUPS: usize = 10;
pub const DEFAULT_REVALIDATE_AFTER_DAYS: i64 = 7;
pub const MIN_LICENSE_KEY_LENGTH: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LicenseTier {
    #[default]
    Free,
    Pro,
}

impl LicenseTier {
    pub fn max_groups(self) -> usize {
        match self {
            Self::Free => FREE_MAX_GROUPS,
            Self::Pro => PRO_MAX_GROUPS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    NoKey,
    KeyStoredUnvalidated,
    ProActive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LicenseState {
    pub key: Option<String>,
    pub is_pro_tier: bool,
    pub last_validated_at: Option<DateTime<Utc>>,
}

impl LicenseState {
    pub fn tier(&self) -> LicenseTier {
        if self.is_pro_tier {
            LicenseTier::Pro
        } else {
            LicenseTier::Free
        }
    }

    pub fn status(&self) -> LicenseStatus {
        match (&self.key, self.is_pro_tier) {
            (None, _) => LicenseStatus::NoKey,
            (Some(_), false) => LicenseStatus::KeyStoredUnvalidated,
            (Some(_), true) => LicenseStatus::ProActive,
        }
    }
}

/// Revalidation policy owned by the caller. A stored key is revalidated when it
/// has never been validated or its last validation is at least `max_age` old.
/// A failed revalidation does not revoke the cached tier; callers that want to
/// downgrade must do so explicitly.
pub fn should_revalidate(state: &LicenseState, now: DateTime<Utc>, max_age: Duration) -> bool {
    if state.key.is_none() {
        return false;
    }
    match state.last_validated_at {
        None => true,
        Some(validated_at) => now - validated_at >= max_age,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn pro_state(validated_at: &str) -> LicenseState {
        LicenseState {
            key: Some("ABCDEFGHIJ-0123456789".to_string()),
            is_pro_tier: true,
            last_validated_at: Some(fixed_time(validated_at)),
        }
    }

    #[test]
    fn tier_controls_group_capacity() {
        assert_eq!(LicenseTier::Free.max_groups(), 5);
        assert_eq!(LicenseTier::Pro.max_groups(), 10);
    }

    #[test]
    fn status_follows_key_and_tier() {
        let mut state = LicenseState::default();
        assert_eq!(state.status(), LicenseStatus::NoKey);
        state.key = Some("key".to_string());
        assert_eq!(state.status(), LicenseStatus::KeyStoredUnvalidated);
        state.is_pro_tier = true;
        assert_eq!(state.status(), LicenseStatus::ProActive);
        assert_eq!(state.tier(), LicenseTier::Pro);
    }

    #[test]
    fn revalidation_is_due_after_seven_days() {
        let state = pro_state("2026-02-01T00:00:00Z");
        let max_age = Duration::days(DEFAULT_REVALIDATE_AFTER_DAYS);
        assert!(!should_revalidate(&state, fixed_time("2026-02-07T23:59:59Z"), max_age));
        assert!(should_revalidate(&state, fixed_time("2026-02-08T00:00:00Z"), max_age));
    }

    #[test]
    fn revalidation_requires_a_key() {
        let state = LicenseState::default();
        assert!(!should_revalidate(&state, Utc::now(), Duration::days(7)));

        let unvalidated = LicenseState {
            key: Some("key".to_string()),
            ..LicenseState::default()
        };
        assert!(should_revalidate(&unvalidated, Utc::now(), Duration::days(7)));
    }
}
