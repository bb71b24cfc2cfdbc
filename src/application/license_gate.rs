use crate::domain::license::{should_revalidate, LicenseState, LicenseTier, MIN_LICENSE_KEY_LENGTH};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::{KeyValueStore, LICENSE_KEY, LICENSE_VALIDATED_AT_KEY};
use crate::infrastructure::license_client::{LicenseValidationRequest, LicenseValidator};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Accepts RFC 3339 or epoch milliseconds, the two formats a stored
/// validation timestamp can have.
fn parse_validated_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
}

/// Reads the persisted license state. A timestamp without a key is ignored.
pub fn load_license_state<S>(store: &S) -> Result<LicenseState, InfraError>
where
    S: KeyValueStore + ?Sized,
{
    let key = store
        .get(LICENSE_KEY)?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let Some(key) = key else {
        return Ok(LicenseState::default());
    };

    let last_validated_at = store
        .get(LICENSE_VALIDATED_AT_KEY)?
        .as_deref()
        .and_then(parse_validated_at);
    Ok(LicenseState {
        key: Some(key),
        is_pro_tier: last_validated_at.is_some(),
        last_validated_at,
    })
}

pub struct LicenseGate<S, V>
where
    S: KeyValueStore,
    V: LicenseValidator,
{
    store: Arc<S>,
    validator: Arc<V>,
    instance_name: String,
    state: Mutex<LicenseState>,
    generation: AtomicU64,
    now_provider: NowProvider,
}

impl<S, V> LicenseGate<S, V>
where
    S: KeyValueStore,
    V: LicenseValidator,
{
    pub fn new(store: Arc<S>, validator: Arc<V>, instance_name: impl Into<String>) -> Self {
        Self {
            store,
            validator,
            instance_name: instance_name.into(),
            state: Mutex::new(LicenseState::default()),
            generation: AtomicU64::new(0),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, LicenseState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Loads the persisted key and validation timestamp into memory.
    pub fn restore(&self) -> Result<LicenseState, InfraError> {
        let restored = load_license_state(self.store.as_ref())?;
        *self.lock_state() = restored.clone();
        Ok(restored)
    }

    pub fn state(&self) -> LicenseState {
        self.lock_state().clone()
    }

    pub fn tier(&self) -> LicenseTier {
        self.lock_state().tier()
    }

    pub fn max_groups(&self) -> usize {
        self.tier().max_groups()
    }

    /// Stores a key without validating it. Changing or removing the key drops
    /// the pro flag and cancels any validation still in flight.
    pub fn set_key(&self, key: Option<&str>) -> Result<(), InfraError> {
        let key = key.map(str::trim).filter(|value| !value.is_empty());
        {
            let mut state = self.lock_state();
            if state.key.as_deref() == key {
                return Ok(());
            }
            *state = LicenseState {
                key: key.map(ToOwned::to_owned),
                is_pro_tier: false,
                last_validated_at: None,
            };
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        self.store.remove(LICENSE_VALIDATED_AT_KEY)?;
        match key {
            Some(key) => self.store.set(LICENSE_KEY, key),
            None => self.store.remove(LICENSE_KEY),
        }
    }

    pub fn clear(&self) -> Result<(), InfraError> {
        self.set_key(None)
    }

    pub fn should_revalidate(&self, max_age: Duration) -> bool {
        should_revalidate(&self.lock_state(), (self.now_provider)(), max_age)
    }

    /// Asks the remote endpoint whether `key` is active and, on success,
    /// records the key as pro. Failures never downgrade the current tier.
    /// A result that arrives after a newer validation started, or after the
    /// key changed, is reported but not applied.
    pub async fn validate(&self, key: &str) -> bool {
        let key = key.trim();
        if key.chars().count() < MIN_LICENSE_KEY_LENGTH {
            tracing::warn!("license key rejected locally: shorter than {MIN_LICENSE_KEY_LENGTH} characters");
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let request = LicenseValidationRequest::activate(key, self.instance_name.as_str());
        match self.validator.validate(request).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("license endpoint did not report the key as active");
                return false;
            }
            Err(error) => {
                tracing::warn!("license validation failed: {error}");
                return false;
            }
        }

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("discarding stale license validation result");
            return true;
        }

        let now = (self.now_provider)();
        *self.lock_state() = LicenseState {
            key: Some(key.to_string()),
            is_pro_tier: true,
            last_validated_at: Some(now),
        };
        if let Err(error) = self.persist_validation(key, now) {
            tracing::warn!("license validated but could not be persisted: {error}");
        }
        tracing::info!("license activated");
        true
    }

    fn persist_validation(&self, key: &str, validated_at: DateTime<Utc>) -> Result<(), InfraError> {
        self.store.set(LICENSE_KEY, key)?;
        self.store.set(LICENSE_VALIDATED_AT_KEY, &validated_at.to_rfc3339())
    }
}
