use crate::application::store::{PlannerStore, SubscriptionId};
use crate::domain::snapshot::Snapshot;
use crate::infrastructure::state_codec::{decode_fragment, encode_snapshot, CodecError};
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use url::Url;

/// Accepts a full share URL, a bare `#fragment`, or the encoded payload alone.
pub fn fragment_from_input(input: &str) -> String {
    let input = input.trim();
    match Url::parse(input) {
        Ok(url) => url.fragment().unwrap_or_default().to_string(),
        Err(_) => input.trim_start_matches('#').to_string(),
    }
}

pub fn load_snapshot(input: &str, today: NaiveDate) -> Snapshot {
    decode_fragment(&fragment_from_input(input), today)
}

pub fn generate_shareable_url(base: &Url, snapshot: &Snapshot) -> Result<Url, CodecError> {
    let fragment = encode_snapshot(snapshot)?;
    let mut url = base.clone();
    url.set_fragment(Some(&fragment));
    Ok(url)
}

/// Keeps the share fragment in step with a [`PlannerStore`]. After `attach`
/// the latest fragment always reflects the store's current snapshot.
#[derive(Debug, Clone)]
pub struct ShareUrlSync {
    base: Url,
    latest: Arc<Mutex<Option<String>>>,
}

impl ShareUrlSync {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn attach(&self, store: &mut PlannerStore) -> SubscriptionId {
        record_fragment(&self.latest, store.snapshot());
        let latest = Arc::clone(&self.latest);
        store.subscribe(move |snapshot| record_fragment(&latest, snapshot))
    }

    pub fn latest_fragment(&self) -> Option<String> {
        self.latest
            .lock()
            .map(|fragment| fragment.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn latest_url(&self) -> Option<Url> {
        let fragment = self.latest_fragment()?;
        let mut url = self.base.clone();
        url.set_fragment(Some(&fragment));
        Some(url)
    }
}

fn record_fragment(latest: &Mutex<Option<String>>, snapshot: &Snapshot) {
    match encode_snapshot(snapshot) {
        Ok(fragment) => {
            let mut slot = latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            *slot = Some(fragment);
        }
        Err(error) => tracing::warn!("failed to encode share state: {error}"),
    }
}
