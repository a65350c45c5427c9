// ── Cooldown aggregator ──
//
// Per-provider cooldown answers derived from the cached `cooldowns` entry.
// Mutations go to the server first; the cache only changes through the
// refetch their success triggers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use maxxctl_api::{AdminClient, Cooldown, CooldownReason};
use serde::Serialize;
use tracing::debug;

use super::timing::{find_active, format_remaining, remaining_seconds};
use crate::cache::{QueryCache, QueryData, QueryKey, QueryObserver};
use crate::error::CoreError;

/// Result of asking whether a provider is cooling down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CooldownLookup {
    /// The cooldown list has not been fetched yet.
    NotReady,
    Inactive,
    Active(Cooldown),
}

impl CooldownLookup {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn cooldown(&self) -> Option<&Cooldown> {
        match self {
            Self::Active(cd) => Some(cd),
            Self::NotReady | Self::Inactive => None,
        }
    }
}

/// Display-ready view of one cooldown at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownView {
    pub provider_id: u64,
    pub provider_name: Option<String>,
    pub client_type: String,
    pub reason: CooldownReason,
    pub until: Option<DateTime<Utc>>,
    pub remaining_seconds: u64,
    /// `remaining_seconds` rendered by [`format_remaining`].
    pub remaining: String,
}

impl CooldownView {
    pub fn new(cd: &Cooldown, now: DateTime<Utc>) -> Self {
        let remaining_seconds = remaining_seconds(cd, now);
        Self {
            provider_id: cd.provider_id,
            provider_name: cd.provider_name.clone(),
            client_type: cd.client_type.clone(),
            reason: cd.reason,
            until: cd.until,
            remaining_seconds,
            remaining: format_remaining(Some(remaining_seconds)),
        }
    }
}

/// Cooldown queries and mutations over the shared cache.
#[derive(Clone)]
pub struct CooldownAggregator {
    client: AdminClient,
    cache: Arc<QueryCache>,
    stale_time: Duration,
}

impl CooldownAggregator {
    pub fn new(client: AdminClient, cache: Arc<QueryCache>, stale_time: Duration) -> Self {
        Self {
            client,
            cache,
            stale_time,
        }
    }

    /// Observe the cooldown list, fetching it unless it is fresh.
    pub async fn load(&self) -> Result<QueryObserver, CoreError> {
        let key = QueryKey::cooldowns();
        let observer = self.cache.observe(key.clone());
        if !self.cache.is_fresh(&key, self.stale_time) {
            self.refetch().await?;
        }
        Ok(observer)
    }

    /// Fetch the cooldown list unconditionally.
    pub async fn refetch(&self) -> Result<(), CoreError> {
        let client = &self.client;
        self.cache
            .fetch_with(&QueryKey::cooldowns(), async {
                let list = client.get_cooldowns().await?;
                debug!(count = list.len(), "fetched cooldowns");
                Ok::<_, CoreError>(QueryData::Cooldowns(list))
            })
            .await
    }

    /// The cached list, or `None` before the first successful fetch.
    pub fn list(&self) -> Option<Vec<Cooldown>> {
        let data = self.cache.get(&QueryKey::cooldowns())?;
        data.as_cooldowns().map(<[Cooldown]>::to_vec)
    }

    /// Active cooldown for `provider_id` (optionally scoped to a client
    /// type) at `now`.
    pub fn lookup(&self, provider_id: u64, client_type: Option<&str>, now: DateTime<Utc>) -> CooldownLookup {
        let Some(data) = self.cache.get(&QueryKey::cooldowns()) else {
            return CooldownLookup::NotReady;
        };
        let Some(list) = data.as_cooldowns() else {
            return CooldownLookup::NotReady;
        };
        match find_active(list, provider_id, client_type, now) {
            Some(cd) => CooldownLookup::Active(cd.clone()),
            None => CooldownLookup::Inactive,
        }
    }

    pub fn is_in_cooldown(
        &self,
        provider_id: u64,
        client_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        match self.lookup(provider_id, client_type, now) {
            CooldownLookup::NotReady => Err(not_ready()),
            lookup => Ok(lookup.is_active()),
        }
    }

    /// Display view of the provider's active cooldown, if any.
    pub fn cooldown_for_provider(
        &self,
        provider_id: u64,
        client_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<CooldownView>, CoreError> {
        match self.lookup(provider_id, client_type, now) {
            CooldownLookup::NotReady => Err(not_ready()),
            CooldownLookup::Inactive => Ok(None),
            CooldownLookup::Active(cd) => Ok(Some(CooldownView::new(&cd, now))),
        }
    }

    /// Views of every cooldown still active at `now`, in list order.
    pub fn active(&self, now: DateTime<Utc>) -> Result<Vec<CooldownView>, CoreError> {
        let list = self.list().ok_or_else(not_ready)?;
        Ok(list
            .iter()
            .filter(|cd| cd.until.is_some_and(|until| until > now))
            .map(|cd| CooldownView::new(cd, now))
            .collect())
    }

    /// Force-expire every cooldown of `provider_id`.
    pub async fn clear_cooldown(&self, provider_id: u64) -> Result<(), CoreError> {
        self.client.clear_cooldown(provider_id).await?;
        debug!(provider_id, "cooldown cleared");
        self.cache.invalidate(&QueryKey::cooldowns());
        Ok(())
    }

    /// Create or extend a cooldown until `until`.
    pub async fn set_cooldown(
        &self,
        provider_id: u64,
        until: DateTime<Utc>,
        client_type: Option<&str>,
    ) -> Result<(), CoreError> {
        self.client
            .set_cooldown(provider_id, until, client_type)
            .await?;
        debug!(provider_id, %until, ?client_type, "cooldown set");
        self.cache.invalidate(&QueryKey::cooldowns());
        Ok(())
    }
}

fn not_ready() -> CoreError {
    CoreError::NotReady {
        what: "cooldown list".into(),
    }
}
