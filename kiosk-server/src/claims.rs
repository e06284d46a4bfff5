// kiosk-server/src/claims.rs
use chrono::{DateTime, Duration, Utc};
use common::models::coin::{ClaimedCoin, CoinKey};
use common::LedgerConfig;
use dashmap::DashMap;

/// Binds anonymous coin events to the session allowed to spend them.
/// Entries live for a fixed TTL; claiming the same coin twice keeps the last claim.
#[derive(Debug)]
pub struct ClaimLedger {
    claims: DashMap<CoinKey, ClaimedCoin>,
    ttl: Duration,
}

impl Default for ClaimLedger {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for ClaimLedger {
    fn from(config: &LedgerConfig) -> Self {
        Self::new(Duration::seconds(config.claim_ttl_secs as i64))
    }
}

impl ClaimLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            claims: DashMap::new(),
            ttl,
        }
    }

    /// Store a claim, returning the one it replaced
    pub fn claim(&self, key: CoinKey, session_id: &str, now: DateTime<Utc>) -> Option<ClaimedCoin> {
        let previous = self.claims.insert(
            key,
            ClaimedCoin {
                session_id: session_id.to_string(),
                claimed_at: now,
            },
        );

        if let Some(previous) = &previous {
            if previous.session_id != session_id {
                tracing::warn!(
                    "Coin {:?} reclaimed by {} (was {})",
                    key,
                    session_id,
                    previous.session_id
                );
            }
        }
        tracing::info!("Coin {:?} claimed by session {}", key, session_id);
        previous
    }

    /// Claim for a coin, ignoring entries older than the TTL that the sweep has not reached yet
    pub fn lookup(&self, key: &CoinKey, now: DateTime<Utc>) -> Option<ClaimedCoin> {
        self.claims
            .get(key)
            .filter(|entry| !self.is_expired(entry.value(), now))
            .map(|entry| entry.value().clone())
    }

    pub fn is_claimed_by(&self, key: &CoinKey, session_id: &str, now: DateTime<Utc>) -> bool {
        self.lookup(key, now)
            .map(|claim| claim.session_id == session_id)
            .unwrap_or(false)
    }

    /// Remove expired claims, returning how many were dropped
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.claims.len();
        self.claims.retain(|_, claim| !self.is_expired(claim, now));
        before - self.claims.len()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    fn is_expired(&self, claim: &ClaimedCoin, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(claim.claimed_at) > self.ttl
    }
}
