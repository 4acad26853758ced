//! Read-through cache of the accounts behind sessions

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

/// The account data that is needed to resolve a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedAccount {
    /// Identifier of the account
    pub uuid: Uuid,
    /// The unique username
    pub username: String,
    /// The name to display
    pub display_name: String,
    /// The account was verified by an administrator
    pub verified: bool,
    /// The account is not deactivated
    pub active: bool,
}

struct Entry {
    inserted: Instant,
    account: CachedAccount,
}

/// In-memory cache of [CachedAccount]s.
///
/// Entries are served until `ttl` has passed, reads may therefore be stale for up to `ttl`.
pub struct AccountCache {
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, Entry>>,
}

impl AccountCache {
    /// Creates a new empty cache
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Gets a cached account if it isn't expired yet
    pub async fn get(&self, uuid: &Uuid) -> Option<CachedAccount> {
        let entries = self.entries.read().await;
        entries
            .get(uuid)
            .filter(|e| e.inserted.elapsed() < self.ttl)
            .map(|e| e.account.clone())
    }

    /// Inserts an account into the cache
    pub async fn insert(&self, account: CachedAccount) {
        let mut entries = self.entries.write().await;

        // Don't let expired entries pile up
        entries.retain(|_, e| e.inserted.elapsed() < self.ttl);

        entries.insert(
            account.uuid,
            Entry {
                inserted: Instant::now(),
                account,
            },
        );
    }

    /// Removes an account from the cache, called whenever it is modified
    pub async fn invalidate(&self, uuid: &Uuid) {
        let mut entries = self.entries.write().await;
        entries.remove(uuid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> CachedAccount {
        CachedAccount {
            uuid: Uuid::new_v4(),
            username: "anna".to_string(),
            display_name: "Anna".to_string(),
            verified: true,
            active: true,
        }
    }

    #[tokio::test]
    async fn serves_inserted_accounts() {
        let cache = AccountCache::new(Duration::from_secs(900));
        let account = account();

        assert_eq!(cache.get(&account.uuid).await, None);
        cache.insert(account.clone()).await;
        assert_eq!(cache.get(&account.uuid).await, Some(account));
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let cache = AccountCache::new(Duration::ZERO);
        let account = account();

        cache.insert(account.clone()).await;
        assert_eq!(cache.get(&account.uuid).await, None);
    }

    #[tokio::test]
    async fn invalidate() {
        let cache = AccountCache::new(Duration::from_secs(900));
        let account = account();

        cache.insert(account.clone()).await;
        cache.invalidate(&account.uuid).await;
        assert_eq!(cache.get(&account.uuid).await, None);
    }
}
