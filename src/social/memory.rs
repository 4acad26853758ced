//! A [ConnectionStore] and [UserDirectory] kept in memory, used to test the graph

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::ConnectionStatus;
use crate::social::{
    Change, ConflictReason, ConnectionRecord, ConnectionStore, Decide, Missing, Pair,
    SocialError, UserDirectory, UserSummary,
};

#[derive(Default)]
struct State {
    next_id: i64,
    connections: HashMap<Pair, ConnectionRecord>,
    users: Vec<UserSummary>,
}

pub(crate) struct MemoryStore {
    epoch: DateTime<Utc>,
    state: Mutex<State>,
    break_after_write: AtomicBool,
    directory_broken: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Utc::now() - Duration::days(365),
            state: Mutex::new(State::default()),
            break_after_write: AtomicBool::new(false),
            directory_broken: AtomicBool::new(false),
        }
    }

    /// Let every account lookup fail once the next transition went through
    pub(crate) fn break_directory_after_write(&self) {
        self.break_after_write.store(true, Ordering::SeqCst);
    }

    fn check_directory(&self) -> Result<(), SocialError> {
        if self.directory_broken.load(Ordering::SeqCst) {
            return Err(SocialError::Unavailable(String::from("directory is down")));
        }
        Ok(())
    }

    /// Register an account, every account is newer than the ones before
    pub(crate) async fn add_user(&self, name: &str, verified: bool, active: bool) -> Uuid {
        let mut state = self.state.lock().await;
        let uuid = Uuid::new_v4();
        let joined_at = self.epoch + Duration::minutes(state.users.len() as i64);

        state.users.push(UserSummary {
            uuid,
            username: name.to_lowercase(),
            display_name: name.to_string(),
            verified,
            active,
            joined_at,
        });

        uuid
    }

    pub(crate) async fn deactivate(&self, uuid: Uuid) {
        if let Some(user) = self.state.lock().await.users.iter_mut().find(|u| u.uuid == uuid) {
            user.active = false;
        }
    }

    pub(crate) async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    /// Move the creation time of the connection of `pair`
    pub(crate) async fn set_created_at(&self, pair: Pair, at: DateTime<Utc>) {
        if let Some(connection) = self.state.lock().await.connections.get_mut(&pair) {
            connection.created_at = at;
        }
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn find_pair(&self, pair: Pair) -> Result<Option<ConnectionRecord>, SocialError> {
        Ok(self.state.lock().await.connections.get(&pair).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ConnectionRecord>, SocialError> {
        Ok(self
            .state
            .lock()
            .await
            .connections
            .values()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn transition(
        &self,
        pair: Pair,
        decide: Decide<'_>,
    ) -> Result<Option<ConnectionRecord>, SocialError> {
        let mut state = self.state.lock().await;
        let current = state.connections.get(&pair).cloned();
        let now = Utc::now();

        let change = decide(current.as_ref())?;
        if self.break_after_write.swap(false, Ordering::SeqCst) {
            self.directory_broken.store(true, Ordering::SeqCst);
        }

        match (change, current) {
            (Change::Keep, current) => Ok(current),
            (
                Change::Create {
                    initiator,
                    target,
                    status,
                },
                None,
            ) => {
                state.next_id += 1;
                let connection =
                    ConnectionRecord::new(state.next_id, initiator, target, status, now);
                state.connections.insert(pair, connection.clone());
                Ok(Some(connection))
            }
            (Change::Create { .. }, Some(_)) => {
                Err(SocialError::Conflict(ConflictReason::DuplicatePair))
            }
            (
                Change::Update {
                    initiator,
                    target,
                    status,
                },
                Some(current),
            ) => {
                let next = current.rewritten(initiator, target, status, now);
                state.connections.insert(pair, next.clone());
                Ok(Some(next))
            }
            (Change::Delete, Some(_)) => {
                state.connections.remove(&pair);
                Ok(None)
            }
            (Change::Update { .. } | Change::Delete, None) => {
                Err(SocialError::NotFound(Missing::Connection))
            }
        }
    }

    async fn list_for(
        &self,
        user: Uuid,
        status: Option<ConnectionStatus>,
    ) -> Result<Vec<ConnectionRecord>, SocialError> {
        let mut connections: Vec<ConnectionRecord> = self
            .state
            .lock()
            .await
            .connections
            .values()
            .filter(|c| c.partner_of(user).is_some())
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();

        connections.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(connections)
    }

    async fn connected_among(
        &self,
        user: Uuid,
        candidates: &[Uuid],
    ) -> Result<HashSet<Uuid>, SocialError> {
        let state = self.state.lock().await;

        Ok(candidates
            .iter()
            .filter(|c| {
                Pair::new(user, **c)
                    .map(|pair| state.connections.contains_key(&pair))
                    .unwrap_or(false)
            })
            .copied()
            .collect())
    }

    async fn touch_message(&self, pair: Pair, at: DateTime<Utc>) -> Result<(), SocialError> {
        let mut state = self.state.lock().await;
        let connection = state
            .connections
            .get_mut(&pair)
            .ok_or(SocialError::NotFound(Missing::Connection))?;
        connection.last_message_at = Some(at);
        Ok(())
    }

    async fn purge_user(&self, user: Uuid) -> Result<u64, SocialError> {
        let mut state = self.state.lock().await;
        let before = state.connections.len();
        state
            .connections
            .retain(|pair, _| pair.low() != user && pair.high() != user);
        Ok((before - state.connections.len()) as u64)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, uuid: Uuid) -> Result<Option<UserSummary>, SocialError> {
        self.check_directory()?;
        Ok(self
            .state
            .lock()
            .await
            .users
            .iter()
            .find(|u| u.uuid == uuid)
            .cloned())
    }

    async fn users_by_ids(&self, uuids: &[Uuid]) -> Result<Vec<UserSummary>, SocialError> {
        self.check_directory()?;
        Ok(self
            .state
            .lock()
            .await
            .users
            .iter()
            .filter(|u| uuids.contains(&u.uuid))
            .cloned()
            .collect())
    }

    async fn suggestion_candidates(
        &self,
        exclude: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UserSummary>, SocialError> {
        let mut users: Vec<UserSummary> = self
            .state
            .lock()
            .await
            .users
            .iter()
            .filter(|u| u.active && u.verified && u.uuid != exclude)
            .cloned()
            .collect();

        users.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));

        Ok(users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn search_users(
        &self,
        exclude: Uuid,
        query: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UserSummary>, SocialError> {
        let mut users: Vec<UserSummary> = self
            .state
            .lock()
            .await
            .users
            .iter()
            .filter(|u| u.active && u.verified && u.uuid != exclude)
            .filter(|u| u.username.contains(query) || u.display_name.contains(query))
            .cloned()
            .collect();

        users.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        Ok(users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}
