use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::ConnectionStatus;
use crate::social::{Change, ConnectionRecord, Pair, SocialError};

/// The decision made inside [ConnectionStore::transition]
pub type Decide<'a> =
    &'a (dyn Fn(Option<&ConnectionRecord>) -> Result<Change, SocialError> + Send + Sync);

/// Persistence of connections.
///
/// Every lookup goes through a [Pair], so it doesn't matter which account is stored as
/// initiator.
#[async_trait]
pub trait ConnectionStore {
    /// The connection of `pair`, if there is one
    async fn find_pair(&self, pair: Pair) -> Result<Option<ConnectionRecord>, SocialError>;

    /// The connection with the given id
    async fn find_by_id(&self, id: i64) -> Result<Option<ConnectionRecord>, SocialError>;

    /// Read the connection of `pair`, let `decide` choose a [Change] and apply it atomically.
    ///
    /// Returns the connection after the change, `None` if there is none anymore.
    async fn transition(
        &self,
        pair: Pair,
        decide: Decide<'_>,
    ) -> Result<Option<ConnectionRecord>, SocialError>;

    /// All connections of `user`, newest first
    async fn list_for(
        &self,
        user: Uuid,
        status: Option<ConnectionStatus>,
    ) -> Result<Vec<ConnectionRecord>, SocialError>;

    /// The subset of `candidates` that has a connection of any status with `user`
    async fn connected_among(
        &self,
        user: Uuid,
        candidates: &[Uuid],
    ) -> Result<HashSet<Uuid>, SocialError>;

    /// Remember the last direct message of `pair`
    async fn touch_message(&self, pair: Pair, at: DateTime<Utc>) -> Result<(), SocialError>;

    /// Delete every connection referencing `user`
    async fn purge_user(&self, user: Uuid) -> Result<u64, SocialError>;
}

/// The public data of an account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSummary {
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
    /// The point in time the account was registered
    pub joined_at: DateTime<Utc>,
}

/// Lookup of accounts
#[async_trait]
pub trait UserDirectory {
    /// The account with the given uuid, regardless of its state
    async fn find_user(&self, uuid: Uuid) -> Result<Option<UserSummary>, SocialError>;

    /// The accounts with the given uuids, in no particular order
    async fn users_by_ids(&self, uuids: &[Uuid]) -> Result<Vec<UserSummary>, SocialError>;

    /// Active and verified accounts except `exclude`, newest first
    async fn suggestion_candidates(
        &self,
        exclude: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UserSummary>, SocialError>;

    /// Active and verified accounts except `exclude` whose name contains `query`
    async fn search_users(
        &self,
        exclude: Uuid,
        query: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UserSummary>, SocialError>;
}
