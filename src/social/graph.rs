use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use uuid::Uuid;

use crate::chan::{WsManagerChan, WsManagerMessage, WsMessage};
use crate::models::ConnectionStatus;
use crate::social::{
    decide, evaluate, Action, Capabilities, ConnectionRecord, ConnectionStore, Missing, Page,
    Pair, Relation, SocialError, UserDirectory, UserSummary,
};

/// The count of candidates that are fetched at once when collecting suggestions
const SUGGESTION_BATCH: u64 = 100;

/// The relation of two accounts and what follows from it
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusView {
    /// The relation, seen by the viewer
    pub relation: Relation,
    /// The capabilities of the viewer
    pub capabilities: Capabilities,
}

/// A connection together with the account on the other side
#[derive(Clone, Debug)]
pub struct ConnectionEntry {
    /// The stored connection
    pub connection: ConnectionRecord,
    /// The account on the other side
    pub partner: UserSummary,
    /// The relation, seen by the listing account
    pub relation: Relation,
}

/// The friend graph.
///
/// All connection related operations of the API go through this type.
pub struct SocialGraph<S> {
    store: S,
    ws_manager_chan: WsManagerChan,
}

impl<S> SocialGraph<S>
where
    S: ConnectionStore + UserDirectory + Send + Sync,
{
    /// Create a graph on top of `store`.
    ///
    /// Notifications are handed to the websocket manager behind `ws_manager_chan`.
    pub fn new(store: S, ws_manager_chan: WsManagerChan) -> Self {
        Self {
            store,
            ws_manager_chan,
        }
    }

    /// Send a friend request from `from` to `to`
    pub async fn send_request(
        &self,
        from: Uuid,
        to: Uuid,
    ) -> Result<ConnectionRecord, SocialError> {
        let pair = Pair::new(from, to)?;
        self.active_account(to).await?;

        let connection = self
            .store
            .transition(pair, &|current| decide(current, from, to, Action::Send))
            .await?
            .ok_or(SocialError::NotFound(Missing::Connection))?;

        debug!("Friend request {} was sent", connection.id);

        self.notify_about(to, from, |sender| WsMessage::IncomingFriendRequest {
            connection_id: connection.id,
            from: sender.into(),
        })
        .await;

        Ok(connection)
    }

    /// Accept or reject the request `request_id` as `by`.
    ///
    /// Only the target of the request may answer it.
    pub async fn respond(
        &self,
        request_id: i64,
        by: Uuid,
        accept: bool,
    ) -> Result<ConnectionRecord, SocialError> {
        let request = self
            .store
            .find_by_id(request_id)
            .await?
            .ok_or(SocialError::NotFound(Missing::Connection))?;

        // Requests of other accounts don't exist for `by`
        let other = request
            .partner_of(by)
            .ok_or(SocialError::NotFound(Missing::Connection))?;

        let action = if accept {
            Action::Accept
        } else {
            Action::Reject
        };

        let connection = self
            .store
            .transition(request.pair()?, &|current| match current {
                Some(current) if current.id == request_id => {
                    decide(Some(current), by, other, action)
                }
                _ => Err(SocialError::NotFound(Missing::Connection)),
            })
            .await?
            .ok_or(SocialError::NotFound(Missing::Connection))?;

        if connection.status == ConnectionStatus::Accepted {
            self.notify_about(other, by, |acceptor| WsMessage::FriendRequestAccepted {
                connection_id: connection.id,
                by: acceptor.into(),
            })
            .await;
        }

        Ok(connection)
    }

    /// Withdraw the request `by` has sent to `target`
    pub async fn cancel(&self, by: Uuid, target: Uuid) -> Result<(), SocialError> {
        self.apply(by, target, Action::Cancel).await.map(|_| ())
    }

    /// End the friendship of `a` and `b`
    pub async fn remove(&self, a: Uuid, b: Uuid) -> Result<(), SocialError> {
        self.apply(a, b, Action::Remove).await.map(|_| ())
    }

    /// Block `target`.
    ///
    /// Blocking an already blocked account succeeds without changes.
    pub async fn block(&self, by: Uuid, target: Uuid) -> Result<(), SocialError> {
        self.store
            .find_user(target)
            .await?
            .ok_or(SocialError::NotFound(Missing::Account))?;

        self.apply(by, target, Action::Block).await.map(|_| ())
    }

    /// Lift the block `by` has put on `target`
    pub async fn unblock(&self, by: Uuid, target: Uuid) -> Result<(), SocialError> {
        self.apply(by, target, Action::Unblock).await.map(|_| ())
    }

    /// The relation of `viewer` to `subject`
    pub async fn status(&self, viewer: Uuid, subject: Uuid) -> Result<StatusView, SocialError> {
        if viewer == subject {
            return Ok(StatusView {
                relation: Relation::None,
                capabilities: evaluate(viewer, subject, Relation::None),
            });
        }

        self.active_account(subject).await?;

        let connection = self.store.find_pair(Pair::new(viewer, subject)?).await?;
        let relation = Relation::of(connection.as_ref(), viewer);

        Ok(StatusView {
            relation,
            capabilities: evaluate(viewer, subject, relation),
        })
    }

    /// The connections of `user`, newest first.
    ///
    /// Accounts that blocked `user` are not listed.
    pub async fn list_connections(
        &self,
        user: Uuid,
        relation: Option<Relation>,
        page: Page,
    ) -> Result<Vec<ConnectionEntry>, SocialError> {
        let status = match relation {
            None => None,
            Some(Relation::None) => return Ok(Vec::new()),
            Some(Relation::Sent | Relation::Received) => Some(ConnectionStatus::Pending),
            Some(Relation::Accepted) => Some(ConnectionStatus::Accepted),
            Some(Relation::Rejected) => Some(ConnectionStatus::Rejected),
            Some(Relation::Blocked) => Some(ConnectionStatus::Blocked),
        };

        let visible = self
            .store
            .list_for(user, status)
            .await?
            .into_iter()
            .filter(|c| c.status != ConnectionStatus::Blocked || c.user == user)
            .filter(|c| relation.map_or(true, |r| Relation::of(Some(c), user) == r));

        self.with_partners(user, page.slice(visible)).await
    }

    /// The friends of `user` ordered by the last direct message, most recent first
    pub async fn conversations(
        &self,
        user: Uuid,
        page: Page,
    ) -> Result<Vec<ConnectionEntry>, SocialError> {
        let mut friends = self
            .store
            .list_for(user, Some(ConnectionStatus::Accepted))
            .await?;

        // Friends without messages go last
        friends.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));

        self.with_partners(user, page.slice(friends)).await
    }

    /// The accounts that are friends with both `a` and `b`.
    ///
    /// Ordered by the creation of `a`'s connection to them, newest first.
    pub async fn mutual_friends(
        &self,
        a: Uuid,
        b: Uuid,
        page: Page,
    ) -> Result<Vec<UserSummary>, SocialError> {
        let pair = Pair::new(a, b)?;

        if let Some(connection) = self.store.find_pair(pair).await? {
            if connection.status == ConnectionStatus::Blocked {
                return Err(SocialError::Forbidden);
            }
        }

        let theirs: HashSet<Uuid> = self
            .store
            .list_for(b, Some(ConnectionStatus::Accepted))
            .await?
            .iter()
            .filter_map(|c| c.partner_of(b))
            .collect();

        let mut mutual: Vec<(DateTime<Utc>, Uuid)> = self
            .store
            .list_for(a, Some(ConnectionStatus::Accepted))
            .await?
            .iter()
            .filter_map(|c| c.partner_of(a).map(|partner| (c.created_at, partner)))
            .filter(|(_, partner)| theirs.contains(partner))
            .collect();

        mutual.sort_by(|x, y| y.0.cmp(&x.0).then(x.1.cmp(&y.1)));

        let uuids: Vec<Uuid> = mutual.into_iter().map(|(_, partner)| partner).collect();
        Ok(page.slice(self.ordered_summaries(&uuids).await?))
    }

    /// Accounts `user` might want to befriend.
    ///
    /// Only active and verified accounts that have no connection with `user` are suggested,
    /// newest first.
    pub async fn suggestions(
        &self,
        user: Uuid,
        page: Page,
    ) -> Result<Vec<UserSummary>, SocialError> {
        let mut skip = page.offset();
        let limit = page.limit() as usize;
        let mut cursor = 0;
        let mut suggestions = Vec::with_capacity(limit);

        loop {
            let batch = self
                .store
                .suggestion_candidates(user, cursor, SUGGESTION_BATCH)
                .await?;
            let exhausted = (batch.len() as u64) < SUGGESTION_BATCH;
            cursor += batch.len() as u64;

            let uuids: Vec<Uuid> = batch.iter().map(|u| u.uuid).collect();
            let connected = self.store.connected_among(user, &uuids).await?;

            for candidate in batch {
                if candidate.uuid == user
                    || !candidate.active
                    || !candidate.verified
                    || connected.contains(&candidate.uuid)
                {
                    continue;
                }

                if skip > 0 {
                    skip -= 1;
                    continue;
                }

                suggestions.push(candidate);
                if suggestions.len() == limit {
                    return Ok(suggestions);
                }
            }

            if exhausted {
                return Ok(suggestions);
            }
        }
    }

    /// The friends of `user` whose username or display name contains `query`.
    ///
    /// The match is case-insensitive, names starting with `query` come first.
    pub async fn search_friends(
        &self,
        user: Uuid,
        query: &str,
        page: Page,
    ) -> Result<Vec<UserSummary>, SocialError> {
        let needle = query.trim().to_lowercase();

        let friends: Vec<Uuid> = self
            .store
            .list_for(user, Some(ConnectionStatus::Accepted))
            .await?
            .iter()
            .filter_map(|c| c.partner_of(user))
            .collect();

        let mut matches: Vec<(bool, String, UserSummary)> = self
            .store
            .users_by_ids(&friends)
            .await?
            .into_iter()
            .filter(|u| u.active)
            .filter_map(|u| {
                let username = u.username.to_lowercase();
                let display_name = u.display_name.to_lowercase();

                if !username.contains(&needle) && !display_name.contains(&needle) {
                    return None;
                }

                let prefix = username.starts_with(&needle) || display_name.starts_with(&needle);
                Some((!prefix, display_name, u))
            })
            .collect();

        matches.sort_by(|x, y| {
            x.0.cmp(&y.0)
                .then_with(|| x.1.cmp(&y.1))
                .then(x.2.uuid.cmp(&y.2.uuid))
        });

        Ok(page.slice(matches.into_iter().map(|(_, _, u)| u)))
    }

    /// Search the directory of active and verified accounts
    pub async fn search_accounts(
        &self,
        viewer: Uuid,
        query: &str,
        page: Page,
    ) -> Result<Vec<UserSummary>, SocialError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.store
            .search_users(viewer, query, page.offset(), page.limit())
            .await
    }

    /// Fails with [SocialError::Forbidden] unless `a` may chat with `b`
    pub async fn ensure_can_chat(&self, a: Uuid, b: Uuid) -> Result<(), SocialError> {
        if self.status(a, b).await?.capabilities.can_chat {
            Ok(())
        } else {
            Err(SocialError::Forbidden)
        }
    }

    /// Remember that `a` and `b` exchanged a message at `at`.
    ///
    /// The message is already stored, so a connection that vanished in between is ignored.
    pub async fn record_message(
        &self,
        a: Uuid,
        b: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), SocialError> {
        match self.store.touch_message(Pair::new(a, b)?, at).await {
            Err(SocialError::NotFound(Missing::Connection)) => {
                debug!("Connection vanished before the message time could be stored");
                Ok(())
            }
            result => result,
        }
    }

    /// Remove every connection of `user`, used when the account is deleted
    pub async fn purge(&self, user: Uuid) -> Result<u64, SocialError> {
        let purged = self.store.purge_user(user).await?;
        debug!("Purged {purged} connections");
        Ok(purged)
    }

    async fn apply(
        &self,
        actor: Uuid,
        other: Uuid,
        action: Action,
    ) -> Result<Option<ConnectionRecord>, SocialError> {
        let pair = Pair::new(actor, other)?;

        self.store
            .transition(pair, &|current| decide(current, actor, other, action))
            .await
    }

    async fn active_account(&self, uuid: Uuid) -> Result<UserSummary, SocialError> {
        self.store
            .find_user(uuid)
            .await?
            .filter(|u| u.active)
            .ok_or(SocialError::NotFound(Missing::Account))
    }

    async fn with_partners(
        &self,
        user: Uuid,
        connections: Vec<ConnectionRecord>,
    ) -> Result<Vec<ConnectionEntry>, SocialError> {
        let uuids: Vec<Uuid> = connections
            .iter()
            .filter_map(|c| c.partner_of(user))
            .collect();

        let mut partners: HashMap<Uuid, UserSummary> = self
            .store
            .users_by_ids(&uuids)
            .await?
            .into_iter()
            .map(|u| (u.uuid, u))
            .collect();

        Ok(connections
            .into_iter()
            .filter_map(|connection| {
                let partner = partners.remove(&connection.partner_of(user)?)?;
                Some(ConnectionEntry {
                    relation: Relation::of(Some(&connection), user),
                    connection,
                    partner,
                })
            })
            .collect())
    }

    async fn ordered_summaries(&self, uuids: &[Uuid]) -> Result<Vec<UserSummary>, SocialError> {
        let mut found: HashMap<Uuid, UserSummary> = self
            .store
            .users_by_ids(uuids)
            .await?
            .into_iter()
            .filter(|u| u.active)
            .map(|u| (u.uuid, u))
            .collect();

        Ok(uuids.iter().filter_map(|uuid| found.remove(uuid)).collect())
    }

    /// Notify `to` with a message about the account `about`.
    ///
    /// Runs after the change was stored, so failures are only logged.
    async fn notify_about(
        &self,
        to: Uuid,
        about: Uuid,
        message: impl FnOnce(UserSummary) -> WsMessage,
    ) {
        let account = match self.store.find_user(about).await {
            Ok(Some(account)) => account,
            Ok(None) => return,
            Err(err) => {
                warn!("Could not look up account for notification: {err}");
                return;
            }
        };

        if let Err(err) = self
            .ws_manager_chan
            .try_send(WsManagerMessage::SendMessage(to, message(account)))
        {
            warn!("Could not send to ws manager chan: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tokio::sync::mpsc;

    use super::*;
    use crate::chan::WsManagerMessage;
    use crate::social::memory::MemoryStore;
    use crate::social::ConflictReason;

    fn graph() -> (SocialGraph<MemoryStore>, mpsc::Receiver<WsManagerMessage>) {
        let (tx, rx) = mpsc::channel(64);
        (SocialGraph::new(MemoryStore::new(), tx), rx)
    }

    async fn user(graph: &SocialGraph<MemoryStore>, name: &str) -> Uuid {
        graph.store.add_user(name, true, true).await
    }

    async fn befriend(graph: &SocialGraph<MemoryStore>, a: Uuid, b: Uuid) {
        let request = graph.send_request(a, b).await.unwrap();
        graph.respond(request.id, b, true).await.unwrap();
    }

    #[tokio::test]
    async fn request_to_self_is_invalid() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;

        assert!(matches!(
            graph.send_request(a, a).await,
            Err(SocialError::InvalidOperation)
        ));
    }

    #[tokio::test]
    async fn request_to_unknown_or_inactive_account() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let gone = graph.store.add_user("Gone", true, false).await;

        assert!(matches!(
            graph.send_request(a, Uuid::new_v4()).await,
            Err(SocialError::NotFound(Missing::Account))
        ));
        assert!(matches!(
            graph.send_request(a, gone).await,
            Err(SocialError::NotFound(Missing::Account))
        ));
    }

    #[tokio::test]
    async fn concurrent_requests_collapse_into_one_connection() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        let (ab, ba) = tokio::join!(graph.send_request(a, b), graph.send_request(b, a));

        assert_eq!(graph.store.connection_count().await, 1);
        assert!(ab.is_ok() != ba.is_ok());
        for result in [ab, ba] {
            if let Err(err) = result {
                assert!(matches!(
                    err,
                    SocialError::Conflict(ConflictReason::RequestPending)
                ));
            }
        }
    }

    #[tokio::test]
    async fn duplicate_requests() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        graph.send_request(a, b).await.unwrap();
        assert!(matches!(
            graph.send_request(a, b).await,
            Err(SocialError::Conflict(ConflictReason::RequestPending))
        ));

        let request = graph.store.find_pair(Pair::new(a, b).unwrap()).await.unwrap();
        graph.respond(request.unwrap().id, b, true).await.unwrap();

        assert!(matches!(
            graph.send_request(b, a).await,
            Err(SocialError::Conflict(ConflictReason::AlreadyFriends))
        ));
    }

    #[tokio::test]
    async fn status_is_symmetric() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        assert_eq!(graph.status(a, b).await.unwrap().relation, Relation::None);
        assert_eq!(graph.status(b, a).await.unwrap().relation, Relation::None);

        let request = graph.send_request(a, b).await.unwrap();
        assert_eq!(graph.status(a, b).await.unwrap().relation, Relation::Sent);
        assert_eq!(graph.status(b, a).await.unwrap().relation, Relation::Received);

        graph.respond(request.id, b, false).await.unwrap();
        assert_eq!(graph.status(a, b).await.unwrap().relation, Relation::Rejected);
        assert_eq!(graph.status(b, a).await.unwrap().relation, Relation::Rejected);

        graph.block(b, a).await.unwrap();
        assert_eq!(graph.status(a, b).await.unwrap().relation, Relation::Blocked);
        assert_eq!(graph.status(b, a).await.unwrap().relation, Relation::Blocked);
    }

    #[tokio::test]
    async fn requester_cannot_accept_own_request() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;
        let c = user(&graph, "Carl").await;

        let request = graph.send_request(a, b).await.unwrap();

        assert!(matches!(
            graph.respond(request.id, a, true).await,
            Err(SocialError::Forbidden)
        ));
        assert!(matches!(
            graph.respond(request.id, c, true).await,
            Err(SocialError::NotFound(Missing::Connection))
        ));
        assert!(matches!(
            graph.respond(4711, b, true).await,
            Err(SocialError::NotFound(Missing::Connection))
        ));
    }

    #[tokio::test]
    async fn accept_block_unblock_scenario() {
        let (graph, mut rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        let request = graph.send_request(a, b).await.unwrap();
        assert!(matches!(
            rx.try_recv(),
            Ok(WsManagerMessage::SendMessage(to, WsMessage::IncomingFriendRequest { .. })) if to == b
        ));

        let accepted = graph.respond(request.id, b, true).await.unwrap();
        assert_eq!(accepted.status, ConnectionStatus::Accepted);
        assert!(accepted.accepted_at.is_some());
        assert!(matches!(
            rx.try_recv(),
            Ok(WsManagerMessage::SendMessage(to, WsMessage::FriendRequestAccepted { .. })) if to == a
        ));

        assert!(graph.status(a, b).await.unwrap().capabilities.can_chat);
        assert!(graph.status(b, a).await.unwrap().capabilities.can_chat);
        graph.ensure_can_chat(b, a).await.unwrap();

        graph.block(a, b).await.unwrap();
        let status = graph.status(b, a).await.unwrap();
        assert_eq!(status.relation, Relation::Blocked);
        assert!(!status.capabilities.can_chat);
        assert!(matches!(
            graph.ensure_can_chat(b, a).await,
            Err(SocialError::Forbidden)
        ));

        assert!(matches!(graph.unblock(b, a).await, Err(SocialError::Forbidden)));
        graph.unblock(a, b).await.unwrap();

        assert_eq!(graph.status(a, b).await.unwrap().relation, Relation::None);
        assert_eq!(graph.store.connection_count().await, 0);
    }

    #[tokio::test]
    async fn blocking_is_idempotent() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        graph.block(a, b).await.unwrap();
        let before = graph.store.find_pair(Pair::new(a, b).unwrap()).await.unwrap();

        graph.block(a, b).await.unwrap();
        graph.block(b, a).await.unwrap();
        let after = graph.store.find_pair(Pair::new(a, b).unwrap()).await.unwrap();

        assert_eq!(before, after);
        assert_eq!(after.unwrap().user, a);
    }

    #[tokio::test]
    async fn blocked_account_cannot_send_requests() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        graph.block(a, b).await.unwrap();

        assert!(matches!(
            graph.send_request(b, a).await,
            Err(SocialError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn remove_then_request_again() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        befriend(&graph, a, b).await;
        graph.remove(a, b).await.unwrap();

        assert_eq!(graph.status(a, b).await.unwrap().relation, Relation::None);
        assert!(matches!(
            graph.remove(a, b).await,
            Err(SocialError::NotFound(Missing::Connection))
        ));

        graph.send_request(a, b).await.unwrap();
        assert_eq!(graph.status(a, b).await.unwrap().relation, Relation::Sent);
    }

    #[tokio::test]
    async fn request_again_after_rejection() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        let request = graph.send_request(a, b).await.unwrap();
        graph.respond(request.id, b, false).await.unwrap();

        let again = graph.send_request(b, a).await.unwrap();
        assert_eq!(again.id, request.id);
        assert_eq!(again.user, b);
        assert_eq!(graph.status(a, b).await.unwrap().relation, Relation::Received);
    }

    #[tokio::test]
    async fn cancel_request() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        graph.send_request(a, b).await.unwrap();
        assert!(matches!(graph.cancel(b, a).await, Err(SocialError::Forbidden)));

        graph.cancel(a, b).await.unwrap();
        assert_eq!(graph.store.connection_count().await, 0);
    }

    #[tokio::test]
    async fn mutual_friends_are_ordered_by_creation() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;
        let x = user(&graph, "Xaver").await;
        let y = user(&graph, "Yara").await;
        let z = user(&graph, "Zoe").await;
        let w = user(&graph, "Wim").await;

        for friend in [x, y, z] {
            befriend(&graph, a, friend).await;
        }
        for friend in [y, z, w] {
            befriend(&graph, b, friend).await;
        }

        let now = Utc::now();
        graph
            .store
            .set_created_at(Pair::new(a, y).unwrap(), now - Duration::hours(2))
            .await;
        graph
            .store
            .set_created_at(Pair::new(a, z).unwrap(), now - Duration::hours(1))
            .await;

        let mutual: Vec<Uuid> = graph
            .mutual_friends(a, b, Page::default())
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.uuid)
            .collect();
        assert_eq!(mutual, vec![z, y]);

        let second: Vec<Uuid> = graph
            .mutual_friends(a, b, Page::new(2, 1))
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.uuid)
            .collect();
        assert_eq!(second, vec![y]);
    }

    #[tokio::test]
    async fn no_mutual_friends_across_a_block() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        graph.block(b, a).await.unwrap();

        assert!(matches!(
            graph.mutual_friends(a, b, Page::default()).await,
            Err(SocialError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn suggestions_exclude_connected_and_unverified_accounts() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let friend = user(&graph, "Friend").await;
        let requested = user(&graph, "Requested").await;
        let blocked = user(&graph, "Blocked").await;
        let unverified = graph.store.add_user("Unverified", false, true).await;
        let inactive = graph.store.add_user("Inactive", true, false).await;
        let older = user(&graph, "Older").await;
        let newer = user(&graph, "Newer").await;

        befriend(&graph, a, friend).await;
        graph.send_request(requested, a).await.unwrap();
        graph.block(blocked, a).await.unwrap();

        let suggested: Vec<Uuid> = graph
            .suggestions(a, Page::default())
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.uuid)
            .collect();

        assert_eq!(suggested, vec![newer, older]);
        for excluded in [a, friend, requested, blocked, unverified, inactive] {
            assert!(!suggested.contains(&excluded));
        }

        let second: Vec<Uuid> = graph
            .suggestions(a, Page::new(2, 1))
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.uuid)
            .collect();
        assert_eq!(second, vec![older]);
    }

    #[tokio::test]
    async fn search_only_covers_friends() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let marta = user(&graph, "Marta").await;
        let tamara = user(&graph, "Tamara").await;
        let martin = user(&graph, "Martin").await;

        befriend(&graph, a, marta).await;
        befriend(&graph, a, tamara).await;
        graph.send_request(a, martin).await.unwrap();

        let found: Vec<Uuid> = graph
            .search_friends(a, "MAR", Page::default())
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.uuid)
            .collect();

        assert_eq!(found, vec![marta, tamara]);
    }

    #[tokio::test]
    async fn listing_hides_blocks_of_others() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;
        let c = user(&graph, "Carl").await;
        let d = user(&graph, "Dora").await;

        befriend(&graph, a, b).await;
        graph.block(c, a).await.unwrap();
        graph.send_request(d, a).await.unwrap();

        let all = graph.list_connections(a, None, Page::default()).await.unwrap();
        let partners: Vec<Uuid> = all.iter().map(|e| e.partner.uuid).collect();
        assert_eq!(all.len(), 2);
        assert!(partners.contains(&b) && partners.contains(&d));

        let received = graph
            .list_connections(a, Some(Relation::Received), Page::default())
            .await
            .unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].partner.uuid, d);

        let blocked = graph
            .list_connections(c, Some(Relation::Blocked), Page::default())
            .await
            .unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].partner.uuid, a);
    }

    #[tokio::test]
    async fn conversations_are_ordered_by_last_message() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;
        let c = user(&graph, "Carl").await;
        let d = user(&graph, "Dora").await;

        for friend in [b, c, d] {
            befriend(&graph, a, friend).await;
        }

        let now = Utc::now();
        graph.record_message(a, c, now - Duration::minutes(5)).await.unwrap();
        graph.record_message(b, a, now).await.unwrap();

        let order: Vec<Uuid> = graph
            .conversations(a, Page::default())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.partner.uuid)
            .collect();

        assert_eq!(order, vec![b, c, d]);
    }

    #[tokio::test]
    async fn purge_removes_every_connection() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;
        let c = user(&graph, "Carl").await;
        let d = user(&graph, "Dora").await;

        befriend(&graph, a, b).await;
        graph.block(c, a).await.unwrap();
        befriend(&graph, c, d).await;

        assert_eq!(graph.purge(a).await.unwrap(), 2);
        assert_eq!(graph.store.connection_count().await, 1);
    }

    #[tokio::test]
    async fn account_search_skips_hidden_accounts() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let marta = user(&graph, "Marta").await;
        graph.store.add_user("Marek", false, true).await;
        graph.store.add_user("Mara", true, false).await;

        let found: Vec<Uuid> = graph
            .search_accounts(a, "mar", Page::default())
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.uuid)
            .collect();
        assert_eq!(found, vec![marta]);

        assert!(graph
            .search_accounts(a, "   ", Page::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn failing_account_lookup_keeps_stored_changes() {
        let (graph, mut rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        graph.store.break_directory_after_write();
        let request = graph.send_request(a, b).await.unwrap();
        assert_eq!(request.status, ConnectionStatus::Pending);
        assert!(rx.try_recv().is_err());

        let accepted = graph.respond(request.id, b, true).await.unwrap();
        assert_eq!(accepted.status, ConnectionStatus::Accepted);
        assert!(rx.try_recv().is_err());
        assert_eq!(graph.store.connection_count().await, 1);
    }

    #[tokio::test]
    async fn message_time_of_vanished_connection_is_ignored() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;

        graph.record_message(a, b, Utc::now()).await.unwrap();
        assert!(matches!(
            graph.record_message(a, a, Utc::now()).await,
            Err(SocialError::InvalidOperation)
        ));
    }

    #[tokio::test]
    async fn inactive_mutual_friends_do_not_shorten_pages() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;
        let x = user(&graph, "Xaver").await;
        let y = user(&graph, "Yara").await;

        for friend in [x, y] {
            befriend(&graph, a, friend).await;
            befriend(&graph, b, friend).await;
        }

        let now = Utc::now();
        graph
            .store
            .set_created_at(Pair::new(a, x).unwrap(), now - Duration::hours(2))
            .await;
        graph
            .store
            .set_created_at(Pair::new(a, y).unwrap(), now - Duration::hours(1))
            .await;
        graph.store.deactivate(y).await;

        let first: Vec<Uuid> = graph
            .mutual_friends(a, b, Page::new(1, 1))
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.uuid)
            .collect();
        assert_eq!(first, vec![x]);
        assert!(graph
            .mutual_friends(a, b, Page::new(2, 1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn listing_with_equal_timestamps_is_stable() {
        let (graph, _rx) = graph();
        let a = user(&graph, "Anna").await;
        let b = user(&graph, "Ben").await;
        let c = user(&graph, "Carl").await;

        befriend(&graph, a, b).await;
        befriend(&graph, a, c).await;

        let at = Utc::now() - Duration::hours(1);
        for other in [b, c] {
            graph.store.set_created_at(Pair::new(a, other).unwrap(), at).await;
        }

        let partners = |page: Page| {
            let graph = &graph;
            async move {
                graph
                    .list_connections(a, Some(Relation::Accepted), page)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|e| e.partner.uuid)
                    .collect::<Vec<_>>()
            }
        };

        assert_eq!(partners(Page::new(1, 1)).await, vec![c]);
        assert_eq!(partners(Page::new(2, 1)).await, vec![b]);
    }
}
