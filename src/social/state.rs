//! The connection state machine.
//!
//! [decide] is the single place that knows which action is allowed in which state.
//! Stores call it inside their transaction and apply the [Change] it returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ConnectionStatus;
use crate::social::{ConflictReason, Missing, Pair, SocialError};

/// A stored connection between two accounts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Identifier of the connection, used to answer requests
    pub id: i64,
    /// The initiator, or the blocker if the connection is blocked
    pub user: Uuid,
    /// The other account
    pub connected_user: Uuid,
    /// The stored status
    pub status: ConnectionStatus,
    /// The point in time the current request was sent
    pub created_at: DateTime<Utc>,
    /// The point in time the request was accepted
    pub accepted_at: Option<DateTime<Utc>>,
    /// The point in time of the last direct message
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ConnectionRecord {
    /// A freshly created connection
    pub fn new(
        id: i64,
        initiator: Uuid,
        target: Uuid,
        status: ConnectionStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user: initiator,
            connected_user: target,
            status,
            created_at: now,
            accepted_at: (status == ConnectionStatus::Accepted).then_some(now),
            last_message_at: None,
        }
    }

    /// The connection after it was rewritten by [Change::Update]
    pub fn rewritten(
        &self,
        initiator: Uuid,
        target: Uuid,
        status: ConnectionStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let (created_at, accepted_at) = match status {
            // A new request starts over
            ConnectionStatus::Pending => (now, None),
            ConnectionStatus::Accepted => (self.created_at, Some(now)),
            ConnectionStatus::Rejected => (self.created_at, None),
            ConnectionStatus::Blocked => (self.created_at, None),
        };

        Self {
            id: self.id,
            user: initiator,
            connected_user: target,
            status,
            created_at,
            accepted_at,
            last_message_at: self.last_message_at,
        }
    }

    /// The pair this connection belongs to
    pub fn pair(&self) -> Result<Pair, SocialError> {
        Pair::new(self.user, self.connected_user)
    }

    /// The account on the other side of `uuid`
    pub fn partner_of(&self, uuid: Uuid) -> Option<Uuid> {
        if uuid == self.user {
            Some(self.connected_user)
        } else if uuid == self.connected_user {
            Some(self.user)
        } else {
            None
        }
    }
}

/// The relation of two accounts, seen by one of them
#[derive(Serialize, Deserialize, ToSchema, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
    /// There is no connection
    None,
    /// The viewer has sent a request that is not answered yet
    Sent,
    /// The viewer has received a request that is not answered yet
    Received,
    /// Both are friends
    Accepted,
    /// The request was rejected
    Rejected,
    /// One of them blocked the other one
    Blocked,
}

impl Relation {
    /// The relation described by `connection`, seen by `viewer`
    pub fn of(connection: Option<&ConnectionRecord>, viewer: Uuid) -> Self {
        let Some(connection) = connection else {
            return Relation::None;
        };

        match connection.status {
            ConnectionStatus::Pending if connection.user == viewer => Relation::Sent,
            ConnectionStatus::Pending => Relation::Received,
            ConnectionStatus::Accepted => Relation::Accepted,
            ConnectionStatus::Rejected => Relation::Rejected,
            ConnectionStatus::Blocked => Relation::Blocked,
        }
    }
}

/// Something an account does regarding another account
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Send a friend request
    Send,
    /// Accept a received request
    Accept,
    /// Reject a received request
    Reject,
    /// Withdraw a sent request
    Cancel,
    /// End a friendship
    Remove,
    /// Block the other account
    Block,
    /// Lift a block
    Unblock,
}

/// The write a store has to perform
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// Leave the connection as it is
    Keep,
    /// Insert a new connection
    Create {
        /// The account stored as `user`
        initiator: Uuid,
        /// The account stored as `connected_user`
        target: Uuid,
        /// The new status
        status: ConnectionStatus,
    },
    /// Overwrite the existing connection
    Update {
        /// The account stored as `user`
        initiator: Uuid,
        /// The account stored as `connected_user`
        target: Uuid,
        /// The new status
        status: ConnectionStatus,
    },
    /// Delete the connection, the pair returns to "none"
    Delete,
}

/// Decide what `action` of `actor` against `other` does to the `current` connection of both
pub fn decide(
    current: Option<&ConnectionRecord>,
    actor: Uuid,
    other: Uuid,
    action: Action,
) -> Result<Change, SocialError> {
    if actor == other {
        return Err(SocialError::InvalidOperation);
    }

    let Some(current) = current else {
        return match action {
            Action::Send => Ok(Change::Create {
                initiator: actor,
                target: other,
                status: ConnectionStatus::Pending,
            }),
            Action::Block => Ok(Change::Create {
                initiator: actor,
                target: other,
                status: ConnectionStatus::Blocked,
            }),
            _ => Err(SocialError::NotFound(Missing::Connection)),
        };
    };

    if current.partner_of(actor) != Some(other) {
        return Err(SocialError::NotFound(Missing::Connection));
    }

    let initiated = current.user == actor;

    match (current.status, action) {
        // Blocking twice is fine, no matter who blocked first
        (ConnectionStatus::Blocked, Action::Block) => Ok(Change::Keep),
        (ConnectionStatus::Blocked, Action::Unblock) if initiated => Ok(Change::Delete),
        (ConnectionStatus::Blocked, _) => Err(SocialError::Forbidden),

        (_, Action::Block) => Ok(Change::Update {
            initiator: actor,
            target: other,
            status: ConnectionStatus::Blocked,
        }),
        (_, Action::Unblock) => Err(SocialError::NotFound(Missing::Connection)),

        (ConnectionStatus::Pending, Action::Send) => {
            Err(SocialError::Conflict(ConflictReason::RequestPending))
        }
        (ConnectionStatus::Accepted, Action::Send) => {
            Err(SocialError::Conflict(ConflictReason::AlreadyFriends))
        }
        (ConnectionStatus::Rejected, Action::Send) => Ok(Change::Update {
            initiator: actor,
            target: other,
            status: ConnectionStatus::Pending,
        }),

        (ConnectionStatus::Pending, Action::Accept | Action::Reject) if initiated => {
            Err(SocialError::Forbidden)
        }
        (ConnectionStatus::Pending, Action::Accept) => Ok(Change::Update {
            initiator: current.user,
            target: current.connected_user,
            status: ConnectionStatus::Accepted,
        }),
        (ConnectionStatus::Pending, Action::Reject) => Ok(Change::Update {
            initiator: current.user,
            target: current.connected_user,
            status: ConnectionStatus::Rejected,
        }),
        (_, Action::Accept | Action::Reject) => {
            Err(SocialError::Conflict(ConflictReason::NotPending))
        }

        (ConnectionStatus::Pending, Action::Cancel | Action::Remove) if initiated => {
            Ok(Change::Delete)
        }
        (ConnectionStatus::Pending, Action::Cancel | Action::Remove) => Err(SocialError::Forbidden),
        (_, Action::Cancel) => Err(SocialError::Conflict(ConflictReason::NotPending)),

        (ConnectionStatus::Accepted | ConnectionStatus::Rejected, Action::Remove) => {
            Ok(Change::Delete)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: Uuid, connected_user: Uuid, status: ConnectionStatus) -> ConnectionRecord {
        ConnectionRecord::new(1, user, connected_user, status, Utc::now())
    }

    #[test]
    fn send_from_none_creates_request() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(
            decide(None, a, b, Action::Send).unwrap(),
            Change::Create {
                initiator: a,
                target: b,
                status: ConnectionStatus::Pending
            }
        );
    }

    #[test]
    fn self_reference_is_invalid() {
        let a = Uuid::new_v4();
        assert!(matches!(
            decide(None, a, a, Action::Send),
            Err(SocialError::InvalidOperation)
        ));
    }

    #[test]
    fn send_conflicts_with_pending_and_accepted() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let pending = record(a, b, ConnectionStatus::Pending);
        for actor in [a, b] {
            let other = pending.partner_of(actor).unwrap();
            assert!(matches!(
                decide(Some(&pending), actor, other, Action::Send),
                Err(SocialError::Conflict(ConflictReason::RequestPending))
            ));
        }

        let accepted = record(a, b, ConnectionStatus::Accepted);
        assert!(matches!(
            decide(Some(&accepted), b, a, Action::Send),
            Err(SocialError::Conflict(ConflictReason::AlreadyFriends))
        ));
    }

    #[test]
    fn only_target_answers() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let pending = record(a, b, ConnectionStatus::Pending);

        assert!(matches!(
            decide(Some(&pending), a, b, Action::Accept),
            Err(SocialError::Forbidden)
        ));
        assert!(matches!(
            decide(Some(&pending), a, b, Action::Reject),
            Err(SocialError::Forbidden)
        ));
        assert_eq!(
            decide(Some(&pending), b, a, Action::Accept).unwrap(),
            Change::Update {
                initiator: a,
                target: b,
                status: ConnectionStatus::Accepted
            }
        );
        assert_eq!(
            decide(Some(&pending), b, a, Action::Reject).unwrap(),
            Change::Update {
                initiator: a,
                target: b,
                status: ConnectionStatus::Rejected
            }
        );
    }

    #[test]
    fn answered_request_is_not_pending() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let rejected = record(a, b, ConnectionStatus::Rejected);

        assert!(matches!(
            decide(Some(&rejected), b, a, Action::Accept),
            Err(SocialError::Conflict(ConflictReason::NotPending))
        ));
    }

    #[test]
    fn only_requester_cancels() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let pending = record(a, b, ConnectionStatus::Pending);

        assert_eq!(
            decide(Some(&pending), a, b, Action::Cancel).unwrap(),
            Change::Delete
        );
        assert!(matches!(
            decide(Some(&pending), b, a, Action::Cancel),
            Err(SocialError::Forbidden)
        ));
        assert!(matches!(
            decide(None, a, b, Action::Cancel),
            Err(SocialError::NotFound(Missing::Connection))
        ));
    }

    #[test]
    fn remove_deletes_friendship_from_both_sides() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let accepted = record(a, b, ConnectionStatus::Accepted);

        assert_eq!(
            decide(Some(&accepted), a, b, Action::Remove).unwrap(),
            Change::Delete
        );
        assert_eq!(
            decide(Some(&accepted), b, a, Action::Remove).unwrap(),
            Change::Delete
        );
        assert!(matches!(
            decide(None, a, b, Action::Remove),
            Err(SocialError::NotFound(Missing::Connection))
        ));
    }

    #[test]
    fn block_is_reachable_from_everywhere() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let expected = Change::Update {
            initiator: b,
            target: a,
            status: ConnectionStatus::Blocked,
        };

        for status in [
            ConnectionStatus::Pending,
            ConnectionStatus::Accepted,
            ConnectionStatus::Rejected,
        ] {
            let current = record(a, b, status);
            assert_eq!(
                decide(Some(&current), b, a, Action::Block).unwrap(),
                expected
            );
        }

        assert_eq!(
            decide(None, b, a, Action::Block).unwrap(),
            Change::Create {
                initiator: b,
                target: a,
                status: ConnectionStatus::Blocked
            }
        );
    }

    #[test]
    fn blocked_pair() {
        let (blocker, blocked) = (Uuid::new_v4(), Uuid::new_v4());
        let current = record(blocker, blocked, ConnectionStatus::Blocked);

        assert_eq!(
            decide(Some(&current), blocker, blocked, Action::Block).unwrap(),
            Change::Keep
        );
        assert_eq!(
            decide(Some(&current), blocked, blocker, Action::Block).unwrap(),
            Change::Keep
        );
        assert!(matches!(
            decide(Some(&current), blocked, blocker, Action::Unblock),
            Err(SocialError::Forbidden)
        ));
        assert_eq!(
            decide(Some(&current), blocker, blocked, Action::Unblock).unwrap(),
            Change::Delete
        );

        for action in [Action::Send, Action::Accept, Action::Remove, Action::Cancel] {
            assert!(matches!(
                decide(Some(&current), blocked, blocker, action),
                Err(SocialError::Forbidden)
            ));
        }
    }

    #[test]
    fn unblock_without_block() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let accepted = record(a, b, ConnectionStatus::Accepted);

        assert!(matches!(
            decide(Some(&accepted), a, b, Action::Unblock),
            Err(SocialError::NotFound(Missing::Connection))
        ));
    }

    #[test]
    fn request_again_after_rejection() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let rejected = record(a, b, ConnectionStatus::Rejected);

        assert_eq!(
            decide(Some(&rejected), b, a, Action::Send).unwrap(),
            Change::Update {
                initiator: b,
                target: a,
                status: ConnectionStatus::Pending
            }
        );
    }

    #[test]
    fn foreign_connection_is_not_found() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let pending = record(a, b, ConnectionStatus::Pending);

        assert!(matches!(
            decide(Some(&pending), c, a, Action::Accept),
            Err(SocialError::NotFound(Missing::Connection))
        ));
    }

    #[test]
    fn viewpoint_labels() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let pending = record(a, b, ConnectionStatus::Pending);

        assert_eq!(Relation::of(None, a), Relation::None);
        assert_eq!(Relation::of(Some(&pending), a), Relation::Sent);
        assert_eq!(Relation::of(Some(&pending), b), Relation::Received);

        let blocked = record(a, b, ConnectionStatus::Blocked);
        assert_eq!(Relation::of(Some(&blocked), a), Relation::Blocked);
        assert_eq!(Relation::of(Some(&blocked), b), Relation::Blocked);
    }

    #[test]
    fn rewrite_timestamps() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let sent_at = Utc::now() - chrono::Duration::days(2);
        let now = Utc::now();
        let pending = ConnectionRecord::new(7, a, b, ConnectionStatus::Pending, sent_at);

        let accepted = pending.rewritten(a, b, ConnectionStatus::Accepted, now);
        assert_eq!(accepted.id, 7);
        assert_eq!(accepted.created_at, sent_at);
        assert_eq!(accepted.accepted_at, Some(now));

        let blocked = accepted.rewritten(b, a, ConnectionStatus::Blocked, now);
        assert_eq!(blocked.user, b);
        assert_eq!(blocked.accepted_at, None);

        let resent = pending
            .rewritten(a, b, ConnectionStatus::Rejected, now)
            .rewritten(b, a, ConnectionStatus::Pending, now);
        assert_eq!(resent.user, b);
        assert_eq!(resent.created_at, now);
    }
}
