use rorm::fields::types::ForeignModel;
use rorm::{DbEnum, Model, Patch};

use crate::models::Account;

/// The stored status of a [Connection]
///
/// `Received` is not stored, it is the viewpoint of the target on a `Pending` row.
#[derive(DbEnum, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// The request was sent and awaits an answer of the target
    Pending,
    /// Both users are friends
    Accepted,
    /// The target declined the request
    Rejected,
    /// One of the users blocked the other one
    Blocked,
}

/// The relationship between two accounts.
///
/// There is at most one row per unordered pair of accounts, which is enforced by `pair_key`.
#[derive(Model)]
pub struct Connection {
    /// Primary key of the connection
    #[rorm(id)]
    pub id: i64,

    /// `<lower uuid>:<higher uuid>` of both accounts
    #[rorm(max_length = 80, unique)]
    pub pair_key: String,

    /// The account that initiated the connection.
    ///
    /// For blocked connections, this is the account that blocked the other one.
    #[rorm(on_update = "Cascade", on_delete = "Cascade")]
    pub user: ForeignModel<Account>,

    /// The other account
    #[rorm(on_update = "Cascade", on_delete = "Cascade")]
    pub connected_user: ForeignModel<Account>,

    /// The current status
    pub status: ConnectionStatus,

    /// The point in time the current request was sent
    pub created_at: chrono::NaiveDateTime,

    /// The point in time the request was accepted
    pub accepted_at: Option<chrono::NaiveDateTime>,

    /// The point in time of the last direct message between both accounts
    pub last_message_at: Option<chrono::NaiveDateTime>,
}

#[derive(Patch)]
#[rorm(model = "Connection")]
pub(crate) struct ConnectionInsert {
    pub(crate) pair_key: String,
    pub(crate) user: ForeignModel<Account>,
    pub(crate) connected_user: ForeignModel<Account>,
    pub(crate) status: ConnectionStatus,
    pub(crate) created_at: chrono::NaiveDateTime,
}
