use rorm::fields::types::ForeignModel;
use rorm::{Model, Patch};

use crate::models::Account;

/// A message between two friends
#[derive(Model)]
pub struct DirectMessage {
    /// The primary key of a message
    #[rorm(id)]
    pub id: i64,

    /// The account that sent the message
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub sender: ForeignModel<Account>,

    /// The account the message is addressed to
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub recipient: ForeignModel<Account>,

    /// The maximum length of a message
    #[rorm(max_length = 2048)]
    pub message: String,

    /// The timestamp when the message was received
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "DirectMessage")]
pub(crate) struct DirectMessageInsert {
    pub(crate) sender: ForeignModel<Account>,
    pub(crate) recipient: ForeignModel<Account>,
    pub(crate) message: String,
    pub(crate) created_at: chrono::NaiveDateTime,
}
