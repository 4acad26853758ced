use rorm::{Model, Patch};
use uuid::Uuid;

/// A user account
#[derive(Model)]
pub struct Account {
    /// The primary key of a user.
    ///
    /// This will be a uuid.
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The username of the client
    #[rorm(max_length = 255, unique)]
    pub username: String,

    /// The name that is displayed for this user
    #[rorm(max_length = 255)]
    pub display_name: String,

    /// The password hash of the user.
    #[rorm(max_length = 1024)]
    pub password_hash: String,

    /// Set by an administrator once the identity of the user has been checked
    #[rorm(default = false)]
    pub verified: bool,

    /// Deactivated accounts can't log in and are hidden from the directory
    #[rorm(default = true)]
    pub active: bool,

    /// A short text about the user, only visible to friends
    #[rorm(max_length = 1024)]
    pub bio: Option<String>,

    /// The city the user usually travels from, only visible to friends
    #[rorm(max_length = 255)]
    pub home_city: Option<String>,

    /// The point in time the account was registered
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,

    /// The last time the user has logged in
    pub last_login: Option<chrono::NaiveDateTime>,
}

#[derive(Patch)]
#[rorm(model = "Account")]
pub(crate) struct AccountInsert {
    pub(crate) uuid: Uuid,
    pub(crate) username: String,
    pub(crate) display_name: String,
    pub(crate) password_hash: String,
    pub(crate) last_login: Option<chrono::NaiveDateTime>,
}

/// The columns of an [Account] that the user directory works with
#[derive(Patch)]
#[rorm(model = "Account")]
pub(crate) struct AccountSummary {
    pub(crate) uuid: Uuid,
    pub(crate) username: String,
    pub(crate) display_name: String,
    pub(crate) verified: bool,
    pub(crate) active: bool,
    pub(crate) created_at: chrono::NaiveDateTime,
}
