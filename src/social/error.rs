use std::fmt::{Display, Formatter};

/// The thing that could not be found
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Missing {
    /// The referenced account doesn't exist or is deactivated
    Account,
    /// There is no (matching) connection between both accounts
    Connection,
}

/// The reason an operation conflicts with the stored state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConflictReason {
    /// There is already an open request between both accounts
    RequestPending,
    /// Both accounts are already friends
    AlreadyFriends,
    /// The request was already answered
    NotPending,
    /// Another request for the same pair was stored concurrently
    DuplicatePair,
    /// The connection was modified concurrently
    ConcurrentUpdate,
}

/// The errors of the social graph
#[derive(Debug)]
pub enum SocialError {
    /// A referenced account or connection is absent
    NotFound(Missing),
    /// The pair is already in a state that doesn't allow the operation
    Conflict(ConflictReason),
    /// The acting account lacks the standing for the operation
    Forbidden,
    /// The operation references the acting account itself
    InvalidOperation,
    /// The storage layer failed.
    ///
    /// The detail is meant for the log only.
    Unavailable(String),
}

impl Display for SocialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SocialError::NotFound(Missing::Account) => write!(f, "Account not found"),
            SocialError::NotFound(Missing::Connection) => write!(f, "Connection not found"),
            SocialError::Conflict(ConflictReason::RequestPending) => {
                write!(f, "A friend request is already pending")
            }
            SocialError::Conflict(ConflictReason::AlreadyFriends) => {
                write!(f, "You are already friends")
            }
            SocialError::Conflict(ConflictReason::NotPending) => {
                write!(f, "The friend request was already answered")
            }
            SocialError::Conflict(ConflictReason::DuplicatePair) => {
                write!(f, "A connection with this account already exists")
            }
            SocialError::Conflict(ConflictReason::ConcurrentUpdate) => {
                write!(f, "The connection was modified concurrently")
            }
            SocialError::Forbidden => write!(f, "Missing privileges"),
            SocialError::InvalidOperation => write!(f, "Invalid operation on your own account"),
            SocialError::Unavailable(_) => write!(f, "Storage is unavailable"),
        }
    }
}

impl std::error::Error for SocialError {}

impl From<rorm::Error> for SocialError {
    fn from(value: rorm::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}
