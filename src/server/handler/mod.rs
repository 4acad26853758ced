//! This module holds the handler of ridealong

use std::fmt::{Display, Formatter};

use actix_toolbox::tb_middleware::actix_session::{SessionGetError, SessionInsertError};
use actix_toolbox::tb_middleware::Session;
use actix_web::body::BoxBody;
use actix_web::error::JsonPayloadError;
use actix_web::HttpResponse;
use log::{debug, error, info, trace};
use rorm::{query, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use serde_repr::Serialize_repr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub use crate::server::handler::accounts::*;
pub use crate::server::handler::admin::*;
pub use crate::server::handler::auth::*;
pub use crate::server::handler::chats::*;
pub use crate::server::handler::friends::*;
pub use crate::server::handler::groups::*;
pub use crate::server::handler::rides::*;
pub use crate::server::handler::version::*;
pub use crate::server::handler::websocket::*;
use crate::models::{Account, AccountSummary};
use crate::server::cache::{AccountCache, CachedAccount};
use crate::social::{ConflictReason, Missing, SocialError};

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod chats;
pub mod friends;
pub mod groups;
pub mod rides;
pub mod version;
pub mod websocket;

/// The result that is used throughout the complete api.
pub type ApiResult<T> = Result<T, ApiError>;

/// The status code represents a unique identifier for an error.
///
/// Error codes in the range of 1000..2000 represent client errors
/// that could be handled by the client.
/// Error codes in the range of 2000..3000 represent server errors.
#[derive(Serialize_repr, ToSchema)]
#[repr(u16)]
pub(crate) enum ApiStatusCode {
    Unauthenticated = 1000,
    NotFound = 1001,
    InvalidContentType = 1002,
    InvalidJson = 1003,
    PayloadOverflow = 1004,

    LoginFailed = 1005,
    UsernameAlreadyOccupied = 1006,
    InvalidPassword = 1007,
    EmptyJson = 1008,
    InvalidUsername = 1009,
    InvalidDisplayName = 1010,
    InvalidUuid = 1011,
    AccountDeactivated = 1012,
    MissingPrivileges = 1013,

    ConnectionNotFound = 1014,
    FriendRequestPending = 1015,
    AlreadyFriends = 1016,
    FriendRequestAnswered = 1017,
    ConnectionConflict = 1018,
    InvalidOperation = 1019,

    InvalidRide = 1020,
    InvalidGroupName = 1021,
    InvalidMessage = 1022,
    AlreadyGroupMember = 1023,
    InvalidProfile = 1024,

    InternalServerError = 2000,
    DatabaseError = 2001,
    SessionError = 2002,
    StorageUnavailable = 2003,
}

/// The error response that is returned in case of an error
#[derive(Serialize, ToSchema)]
pub(crate) struct ApiErrorResponse {
    #[schema(example = "Error message is here")]
    message: String,
    #[schema(example = 1000)]
    status_code: ApiStatusCode,
}

impl ApiErrorResponse {
    pub(crate) fn new(status_code: ApiStatusCode, message: String) -> Self {
        Self {
            message,
            status_code,
        }
    }
}

/// A uuid in the path of a request
#[derive(Deserialize, IntoParams)]
pub struct PathUuid {
    pub(crate) uuid: Uuid,
}

/// This enum holds all possible error types that can occur in the API
#[derive(Debug)]
pub enum ApiError {
    /// The user is not allowed to access the resource
    Unauthenticated,
    /// Something was not found
    NotFound,
    /// Invalid content type sent
    InvalidContentType,
    /// Json error
    InvalidJson(serde_json::Error),
    /// Payload overflow
    PayloadOverflow(String),

    /// Login was not successful. Can be caused by incorrect username / password
    LoginFailed,
    /// The username is already occupied
    UsernameAlreadyOccupied,
    /// Invalid password
    InvalidPassword,
    /// Empty json is not allowed
    EmptyJson,
    /// The username is not valid
    InvalidUsername,
    /// The display name is not valid
    InvalidDisplayName,
    /// The referenced account doesn't exist
    InvalidUuid,
    /// The account was deactivated
    AccountDeactivated,
    /// The executing account is missing privileges
    MissingPrivileges,

    /// An error of the friend graph
    Social(SocialError),

    /// The ride has invalid data
    InvalidRide,
    /// The name of a group is not valid
    InvalidGroupName,
    /// The chat message is empty or too long
    InvalidMessage,
    /// The account is already part of the group
    AlreadyGroupMember,
    /// Bio or home city are too long
    InvalidProfile,

    /// Unknown error occurred
    InternalServerError,
    /// All errors that are thrown by the database
    DatabaseError(rorm::Error),
    /// An invalid hash is retrieved from the database
    InvalidHash(argon2::password_hash::Error),
    /// Error inserting into a session
    SessionInsert(SessionInsertError),
    /// Error retrieving data from a session
    SessionGet(SessionGetError),
    /// Session is in a corrupt state
    SessionCorrupt,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthenticated => write!(f, "Unauthenticated"),
            ApiError::NotFound => write!(f, "Not found"),
            ApiError::InvalidContentType => write!(f, "Content type error"),
            ApiError::InvalidJson(err) => write!(f, "Json error: {err}"),
            ApiError::PayloadOverflow(err) => write!(f, "{err}"),
            ApiError::LoginFailed => write!(f, "The login was not successful"),
            ApiError::UsernameAlreadyOccupied => write!(f, "Username is already occupied"),
            ApiError::InvalidPassword => write!(f, "Invalid password"),
            ApiError::EmptyJson => write!(f, "Empty json is not allowed"),
            ApiError::InvalidUsername => write!(f, "Invalid username"),
            ApiError::InvalidDisplayName => write!(f, "Invalid display name"),
            ApiError::InvalidUuid => write!(f, "Invalid uuid"),
            ApiError::AccountDeactivated => write!(f, "The account is deactivated"),
            ApiError::MissingPrivileges => write!(f, "Missing privileges"),
            ApiError::Social(err) => write!(f, "{err}"),
            ApiError::InvalidRide => write!(f, "Invalid ride"),
            ApiError::InvalidGroupName => write!(f, "Invalid group name"),
            ApiError::InvalidMessage => write!(f, "Invalid message"),
            ApiError::AlreadyGroupMember => write!(f, "The account is already a member"),
            ApiError::InvalidProfile => write!(f, "Invalid profile"),
            ApiError::InternalServerError => write!(f, "Internal server error"),
            ApiError::DatabaseError(_) => write!(f, "Database error occurred"),
            ApiError::InvalidHash(_) => write!(f, "Internal server error"),
            ApiError::SessionInsert(_) | ApiError::SessionGet(_) => {
                write!(f, "Session error occurred")
            }
            ApiError::SessionCorrupt => write!(f, "Corrupt session"),
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            ApiError::Unauthenticated => {
                trace!("Unauthenticated");

                HttpResponse::Unauthorized().json(ApiErrorResponse::new(
                    ApiStatusCode::Unauthenticated,
                    self.to_string(),
                ))
            }
            ApiError::NotFound => HttpResponse::NotFound().json(ApiErrorResponse::new(
                ApiStatusCode::NotFound,
                self.to_string(),
            )),
            ApiError::InvalidContentType => HttpResponse::BadRequest().json(
                ApiErrorResponse::new(ApiStatusCode::InvalidContentType, self.to_string()),
            ),
            ApiError::InvalidJson(err) => {
                debug!("Received invalid json: {err}");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::InvalidJson,
                    self.to_string(),
                ))
            }
            ApiError::PayloadOverflow(err) => {
                debug!("Payload overflow: {err}");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::PayloadOverflow,
                    self.to_string(),
                ))
            }
            ApiError::LoginFailed => {
                debug!("Login request failed");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::LoginFailed,
                    self.to_string(),
                ))
            }
            ApiError::UsernameAlreadyOccupied => {
                debug!("Username is already occupied");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::UsernameAlreadyOccupied,
                    self.to_string(),
                ))
            }
            ApiError::InvalidPassword => HttpResponse::BadRequest().json(ApiErrorResponse::new(
                ApiStatusCode::InvalidPassword,
                self.to_string(),
            )),
            ApiError::EmptyJson => HttpResponse::BadRequest().json(ApiErrorResponse::new(
                ApiStatusCode::EmptyJson,
                self.to_string(),
            )),
            ApiError::InvalidUsername => HttpResponse::BadRequest().json(ApiErrorResponse::new(
                ApiStatusCode::InvalidUsername,
                self.to_string(),
            )),
            ApiError::InvalidDisplayName => HttpResponse::BadRequest().json(
                ApiErrorResponse::new(ApiStatusCode::InvalidDisplayName, self.to_string()),
            ),
            ApiError::InvalidUuid => HttpResponse::NotFound().json(ApiErrorResponse::new(
                ApiStatusCode::InvalidUuid,
                self.to_string(),
            )),
            ApiError::AccountDeactivated => HttpResponse::Forbidden().json(
                ApiErrorResponse::new(ApiStatusCode::AccountDeactivated, self.to_string()),
            ),
            ApiError::MissingPrivileges => HttpResponse::Forbidden().json(ApiErrorResponse::new(
                ApiStatusCode::MissingPrivileges,
                self.to_string(),
            )),
            ApiError::Social(err) => social_error_response(err, self.to_string()),
            ApiError::InvalidRide => HttpResponse::BadRequest().json(ApiErrorResponse::new(
                ApiStatusCode::InvalidRide,
                self.to_string(),
            )),
            ApiError::InvalidGroupName => HttpResponse::BadRequest().json(
                ApiErrorResponse::new(ApiStatusCode::InvalidGroupName, self.to_string()),
            ),
            ApiError::InvalidMessage => HttpResponse::BadRequest().json(ApiErrorResponse::new(
                ApiStatusCode::InvalidMessage,
                self.to_string(),
            )),
            ApiError::AlreadyGroupMember => HttpResponse::Conflict().json(
                ApiErrorResponse::new(ApiStatusCode::AlreadyGroupMember, self.to_string()),
            ),
            ApiError::InvalidProfile => HttpResponse::BadRequest().json(ApiErrorResponse::new(
                ApiStatusCode::InvalidProfile,
                self.to_string(),
            )),
            ApiError::InternalServerError => HttpResponse::InternalServerError().json(
                ApiErrorResponse::new(ApiStatusCode::InternalServerError, self.to_string()),
            ),
            ApiError::DatabaseError(err) => {
                error!("Database error: {err}");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::DatabaseError,
                    self.to_string(),
                ))
            }
            ApiError::InvalidHash(err) => {
                error!("Got invalid password hash from db: {err}");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::InternalServerError,
                    self.to_string(),
                ))
            }
            ApiError::SessionInsert(err) => {
                error!("Session insert error: {err}");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::SessionError,
                    self.to_string(),
                ))
            }
            ApiError::SessionGet(err) => {
                error!("Session get error: {err}");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::SessionError,
                    self.to_string(),
                ))
            }
            ApiError::SessionCorrupt => {
                error!("Corrupt session");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::SessionError,
                    self.to_string(),
                ))
            }
        }
    }
}

fn social_error_response(err: &SocialError, message: String) -> HttpResponse<BoxBody> {
    match err {
        SocialError::NotFound(Missing::Account) => HttpResponse::NotFound().json(
            ApiErrorResponse::new(ApiStatusCode::InvalidUuid, message),
        ),
        SocialError::NotFound(Missing::Connection) => HttpResponse::NotFound().json(
            ApiErrorResponse::new(ApiStatusCode::ConnectionNotFound, message),
        ),
        SocialError::Conflict(reason) => {
            debug!("Connection conflict: {reason:?}");

            let status_code = match reason {
                ConflictReason::RequestPending => ApiStatusCode::FriendRequestPending,
                ConflictReason::AlreadyFriends => ApiStatusCode::AlreadyFriends,
                ConflictReason::NotPending => ApiStatusCode::FriendRequestAnswered,
                ConflictReason::DuplicatePair | ConflictReason::ConcurrentUpdate => {
                    ApiStatusCode::ConnectionConflict
                }
            };

            HttpResponse::Conflict().json(ApiErrorResponse::new(status_code, message))
        }
        SocialError::Forbidden => HttpResponse::Forbidden().json(ApiErrorResponse::new(
            ApiStatusCode::MissingPrivileges,
            message,
        )),
        SocialError::InvalidOperation => HttpResponse::BadRequest().json(ApiErrorResponse::new(
            ApiStatusCode::InvalidOperation,
            message,
        )),
        SocialError::Unavailable(detail) => {
            error!("Storage error: {detail}");

            HttpResponse::ServiceUnavailable().json(ApiErrorResponse::new(
                ApiStatusCode::StorageUnavailable,
                message,
            ))
        }
    }
}

impl From<rorm::Error> for ApiError {
    fn from(value: rorm::Error) -> Self {
        Self::DatabaseError(value)
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(value: argon2::password_hash::Error) -> Self {
        Self::InvalidHash(value)
    }
}

impl From<SessionInsertError> for ApiError {
    fn from(value: SessionInsertError) -> Self {
        Self::SessionInsert(value)
    }
}

impl From<SessionGetError> for ApiError {
    fn from(value: SessionGetError) -> Self {
        Self::SessionGet(value)
    }
}

impl From<SocialError> for ApiError {
    fn from(value: SocialError) -> Self {
        Self::Social(value)
    }
}

impl From<JsonPayloadError> for ApiError {
    fn from(value: JsonPayloadError) -> Self {
        match value {
            JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
                Self::PayloadOverflow(value.to_string())
            }
            JsonPayloadError::ContentType => Self::InvalidContentType,
            JsonPayloadError::Deserialize(err) | JsonPayloadError::Serialize(err) => {
                Self::InvalidJson(err)
            }
            _ => {
                info!("Unhandled JsonPayloadError: {value}");
                Self::InternalServerError
            }
        }
    }
}

/// Resolve the account of the logged-in session.
///
/// The account is served from `cache` if possible. Deactivated accounts are rejected.
pub(crate) async fn current_account(
    session: &Session,
    db: &Database,
    cache: &AccountCache,
) -> ApiResult<CachedAccount> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let account = match cache.get(&uuid).await {
        Some(account) => account,
        None => {
            let summary = query!(db, AccountSummary)
                .condition(Account::F.uuid.equals(uuid))
                .optional()
                .await?
                .ok_or(ApiError::SessionCorrupt)?;

            let account = CachedAccount {
                uuid: summary.uuid,
                username: summary.username,
                display_name: summary.display_name,
                verified: summary.verified,
                active: summary.active,
            };
            cache.insert(account.clone()).await;
            account
        }
    };

    if !account.active {
        return Err(ApiError::AccountDeactivated);
    }

    Ok(account)
}
