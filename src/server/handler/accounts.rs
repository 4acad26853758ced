//! All handlers for the account endpoints live in here

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, post, put, HttpResponse};
use argon2::password_hash::{Error, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, error};
use rand::thread_rng;
use rorm::{insert, query, update, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::chan::{WsManagerChan, WsManagerMessage};
use crate::models::{Account, AccountInsert};
use crate::server::cache::AccountCache;
use crate::server::handler::{current_account, ApiError, ApiErrorResponse, ApiResult, PathUuid};
use crate::server::Graph;
use crate::social::{Capabilities, Page, Relation, UserSummary};

const MAX_NAME_LENGTH: usize = 255;
const MAX_BIO_LENGTH: usize = 1024;

fn check_username(username: &str) -> ApiResult<()> {
    if username.is_empty()
        || username.len() > MAX_NAME_LENGTH
        || username.chars().any(char::is_whitespace)
    {
        return Err(ApiError::InvalidUsername);
    }
    Ok(())
}

fn check_display_name(display_name: &str) -> ApiResult<()> {
    if display_name.trim().is_empty() || display_name.len() > MAX_NAME_LENGTH {
        return Err(ApiError::InvalidDisplayName);
    }
    Ok(())
}

async fn close_socket(ws_manager_chan: &WsManagerChan, uuid: Uuid) {
    if let Err(err) = ws_manager_chan
        .send(WsManagerMessage::CloseSocket(uuid))
        .await
    {
        error!("Could not send to ws manager chan: {err}");
    }
}

/// The content to register a new account
#[derive(Debug, Deserialize, ToSchema)]
pub struct AccountRegistrationRequest {
    #[schema(example = "user123")]
    username: String,
    #[schema(example = "Herbert")]
    display_name: String,
    #[schema(example = "super-secure-password")]
    password: String,
}

/// Register a new account
///
/// New accounts are not verified and won't show up in suggestions or searches until an
/// administrator has verified them.
#[utoipa::path(
    tag = "Accounts",
    responses(
        (status = 200, description = "Account got created"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = AccountRegistrationRequest,
)]
#[post("/api/v1/accounts/register")]
pub async fn register_account(
    req: Json<AccountRegistrationRequest>,
    db: Data<Database>,
) -> ApiResult<HttpResponse> {
    check_username(&req.username)?;
    check_display_name(&req.display_name)?;

    if req.password.is_empty() {
        return Err(ApiError::InvalidPassword);
    }

    let mut tx = db.start_transaction().await?;

    if query!(&mut tx, (Account::F.uuid,))
        .condition(Account::F.username.equals(&req.username))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::UsernameAlreadyOccupied);
    }

    let salt = SaltString::generate(&mut thread_rng());
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)?
        .to_string();

    insert!(&mut tx, AccountInsert)
        .single(&AccountInsert {
            uuid: Uuid::new_v4(),
            username: req.username.clone(),
            display_name: req.display_name.clone(),
            password_hash,
            last_login: None,
        })
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// The public data of an account
#[derive(Serialize, Deserialize, ToSchema, Eq, Ord, PartialOrd, PartialEq, Clone, Debug)]
pub struct AccountResponse {
    pub(crate) uuid: Uuid,
    #[schema(example = "user123")]
    pub(crate) username: String,
    #[schema(example = "Herbert")]
    pub(crate) display_name: String,
    pub(crate) verified: bool,
}

impl From<UserSummary> for AccountResponse {
    fn from(value: UserSummary) -> Self {
        Self {
            uuid: value.uuid,
            username: value.username,
            display_name: value.display_name,
            verified: value.verified,
        }
    }
}

/// The data of the logged-in account
#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    account: AccountResponse,
    #[schema(example = "Likes long rides along the coast")]
    bio: Option<String>,
    #[schema(example = "Hamburg")]
    home_city: Option<String>,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

/// Returns the account that is currently logged-in
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the account data of the current user", body = MeResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[get("/accounts/me")]
pub async fn get_me(
    db: Data<Database>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<MeResponse>> {
    let me = current_account(&session, &db, &cache).await?;

    let account = query!(db.as_ref(), Account)
        .condition(Account::F.uuid.equals(me.uuid))
        .optional()
        .await?
        .ok_or(ApiError::SessionCorrupt)?;

    Ok(Json(MeResponse {
        account: AccountResponse {
            uuid: account.uuid,
            username: account.username,
            display_name: account.display_name,
            verified: account.verified,
        },
        bio: account.bio,
        home_city: account.home_city,
        created_at: Utc.from_utc_datetime(&account.created_at),
        last_login: account.last_login.map(|t| Utc.from_utc_datetime(&t)),
    }))
}

/// Deletes the currently logged-in account
///
/// All connections of the account are removed beforehand.
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Deleted the currently logged-in account"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[delete("/accounts/me")]
pub async fn delete_me(
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
    ws_manager_chan: Data<WsManagerChan>,
) -> ApiResult<HttpResponse> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    graph.purge(uuid).await?;

    rorm::delete!(db.as_ref(), Account)
        .condition(Account::F.uuid.equals(uuid))
        .await?;

    cache.invalidate(&uuid).await;

    // Clear the current session
    session.purge();

    close_socket(&ws_manager_chan, uuid).await;

    Ok(HttpResponse::Ok().finish())
}

/// Deactivates the currently logged-in account
///
/// A deactivated account can't log in anymore and is hidden from other accounts.
/// Its connections are kept.
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Deactivated the currently logged-in account"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[post("/accounts/me/deactivate")]
pub async fn deactivate_me(
    db: Data<Database>,
    cache: Data<AccountCache>,
    session: Session,
    ws_manager_chan: Data<WsManagerChan>,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    update!(db.as_ref(), Account)
        .condition(Account::F.uuid.equals(me.uuid))
        .set(Account::F.active, false)
        .exec()
        .await?;

    cache.invalidate(&me.uuid).await;
    session.purge();

    close_socket(&ws_manager_chan, me.uuid).await;

    Ok(HttpResponse::Ok().finish())
}

/// The set password request data
///
/// The parameter `new_password` must not be empty
#[derive(Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    #[schema(example = "super-secure-password")]
    old_password: String,
    #[schema(example = "ultra-secure-password!!11!")]
    new_password: String,
}

/// Sets a new password for the currently logged-in account
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "New password has been set"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = SetPasswordRequest,
    security(("session_cookie" = []))
)]
#[post("/accounts/me/setPassword")]
pub async fn set_password(
    req: Json<SetPasswordRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    if req.new_password.is_empty() {
        return Err(ApiError::InvalidPassword);
    }

    let mut tx = db.start_transaction().await?;

    let (pw_hash,) = query!(&mut tx, (Account::F.password_hash,))
        .condition(Account::F.uuid.equals(uuid))
        .optional()
        .await?
        .ok_or(ApiError::SessionCorrupt)?;

    Argon2::default()
        .verify_password(req.old_password.as_bytes(), &PasswordHash::new(&pw_hash)?)
        .map_err(|e| match e {
            Error::Password => ApiError::LoginFailed,
            _ => ApiError::InvalidHash(e),
        })?;

    let salt = SaltString::generate(&mut thread_rng());
    let password_hash = Argon2::default()
        .hash_password(req.new_password.as_bytes(), &salt)?
        .to_string();

    update!(&mut tx, Account)
        .condition(Account::F.uuid.equals(uuid))
        .set(Account::F.password_hash, password_hash)
        .exec()
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Update account request data
///
/// All parameter are optional, but at least one of them is required.
#[derive(Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    #[schema(example = "user321")]
    username: Option<String>,
    #[schema(example = "Heeeerbeeeert")]
    display_name: Option<String>,
    #[schema(example = "Always up for a detour")]
    bio: Option<String>,
    #[schema(example = "Bremen")]
    home_city: Option<String>,
}

/// Updates the currently logged-in account
///
/// All parameter are optional, but at least one of them is required.
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Account has been updated"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = UpdateAccountRequest,
    security(("session_cookie" = []))
)]
#[put("/accounts/me")]
pub async fn update_me(
    req: Json<UpdateAccountRequest>,
    db: Data<Database>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    if let Some(display_name) = &req.display_name {
        check_display_name(display_name)?;
    }

    if req.home_city.as_ref().is_some_and(|city| city.len() > MAX_NAME_LENGTH)
        || req.bio.as_ref().is_some_and(|bio| bio.len() > MAX_BIO_LENGTH)
    {
        return Err(ApiError::InvalidProfile);
    }

    let mut tx = db.start_transaction().await?;

    if let Some(username) = &req.username {
        check_username(username)?;

        if query!(&mut tx, (Account::F.uuid,))
            .condition(Account::F.username.equals(username))
            .optional()
            .await?
            .is_some_and(|(uuid,)| uuid != me.uuid)
        {
            return Err(ApiError::UsernameAlreadyOccupied);
        }
    }

    update!(&mut tx, Account)
        .condition(Account::F.uuid.equals(me.uuid))
        .begin_dyn_set()
        .set_if(Account::F.username, req.username.clone())
        .set_if(Account::F.display_name, req.display_name.clone())
        .set_if(Account::F.bio, req.bio.clone().map(Some))
        .set_if(Account::F.home_city, req.home_city.clone().map(Some))
        .finish_dyn_set()
        .map_err(|_| ApiError::EmptyJson)?
        .exec()
        .await?;

    tx.commit().await?;

    cache.invalidate(&me.uuid).await;

    Ok(HttpResponse::Ok().finish())
}

/// The profile of an account, seen by the executing account
#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    #[serde(flatten)]
    account: AccountResponse,
    joined_at: DateTime<Utc>,
    relation: Relation,
    capabilities: Capabilities,
    /// Only set if `capabilities.can_view_full_profile` is true
    bio: Option<String>,
    /// Only set if `capabilities.can_view_full_profile` is true
    home_city: Option<String>,
}

/// Retrieve the profile of an account by uuid
///
/// The public part of the profile is always returned.
/// `bio` and `home_city` are only returned to friends.
/// `relation` and `capabilities` describe what the executing account may do regarding
/// the requested one.
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the requested profile", body = ProfileResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 404, description = "Unknown or deactivated account", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = [])))]
#[get("/accounts/{uuid}")]
pub async fn get_account(
    path: Path<PathUuid>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<ProfileResponse>> {
    let me = current_account(&session, &db, &cache).await?;
    let view = graph.status(me.uuid, path.uuid).await?;

    let account = query!(db.as_ref(), Account)
        .condition(Account::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::InvalidUuid)?;

    let (bio, home_city) = if view.capabilities.can_view_full_profile {
        (account.bio, account.home_city)
    } else {
        (None, None)
    };

    Ok(Json(ProfileResponse {
        account: AccountResponse {
            uuid: account.uuid,
            username: account.username,
            display_name: account.display_name,
            verified: account.verified,
        },
        joined_at: Utc.from_utc_datetime(&account.created_at),
        relation: view.relation,
        capabilities: view.capabilities,
        bio,
        home_city,
    }))
}

/// The search term of a search request
#[derive(Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Part of the username or display name
    #[param(example = "herb")]
    pub(crate) query: String,
}

/// Search for accounts by username or display name
///
/// Only active and verified accounts are found. An empty query returns an empty result.
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the matching accounts", body = [AccountResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(SearchQuery, Page),
    security(("session_cookie" = [])))]
#[get("/accounts/search")]
pub async fn search_accounts(
    search: Query<SearchQuery>,
    page: Query<Page>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<AccountResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    let found = graph
        .search_accounts(me.uuid, &search.query, page.into_inner())
        .await?;
    debug!("Account search returned {} results", found.len());

    Ok(Json(found.into_iter().map(AccountResponse::from).collect()))
}
