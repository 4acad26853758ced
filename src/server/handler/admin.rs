//! Endpoints for the operator of the server
//!
//! They are protected by the admin token of the configuration file.

use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, HttpResponse};
use log::{error, info};
use rorm::{query, update, Database, FieldAccess, Model};
use serde::Serialize;
use tokio::sync::oneshot;
use utoipa::ToSchema;

use crate::chan::{WsManagerChan, WsManagerMessage};
use crate::models::{Account, Connection, ConnectionStatus};
use crate::server::cache::AccountCache;
use crate::server::handler::{ApiError, ApiErrorResponse, ApiResult, PathUuid};

/// The health data of this server
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = 1337)]
    registered_accounts: u64,
    #[schema(example = 4242)]
    friendships: u64,
    #[schema(example = 31337)]
    open_connections: u64,
}

/// Request health data from this server.
///
/// `registered_accounts` are the currently registered user accounts on the server
/// `friendships` are the accepted connections between accounts
/// `open_connections` are the currently open websockets
#[utoipa::path(
    tag = "Server status",
    context_path = "/api/admin",
    responses(
        (status = 200, description = "Health data of this server", body = HealthResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("admin_token" = []))
)]
#[get("/health")]
pub async fn health(
    db: Data<Database>,
    ws_manager_chan: Data<WsManagerChan>,
) -> ApiResult<Json<HealthResponse>> {
    let accounts = query!(db.as_ref(), (Account::F.uuid.count(),))
        .one()
        .await?
        .0 as u64;

    let friendships = query!(db.as_ref(), (Connection::F.id.count(),))
        .condition(Connection::F.status.equals(ConnectionStatus::Accepted))
        .one()
        .await?
        .0 as u64;

    let (tx, rx) = oneshot::channel();

    if let Err(err) = ws_manager_chan
        .send(WsManagerMessage::RetrieveWsCount(tx))
        .await
    {
        error!("Could not send to ws manager chan: {err}");
        return Err(ApiError::InternalServerError);
    }

    let connections = rx.await.map_err(|err| {
        error!("Error receiving message from ws manager chan: {err}");
        ApiError::InternalServerError
    })?;

    Ok(Json(HealthResponse {
        registered_accounts: accounts,
        friendships,
        open_connections: connections,
    }))
}

/// Mark an account as verified
///
/// Only verified accounts are suggested to other accounts and can be found by the account
/// search.
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/admin",
    responses(
        (status = 200, description = "The account is verified"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 404, description = "Unknown account", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("admin_token" = []))
)]
#[post("/accounts/{uuid}/verify")]
pub async fn verify_account(
    path: Path<PathUuid>,
    db: Data<Database>,
    cache: Data<AccountCache>,
) -> ApiResult<HttpResponse> {
    let updated = update!(db.as_ref(), Account)
        .condition(Account::F.uuid.equals(path.uuid))
        .set(Account::F.verified, true)
        .exec()
        .await?;

    if updated == 0 {
        return Err(ApiError::InvalidUuid);
    }

    cache.invalidate(&path.uuid).await;
    info!("Verified account {}", path.uuid);

    Ok(HttpResponse::Ok().finish())
}
