//! The endpoints of the friend graph
//!
//! Every handler resolves the executing account and hands over to [Graph].

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, post, HttpResponse};
use chrono::{DateTime, Utc};
use rorm::Database;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::server::cache::AccountCache;
use crate::server::handler::{
    current_account, AccountResponse, ApiErrorResponse, ApiResult, PathUuid, SearchQuery,
};
use crate::server::Graph;
use crate::social::{Capabilities, ConnectionEntry, ConnectionRecord, Page, Relation};

/// The request of a new friendship
#[derive(Deserialize, ToSchema)]
pub struct CreateFriendRequest {
    /// The uuid of the account that should become a friend
    uuid: Uuid,
}

/// A connection after a change, seen by the executing account
#[derive(Serialize, ToSchema)]
pub struct FriendRequestResponse {
    /// Identifier of the connection, used to answer the request
    #[schema(example = 1337)]
    id: i64,
    relation: Relation,
    created_at: DateTime<Utc>,
}

impl FriendRequestResponse {
    fn seen_by(connection: &ConnectionRecord, viewer: Uuid) -> Self {
        Self {
            id: connection.id,
            relation: Relation::of(Some(connection), viewer),
            created_at: connection.created_at,
        }
    }
}

/// Send a friend request
///
/// Sending a request to an account that rejected an earlier request is possible right away.
/// If the other account has already sent a request, it has to be answered instead.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 201, description = "Friend request has been sent", body = FriendRequestResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "The accounts are blocked", body = ApiErrorResponse),
        (status = 404, description = "Unknown account", body = ApiErrorResponse),
        (status = 409, description = "There is already a request or friendship", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreateFriendRequest,
    security(("session_cookie" = []))
)]
#[post("/friends/requests")]
pub async fn create_friend_request(
    req: Json<CreateFriendRequest>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    let connection = graph.send_request(me.uuid, req.uuid).await?;

    Ok(HttpResponse::Created().json(FriendRequestResponse::seen_by(&connection, me.uuid)))
}

/// The id of a friend request
#[derive(Deserialize, IntoParams)]
pub struct RequestId {
    #[param(example = 1337)]
    id: i64,
}

/// The answer to a friend request
#[derive(Deserialize, ToSchema)]
pub struct RespondFriendRequest {
    /// `true` accepts the request, `false` rejects it
    accept: bool,
}

/// Accept or reject a friend request
///
/// Only the receiver of a request can answer it.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The request has been answered", body = FriendRequestResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "Not allowed to answer", body = ApiErrorResponse),
        (status = 404, description = "Unknown request", body = ApiErrorResponse),
        (status = 409, description = "The request was already answered", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(RequestId),
    request_body = RespondFriendRequest,
    security(("session_cookie" = []))
)]
#[post("/friends/requests/{id}/respond")]
pub async fn respond_friend_request(
    path: Path<RequestId>,
    req: Json<RespondFriendRequest>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<FriendRequestResponse>> {
    let me = current_account(&session, &db, &cache).await?;

    let connection = graph.respond(path.id, me.uuid, req.accept).await?;

    Ok(Json(FriendRequestResponse::seen_by(&connection, me.uuid)))
}

/// Withdraw a friend request
///
/// `uuid` is the account the request was sent to.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The request has been withdrawn"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "The request was sent by the other account", body = ApiErrorResponse),
        (status = 404, description = "No request found", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[delete("/friends/requests/{uuid}")]
pub async fn cancel_friend_request(
    path: Path<PathUuid>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    graph.cancel(me.uuid, path.uuid).await?;

    Ok(HttpResponse::Ok().finish())
}

/// A connection of the executing account
#[derive(Serialize, ToSchema)]
pub struct ConnectionResponse {
    #[schema(example = 1337)]
    id: i64,
    partner: AccountResponse,
    relation: Relation,
    created_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    last_message_at: Option<DateTime<Utc>>,
}

impl From<ConnectionEntry> for ConnectionResponse {
    fn from(value: ConnectionEntry) -> Self {
        Self {
            id: value.connection.id,
            partner: value.partner.into(),
            relation: value.relation,
            created_at: value.connection.created_at,
            accepted_at: value.connection.accepted_at,
            last_message_at: value.connection.last_message_at,
        }
    }
}

/// Filter connections by their relation
#[derive(Deserialize, IntoParams)]
pub struct RelationFilter {
    /// Only return connections with this relation
    #[param(inline)]
    relation: Option<Relation>,
}

/// Retrieve the connections of the executing account, newest first
///
/// Blocks placed by other accounts are not listed.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the connections", body = [ConnectionResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(RelationFilter, Page),
    security(("session_cookie" = []))
)]
#[get("/friends")]
pub async fn get_friends(
    filter: Query<RelationFilter>,
    page: Query<Page>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<ConnectionResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    let connections = graph
        .list_connections(me.uuid, filter.relation, page.into_inner())
        .await?;

    Ok(Json(
        connections
            .into_iter()
            .map(ConnectionResponse::from)
            .collect(),
    ))
}

/// End a friendship
///
/// Rejected requests can be removed the same way. A pending request can only be removed by
/// its sender.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The connection has been removed"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "Not allowed to remove the connection", body = ApiErrorResponse),
        (status = 404, description = "No connection found", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[delete("/friends/{uuid}")]
pub async fn delete_friend(
    path: Path<PathUuid>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    graph.remove(me.uuid, path.uuid).await?;

    Ok(HttpResponse::Ok().finish())
}

/// Block an account
///
/// Any existing connection is replaced. Blocking twice has no further effect.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The account is blocked"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 404, description = "Unknown account", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[post("/friends/{uuid}/block")]
pub async fn block_account(
    path: Path<PathUuid>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    graph.block(me.uuid, path.uuid).await?;

    Ok(HttpResponse::Ok().finish())
}

/// Lift a block
///
/// Only the account that placed the block can lift it. Afterwards there is no connection.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The block has been lifted"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "The block was placed by the other account", body = ApiErrorResponse),
        (status = 404, description = "No block found", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[delete("/friends/{uuid}/block")]
pub async fn unblock_account(
    path: Path<PathUuid>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    graph.unblock(me.uuid, path.uuid).await?;

    Ok(HttpResponse::Ok().finish())
}

/// The relation to another account
#[derive(Serialize, ToSchema)]
pub struct FriendStatusResponse {
    relation: Relation,
    capabilities: Capabilities,
}

/// Retrieve the relation to another account and what it allows
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the relation", body = FriendStatusResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 404, description = "Unknown or deactivated account", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[get("/friends/{uuid}/status")]
pub async fn get_friend_status(
    path: Path<PathUuid>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<FriendStatusResponse>> {
    let me = current_account(&session, &db, &cache).await?;

    let view = graph.status(me.uuid, path.uuid).await?;

    Ok(Json(FriendStatusResponse {
        relation: view.relation,
        capabilities: view.capabilities,
    }))
}

/// Retrieve the friends the executing account has in common with another account
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the mutual friends", body = [AccountResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "The accounts are blocked", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid, Page),
    security(("session_cookie" = []))
)]
#[get("/friends/{uuid}/mutual")]
pub async fn get_mutual_friends(
    path: Path<PathUuid>,
    page: Query<Page>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<AccountResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    let mutual = graph
        .mutual_friends(me.uuid, path.uuid, page.into_inner())
        .await?;

    Ok(Json(mutual.into_iter().map(AccountResponse::from).collect()))
}

/// Retrieve accounts the executing account might want to befriend
///
/// Only active and verified accounts without any connection are suggested, newest first.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the suggestions", body = [AccountResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(Page),
    security(("session_cookie" = []))
)]
#[get("/friends/suggestions")]
pub async fn get_suggestions(
    page: Query<Page>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<AccountResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    let suggestions = graph.suggestions(me.uuid, page.into_inner()).await?;

    Ok(Json(
        suggestions
            .into_iter()
            .map(AccountResponse::from)
            .collect(),
    ))
}

/// Search the friends of the executing account by username or display name
///
/// Names that start with the query are returned first.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the matching friends", body = [AccountResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(SearchQuery, Page),
    security(("session_cookie" = []))
)]
#[get("/friends/search")]
pub async fn search_friends(
    search: Query<SearchQuery>,
    page: Query<Page>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<AccountResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    let friends = graph
        .search_friends(me.uuid, &search.query, page.into_inner())
        .await?;

    Ok(Json(friends.into_iter().map(AccountResponse::from).collect()))
}
