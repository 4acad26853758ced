//! Travel groups
//!
//! Group owners can only add their friends.

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{get, post, HttpResponse};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use rorm::conditions::DynamicCollection;
use rorm::fields::types::ForeignModelByField;
use rorm::{and, insert, query, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Group, GroupInsert, GroupMember, GroupMemberInsert};
use crate::server::cache::AccountCache;
use crate::server::handler::{current_account, ApiError, ApiErrorResponse, ApiResult, PathUuid};
use crate::server::Graph;
use crate::social::Page;

const MAX_GROUP_NAME_LENGTH: usize = 255;

/// The request to create a group
#[derive(Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    #[schema(example = "Baltic Sea Weekend")]
    name: String,
}

/// The response of a newly created group
#[derive(Serialize, ToSchema)]
pub struct CreateGroupResponse {
    uuid: Uuid,
}

/// Create a new group
///
/// The executing account becomes owner and first member of the group.
#[utoipa::path(
    tag = "Groups",
    context_path = "/api/v1",
    responses(
        (status = 201, description = "The group has been created", body = CreateGroupResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreateGroupRequest,
    security(("session_cookie" = []))
)]
#[post("/groups")]
pub async fn create_group(
    req: Json<CreateGroupRequest>,
    db: Data<Database>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    let name = req.into_inner().name;
    if name.trim().is_empty() || name.len() > MAX_GROUP_NAME_LENGTH {
        return Err(ApiError::InvalidGroupName);
    }

    let mut tx = db.start_transaction().await?;

    let uuid = insert!(&mut tx, GroupInsert)
        .return_primary_key()
        .single(&GroupInsert {
            uuid: Uuid::new_v4(),
            name,
            owner: ForeignModelByField::Key(me.uuid),
        })
        .await?;

    insert!(&mut tx, GroupMemberInsert)
        .single(&GroupMemberInsert {
            uuid: Uuid::new_v4(),
            group: ForeignModelByField::Key(uuid),
            member: ForeignModelByField::Key(me.uuid),
        })
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Created().json(CreateGroupResponse { uuid }))
}

/// A group
#[derive(Serialize, ToSchema)]
pub struct GroupResponse {
    uuid: Uuid,
    #[schema(example = "Baltic Sea Weekend")]
    name: String,
    owner: Uuid,
    created_at: DateTime<Utc>,
}

async fn groups_of(db: &Database, member: Uuid, page: Page) -> ApiResult<Vec<GroupResponse>> {
    let memberships = query!(db, (GroupMember::F.group,))
        .condition(GroupMember::F.member.equals(member))
        .order_desc(GroupMember::F.joined_at)
        .limit(page.limit())
        .offset(page.offset())
        .all()
        .await?;

    if memberships.is_empty() {
        return Ok(Vec::new());
    }

    Ok(query!(
        db,
        (Group::F.uuid, Group::F.name, Group::F.owner, Group::F.created_at)
    )
    .condition(DynamicCollection::or(
        memberships
            .iter()
            .map(|(group,)| Group::F.uuid.equals(*group.key()))
            .collect(),
    ))
    .order_asc(Group::F.name)
    .all()
    .await?
    .into_iter()
    .map(|(uuid, name, owner, created_at)| GroupResponse {
        uuid,
        name,
        owner: *owner.key(),
        created_at: Utc.from_utc_datetime(&created_at),
    })
    .collect())
}

/// Retrieve the groups the executing account is a member of
#[utoipa::path(
    tag = "Groups",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the groups", body = [GroupResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(Page),
    security(("session_cookie" = []))
)]
#[get("/groups")]
pub async fn get_my_groups(
    page: Query<Page>,
    db: Data<Database>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<GroupResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    Ok(Json(groups_of(&db, me.uuid, page.into_inner()).await?))
}

/// The request to add a member to a group
#[derive(Deserialize, ToSchema)]
pub struct AddGroupMemberRequest {
    /// The account to add
    uuid: Uuid,
}

/// Add a friend to a group
///
/// Only the owner of a group can add members, and only their friends.
#[utoipa::path(
    tag = "Groups",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The member has been added"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "Not the owner or not a friend", body = ApiErrorResponse),
        (status = 404, description = "Unknown group", body = ApiErrorResponse),
        (status = 409, description = "Already a member", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    request_body = AddGroupMemberRequest,
    security(("session_cookie" = []))
)]
#[post("/groups/{uuid}/members")]
pub async fn add_group_member(
    path: Path<PathUuid>,
    req: Json<AddGroupMemberRequest>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    let (owner,) = query!(db.as_ref(), (Group::F.owner,))
        .condition(Group::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    if *owner.key() != me.uuid {
        return Err(ApiError::MissingPrivileges);
    }

    if !graph
        .status(me.uuid, req.uuid)
        .await?
        .capabilities
        .can_add_to_group
    {
        debug!("Only friends can be added to a group");
        return Err(ApiError::MissingPrivileges);
    }

    let mut tx = db.start_transaction().await?;

    if query!(&mut tx, (GroupMember::F.uuid,))
        .condition(and!(
            GroupMember::F.group.equals(path.uuid),
            GroupMember::F.member.equals(req.uuid)
        ))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::AlreadyGroupMember);
    }

    insert!(&mut tx, GroupMemberInsert)
        .single(&GroupMemberInsert {
            uuid: Uuid::new_v4(),
            group: ForeignModelByField::Key(path.uuid),
            member: ForeignModelByField::Key(req.uuid),
        })
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Retrieve the groups of another account
///
/// Only friends can see the groups of an account.
#[utoipa::path(
    tag = "Groups",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the groups", body = [GroupResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "The groups are not visible", body = ApiErrorResponse),
        (status = 404, description = "Unknown or deactivated account", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid, Page),
    security(("session_cookie" = []))
)]
#[get("/accounts/{uuid}/groups")]
pub async fn get_account_groups(
    path: Path<PathUuid>,
    page: Query<Page>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<GroupResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    if !graph
        .status(me.uuid, path.uuid)
        .await?
        .capabilities
        .can_view_groups
    {
        return Err(ApiError::MissingPrivileges);
    }

    Ok(Json(groups_of(&db, path.uuid, page.into_inner()).await?))
}
