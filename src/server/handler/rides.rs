//! Rides offered by accounts
//!
//! The rides of other accounts are only visible to their friends.

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{get, post, HttpResponse};
use chrono::{DateTime, TimeZone, Utc};
use rorm::fields::types::ForeignModelByField;
use rorm::{insert, query, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Ride, RideInsert};
use crate::server::cache::AccountCache;
use crate::server::handler::{current_account, ApiError, ApiErrorResponse, ApiResult, PathUuid};
use crate::server::Graph;
use crate::social::Page;

const MAX_PLACE_LENGTH: usize = 255;
const MAX_SEATS: u8 = 8;

/// The request to offer a ride
#[derive(Deserialize, ToSchema)]
pub struct CreateRideRequest {
    #[schema(example = "Hamburg")]
    origin: String,
    #[schema(example = "Berlin")]
    destination: String,
    /// Must be in the future
    departure_at: DateTime<Utc>,
    /// Free seats, between 1 and 8
    #[schema(example = 3)]
    seats: u8,
}

/// The response of a newly created ride
#[derive(Serialize, ToSchema)]
pub struct CreateRideResponse {
    uuid: Uuid,
}

/// Offer a new ride
#[utoipa::path(
    tag = "Rides",
    context_path = "/api/v1",
    responses(
        (status = 201, description = "The ride has been created", body = CreateRideResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreateRideRequest,
    security(("session_cookie" = []))
)]
#[post("/rides")]
pub async fn create_ride(
    req: Json<CreateRideRequest>,
    db: Data<Database>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    let valid_place = |place: &str| !place.trim().is_empty() && place.len() <= MAX_PLACE_LENGTH;
    if !valid_place(&req.origin)
        || !valid_place(&req.destination)
        || req.seats == 0
        || req.seats > MAX_SEATS
        || req.departure_at <= Utc::now()
    {
        return Err(ApiError::InvalidRide);
    }

    let uuid = insert!(db.as_ref(), RideInsert)
        .return_primary_key()
        .single(&RideInsert {
            uuid: Uuid::new_v4(),
            driver: ForeignModelByField::Key(me.uuid),
            origin: req.origin.clone(),
            destination: req.destination.clone(),
            departure_at: req.departure_at.naive_utc(),
            seats: i16::from(req.seats),
        })
        .await?;

    Ok(HttpResponse::Created().json(CreateRideResponse { uuid }))
}

/// A ride
#[derive(Serialize, ToSchema)]
pub struct RideResponse {
    uuid: Uuid,
    driver: Uuid,
    #[schema(example = "Hamburg")]
    origin: String,
    #[schema(example = "Berlin")]
    destination: String,
    departure_at: DateTime<Utc>,
    #[schema(example = 3)]
    seats: i16,
    created_at: DateTime<Utc>,
}

impl From<Ride> for RideResponse {
    fn from(value: Ride) -> Self {
        Self {
            uuid: value.uuid,
            driver: *value.driver.key(),
            origin: value.origin,
            destination: value.destination,
            departure_at: Utc.from_utc_datetime(&value.departure_at),
            seats: value.seats,
            created_at: Utc.from_utc_datetime(&value.created_at),
        }
    }
}

async fn rides_of(db: &Database, driver: Uuid, page: Page) -> ApiResult<Vec<RideResponse>> {
    Ok(query!(db, Ride)
        .condition(Ride::F.driver.equals(driver))
        .order_asc(Ride::F.departure_at)
        .limit(page.limit())
        .offset(page.offset())
        .all()
        .await?
        .into_iter()
        .map(RideResponse::from)
        .collect())
}

/// Retrieve the rides of the executing account, ordered by departure
#[utoipa::path(
    tag = "Rides",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the rides", body = [RideResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(Page),
    security(("session_cookie" = []))
)]
#[get("/rides")]
pub async fn get_my_rides(
    page: Query<Page>,
    db: Data<Database>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<RideResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    Ok(Json(rides_of(&db, me.uuid, page.into_inner()).await?))
}

/// Retrieve the rides of another account, ordered by departure
///
/// Only friends can see the rides of an account.
#[utoipa::path(
    tag = "Rides",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the rides", body = [RideResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "The rides are not visible", body = ApiErrorResponse),
        (status = 404, description = "Unknown or deactivated account", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid, Page),
    security(("session_cookie" = []))
)]
#[get("/accounts/{uuid}/rides")]
pub async fn get_account_rides(
    path: Path<PathUuid>,
    page: Query<Page>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<RideResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    if !graph
        .status(me.uuid, path.uuid)
        .await?
        .capabilities
        .can_view_rides
    {
        return Err(ApiError::MissingPrivileges);
    }

    Ok(Json(rides_of(&db, path.uuid, page.into_inner()).await?))
}
