use rorm::fields::types::ForeignModel;
use rorm::{Model, Patch};
use uuid::Uuid;

use crate::models::Account;

/// A ride that is offered by a driver
#[derive(Model)]
pub struct Ride {
    /// Primary key of the ride
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The account offering the ride
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub driver: ForeignModel<Account>,

    /// Where the ride starts
    #[rorm(max_length = 255)]
    pub origin: String,

    /// Where the ride ends
    #[rorm(max_length = 255)]
    pub destination: String,

    /// The planned departure
    pub departure_at: chrono::NaiveDateTime,

    /// The count of free seats
    pub seats: i16,

    /// The point in time, the ride was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "Ride")]
pub(crate) struct RideInsert {
    pub(crate) uuid: Uuid,
    pub(crate) driver: ForeignModel<Account>,
    pub(crate) origin: String,
    pub(crate) destination: String,
    pub(crate) departure_at: chrono::NaiveDateTime,
    pub(crate) seats: i16,
}
