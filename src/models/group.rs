use rorm::fields::types::{BackRef, ForeignModel};
use rorm::{field, Model, Patch};
use uuid::Uuid;

use crate::models::Account;

/// A travel group.
///
/// The owner is a member as well.
#[derive(Model)]
pub struct Group {
    /// Primary key of the group
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// Name of the group
    #[rorm(max_length = 255)]
    pub name: String,

    /// The owner of this group
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub owner: ForeignModel<Account>,

    /// The members of this group
    pub members: BackRef<field!(GroupMember::F.group)>,

    /// The point in time, the group was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "Group")]
pub(crate) struct GroupInsert {
    pub(crate) uuid: Uuid,
    pub(crate) name: String,
    pub(crate) owner: ForeignModel<Account>,
}

/// The m2m relation between groups and accounts
#[derive(Model)]
pub struct GroupMember {
    /// Primary key of a group member
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The group
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub group: ForeignModel<Group>,

    /// The account in the group
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub member: ForeignModel<Account>,

    /// When has the account joined the group
    #[rorm(auto_create_time)]
    pub joined_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "GroupMember")]
pub(crate) struct GroupMemberInsert {
    pub(crate) uuid: Uuid,
    pub(crate) group: ForeignModel<Group>,
    pub(crate) member: ForeignModel<Account>,
}
