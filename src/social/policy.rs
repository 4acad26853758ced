//! Capabilities that one account has regarding another one.
//!
//! Every endpoint that gates chat, profile details, rides or groups asks [evaluate].

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::social::Relation;

/// What the viewer may do regarding the viewed account
#[derive(Serialize, ToSchema, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Direct messages can be exchanged
    pub can_chat: bool,
    /// A friend request can be sent
    pub can_send_request: bool,
    /// Bio, home city and other details are visible
    pub can_view_full_profile: bool,
    /// The rides of the account are visible
    pub can_view_rides: bool,
    /// The groups of the account are visible
    pub can_view_groups: bool,
    /// The account can be added to groups owned by the viewer
    pub can_add_to_group: bool,
}

impl Capabilities {
    /// No capabilities at all
    pub const NONE: Self = Self {
        can_chat: false,
        can_send_request: false,
        can_view_full_profile: false,
        can_view_rides: false,
        can_view_groups: false,
        can_add_to_group: false,
    };

    const OWN: Self = Self {
        can_chat: false,
        can_send_request: false,
        can_view_full_profile: true,
        can_view_rides: true,
        can_view_groups: true,
        can_add_to_group: false,
    };

    const FRIEND: Self = Self {
        can_chat: true,
        can_send_request: false,
        can_view_full_profile: true,
        can_view_rides: true,
        can_view_groups: true,
        can_add_to_group: true,
    };

    const STRANGER: Self = Self {
        can_chat: false,
        can_send_request: true,
        can_view_full_profile: false,
        can_view_rides: false,
        can_view_groups: false,
        can_add_to_group: false,
    };
}

/// The capabilities of `viewer` regarding `subject` when both are in `relation`
pub fn evaluate(viewer: Uuid, subject: Uuid, relation: Relation) -> Capabilities {
    if viewer == subject {
        return Capabilities::OWN;
    }

    match relation {
        Relation::Blocked => Capabilities::NONE,
        Relation::Accepted => Capabilities::FRIEND,
        Relation::None | Relation::Rejected => Capabilities::STRANGER,
        Relation::Sent | Relation::Received => Capabilities::NONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_account() {
        let a = Uuid::new_v4();
        let caps = evaluate(a, a, Relation::None);

        assert!(caps.can_view_full_profile && caps.can_view_rides && caps.can_view_groups);
        assert!(!caps.can_chat);
        assert!(!caps.can_send_request);
        assert!(!caps.can_add_to_group);
    }

    #[test]
    fn own_account_wins_over_relation() {
        let a = Uuid::new_v4();
        assert_eq!(evaluate(a, a, Relation::Blocked), Capabilities::OWN);
    }

    #[test]
    fn blocked_grants_nothing() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(evaluate(a, b, Relation::Blocked), Capabilities::NONE);
        assert_eq!(evaluate(b, a, Relation::Blocked), Capabilities::NONE);
    }

    #[test]
    fn friends() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let caps = evaluate(a, b, Relation::Accepted);

        assert!(caps.can_chat);
        assert!(caps.can_view_full_profile && caps.can_view_rides && caps.can_view_groups);
        assert!(caps.can_add_to_group);
        assert!(!caps.can_send_request);
    }

    #[test]
    fn strangers_may_only_send_requests() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        for relation in [Relation::None, Relation::Rejected] {
            let caps = evaluate(a, b, relation);
            assert!(caps.can_send_request);
            assert!(!caps.can_chat);
            assert!(!caps.can_view_full_profile);
            assert!(!caps.can_view_rides);
            assert!(!caps.can_view_groups);
            assert!(!caps.can_add_to_group);
        }
    }

    #[test]
    fn open_request_grants_nothing() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(evaluate(a, b, Relation::Sent), Capabilities::NONE);
        assert_eq!(evaluate(b, a, Relation::Received), Capabilities::NONE);
    }
}
