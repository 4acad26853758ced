//! This module holds the definition of the swagger declaration

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::server::handler;
use crate::social::{Capabilities, Relation};

struct CookieSecurity;

impl Modify for CookieSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("id"))),
            )
        }
    }
}

/// Helper struct for the openapi definitions.
#[derive(OpenApi)]
#[openapi(
    paths(
        handler::register_account,
        handler::get_me,
        handler::delete_me,
        handler::update_me,
        handler::set_password,
        handler::deactivate_me,
        handler::get_account,
        handler::search_accounts,
        handler::login,
        handler::logout,
        handler::websocket,
        handler::version,
        handler::create_friend_request,
        handler::respond_friend_request,
        handler::cancel_friend_request,
        handler::get_friends,
        handler::delete_friend,
        handler::block_account,
        handler::unblock_account,
        handler::get_friend_status,
        handler::get_mutual_friends,
        handler::get_suggestions,
        handler::search_friends,
        handler::get_all_chats,
        handler::get_chat,
        handler::send_message,
        handler::create_ride,
        handler::get_my_rides,
        handler::get_account_rides,
        handler::create_group,
        handler::get_my_groups,
        handler::add_group_member,
        handler::get_account_groups,
    ),
    components(schemas(
        handler::AccountRegistrationRequest,
        handler::ApiErrorResponse,
        handler::ApiStatusCode,
        handler::LoginRequest,
        handler::AccountResponse,
        handler::MeResponse,
        handler::ProfileResponse,
        handler::SetPasswordRequest,
        handler::UpdateAccountRequest,
        handler::VersionResponse,
        handler::CreateFriendRequest,
        handler::FriendRequestResponse,
        handler::RespondFriendRequest,
        handler::ConnectionResponse,
        handler::FriendStatusResponse,
        handler::ChatMessage,
        handler::ConversationResponse,
        handler::SendMessageRequest,
        handler::CreateRideRequest,
        handler::CreateRideResponse,
        handler::RideResponse,
        handler::CreateGroupRequest,
        handler::CreateGroupResponse,
        handler::GroupResponse,
        handler::AddGroupMemberRequest,
        Relation,
        Capabilities,
    )),
    modifiers(&CookieSecurity)
)]
pub struct ApiDoc;

struct TokenSecurity;

impl Modify for TokenSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "The token is set in the configuration file in the server.",
                        ))
                        .build(),
                ),
            )
        }
    }
}

/// Helper struct for the admin openapi definitions.
#[derive(OpenApi)]
#[openapi(
    paths(
        handler::health,
        handler::verify_account,
    ),
    components(schemas(
        handler::ApiErrorResponse,
        handler::ApiStatusCode,
        handler::HealthResponse,
    )),
    modifiers(&TokenSecurity)
)]
pub struct AdminApiDoc;
