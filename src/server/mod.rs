//! This module holds the server definition

use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use actix_toolbox::tb_middleware::{
    setup_logging_mw, DBSessionStore, LoggingMiddlewareConfig, PersistentSession,
    SessionMiddleware,
};
use actix_web::cookie::time::Duration;
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::middleware::{Compress, ErrorHandlers};
use actix_web::web::{scope, Data, JsonConfig, PayloadConfig};
use actix_web::{App, HttpServer};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use log::{info, warn};
use rorm::Database;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::chan::WsManagerChan;
use crate::config::Config;
use crate::server::cache::AccountCache;
use crate::server::error::StartServerError;
use crate::server::handler::{
    add_group_member, block_account, cancel_friend_request, create_friend_request, create_group,
    create_ride, deactivate_me, delete_friend, delete_me, get_account, get_account_groups,
    get_account_rides, get_all_chats, get_chat, get_friend_status, get_friends, get_me,
    get_mutual_friends, get_my_groups, get_my_rides, get_suggestions, health, login, logout,
    register_account, respond_friend_request, search_accounts, search_friends, send_message,
    set_password, unblock_account, update_me, verify_account, version, websocket,
};
use crate::server::middleware::{
    handle_not_found, json_extractor_error, AdminRequired, AuthenticationRequired,
};
use crate::server::swagger::{AdminApiDoc, ApiDoc};
use crate::social::{DbStore, SocialGraph};

pub mod cache;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod swagger;

/// The friend graph as used by the handlers
pub type Graph = SocialGraph<DbStore>;

/// Start the ridealong server
///
/// **Parameter**:
/// - `config`: Reference to a [Config] struct
/// - `db`: [Database]
/// - `ws_manager_chan`: [WsManagerChan] : The channel to manage websocket connections
pub async fn start_server(
    config: &Config,
    db: Database,
    ws_manager_chan: WsManagerChan,
) -> Result<(), StartServerError> {
    let s_addr = SocketAddr::new(config.server.listen_address, config.server.listen_port);

    let key = Key::try_from(BASE64_STANDARD.decode(&config.server.secret_key)?.as_slice())?;

    if config.server.admin_token.is_empty() {
        warn!("AdminToken is empty, admin endpoints are disabled");
    }
    let admin_token = config.server.admin_token.clone();

    let graph: Data<Graph> = Data::new(SocialGraph::new(
        DbStore::new(db.clone()),
        ws_manager_chan.clone(),
    ));
    let account_cache = Data::new(AccountCache::new(StdDuration::from_secs(
        config.cache.account_ttl,
    )));

    info!("Starting to listen on {}", s_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(PayloadConfig::default())
            .app_data(JsonConfig::default().error_handler(json_extractor_error))
            .app_data(Data::new(db.clone()))
            .app_data(Data::new(ws_manager_chan.clone()))
            .app_data(graph.clone())
            .app_data(account_cache.clone())
            .wrap(setup_logging_mw(LoggingMiddlewareConfig::default()))
            .wrap(
                SessionMiddleware::builder(DBSessionStore::new(db.clone()), key.clone())
                    .session_lifecycle(PersistentSession::session_ttl(
                        PersistentSession::default(),
                        Duration::hours(1),
                    ))
                    .build(),
            )
            .wrap(Compress::default())
            .wrap(ErrorHandlers::new().handler(StatusCode::NOT_FOUND, handle_not_found))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi())
                    .url("/api-doc/admin.json", AdminApiDoc::openapi()),
            )
            .service(version)
            .service(
                scope("/api/admin")
                    .wrap(AdminRequired::new(&admin_token))
                    .service(health)
                    .service(verify_account),
            )
            .service(register_account)
            .service(scope("/api/v1/auth").service(login).service(logout))
            .service(
                scope("/api/v1")
                    .wrap(AuthenticationRequired)
                    // Static paths have to be registered before /accounts/{uuid}
                    .service(get_me)
                    .service(update_me)
                    .service(delete_me)
                    .service(set_password)
                    .service(deactivate_me)
                    .service(search_accounts)
                    .service(get_account)
                    .service(get_account_rides)
                    .service(get_account_groups)
                    .service(create_friend_request)
                    .service(respond_friend_request)
                    .service(cancel_friend_request)
                    .service(get_friends)
                    .service(get_suggestions)
                    .service(search_friends)
                    .service(delete_friend)
                    .service(block_account)
                    .service(unblock_account)
                    .service(get_friend_status)
                    .service(get_mutual_friends)
                    .service(get_all_chats)
                    .service(get_chat)
                    .service(send_message)
                    .service(create_ride)
                    .service(get_my_rides)
                    .service(create_group)
                    .service(get_my_groups)
                    .service(add_group_member)
                    .service(websocket),
            )
    })
    .bind(s_addr)?
    .run()
    .await?;

    Ok(())
}
