use std::cmp::Ordering;

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{get, post, HttpResponse};
use chrono::{DateTime, TimeZone, Utc};
use itertools::Itertools;
use log::error;
use rorm::fields::types::ForeignModelByField;
use rorm::{and, insert, or, query, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::chan::{WsManagerChan, WsManagerMessage, WsMessage};
use crate::models::{Account, AccountSummary, DirectMessage, DirectMessageInsert};
use crate::server::cache::AccountCache;
use crate::server::handler::{
    current_account, AccountResponse, ApiError, ApiErrorResponse, ApiResult, PathUuid,
};
use crate::server::Graph;
use crate::social::{Page, UserSummary};

const MAX_MESSAGE_LENGTH: usize = 2048;

/// A direct message between two friends
///
/// The parameter `id` should be used to uniquely identify a message
#[derive(Serialize, ToSchema, Eq, Deserialize, Clone, Debug)]
pub struct ChatMessage {
    #[schema(example = 1337)]
    id: i64,
    sender: AccountResponse,
    recipient: Uuid,
    #[schema(example = "Hello there!")]
    message: String,
    created_at: DateTime<Utc>,
}

impl Ord for ChatMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for ChatMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ChatMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A conversation with a friend
#[derive(Serialize, ToSchema)]
pub struct ConversationResponse {
    partner: AccountResponse,
    /// Not set if no message was exchanged yet
    last_message_at: Option<DateTime<Utc>>,
}

/// Retrieve the friends of the executing account to chat with
///
/// The friend with the most recent message comes first, friends without any message last.
#[utoipa::path(
    tag = "Chats",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the conversations", body = [ConversationResponse]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(Page),
    security(("session_cookie" = []))
)]
#[get("/chats")]
pub async fn get_all_chats(
    page: Query<Page>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<ConversationResponse>>> {
    let me = current_account(&session, &db, &cache).await?;

    let conversations = graph.conversations(me.uuid, page.into_inner()).await?;

    Ok(Json(
        conversations
            .into_iter()
            .map(|entry| ConversationResponse {
                last_message_at: entry.connection.last_message_at,
                partner: entry.partner.into(),
            })
            .collect(),
    ))
}

async fn partner_account(db: &Database, uuid: Uuid) -> ApiResult<AccountResponse> {
    query!(db, AccountSummary)
        .condition(Account::F.uuid.equals(uuid))
        .optional()
        .await?
        .map(|account| UserSummary::from(account).into())
        .ok_or(ApiError::InvalidUuid)
}

/// Retrieve the messages exchanged with a friend
///
/// The newest messages are on the first page, `messages` are sorted by `created_at`
/// nonetheless. `id` should be used to uniquely identify chat messages, as new messages are
/// delivered via websocket as well.
#[utoipa::path(
    tag = "Chats",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the messages", body = [ChatMessage]),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "The accounts are not friends", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid, Page),
    security(("session_cookie" = []))
)]
#[get("/chats/{uuid}")]
pub async fn get_chat(
    path: Path<PathUuid>,
    page: Query<Page>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let me = current_account(&session, &db, &cache).await?;

    graph.ensure_can_chat(me.uuid, path.uuid).await?;

    let partner = partner_account(&db, path.uuid).await?;
    let own = AccountResponse {
        uuid: me.uuid,
        username: me.username,
        display_name: me.display_name,
        verified: me.verified,
    };

    let messages = query!(
        db.as_ref(),
        (
            DirectMessage::F.id,
            DirectMessage::F.sender,
            DirectMessage::F.message,
            DirectMessage::F.created_at
        )
    )
    .condition(or!(
        and!(
            DirectMessage::F.sender.equals(me.uuid),
            DirectMessage::F.recipient.equals(path.uuid)
        ),
        and!(
            DirectMessage::F.sender.equals(path.uuid),
            DirectMessage::F.recipient.equals(me.uuid)
        )
    ))
    .order_desc(DirectMessage::F.created_at)
    .limit(page.limit())
    .offset(page.offset())
    .all()
    .await?;

    Ok(Json(
        messages
            .into_iter()
            .map(|(id, sender, message, created_at)| {
                let (sender, recipient) = if *sender.key() == me.uuid {
                    (own.clone(), partner.uuid)
                } else {
                    (partner.clone(), own.uuid)
                };

                ChatMessage {
                    id,
                    sender,
                    recipient,
                    message,
                    created_at: Utc.from_utc_datetime(&created_at),
                }
            })
            .sorted()
            .collect(),
    ))
}

/// The request to send a message
#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[schema(example = "Hello there!")]
    message: String,
}

/// Send a direct message to a friend
///
/// The friend is notified via websocket.
#[utoipa::path(
    tag = "Chats",
    context_path = "/api/v1",
    responses(
        (status = 201, description = "The message has been sent", body = ChatMessage),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 403, description = "The accounts are not friends", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    request_body = SendMessageRequest,
    security(("session_cookie" = []))
)]
#[post("/chats/{uuid}")]
pub async fn send_message(
    path: Path<PathUuid>,
    req: Json<SendMessageRequest>,
    db: Data<Database>,
    graph: Data<Graph>,
    cache: Data<AccountCache>,
    session: Session,
    ws_manager_chan: Data<WsManagerChan>,
) -> ApiResult<HttpResponse> {
    let me = current_account(&session, &db, &cache).await?;

    if req.message.trim().is_empty() || req.message.len() > MAX_MESSAGE_LENGTH {
        return Err(ApiError::InvalidMessage);
    }

    graph.ensure_can_chat(me.uuid, path.uuid).await?;

    let now = Utc::now();
    let id = insert!(db.as_ref(), DirectMessageInsert)
        .return_primary_key()
        .single(&DirectMessageInsert {
            sender: ForeignModelByField::Key(me.uuid),
            recipient: ForeignModelByField::Key(path.uuid),
            message: req.message.clone(),
            created_at: now.naive_utc(),
        })
        .await?;

    graph.record_message(me.uuid, path.uuid, now).await?;

    let message = ChatMessage {
        id,
        sender: AccountResponse {
            uuid: me.uuid,
            username: me.username,
            display_name: me.display_name,
            verified: me.verified,
        },
        recipient: path.uuid,
        message: req.into_inner().message,
        created_at: now,
    };

    if let Err(err) = ws_manager_chan
        .send(WsManagerMessage::SendMessage(
            path.uuid,
            WsMessage::IncomingChatMessage {
                message: message.clone(),
            },
        ))
        .await
    {
        error!("Could not send to ws manager chan: {err}");
    }

    Ok(HttpResponse::Created().json(message))
}
