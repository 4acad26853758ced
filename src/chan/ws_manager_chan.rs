use std::collections::HashMap;

use actix_toolbox::ws;
use actix_toolbox::ws::Message;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use uuid::Uuid;

use crate::server::handler::{AccountResponse, ChatMessage};

pub(crate) async fn start_ws_sender(tx: ws::Sender, mut rx: mpsc::Receiver<WsMessage>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WsMessage::ServerQuitSocket => {
                if let Err(err) = tx.close().await {
                    error!("Error while closing ws sender: {err}");
                }
                break;
            }
            _ => {
                let txt = match serde_json::to_string(&msg) {
                    Ok(v) => v,
                    Err(err) => {
                        error!("Error serializing WsMessage: {err}");
                        continue;
                    }
                };

                if let Err(err) = tx.send(Message::Text(txt.into())).await {
                    error!("Error sending to client: {err}, closing socket");
                    if let Err(err) = tx.close().await {
                        error!("Error closing socket: {err}");
                    }
                }
            }
        }
    }
}

/// Message that is sent via websocket
///
/// The messages will get serialized and deserialized using JSON
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(tag = "type", content = "content", rename_all = "camelCase")]
pub enum WsMessage {
    /// This variant is only used internally to signal a socket handler that it should
    /// shutdown
    #[serde(skip)]
    ServerQuitSocket,
    /// Response to the client if an invalid message was received.
    ///
    /// Clients are not supposed to send anything but pings and pongs.
    InvalidMessage,
    /// Another account has sent a friend request to the client
    IncomingFriendRequest {
        /// Identifier of the request, used to answer it
        connection_id: i64,
        /// The account that sent the request
        from: AccountResponse,
    },
    /// A friend request of the client was accepted, chatting is possible from now on
    FriendRequestAccepted {
        /// Identifier of the connection
        connection_id: i64,
        /// The account that accepted the request
        by: AccountResponse,
    },
    /// A friend has sent a direct message to the client
    IncomingChatMessage {
        /// The new message
        message: ChatMessage,
    },
}

/// This type is a sender to the websocket manager
pub type WsManagerChan = Sender<WsManagerMessage>;

/// Messages to control the websocket manager
pub enum WsManagerMessage {
    /// Close the socket from the server side
    CloseSocket(Uuid),
    /// Client with given uuid initialized a websocket
    OpenedSocket(Uuid, ws::Sender),
    /// Send a message to given uuid
    SendMessage(Uuid, WsMessage),
    /// Retrieve the current websocket count by sending this
    /// message to the ws manager.
    ///
    /// It will respond through the provided channel
    RetrieveWsCount(oneshot::Sender<u64>),
}

/// Start the websocket manager
///
/// It will return a channel to this manager
pub async fn start_ws_manager() -> Result<WsManagerChan, String> {
    let mut lookup: HashMap<Uuid, Vec<Sender<WsMessage>>> = HashMap::new();

    let (tx, mut rx) = mpsc::channel(64);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                WsManagerMessage::CloseSocket(uuid) => {
                    // Trigger close for all websockets associated with uuid
                    if let Some(sockets) = lookup.get(&uuid) {
                        for s in sockets {
                            if !s.is_closed() {
                                if let Err(err) = s.send(WsMessage::ServerQuitSocket).await {
                                    error!("Couldn't send close to ws sender: {err}");
                                }
                            }
                        }
                    }

                    lookup.remove(&uuid);
                }
                WsManagerMessage::OpenedSocket(uuid, ws_tx) => {
                    let (tx, rx) = mpsc::channel(16);
                    task::spawn(start_ws_sender(ws_tx, rx));

                    lookup.entry(uuid).or_default().push(tx);
                }
                WsManagerMessage::SendMessage(uuid, msg) => {
                    let Some(senders) = lookup.get_mut(&uuid) else {
                        debug!("No open websocket to deliver the message to");
                        continue;
                    };

                    // Forget about sockets that were closed by the client
                    senders.retain(|s| !s.is_closed());

                    for tx in senders.iter() {
                        if let Err(err) = tx.send(msg.clone()).await {
                            error!("Could not send to ws sender: {err}");
                        }
                    }
                }
                WsManagerMessage::RetrieveWsCount(tx) => {
                    let sum = lookup.values().map(|s| s.len() as u64).sum();
                    if tx.send(sum).is_err() {
                        error!("Could not send through callback channel");
                    }
                }
            }
        }
    });

    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_tagged() {
        let by = AccountResponse {
            uuid: Uuid::new_v4(),
            username: "ben".to_string(),
            display_name: "Ben".to_string(),
            verified: true,
        };

        let json = serde_json::to_value(WsMessage::FriendRequestAccepted {
            connection_id: 7,
            by,
        })
        .unwrap();

        assert_eq!(json["type"], "friendRequestAccepted");
        assert_eq!(json["content"]["connection_id"], 7);
        assert_eq!(json["content"]["by"]["username"], "ben");
    }

    #[tokio::test]
    async fn no_sockets_after_start() {
        let chan = start_ws_manager().await.unwrap();

        // Messages to accounts without socket are dropped
        chan.send(WsManagerMessage::SendMessage(
            Uuid::new_v4(),
            WsMessage::InvalidMessage,
        ))
        .await
        .unwrap();

        let (tx, rx) = oneshot::channel();
        chan.send(WsManagerMessage::RetrieveWsCount(tx))
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), 0);
    }
}
