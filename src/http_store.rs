//! `MessageStore` over the board's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::StoreError;
use crate::store::MessageStore;
use crate::types::{ChatRoom, Message, NewMessage, NewRoom};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base: Url,
}

impl HttpStore {
    /// `server` is the origin, e.g. `http://localhost:5000`.
    pub fn new(server: &str) -> Result<Self, StoreError> {
        let mut base =
            Url::parse(server).map_err(|e| StoreError::InvalidUrl(format!("{}: {}", server, e)))?;
        base.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(server.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "chat"]);
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base })
    }

    /// Each segment is percent-encoded, so ids may contain `/`, `?` or `#`.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` only accepts urls that can take a path
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    async fn parse<T: DeserializeOwned>(res: Response) -> Result<T, StoreError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res.json().await?);
        }
        let text = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);
        debug!("request failed with {}: {}", status, message);
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl MessageStore for HttpStore {
    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let res = self
            .client
            .post(self.url(&["message"]))
            .json(&message)
            .send()
            .await?;
        Self::parse(res).await
    }

    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let res = self
            .client
            .get(self.url(&[chat_id, "messages"]))
            .send()
            .await?;
        Self::parse(res).await
    }

    async fn create_room(&self, room: NewRoom) -> Result<ChatRoom, StoreError> {
        let res = self.client.post(self.url(&["room"])).json(&room).send().await?;
        Self::parse(res).await
    }

    async fn rooms(&self) -> Result<Vec<ChatRoom>, StoreError> {
        let res = self.client.get(self.url(&["rooms"])).send().await?;
        Self::parse(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::store::MemoryStore;
    use crate::types::Profile;
    use std::net::SocketAddr;
    use std::sync::Arc;

    async fn serve() -> String {
        let store: api::SharedStore = Arc::new(MemoryStore::new());
        let (addr, server) =
            warp::serve(api::routes(store, &[])).bind_ephemeral(SocketAddr::from(([127, 0, 0, 1], 0)));
        tokio::spawn(server);
        format!("http://{}/", addr)
    }

    #[test]
    fn test_url_building() {
        let store = HttpStore::new("http://localhost:5000/").unwrap();
        assert_eq!(store.url(&["rooms"]).as_str(), "http://localhost:5000/api/v1/chat/rooms");

        let store = HttpStore::new("http://localhost:5000").unwrap();
        assert_eq!(store.url(&["room"]).as_str(), "http://localhost:5000/api/v1/chat/room");
    }

    #[test]
    fn test_room_id_is_one_path_segment() {
        let store = HttpStore::new("http://localhost:5000").unwrap();
        let url = store.url(&["a/b?c#d", "messages"]);
        assert_eq!(url.as_str(), "http://localhost:5000/api/v1/chat/a%2Fb%3Fc%23d/messages");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path_segments().unwrap().count(), 5);
    }

    #[test]
    fn test_rejects_unusable_server_url() {
        assert!(matches!(HttpStore::new("not a url"), Err(StoreError::InvalidUrl(_))));
        assert!(matches!(HttpStore::new("mailto:board@example.com"), Err(StoreError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_round_trip_against_server() {
        let store = HttpStore::new(&serve().await).unwrap();

        let room = store.create_room(NewRoom::new("Derby", "Sports")).await.unwrap();
        let profile = Profile::new("owl", "🦉").unwrap();
        let saved = store
            .create_message(NewMessage::from_profile(&profile, &room.id, "goal!"))
            .await
            .unwrap();
        assert_eq!(saved.chat_id, room.id);

        let items = store.messages(&room.id).await.unwrap();
        assert_eq!(items, vec![saved]);

        let rooms = store.rooms().await.unwrap();
        assert_eq!(rooms[0].message_count, 1);
    }

    #[tokio::test]
    async fn test_server_error_message_surfaces() {
        let store = HttpStore::new(&serve().await).unwrap();
        store.create_room(NewRoom::new("Derby", "Sports")).await.unwrap();

        let err = store
            .create_room(NewRoom::new("derby", "Sports"))
            .await
            .unwrap_err();
        match err {
            StoreError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Chat room with this title already exists.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_retryable() {
        let store = HttpStore::new("http://127.0.0.1:9").unwrap();
        let err = store.rooms().await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
        assert!(err.is_retryable());
    }
}
