//! REST routes under `/api/v1/chat`.
//!
//! The server never throttles: rate limiting is the client's job.

use std::convert::Infallible;
use std::sync::Arc;

use serde_json::json;
use tracing::error;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::error::StoreError;
use crate::store::MessageStore;
use crate::types::{NewMessage, NewRoom};

/// Largest JSON body accepted.
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub type SharedStore = Arc<dyn MessageStore>;

fn with_store(store: SharedStore) -> impl Filter<Extract = (SharedStore,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// All routes, with CORS for `origins` and rejection handling.
pub fn routes(
    store: SharedStore,
    origins: &[String],
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let cors = warp::cors()
        .allow_origins(origins.iter().map(String::as_str))
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS", "PATCH"])
        .allow_headers(vec!["Content-Type", "Authorization"]);

    api(store)
        .with(cors)
        .with(warp::trace::request())
        .recover(handle_rejection)
}

/// The routes without CORS, for direct use in tests.
pub fn api(store: SharedStore) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path::end()
        .and(warp::get())
        .map(|| "Backend is running fine here ............");

    let create_message = warp::path!("api" / "v1" / "chat" / "message")
        .and(warp::post())
        .and(json_body::<NewMessage>())
        .and(with_store(store.clone()))
        .and_then(create_message);

    let fetch_messages = warp::path!("api" / "v1" / "chat" / String / "messages")
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(fetch_messages);

    let create_room = warp::path!("api" / "v1" / "chat" / "room")
        .and(warp::post())
        .and(json_body::<NewRoom>())
        .and(with_store(store.clone()))
        .and_then(create_room);

    let list_rooms = warp::path!("api" / "v1" / "chat" / "rooms")
        .and(warp::get())
        .and(with_store(store))
        .and_then(list_rooms);

    health
        .map(|r| Box::new(r) as Box<dyn Reply>)
        .or(create_message)
        .unify()
        .or(fetch_messages)
        .unify()
        .or(create_room)
        .unify()
        .or(list_rooms)
        .unify()
}

type BoxedReply = Box<dyn Reply>;

fn reply<T: serde::Serialize>(body: &T, status: StatusCode) -> BoxedReply {
    Box::new(warp::reply::with_status(warp::reply::json(body), status))
}

fn store_error_reply(err: StoreError) -> BoxedReply {
    match err {
        StoreError::MissingRoomFields | StoreError::DuplicateRoom | StoreError::RoomIdTaken(_) => {
            reply(&json!({ "message": err.to_string() }), StatusCode::BAD_REQUEST)
        }
        other => {
            error!("store failure: {}", other);
            reply(
                &json!({ "message": "Internal server error" }),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    }
}

async fn create_message(body: NewMessage, store: SharedStore) -> Result<BoxedReply, Rejection> {
    Ok(match store.create_message(body).await {
        Ok(saved) => reply(&saved, StatusCode::CREATED),
        Err(e) => store_error_reply(e),
    })
}

async fn fetch_messages(chat_id: String, store: SharedStore) -> Result<BoxedReply, Rejection> {
    Ok(match store.messages(&chat_id).await {
        Ok(items) => reply(&items, StatusCode::OK),
        Err(e) => store_error_reply(e),
    })
}

async fn create_room(body: NewRoom, store: SharedStore) -> Result<BoxedReply, Rejection> {
    Ok(match store.create_room(body).await {
        Ok(room) => reply(&room, StatusCode::CREATED),
        Err(e) => store_error_reply(e),
    })
}

async fn list_rooms(store: SharedStore) -> Result<BoxedReply, Rejection> {
    Ok(match store.rooms().await {
        Ok(rooms) => reply(&rooms, StatusCode::OK),
        Err(e) => store_error_reply(e),
    })
}

/// Turn warp rejections into the same `{"message": ...}` bodies.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if let Some(e) = err.find::<warp::cors::CorsForbidden>() {
        (StatusCode::FORBIDDEN, e.to_string())
    } else {
        error!("unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "message": message })),
        status,
    ))
}
