use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use cookie::{Cookie, SameSite};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::domain::MessagesTurn;
use crate::http::error::{ApiError, AppResult};
use shared::models::{
    EnterRequest, EnterResponse, GetMessagesParams, GetMessagesResponse, SayRequest, SayResponse,
};

/// Cookie carrying the validated room-entry name.
pub const NAME_COOKIE: &str = "parlor_name";

const SAY_INVALID: &str = "The say request was invalid.";
const MESSAGES_INVALID: &str = "The messages request was invalid.";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_ -]+$").expect("name pattern compiles"))
}

fn valid_name(name: &str, max_chars: usize) -> bool {
    let count = name.chars().count();
    count >= 1 && count <= max_chars && name_pattern().is_match(name)
}

fn valid_text(text: &str, max_chars: usize) -> bool {
    let count = text.chars().count();
    count >= 1 && count <= max_chars
}

/// Name of the participant who entered through this connection, read from
/// the room-entry cookie.
fn identity(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    Cookie::split_parse(raw.to_owned())
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == NAME_COOKIE)
        .map(|cookie| cookie.value().to_owned())
}

fn entry_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((NAME_COOKIE, name.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = entry_cookie("");
    cookie.make_removal();
    cookie
}

fn set_cookie_header(cookie: &Cookie<'_>) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|_| ApiError::internal_server_error("failed to encode cookie"))
}

/// `POST /api/enter` - validate the name, hand out the entry cookie, and
/// announce the participant to the room.
pub async fn enter(
    State(state): State<AppState>,
    Json(request): Json<EnterRequest>,
) -> AppResult<Response> {
    let name = request.name.trim().to_owned();
    if !valid_name(&name, state.config.room.name_max_chars) {
        return Err(ApiError::validation(format!(
            "A name must be 1-{} letters, numbers, spaces, hyphens or underscores.",
            state.config.room.name_max_chars
        )));
    }

    info!(%name, "participant entering the room");
    state.room.add_participant(&name);

    let header_value = set_cookie_header(&entry_cookie(&name))?;
    let mut response = Json(EnterResponse { error: None }).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, header_value);
    Ok(response)
}

/// `POST /api/leave` - clear the entry cookie and announce the exit.
pub async fn leave(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let name =
        identity(&headers).ok_or_else(|| ApiError::unauthorized("enter the room first"))?;

    info!(%name, "participant leaving the room");
    state.room.remove_participant(&name);

    let header_value = set_cookie_header(&removal_cookie())?;
    let mut response = Json(EnterResponse { error: None }).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, header_value);
    Ok(response)
}

/// `POST /api/say` - post a message to the room. Validation failures are
/// reported in-band so the polling client reads a single response shape.
pub async fn say(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SayRequest>,
) -> AppResult<Json<SayResponse>> {
    if identity(&headers).is_none() {
        return Err(ApiError::unauthorized("enter the room first"));
    }

    if !valid_text(&request.text, state.config.room.message_max_chars) {
        return Ok(Json(SayResponse {
            error: Some(SAY_INVALID.to_owned()),
        }));
    }

    state.room.add_message(&request.text);
    Ok(Json(SayResponse { error: None }))
}

/// `GET /api/messages?since=<RFC3339>` - answer immediately when the log
/// holds newer messages, otherwise park until a broadcast or the idle
/// sweep completes the request. A missing cursor means "from now".
pub async fn get_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GetMessagesParams>,
) -> AppResult<Json<GetMessagesResponse>> {
    if identity(&headers).is_none() {
        return Err(ApiError::unauthorized("enter the room first"));
    }

    let since: DateTime<Utc> = match params.since {
        None => state.clock.now(),
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(_) => {
                return Ok(Json(GetMessagesResponse::invalid(
                    MESSAGES_INVALID,
                    state.clock.now(),
                )));
            }
        },
    };

    match state.room.get_messages(since) {
        MessagesTurn::Ready(delivery) => {
            Ok(Json(GetMessagesResponse::ok(delivery.since, delivery.messages)))
        }
        MessagesTurn::Parked(receiver) => {
            debug!(%since, "no new messages, parking the poll");
            let delivery = receiver.await.map_err(|_| {
                ApiError::internal_server_error("the room dropped this request without answering")
            })?;
            Ok(Json(GetMessagesResponse::ok(delivery.since, delivery.messages)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_accept_the_documented_character_set() {
        assert!(valid_name("alice", 16));
        assert!(valid_name("Bob the-2nd_", 16));
        assert!(!valid_name("", 16));
        assert!(!valid_name("name!", 16));
        assert!(!valid_name("<script>", 16));
        assert!(!valid_name("seventeen-chars-x", 16));
    }

    #[test]
    fn texts_are_bounded_but_free_form() {
        assert!(valid_text("hello", 1024));
        assert!(valid_text("punctuation?! ok.", 1024));
        assert!(!valid_text("", 1024));
        assert!(!valid_text(&"x".repeat(1025), 1024));
        assert!(valid_text(&"x".repeat(1024), 1024));
    }

    #[test]
    fn identity_reads_the_entry_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; parlor_name=alice; theme=dark"),
        );
        assert_eq!(identity(&headers), Some("alice".into()));

        headers.insert(header::COOKIE, HeaderValue::from_static("other=1"));
        assert_eq!(identity(&headers), None);

        headers.remove(header::COOKIE);
        assert_eq!(identity(&headers), None);
    }

    #[test]
    fn entry_cookie_is_scoped_and_http_only() {
        let cookie = entry_cookie("alice");
        assert_eq!(cookie.name(), NAME_COOKIE);
        assert_eq!(cookie.value(), "alice");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
    }
}
