use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for `POST /api/enter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterRequest {
    /// Display name the participant enters the room under.
    pub name: String,
}

/// Response body for `POST /api/enter` and `POST /api/leave`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterResponse {
    /// Populated when the request could not be honored.
    pub error: Option<String>,
}

/// Request body for `POST /api/say`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SayRequest {
    /// The message text to post to the room.
    pub text: String,
}

/// Response body for `POST /api/say`. Errors travel in-band so a polling
/// client reads one shape regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SayResponse {
    pub error: Option<String>,
}

/// Query parameters for `GET /api/messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetMessagesParams {
    /// RFC 3339 cursor; everything strictly after this instant is
    /// returned. Absent means "from now".
    pub since: Option<String>,
}

/// Response body for `GET /api/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMessagesResponse {
    /// Populated when the request could not be honored.
    pub error: Option<String>,
    /// The cursor the client should consider for its next poll.
    pub since: DateTime<Utc>,
    /// New message texts, oldest first.
    pub messages: Vec<String>,
}

impl GetMessagesResponse {
    /// A successful response carrying `messages` and the next cursor.
    #[must_use]
    pub fn ok(since: DateTime<Utc>, messages: Vec<String>) -> Self {
        Self {
            error: None,
            since,
            messages,
        }
    }

    /// A failed response with an in-band error and an empty message list.
    #[must_use]
    pub fn invalid(error: impl Into<String>, since: DateTime<Utc>) -> Self {
        Self {
            error: Some(error.into()),
            since,
            messages: Vec::new(),
        }
    }
}
