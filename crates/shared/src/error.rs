use serde::{Deserialize, Serialize};

/// Body the reactor service attaches to every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}

impl ApiErrorBody {
    /// Extracts the service message from a raw response body, if it has one.
    pub fn parse_message(body: &str) -> Option<String> {
        serde_json::from_str::<Self>(body)
            .ok()
            .map(|parsed| parsed.message)
            .filter(|message| !message.trim().is_empty())
    }
}
