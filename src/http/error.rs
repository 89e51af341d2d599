use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// Builds a status error from a non-2xx response body, pulling out the
    /// human readable part the server put in it.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| extract_message(&value))
            .or_else(|| {
                let raw = body.trim();
                (!raw.is_empty()).then(|| raw.to_string())
            })
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self::Status { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn extract_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            for key in ["detail", "error", "message"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return Some(s.clone());
                }
            }

            // field -> [errors] maps from form validation
            let parts: Vec<String> = map
                .iter()
                .filter_map(|(field, errors)| {
                    let text = match errors {
                        Value::String(s) => s.clone(),
                        Value::Array(items) => items
                            .iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(", "),
                        _ => return None,
                    };
                    (!text.is_empty()).then(|| format!("{field}: {text}"))
                })
                .collect();

            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Array(items) => {
            let parts: Vec<&str> =
                items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}
