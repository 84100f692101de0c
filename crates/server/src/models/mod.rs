mod channel;
mod guild;
mod message;

pub use channel::*;
pub use guild::*;
pub use message::*;

use serde::Serialize;

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            results: None,
            message: None,
            data,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<I: Serialize> ApiResponse<Vec<I>> {
    pub fn list(data: Vec<I>) -> Self {
        Self {
            status: "success",
            results: Some(data.len()),
            message: None,
            data,
        }
    }
}

/// Caller authenticated with the service API key.
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub ip: Option<String>,
}
