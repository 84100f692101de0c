use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessage {
    pub id: String,
    pub content: String,
    pub channel_id: String,
    pub scheduled_for: String,
    pub sent: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub content: String,
    pub scheduled_for: String,
    pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessageRequest {
    pub content: Option<String>,
    pub scheduled_for: Option<String>,
    pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub sent: Option<bool>,
}
