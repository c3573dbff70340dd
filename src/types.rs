use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};

/// Id prefix reserved for client-only messages that are still in flight.
pub const PENDING_ID_PREFIX: &str = "pending-";

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

/// Which screen group the app shell may show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthStatus {
    Unauthenticated,
    AuthenticatedNoBusiness,
    Ready,
}

impl AuthStatus {
    pub fn derive(authenticated: bool, selected_business: Option<&str>) -> Self {
        match (authenticated, selected_business) {
            (false, _) => AuthStatus::Unauthenticated,
            (true, None) => AuthStatus::AuthenticatedNoBusiness,
            (true, Some(_)) => AuthStatus::Ready,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    ImageGeneration,
    ImageEdit,
    ImageUpload,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::ImageGeneration => "image_generation",
            MessageType::ImageEdit => "image_edit",
            MessageType::ImageUpload => "image_upload",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(alias = "id", alias = "_id")]
    pub message_id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339", alias = "createdAt")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    /// Client-only user message standing in for a send that has not returned yet.
    pub fn pending(content: &str, message_type: MessageType) -> Self {
        Self {
            message_id: format!("{PENDING_ID_PREFIX}{}", uuid::Uuid::new_v4()),
            role: Role::User,
            content: content.to_string(),
            message_type,
            image_url: None,
            previous_image_url: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.message_id.starts_with(PENDING_ID_PREFIX)
    }

    /// The image this message should render, if any. Empty urls count as absent.
    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn display_time(&self) -> Option<String> {
        let mut datetime = self.timestamp;
        if let Ok(offset) = UtcOffset::current_local_offset() {
            datetime = datetime.to_offset(offset);
        }
        datetime.format(MESSAGE_TIME_FORMAT).ok()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(alias = "id", alias = "_id")]
    pub conversation_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub message_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default, alias = "pages")]
    pub total_pages: u32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ConversationPage {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ConversationDetails {
    pub conversation: Conversation,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Both sides of one chat round trip, as confirmed by the server.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageExchange {
    pub user_message: Message,
    pub assistant_message: Message,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    #[serde(default)]
    pub total_conversations: u32,
    #[serde(default)]
    pub total_messages: u32,
}

/// Raw image bytes picked by the user for an upload message.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total: f64,
    /// Line items, terms and anything else the server attaches.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}
