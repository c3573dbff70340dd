use super::reconcile::reconcile;
use crate::api::ChatApi;
use crate::error::ApiResult;
use crate::types::{
    Conversation, ConversationPage, ConversationStats, ImageUpload, Message, MessageExchange,
    MessageType,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Default)]
struct ActiveConversation {
    conversation: Option<Conversation>,
    messages: Vec<Message>,
}

/// Remote conversations plus the displayed message sequence of the one open conversation.
pub struct ConversationStore {
    api: Arc<dyn ChatApi>,
    active: Mutex<ActiveConversation>,
}

impl ConversationStore {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            active: Mutex::new(ActiveConversation::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActiveConversation> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn list(&self, page: u32, page_size: u32) -> ApiResult<ConversationPage> {
        self.api.list_conversations(page, page_size).await
    }

    pub async fn create(&self, title: &str) -> ApiResult<String> {
        let conversation_id = self.api.create_conversation(title).await?;
        info!(%conversation_id, "conversation created");
        Ok(conversation_id)
    }

    pub async fn details(&self, conversation_id: &str) -> ApiResult<(Conversation, Vec<Message>)> {
        let details = self.api.conversation_details(conversation_id).await?;
        Ok((details.conversation, details.messages))
    }

    /// Make `conversation_id` the open conversation, reconciling the full transcript.
    pub async fn open(&self, conversation_id: &str) -> ApiResult<Vec<Message>> {
        let (conversation, messages) = self.details(conversation_id).await?;
        let messages = reconcile(messages);
        let mut active = self.lock();
        active.conversation = Some(conversation);
        active.messages = messages.clone();
        Ok(messages)
    }

    /// Open the most recently updated conversation, creating one if the user has none.
    pub async fn open_or_create(&self, title: &str) -> ApiResult<Vec<Message>> {
        let page = self.list(1, 1).await?;
        let conversation_id = match page.conversations.into_iter().next() {
            Some(latest) => latest.conversation_id,
            None => self.create(title).await?,
        };
        self.open(&conversation_id).await
    }

    pub async fn send(
        &self,
        conversation_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> ApiResult<MessageExchange> {
        self.api
            .send_message(conversation_id, content, message_type)
            .await
    }

    pub async fn upload_image(
        &self,
        conversation_id: &str,
        image: &ImageUpload,
        content: &str,
    ) -> ApiResult<MessageExchange> {
        self.api.upload_image(conversation_id, image, content).await
    }

    pub async fn clear(&self, conversation_id: &str) -> ApiResult<()> {
        self.api.clear_conversation(conversation_id).await?;
        let mut active = self.lock();
        if active.conversation_id() == Some(conversation_id) {
            active.messages.clear();
        }
        Ok(())
    }

    pub async fn delete(&self, conversation_id: &str) -> ApiResult<()> {
        self.api.delete_conversation(conversation_id).await?;
        let mut active = self.lock();
        if active.conversation_id() == Some(conversation_id) {
            *active = ActiveConversation::default();
        }
        info!(%conversation_id, "conversation deleted");
        Ok(())
    }

    pub async fn stats(&self) -> ApiResult<ConversationStats> {
        self.api.conversation_stats().await
    }

    pub fn active_conversation(&self) -> Option<Conversation> {
        self.lock().conversation.clone()
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        self.lock().conversation_id().map(str::to_string)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn last_message(&self) -> Option<Message> {
        self.lock().messages.last().cloned()
    }

    pub fn push(&self, message: Message) {
        self.lock().messages.push(message);
    }

    pub fn extend(&self, messages: impl IntoIterator<Item = Message>) {
        self.lock().messages.extend(messages);
    }

    /// Drop a message by id. Returns whether it was present.
    pub fn remove(&self, message_id: &str) -> bool {
        let mut active = self.lock();
        let before = active.messages.len();
        active.messages.retain(|message| message.message_id != message_id);
        active.messages.len() != before
    }
}

impl ActiveConversation {
    fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|conversation| conversation.conversation_id.as_str())
    }
}
