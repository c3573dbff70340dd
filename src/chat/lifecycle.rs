use super::image_state::{ImageLoadState, ImageLoadTracker};
use super::reconcile::reconcile_appended;
use super::store::ConversationStore;
use crate::error::{ApiError, ApiResult};
use crate::notice::{Notice, NoticeSender};
use crate::types::{ImageUpload, Message, MessageType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

const SEND_FAILED_TITLE: &str = "Message not sent";

/// What a submit did.
#[derive(Debug, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing but whitespace to send.
    Empty,
    /// Another send is still in flight; this one was dropped.
    Busy,
    NoConversation,
    Sent,
    Failed(ApiError),
}

/// Removes the pending message and releases the send slot, even if the send future is dropped.
struct InFlight<'a> {
    controller: &'a MessageLifecycleController,
    pending_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.controller.store.remove(&self.pending_id);
        self.controller.sending.store(false, Ordering::Release);
    }
}

/// Optimistic send and per-message image loading for the open conversation.
pub struct MessageLifecycleController {
    store: Arc<ConversationStore>,
    images: ImageLoadTracker,
    input: Mutex<String>,
    sending: AtomicBool,
    notices: Option<NoticeSender>,
}

impl MessageLifecycleController {
    pub fn new(store: Arc<ConversationStore>, images: ImageLoadTracker) -> Self {
        Self {
            store,
            images,
            input: Mutex::new(String::new()),
            sending: AtomicBool::new(false),
            notices: None,
        }
    }

    pub fn with_notices(mut self, notices: NoticeSender) -> Self {
        self.notices = Some(notices);
        self
    }

    fn lock_input(&self) -> MutexGuard<'_, String> {
        self.input.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn input(&self) -> String {
        self.lock_input().clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        *self.lock_input() = text.into();
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.messages()
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub async fn open(&self, conversation_id: &str) -> ApiResult<Vec<Message>> {
        let messages = self.store.open(conversation_id).await?;
        self.track_images(&messages);
        Ok(messages)
    }

    pub async fn open_or_create(&self, title: &str) -> ApiResult<Vec<Message>> {
        let messages = self.store.open_or_create(title).await?;
        self.track_images(&messages);
        Ok(messages)
    }

    fn track_images(&self, messages: &[Message]) {
        self.images.clear();
        for message in messages {
            self.images.observe(&message.message_id, message.image());
        }
    }

    /// Send the current input as a `message_type` message.
    pub async fn submit(&self, message_type: MessageType) -> SubmitOutcome {
        let content = self.input().trim().to_string();
        if content.is_empty() {
            return SubmitOutcome::Empty;
        }
        self.run_send(content, message_type, None).await
    }

    /// Upload an image, captioned with the current input (which may be empty).
    pub async fn submit_image(&self, image: ImageUpload) -> SubmitOutcome {
        let content = self.input().trim().to_string();
        self.run_send(content, MessageType::ImageUpload, Some(image))
            .await
    }

    async fn run_send(
        &self,
        content: String,
        message_type: MessageType,
        image: Option<ImageUpload>,
    ) -> SubmitOutcome {
        let Some(conversation_id) = self.store.active_conversation_id() else {
            return SubmitOutcome::NoConversation;
        };
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("send already in flight, dropping submit");
            return SubmitOutcome::Busy;
        }

        let pending = Message::pending(&content, message_type);
        let in_flight = InFlight {
            controller: self,
            pending_id: pending.message_id.clone(),
        };
        self.store.push(pending);
        info!(%conversation_id, message_type = message_type.as_str(), "sending message");

        let result = match &image {
            Some(upload) => {
                self.store
                    .upload_image(&conversation_id, upload, &content)
                    .await
            }
            None => self.store.send(&conversation_id, &content, message_type).await,
        };

        self.store.remove(&in_flight.pending_id);
        match result {
            // another conversation was opened mid-send: leave its transcript and input alone
            Ok(_) if self.store.active_conversation_id().as_deref() != Some(conversation_id.as_str()) => {
                info!(%conversation_id, "message sent, conversation no longer open");
                SubmitOutcome::Sent
            }
            Ok(exchange) => {
                let tail = self.store.last_message();
                let confirmed = reconcile_appended(
                    tail.as_ref(),
                    vec![exchange.user_message, exchange.assistant_message],
                );
                for message in &confirmed {
                    self.images.observe(&message.message_id, message.image());
                }
                self.store.extend(confirmed);
                self.lock_input().clear();
                info!(%conversation_id, "message sent");
                SubmitOutcome::Sent
            }
            Err(err) => {
                warn!(%conversation_id, error = %err, "send failed, rolled back");
                if let Some(notices) = &self.notices {
                    let _ = notices.send(Notice::api(SEND_FAILED_TITLE, &err));
                }
                SubmitOutcome::Failed(err)
            }
        }
    }

    pub fn image_state(&self, message_id: &str) -> Option<ImageLoadState> {
        self.images.state(message_id)
    }

    pub fn image_attempt(&self, message_id: &str) -> Option<u64> {
        self.images.attempt(message_id)
    }

    pub fn image_loaded(&self, message_id: &str, attempt: u64) -> bool {
        self.images.mark_loaded(message_id, attempt)
    }

    pub fn image_failed(&self, message_id: &str, attempt: u64) -> bool {
        self.images.mark_failed(message_id, attempt)
    }

    pub fn retry_image(&self, message_id: &str) -> Option<u64> {
        self.images.retry(message_id)
    }
}
