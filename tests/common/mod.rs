//! Hand-written fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bizsuite::api::{AuthApi, ChatApi, SignInResponse, SignUpRequest};
use bizsuite::auth::{BiometricPlatform, PlatformFailure};
use bizsuite::error::{ApiError, ApiResult};
use bizsuite::types::{
    Conversation, ConversationDetails, ConversationPage, ConversationStats, ImageUpload, Message,
    MessageExchange, MessageType, Pagination, Role,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use time::OffsetDateTime;
use tokio::sync::Notify;

pub fn message(id: &str, role: Role, image: Option<&str>) -> Message {
    Message {
        message_id: id.to_string(),
        role,
        content: format!("content of {id}"),
        message_type: MessageType::Text,
        image_url: image.map(str::to_string),
        previous_image_url: None,
        timestamp: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn conversation(id: &str) -> Conversation {
    Conversation {
        conversation_id: id.to_string(),
        title: format!("Chat {id}"),
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
        message_count: 0,
    }
}

// ============================================
// Auth
// ============================================

#[derive(Default)]
pub struct FakeAuthApi {
    accounts: Mutex<HashMap<String, String>>,
    pub offline: AtomicBool,
    pub omit_token: AtomicBool,
    pub sign_in_calls: AtomicUsize,
}

impl FakeAuthApi {
    pub fn with_account(email: &str, password: &str) -> Self {
        let api = Self::default();
        api.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), password.to_string());
        api
    }

    pub fn change_password(&self, email: &str, password: &str) {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), password.to_string());
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn sign_in(&self, email: &str, password: &str) -> ApiResult<SignInResponse> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Network("Network error: connection refused".into()));
        }
        let accepted = self.accounts.lock().unwrap().get(email).map(String::as_str) == Some(password);
        if !accepted {
            return Err(ApiError::Http {
                status: 401,
                message: "Invalid email or password".into(),
            });
        }
        if self.omit_token.load(Ordering::SeqCst) {
            return Ok(SignInResponse::default());
        }
        Ok(SignInResponse {
            token: Some(format!("token-for-{email}")),
            user: None,
        })
    }

    async fn sign_up(&self, request: &SignUpRequest) -> ApiResult<SignInResponse> {
        self.change_password(&request.email, &request.password);
        Ok(SignInResponse {
            token: Some(format!("token-for-{}", request.email)),
            user: None,
        })
    }

    async fn forgot_password(&self, _email: &str) -> ApiResult<()> {
        Ok(())
    }

    async fn verify_otp(&self, _email: &str, _otp: &str) -> ApiResult<()> {
        Ok(())
    }

    async fn reset_password(&self, email: &str, _otp: &str, new_password: &str) -> ApiResult<()> {
        self.change_password(email, new_password);
        Ok(())
    }
}

// ============================================
// Biometrics
// ============================================

pub struct FakeBiometrics {
    pub hardware: AtomicBool,
    pub enrolled: AtomicBool,
    pub outcome: Mutex<Result<(), PlatformFailure>>,
    pub challenges: AtomicUsize,
}

impl FakeBiometrics {
    pub fn capable() -> Self {
        Self {
            hardware: AtomicBool::new(true),
            enrolled: AtomicBool::new(true),
            outcome: Mutex::new(Ok(())),
            challenges: AtomicUsize::new(0),
        }
    }

    pub fn incapable() -> Self {
        let fake = Self::capable();
        fake.enrolled.store(false, Ordering::SeqCst);
        fake
    }

    pub fn fail_with(&self, failure: PlatformFailure) {
        *self.outcome.lock().unwrap() = Err(failure);
    }
}

#[async_trait]
impl BiometricPlatform for FakeBiometrics {
    async fn has_hardware(&self) -> bool {
        self.hardware.load(Ordering::SeqCst)
    }

    async fn is_enrolled(&self) -> bool {
        self.enrolled.load(Ordering::SeqCst)
    }

    async fn authenticate(&self, _prompt: &str) -> Result<(), PlatformFailure> {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().unwrap().clone()
    }
}

// ============================================
// Chat
// ============================================

#[derive(Default)]
pub struct FakeChatApi {
    conversations: Mutex<Vec<Conversation>>,
    transcripts: Mutex<HashMap<String, Vec<Message>>>,
    pub fail_sends: Mutex<Option<ApiError>>,
    pub user_image: Mutex<Option<String>>,
    pub assistant_image: Mutex<Option<String>>,
    pub hold_sends: AtomicBool,
    pub release: Notify,
    pub send_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub created: AtomicUsize,
}

impl FakeChatApi {
    pub fn with_conversation(id: &str, messages: Vec<Message>) -> Self {
        let api = Self::default();
        api.conversations.lock().unwrap().push(conversation(id));
        api.transcripts
            .lock()
            .unwrap()
            .insert(id.to_string(), messages);
        api
    }

    pub fn set_reply_images(&self, user: Option<&str>, assistant: Option<&str>) {
        *self.user_image.lock().unwrap() = user.map(str::to_string);
        *self.assistant_image.lock().unwrap() = assistant.map(str::to_string);
    }

    pub fn fail_next_sends(&self, err: ApiError) {
        *self.fail_sends.lock().unwrap() = Some(err);
    }

    pub fn total_sends(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst) + self.upload_calls.load(Ordering::SeqCst)
    }

    async fn exchange(&self, content: &str, message_type: MessageType) -> ApiResult<MessageExchange> {
        if self.hold_sends.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        let failure = self.fail_sends.lock().unwrap().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        let n = self.total_sends();
        let mut user = message(&format!("u{n}"), Role::User, self.user_image.lock().unwrap().as_deref());
        user.content = content.to_string();
        user.message_type = message_type;
        let mut assistant = message(
            &format!("a{n}"),
            Role::Assistant,
            self.assistant_image.lock().unwrap().as_deref(),
        );
        assistant.message_type = message_type;
        Ok(MessageExchange {
            user_message: user,
            assistant_message: assistant,
        })
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn list_conversations(&self, page: u32, page_size: u32) -> ApiResult<ConversationPage> {
        let all = self.conversations.lock().unwrap().clone();
        let start = ((page.max(1) - 1) * page_size) as usize;
        let conversations: Vec<_> = all.iter().skip(start).take(page_size as usize).cloned().collect();
        Ok(ConversationPage {
            conversations,
            pagination: Pagination {
                page,
                limit: page_size,
                total: all.len() as u32,
                total_pages: (all.len() as u32).div_ceil(page_size.max(1)),
            },
        })
    }

    async fn create_conversation(&self, _title: &str) -> ApiResult<String> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        let id = format!("new-{n}");
        self.conversations.lock().unwrap().insert(0, conversation(&id));
        self.transcripts.lock().unwrap().insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn conversation_details(&self, conversation_id: &str) -> ApiResult<ConversationDetails> {
        let messages = self
            .transcripts
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: "Conversation not found".into(),
            })?;
        Ok(ConversationDetails {
            conversation: conversation(conversation_id),
            messages,
        })
    }

    async fn send_message(
        &self,
        _conversation_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> ApiResult<MessageExchange> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange(content, message_type).await
    }

    async fn upload_image(
        &self,
        _conversation_id: &str,
        _image: &ImageUpload,
        content: &str,
    ) -> ApiResult<MessageExchange> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange(content, MessageType::ImageUpload).await
    }

    async fn clear_conversation(&self, conversation_id: &str) -> ApiResult<()> {
        if let Some(messages) = self.transcripts.lock().unwrap().get_mut(conversation_id) {
            messages.clear();
        }
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> ApiResult<()> {
        self.conversations
            .lock()
            .unwrap()
            .retain(|c| c.conversation_id != conversation_id);
        self.transcripts.lock().unwrap().remove(conversation_id);
        Ok(())
    }

    async fn conversation_stats(&self) -> ApiResult<ConversationStats> {
        let transcripts = self.transcripts.lock().unwrap();
        Ok(ConversationStats {
            total_conversations: transcripts.len() as u32,
            total_messages: transcripts.values().map(|m| m.len() as u32).sum(),
        })
    }
}
