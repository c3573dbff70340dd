//! Remote API surface.
//!
//! Each concern gets its own trait so controllers can be driven by fakes in tests;
//! `ApiClient` implements all of them over HTTP.
mod client;

pub use client::ApiClient;

use crate::error::ApiResult;
use crate::types::{
    ConversationDetails, ConversationPage, ConversationStats, ImageUpload, MessageExchange,
    MessageType, Proposal, UserProfile,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SignInResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> ApiResult<SignInResponse>;
    async fn sign_up(&self, request: &SignUpRequest) -> ApiResult<SignInResponse>;
    async fn forgot_password(&self, email: &str) -> ApiResult<()>;
    async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<()>;
    async fn reset_password(&self, email: &str, otp: &str, new_password: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_conversations(&self, page: u32, page_size: u32) -> ApiResult<ConversationPage>;
    async fn create_conversation(&self, title: &str) -> ApiResult<String>;
    async fn conversation_details(&self, conversation_id: &str) -> ApiResult<ConversationDetails>;
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> ApiResult<MessageExchange>;
    async fn upload_image(
        &self,
        conversation_id: &str,
        image: &ImageUpload,
        content: &str,
    ) -> ApiResult<MessageExchange>;
    async fn clear_conversation(&self, conversation_id: &str) -> ApiResult<()>;
    async fn delete_conversation(&self, conversation_id: &str) -> ApiResult<()>;
    async fn conversation_stats(&self) -> ApiResult<ConversationStats>;
}

#[async_trait]
pub trait ProposalApi: Send + Sync {
    async fn list_proposals(&self) -> ApiResult<Vec<Proposal>>;
    async fn create_proposal(&self, proposal: &Value) -> ApiResult<Proposal>;
    async fn get_proposal(&self, id: &str) -> ApiResult<Proposal>;
    async fn update_proposal(&self, id: &str, proposal: &Value) -> ApiResult<Proposal>;
    async fn delete_proposal(&self, id: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn get_profile(&self) -> ApiResult<UserProfile>;
    async fn update_profile(&self, profile: &UserProfile) -> ApiResult<UserProfile>;
    async fn change_password(&self, current_password: &str, new_password: &str) -> ApiResult<()>;
}
