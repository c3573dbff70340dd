use super::{AuthApi, ChatApi, ProfileApi, ProposalApi, SignInResponse, SignUpRequest};
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::storage::TokenStore;
use crate::types::{
    Conversation, ConversationDetails, ConversationPage, ConversationStats, ImageUpload,
    MessageExchange, MessageType, Proposal, UserProfile,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

/// HTTP client for the suite API. Attaches the stored bearer token to every request
/// when one exists; a missing token is left for the server to reject.
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: TokenStore,
}

impl ApiClient {
    pub fn new(config: &AppConfig, tokens: TokenStore) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = self.tokens.get().filter(|token| !token.trim().is_empty()) {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn execute(&self, request: RequestBuilder) -> ApiResult<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "api response");
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::from_response(status, &body))
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let body = self.execute(request).await?;
        parse_body(&body)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.fetch(self.request(Method::POST, path).json(body)).await
    }

    async fn send_only(&self, request: RequestBuilder) -> ApiResult<()> {
        self.execute(request).await.map(|_| ())
    }
}

/// Accept a payload either bare or wrapped in a `{ "data": ... }` envelope.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    let value: Value = serde_json::from_str(body)?;

    if let Some(data) = value.get("data")
        && let Ok(parsed) = T::deserialize(data)
    {
        return Ok(parsed);
    }

    Ok(T::deserialize(value)?)
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum CreatedConversation {
    Wrapped { conversation: Conversation },
    Bare(Conversation),
    IdOnly {
        #[serde(alias = "conversationId", alias = "_id")]
        id: String,
    },
}

impl CreatedConversation {
    fn into_id(self) -> String {
        match self {
            CreatedConversation::Wrapped { conversation } => conversation.conversation_id,
            CreatedConversation::Bare(conversation) => conversation.conversation_id,
            CreatedConversation::IdOnly { id } => id,
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ProposalList {
    Wrapped { proposals: Vec<Proposal> },
    Bare(Vec<Proposal>),
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ProposalBody {
    Wrapped { proposal: Proposal },
    Bare(Proposal),
}

impl From<ProposalBody> for Proposal {
    fn from(body: ProposalBody) -> Self {
        match body {
            ProposalBody::Wrapped { proposal } => proposal,
            ProposalBody::Bare(proposal) => proposal,
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ProfileBody {
    Wrapped { user: UserProfile },
    Bare(UserProfile),
}

impl From<ProfileBody> for UserProfile {
    fn from(body: ProfileBody) -> Self {
        match body {
            ProfileBody::Wrapped { user } => user,
            ProfileBody::Bare(user) => user,
        }
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn sign_in(&self, email: &str, password: &str) -> ApiResult<SignInResponse> {
        self.post_json(
            "/api/auth/signin",
            &json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn sign_up(&self, request: &SignUpRequest) -> ApiResult<SignInResponse> {
        self.post_json("/api/auth/signup", request).await
    }

    async fn forgot_password(&self, email: &str) -> ApiResult<()> {
        let request = self
            .request(Method::POST, "/api/auth/forgot-password")
            .json(&json!({ "email": email }));
        self.send_only(request).await
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<()> {
        let request = self
            .request(Method::POST, "/api/auth/verify-otp")
            .json(&json!({ "email": email, "otp": otp }));
        self.send_only(request).await
    }

    async fn reset_password(&self, email: &str, otp: &str, new_password: &str) -> ApiResult<()> {
        let request = self
            .request(Method::POST, "/api/auth/reset-password")
            .json(&json!({ "email": email, "otp": otp, "newPassword": new_password }));
        self.send_only(request).await
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn list_conversations(&self, page: u32, page_size: u32) -> ApiResult<ConversationPage> {
        let request = self
            .request(Method::GET, "/api/chat/conversations")
            .query(&[("page", page), ("limit", page_size)]);
        self.fetch(request).await
    }

    async fn create_conversation(&self, title: &str) -> ApiResult<String> {
        let created: CreatedConversation = self
            .post_json("/api/chat/conversations", &json!({ "title": title }))
            .await?;
        Ok(created.into_id())
    }

    async fn conversation_details(&self, conversation_id: &str) -> ApiResult<ConversationDetails> {
        let path = format!("/api/chat/conversations/{conversation_id}/details");
        self.fetch(self.request(Method::GET, &path)).await
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> ApiResult<MessageExchange> {
        let path = format!("/api/chat/conversations/{conversation_id}/messages");
        self.post_json(
            &path,
            &json!({ "content": content, "messageType": message_type.as_str() }),
        )
        .await
    }

    async fn upload_image(
        &self,
        conversation_id: &str,
        image: &ImageUpload,
        content: &str,
    ) -> ApiResult<MessageExchange> {
        let path = format!("/api/chat/conversations/{conversation_id}/messages/upload");
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)?;
        let form = Form::new()
            .text("content", content.to_string())
            .part("image", part);
        self.fetch(self.request(Method::POST, &path).multipart(form))
            .await
    }

    async fn clear_conversation(&self, conversation_id: &str) -> ApiResult<()> {
        let path = format!("/api/chat/conversations/{conversation_id}/clear");
        self.send_only(self.request(Method::POST, &path)).await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> ApiResult<()> {
        let path = format!("/api/chat/conversations/{conversation_id}");
        self.send_only(self.request(Method::DELETE, &path)).await
    }

    async fn conversation_stats(&self) -> ApiResult<ConversationStats> {
        self.fetch(self.request(Method::GET, "/api/chat/conversations/stats"))
            .await
    }
}

#[async_trait]
impl ProposalApi for ApiClient {
    async fn list_proposals(&self) -> ApiResult<Vec<Proposal>> {
        let list: ProposalList = self.fetch(self.request(Method::GET, "/api/proposals")).await?;
        Ok(match list {
            ProposalList::Wrapped { proposals } => proposals,
            ProposalList::Bare(proposals) => proposals,
        })
    }

    async fn create_proposal(&self, proposal: &Value) -> ApiResult<Proposal> {
        let body: ProposalBody = self.post_json("/api/proposals", proposal).await?;
        Ok(body.into())
    }

    async fn get_proposal(&self, id: &str) -> ApiResult<Proposal> {
        let path = format!("/api/proposals/{id}");
        let body: ProposalBody = self.fetch(self.request(Method::GET, &path)).await?;
        Ok(body.into())
    }

    async fn update_proposal(&self, id: &str, proposal: &Value) -> ApiResult<Proposal> {
        let path = format!("/api/proposals/{id}");
        let body: ProposalBody = self
            .fetch(self.request(Method::PUT, &path).json(proposal))
            .await?;
        Ok(body.into())
    }

    async fn delete_proposal(&self, id: &str) -> ApiResult<()> {
        let path = format!("/api/proposals/{id}");
        self.send_only(self.request(Method::DELETE, &path)).await
    }
}

#[async_trait]
impl ProfileApi for ApiClient {
    async fn get_profile(&self) -> ApiResult<UserProfile> {
        let body: ProfileBody = self.fetch(self.request(Method::GET, "/api/user/profile")).await?;
        Ok(body.into())
    }

    async fn update_profile(&self, profile: &UserProfile) -> ApiResult<UserProfile> {
        let body: ProfileBody = self
            .fetch(self.request(Method::PUT, "/api/user/profile").json(profile))
            .await?;
        Ok(body.into())
    }

    async fn change_password(&self, current_password: &str, new_password: &str) -> ApiResult<()> {
        let request = self
            .request(Method::PUT, "/api/user/change-password")
            .json(&json!({ "currentPassword": current_password, "newPassword": new_password }));
        self.send_only(request).await
    }
}
