use crate::api::ApiClient;
use crate::auth::{BiometricGate, BiometricPlatform, SessionController};
use crate::chat::{ConversationStore, ImageLoadTracker, MessageLifecycleController};
use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::notice::{NoticeReceiver, notice_channel};
use crate::storage::{FileStorage, SecureStorage, TokenStore};
use crate::types::AuthStatus;
use std::sync::Arc;

/// Screen group the shell may show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Auth,
    BusinessSelection,
    Main,
}

impl From<AuthStatus> for Route {
    fn from(status: AuthStatus) -> Self {
        match status {
            AuthStatus::Unauthenticated => Route::Auth,
            AuthStatus::AuthenticatedNoBusiness => Route::BusinessSelection,
            AuthStatus::Ready => Route::Main,
        }
    }
}

/// Everything the presentation layer needs, wired once at startup.
pub struct App {
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionController>,
    pub chat: Arc<MessageLifecycleController>,
}

impl App {
    pub fn build(
        config: &AppConfig,
        platform: Arc<dyn BiometricPlatform>,
    ) -> ApiResult<(Self, NoticeReceiver)> {
        let storage: Arc<dyn SecureStorage> = Arc::new(FileStorage::new(&config.storage_dir));
        Self::with_storage(config, storage, platform)
    }

    pub fn with_storage(
        config: &AppConfig,
        storage: Arc<dyn SecureStorage>,
        platform: Arc<dyn BiometricPlatform>,
    ) -> ApiResult<(Self, NoticeReceiver)> {
        let api = Arc::new(ApiClient::new(config, TokenStore::new(storage.clone()))?);
        let session = Arc::new(SessionController::with_storage(
            api.clone(),
            storage,
            BiometricGate::new(platform),
        ));

        let (notices, notice_rx) = notice_channel();
        let store = Arc::new(ConversationStore::new(api.clone()));
        let chat = Arc::new(
            MessageLifecycleController::new(store, ImageLoadTracker::new(config.image_load_timeout))
                .with_notices(notices),
        );

        Ok((Self { api, session, chat }, notice_rx))
    }

    pub fn route(&self) -> Route {
        self.session.status().into()
    }
}
