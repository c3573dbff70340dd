use crate::auth::BiometricError;
use crate::error::ApiError;
use tokio::sync::mpsc;

/// A dismissible user-facing notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

pub type NoticeSender = mpsc::UnboundedSender<Notice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

pub fn notice_channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::unbounded_channel()
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn api(title: impl Into<String>, err: &ApiError) -> Self {
        Self::new(title, err.to_string())
    }
}

impl From<BiometricError> for Notice {
    fn from(err: BiometricError) -> Self {
        Self::new("Biometric Login", err.user_message())
    }
}
