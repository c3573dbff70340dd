use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a platform biometric challenge did not succeed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformFailure {
    UserCancel,
    SystemCancel,
    UserFallback,
    Lockout,
    LockoutPermanent,
    NotRecognized,
    Other(String),
}

/// Device biometric capability as exposed by the host OS.
#[async_trait]
pub trait BiometricPlatform: Send + Sync {
    async fn has_hardware(&self) -> bool;
    async fn is_enrolled(&self) -> bool;
    async fn authenticate(&self, prompt: &str) -> Result<(), PlatformFailure>;
}

/// Platform for hosts without any biometric hardware.
pub struct UnsupportedPlatform;

#[async_trait]
impl BiometricPlatform for UnsupportedPlatform {
    async fn has_hardware(&self) -> bool {
        false
    }

    async fn is_enrolled(&self) -> bool {
        false
    }

    async fn authenticate(&self, _prompt: &str) -> Result<(), PlatformFailure> {
        Err(PlatformFailure::Other("biometrics not supported".into()))
    }
}

/// Closed set of biometric-login failure reasons.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
#[error("{}", self.user_message())]
pub enum BiometricError {
    NotAvailable,
    NotEnabled,
    NoCredentials,
    LoginFailed,
    NoToken,
    NetworkError,
    UserCancel,
    SystemCancel,
    UserFallback,
    Lockout,
    LockoutPermanent,
    AuthenticationFailed,
    UnknownError,
}

impl BiometricError {
    pub fn code(&self) -> &'static str {
        match self {
            BiometricError::NotAvailable => "NOT_AVAILABLE",
            BiometricError::NotEnabled => "NOT_ENABLED",
            BiometricError::NoCredentials => "NO_CREDENTIALS",
            BiometricError::LoginFailed => "LOGIN_FAILED",
            BiometricError::NoToken => "NO_TOKEN",
            BiometricError::NetworkError => "NETWORK_ERROR",
            BiometricError::UserCancel => "user_cancel",
            BiometricError::SystemCancel => "system_cancel",
            BiometricError::UserFallback => "user_fallback",
            BiometricError::Lockout => "lockout",
            BiometricError::LockoutPermanent => "lockout_permanent",
            BiometricError::AuthenticationFailed => "AUTHENTICATION_FAILED",
            BiometricError::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            BiometricError::NotAvailable => {
                "Biometric authentication is not available on this device."
            }
            BiometricError::NotEnabled => {
                "Biometric login is not enabled. Turn it on in Settings first."
            }
            BiometricError::NoCredentials => {
                "Please sign in with your email and password once to set up biometric login."
            }
            BiometricError::LoginFailed => {
                "Your saved credentials were rejected. Please sign in with your password."
            }
            BiometricError::NoToken => "The server did not return a session. Please try again.",
            BiometricError::NetworkError => {
                "Could not reach the server. Check your connection and try again."
            }
            BiometricError::UserCancel => "Authentication was cancelled.",
            BiometricError::SystemCancel => "Authentication was interrupted by the system.",
            BiometricError::UserFallback => "Please sign in with your password.",
            BiometricError::Lockout => "Too many attempts. Try again later.",
            BiometricError::LockoutPermanent => {
                "Biometrics are locked. Unlock your device with your passcode to re-enable them."
            }
            BiometricError::AuthenticationFailed => "Biometric authentication failed.",
            BiometricError::UnknownError => "Something went wrong. Please try again.",
        }
    }
}

impl From<PlatformFailure> for BiometricError {
    fn from(failure: PlatformFailure) -> Self {
        match failure {
            PlatformFailure::UserCancel => BiometricError::UserCancel,
            PlatformFailure::SystemCancel => BiometricError::SystemCancel,
            PlatformFailure::UserFallback => BiometricError::UserFallback,
            PlatformFailure::Lockout => BiometricError::Lockout,
            PlatformFailure::LockoutPermanent => BiometricError::LockoutPermanent,
            PlatformFailure::NotRecognized => BiometricError::AuthenticationFailed,
            PlatformFailure::Other(_) => BiometricError::UnknownError,
        }
    }
}

/// Single challenge/response wrapper over the host biometric API. Never panics outward.
#[derive(Clone)]
pub struct BiometricGate {
    platform: Arc<dyn BiometricPlatform>,
}

impl BiometricGate {
    pub fn new(platform: Arc<dyn BiometricPlatform>) -> Self {
        Self { platform }
    }

    /// True only with biometric hardware and at least one enrolled biometric.
    pub async fn is_available(&self) -> bool {
        self.platform.has_hardware().await && self.platform.is_enrolled().await
    }

    pub async fn authenticate(&self, prompt: &str) -> Result<(), BiometricError> {
        let outcome = AssertUnwindSafe(self.platform.authenticate(prompt))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {
                debug!("biometric challenge passed");
                Ok(())
            }
            Ok(Err(failure)) => {
                debug!(?failure, "biometric challenge failed");
                Err(failure.into())
            }
            Err(_) => {
                warn!("biometric platform panicked");
                Err(BiometricError::UnknownError)
            }
        }
    }
}
