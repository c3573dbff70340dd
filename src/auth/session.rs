use super::biometric::{BiometricError, BiometricGate};
use crate::api::{AuthApi, SignUpRequest};
use crate::error::{ApiError, ApiResult};
use crate::storage::{
    BiometricCredential, BiometricPreference, CredentialVault, SecureStorage, TokenStore,
};
use crate::types::AuthStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{info, warn};

const BIOMETRIC_PROMPT: &str = "Sign in to BizSuite";

#[derive(Default)]
struct SessionState {
    authenticated: bool,
    selected_business: Option<String>,
}

impl SessionState {
    fn status(&self) -> AuthStatus {
        AuthStatus::derive(self.authenticated, self.selected_business.as_deref())
    }
}

/// Owns the session and decides which screen group is reachable.
///
/// Construct one per process and hand it to whatever needs it. Every mutation
/// publishes the derived status to `subscribe()` receivers.
pub struct SessionController {
    auth: Arc<dyn AuthApi>,
    tokens: TokenStore,
    vault: CredentialVault,
    preference: BiometricPreference,
    gate: BiometricGate,
    state: Mutex<SessionState>,
    status_tx: watch::Sender<AuthStatus>,
}

impl SessionController {
    pub fn new(
        auth: Arc<dyn AuthApi>,
        tokens: TokenStore,
        vault: CredentialVault,
        preference: BiometricPreference,
        gate: BiometricGate,
    ) -> Self {
        let (status_tx, _) = watch::channel(AuthStatus::Unauthenticated);
        Self {
            auth,
            tokens,
            vault,
            preference,
            gate,
            state: Mutex::new(SessionState::default()),
            status_tx,
        }
    }

    /// All three secure values share one storage backend.
    pub fn with_storage(
        auth: Arc<dyn AuthApi>,
        storage: Arc<dyn SecureStorage>,
        gate: BiometricGate,
    ) -> Self {
        Self::new(
            auth,
            TokenStore::new(storage.clone()),
            CredentialVault::new(storage.clone()),
            BiometricPreference::new(storage),
            gate,
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status_tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, mutate: impl FnOnce(&mut SessionState)) -> AuthStatus {
        let status = {
            let mut state = self.lock();
            mutate(&mut state);
            state.status()
        };
        self.status_tx.send_replace(status);
        status
    }

    /// In-memory status, no storage read.
    pub fn status(&self) -> AuthStatus {
        self.lock().status()
    }

    pub fn selected_business(&self) -> Option<String> {
        self.lock().selected_business.clone()
    }

    /// Re-derive the status from the stored token. A blank token is cleared.
    /// The token is not validated remotely; the server rejects it on use if stale.
    pub fn check_status(&self) -> AuthStatus {
        let authenticated = match self.tokens.get() {
            Some(token) if !token.trim().is_empty() => true,
            Some(_) => {
                warn!("clearing blank stored token");
                self.tokens.clear();
                false
            }
            None => false,
        };
        self.update(|state| {
            state.authenticated = authenticated;
            if !authenticated {
                state.selected_business = None;
            }
        })
    }

    /// Mark the session authenticated. The caller must already have persisted `token`.
    pub fn login(&self, token: &str) {
        if token.trim().is_empty() {
            warn!("ignoring login with empty token");
            return;
        }
        let status = self.update(|state| state.authenticated = true);
        info!(?status, "logged in");
    }

    /// Email/password sign-in: persists the returned token, then logs in.
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<()> {
        let response = self.auth.sign_in(email, password).await?;
        let token = response
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ApiError::Decode("sign-in response had no token".into()))?;
        self.tokens.set(&token);
        self.login(&token);
        Ok(())
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> ApiResult<()> {
        let response = self.auth.sign_up(request).await?;
        let token = response
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ApiError::Decode("sign-up response had no token".into()))?;
        self.tokens.set(&token);
        self.login(&token);
        Ok(())
    }

    /// Drops the token and business. Biometric credentials and preference survive.
    pub fn logout(&self) {
        self.tokens.clear();
        self.update(|state| {
            state.authenticated = false;
            state.selected_business = None;
        });
        info!("logged out");
    }

    /// In memory only. Rejected while unauthenticated.
    pub fn select_business(&self, business_id: &str) -> bool {
        let mut accepted = false;
        self.update(|state| {
            if state.authenticated {
                state.selected_business = Some(business_id.to_string());
                accepted = true;
            }
        });
        if !accepted {
            warn!("business selection ignored without a session");
        }
        accepted
    }

    pub fn is_biometric_enabled(&self) -> bool {
        self.preference.is_enabled()
    }

    pub fn has_biometric_credentials(&self) -> bool {
        self.vault.has_credentials()
    }

    pub async fn is_biometric_available(&self) -> bool {
        self.gate.is_available().await
    }

    /// Enabling requires device support. Disabling also revokes the stored credential.
    pub async fn toggle_biometric(&self, enabled: bool) -> bool {
        if enabled {
            if !self.gate.is_available().await {
                info!("biometric enable refused, device not capable");
                return false;
            }
            self.preference.set_enabled(true);
        } else {
            self.vault.clear();
            self.preference.set_enabled(false);
        }
        info!(enabled, "biometric preference changed");
        true
    }

    /// Verifies the pair with a real sign-in before storing it. Nothing is stored on failure.
    pub async fn setup_biometric_credentials(&self, email: &str, password: &str) -> bool {
        match self.auth.sign_in(email, password).await {
            Ok(response) if response.token.as_deref().is_some_and(|token| !token.trim().is_empty()) => {
                self.vault.set(&BiometricCredential {
                    email: email.to_string(),
                    password: password.to_string(),
                });
                info!("biometric credentials stored");
                true
            }
            Ok(_) => {
                warn!("credential check returned no token");
                false
            }
            Err(err) => {
                warn!(error = %err, "credential check failed");
                false
            }
        }
    }

    /// Biometric challenge, then replay of the stored credential through sign-in.
    pub async fn authenticate_with_biometric(&self) -> Result<(), BiometricError> {
        if !self.preference.is_enabled() {
            return Err(BiometricError::NotEnabled);
        }
        if !self.gate.is_available().await {
            return Err(BiometricError::NotAvailable);
        }
        let credential = self.vault.get().ok_or(BiometricError::NoCredentials)?;

        self.gate.authenticate(BIOMETRIC_PROMPT).await?;

        let response = self
            .auth
            .sign_in(&credential.email, &credential.password)
            .await
            .map_err(|err| {
                warn!(error = %err, "biometric credential replay failed");
                match err {
                    ApiError::Network(_) => BiometricError::NetworkError,
                    ApiError::Http { .. } | ApiError::Decode(_) => BiometricError::LoginFailed,
                }
            })?;

        let token = response
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or(BiometricError::NoToken)?;
        self.tokens.set(&token);
        self.login(&token);
        Ok(())
    }
}
