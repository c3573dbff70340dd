//! Integration tests for session status, login/logout and biometric login.

mod common;

use bizsuite::auth::{BiometricError, BiometricGate, PlatformFailure, SessionController};
use bizsuite::storage::{MemoryStorage, SecureStorage, TOKEN_KEY, TokenStore};
use bizsuite::types::AuthStatus;
use common::{FakeAuthApi, FakeBiometrics};
use std::sync::Arc;
use std::sync::atomic::Ordering;

const EMAIL: &str = "owner@solidrock.com";
const PASSWORD: &str = "correct horse";

struct Harness {
    storage: Arc<MemoryStorage>,
    auth: Arc<FakeAuthApi>,
    biometrics: Arc<FakeBiometrics>,
    session: SessionController,
}

impl Harness {
    fn new(biometrics: FakeBiometrics) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let auth = Arc::new(FakeAuthApi::with_account(EMAIL, PASSWORD));
        let biometrics = Arc::new(biometrics);
        let session = SessionController::with_storage(
            auth.clone(),
            storage.clone(),
            BiometricGate::new(biometrics.clone()),
        );
        Self {
            storage,
            auth,
            biometrics,
            session,
        }
    }

    fn tokens(&self) -> TokenStore {
        TokenStore::new(self.storage.clone())
    }
}

mod status_tests {
    use super::*;

    #[test]
    fn login_select_logout_scenario() {
        let h = Harness::new(FakeBiometrics::capable());
        assert_eq!(h.session.check_status(), AuthStatus::Unauthenticated);

        h.tokens().set("abc123");
        h.session.login("abc123");
        assert_eq!(h.session.status(), AuthStatus::AuthenticatedNoBusiness);

        assert!(h.session.select_business("Solid Rock"));
        assert_eq!(h.session.status(), AuthStatus::Ready);
        assert_eq!(h.session.selected_business().as_deref(), Some("Solid Rock"));

        h.session.logout();
        assert_eq!(h.session.status(), AuthStatus::Unauthenticated);
        assert_eq!(h.session.selected_business(), None);
        assert_eq!(h.tokens().get(), None);
        assert_eq!(h.session.check_status(), AuthStatus::Unauthenticated);
    }

    #[test]
    fn blank_token_is_cleared() {
        let h = Harness::new(FakeBiometrics::capable());
        h.storage.set(TOKEN_KEY, "   ").unwrap();
        assert_eq!(h.session.check_status(), AuthStatus::Unauthenticated);
        assert_eq!(h.storage.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn stored_token_restores_without_business() {
        let h = Harness::new(FakeBiometrics::capable());
        h.tokens().set("abc123");
        assert_eq!(h.session.check_status(), AuthStatus::AuthenticatedNoBusiness);
    }

    #[test]
    fn business_requires_session() {
        let h = Harness::new(FakeBiometrics::capable());
        assert!(!h.session.select_business("Solid Rock"));
        assert_eq!(h.session.selected_business(), None);
        assert_eq!(h.session.status(), AuthStatus::Unauthenticated);
    }

    #[test]
    fn ready_implies_token_and_business() {
        let h = Harness::new(FakeBiometrics::capable());
        h.tokens().set("abc123");
        h.session.check_status();
        h.session.select_business("Solid Rock");
        assert_eq!(h.session.status(), AuthStatus::Ready);

        // token vanishes from storage: re-deriving drops the business too
        h.tokens().clear();
        assert_eq!(h.session.check_status(), AuthStatus::Unauthenticated);
        assert_eq!(h.session.selected_business(), None);
    }

    #[test]
    fn empty_login_ignored() {
        let h = Harness::new(FakeBiometrics::capable());
        h.session.login("");
        assert_eq!(h.session.status(), AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn subscribers_see_each_change() {
        let h = Harness::new(FakeBiometrics::capable());
        let mut updates = h.session.subscribe();

        h.session.login("abc123");
        assert!(updates.has_changed().unwrap());
        assert_eq!(*updates.borrow_and_update(), AuthStatus::AuthenticatedNoBusiness);

        h.session.select_business("Solid Rock");
        assert_eq!(*updates.borrow_and_update(), AuthStatus::Ready);

        h.session.logout();
        assert_eq!(*updates.borrow_and_update(), AuthStatus::Unauthenticated);
    }
}

mod sign_in_tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_persists_token() {
        let h = Harness::new(FakeBiometrics::capable());
        h.session.sign_in(EMAIL, PASSWORD).await.unwrap();
        assert_eq!(h.session.status(), AuthStatus::AuthenticatedNoBusiness);
        assert_eq!(h.tokens().get(), Some(format!("token-for-{EMAIL}")));
    }

    #[tokio::test]
    async fn rejected_sign_in_surfaces_server_message() {
        let h = Harness::new(FakeBiometrics::capable());
        let err = h.session.sign_in(EMAIL, "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");
        assert_eq!(h.session.status(), AuthStatus::Unauthenticated);
        assert_eq!(h.tokens().get(), None);
    }

    #[tokio::test]
    async fn tokenless_sign_in_is_an_error() {
        let h = Harness::new(FakeBiometrics::capable());
        h.auth.omit_token.store(true, Ordering::SeqCst);
        assert!(h.session.sign_in(EMAIL, PASSWORD).await.is_err());
        assert_eq!(h.session.status(), AuthStatus::Unauthenticated);
    }
}

mod biometric_tests {
    use super::*;

    async fn enabled_with_credentials(biometrics: FakeBiometrics) -> Harness {
        let h = Harness::new(biometrics);
        assert!(h.session.toggle_biometric(true).await);
        assert!(h.session.setup_biometric_credentials(EMAIL, PASSWORD).await);
        h
    }

    #[tokio::test]
    async fn logout_keeps_biometric_credentials() {
        let h = Harness::new(FakeBiometrics::capable());
        h.tokens().set("abc123");
        h.session.login("abc123");
        assert!(h.session.setup_biometric_credentials(EMAIL, PASSWORD).await);

        h.session.logout();
        assert!(h.session.has_biometric_credentials());
    }

    #[tokio::test]
    async fn disabling_biometrics_revokes_credentials() {
        let h = enabled_with_credentials(FakeBiometrics::capable()).await;
        assert!(h.session.has_biometric_credentials());

        assert!(h.session.toggle_biometric(false).await);
        assert!(!h.session.has_biometric_credentials());
        assert!(!h.session.is_biometric_enabled());
    }

    #[tokio::test]
    async fn enabling_needs_capable_device() {
        let h = Harness::new(FakeBiometrics::incapable());
        assert!(!h.session.toggle_biometric(true).await);
        assert!(!h.session.is_biometric_enabled());
    }

    #[tokio::test]
    async fn failed_setup_stores_nothing() {
        let h = Harness::new(FakeBiometrics::capable());
        assert!(!h.session.setup_biometric_credentials(EMAIL, "wrong").await);
        assert!(!h.session.has_biometric_credentials());

        h.auth.offline.store(true, Ordering::SeqCst);
        assert!(!h.session.setup_biometric_credentials(EMAIL, PASSWORD).await);
        assert!(!h.session.has_biometric_credentials());
    }

    #[tokio::test]
    async fn failed_setup_keeps_previous_credentials() {
        let h = enabled_with_credentials(FakeBiometrics::capable()).await;
        assert!(!h.session.setup_biometric_credentials("intruder@x.com", "nope").await);

        // the original pair still replays successfully
        h.session.authenticate_with_biometric().await.unwrap();
        assert_eq!(h.tokens().get(), Some(format!("token-for-{EMAIL}")));
    }

    #[tokio::test]
    async fn biometric_login_replays_credentials() {
        let h = enabled_with_credentials(FakeBiometrics::capable()).await;
        h.session.authenticate_with_biometric().await.unwrap();
        assert_eq!(h.session.status(), AuthStatus::AuthenticatedNoBusiness);
        assert_eq!(h.biometrics.challenges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn biometric_login_after_logout() {
        let h = enabled_with_credentials(FakeBiometrics::capable()).await;
        h.session.sign_in(EMAIL, PASSWORD).await.unwrap();
        h.session.logout();

        h.session.authenticate_with_biometric().await.unwrap();
        assert_eq!(h.session.status(), AuthStatus::AuthenticatedNoBusiness);
    }

    #[tokio::test]
    async fn precondition_failures() {
        let h = Harness::new(FakeBiometrics::capable());
        assert_eq!(
            h.session.authenticate_with_biometric().await,
            Err(BiometricError::NotEnabled)
        );

        h.session.toggle_biometric(true).await;
        assert_eq!(
            h.session.authenticate_with_biometric().await,
            Err(BiometricError::NoCredentials)
        );

        h.biometrics.enrolled.store(false, Ordering::SeqCst);
        assert_eq!(
            h.session.authenticate_with_biometric().await,
            Err(BiometricError::NotAvailable)
        );
        assert_eq!(h.biometrics.challenges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_challenge_skips_sign_in() {
        let h = enabled_with_credentials(FakeBiometrics::capable()).await;
        let calls_before = h.auth.sign_in_calls.load(Ordering::SeqCst);
        h.biometrics.fail_with(PlatformFailure::UserCancel);

        assert_eq!(
            h.session.authenticate_with_biometric().await,
            Err(BiometricError::UserCancel)
        );
        assert_eq!(h.auth.sign_in_calls.load(Ordering::SeqCst), calls_before);
        assert_eq!(h.session.status(), AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn replay_failures_are_tagged() {
        let h = enabled_with_credentials(FakeBiometrics::capable()).await;

        h.auth.change_password(EMAIL, "rotated");
        assert_eq!(
            h.session.authenticate_with_biometric().await,
            Err(BiometricError::LoginFailed)
        );

        h.auth.change_password(EMAIL, PASSWORD);
        h.auth.offline.store(true, Ordering::SeqCst);
        assert_eq!(
            h.session.authenticate_with_biometric().await,
            Err(BiometricError::NetworkError)
        );

        h.auth.offline.store(false, Ordering::SeqCst);
        h.auth.omit_token.store(true, Ordering::SeqCst);
        assert_eq!(
            h.session.authenticate_with_biometric().await,
            Err(BiometricError::NoToken)
        );
        assert_eq!(h.session.status(), AuthStatus::Unauthenticated);
    }
}
