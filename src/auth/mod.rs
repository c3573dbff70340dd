//! Session state and biometric-assisted login.
pub mod biometric;
pub mod session;

pub use biometric::{BiometricError, BiometricGate, BiometricPlatform, PlatformFailure};
pub use session::SessionController;
