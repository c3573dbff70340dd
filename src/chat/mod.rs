//! Chat session: conversation loading, optimistic sends and image reconciliation.
pub mod image_state;
pub mod lifecycle;
pub mod reconcile;
pub mod store;

pub use image_state::{ImageLoadState, ImageLoadTracker, ImageTransition};
pub use lifecycle::{MessageLifecycleController, SubmitOutcome};
pub use reconcile::{reconcile, reconcile_appended};
pub use store::ConversationStore;
