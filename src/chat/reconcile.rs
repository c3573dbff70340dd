//! Duplicate-image suppression for a chat transcript.
//!
//! The backend may echo one generated image on both the prompting user message and
//! the assistant reply, or on consecutive assistant turns. Each distinct image is
//! shown exactly once, using three rules applied in order:
//!
//! 1. A user message whose image equals the next message's image, when that next
//!    message is an assistant message, loses its image.
//! 2. An assistant message whose image was already kept on an earlier assistant
//!    message, or equals the (reconciled) image of the message just before it,
//!    loses its image.
//! 3. Anything else keeps its image; assistant images are remembered as seen.

use crate::types::{Message, Role};
use std::collections::HashSet;

#[derive(Default)]
struct Reconciler {
    seen: HashSet<String>,
    previous_image: Option<String>,
}

impl Reconciler {
    /// Continue from an already-displayed message instead of an empty transcript.
    fn after(tail: Option<&Message>) -> Self {
        let mut reconciler = Self::default();
        if let Some(tail) = tail {
            reconciler.previous_image = tail.image().map(str::to_string);
            if tail.role == Role::Assistant
                && let Some(url) = tail.image()
            {
                reconciler.seen.insert(url.to_string());
            }
        }
        reconciler
    }

    fn run(mut self, mut messages: Vec<Message>) -> Vec<Message> {
        for index in 0..messages.len() {
            let next_assistant_image = messages
                .get(index + 1)
                .filter(|next| next.role == Role::Assistant)
                .and_then(|next| next.image())
                .map(str::to_string);

            let message = &mut messages[index];
            let keep = match (message.role, message.image()) {
                (_, None) => false,
                (Role::User, Some(url)) => next_assistant_image.as_deref() != Some(url),
                (Role::Assistant, Some(url)) => {
                    !self.seen.contains(url) && self.previous_image.as_deref() != Some(url)
                }
            };

            if keep {
                if message.role == Role::Assistant
                    && let Some(url) = message.image()
                {
                    self.seen.insert(url.to_string());
                }
            } else {
                message.image_url = None;
            }
            self.previous_image = message.image().map(str::to_string);
        }
        messages
    }
}

/// Reconcile a whole transcript, as on conversation load.
pub fn reconcile(messages: Vec<Message>) -> Vec<Message> {
    Reconciler::default().run(messages)
}

/// Reconcile freshly-arrived messages against the last displayed message and each
/// other. Only `incoming` is returned; `tail` is never modified.
pub fn reconcile_appended(tail: Option<&Message>, incoming: Vec<Message>) -> Vec<Message> {
    Reconciler::after(tail).run(incoming)
}
