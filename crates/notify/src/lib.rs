//! Notification transports used by approval prompts and by `notify` and
//! `webhook` action steps.
//!
//! Two seams are defined: [`ChatNotifier`] for human-facing messages and
//! [`WebhookNotifier`] for structured HTTP callbacks. Production
//! implementations talk to Slack and to arbitrary HTTP endpoints; the
//! [`LogNotifier`] and [`RecordingNotifier`] stand in when nothing is
//! configured and in tests.

pub mod error;
pub mod log;
pub mod message;
pub mod notifier;
pub mod recording;
pub mod slack;
pub mod webhook;

pub use error::NotifyError;
pub use log::LogNotifier;
pub use message::{ChatMessage, WebhookPayload};
pub use notifier::{ChatNotifier, WebhookNotifier};
pub use recording::{RecordedWebhook, RecordingNotifier};
pub use slack::{SlackConfig, SlackNotifier};
pub use webhook::HttpWebhookNotifier;
