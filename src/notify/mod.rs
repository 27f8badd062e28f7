//! Outbound notifications.
//!
//! A single sink type is supported: an incoming webhook that accepts
//! `{"text": <message>}` as JSON.

mod webhook;

pub use webhook::{DeliveryError, Notifier, WebhookNotifier};
