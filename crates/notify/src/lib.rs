//! Notification delivery for alert fanout.
//!
//! Implements the core's `NotificationDispatcher` by routing each
//! requested channel to a `ChannelSender`. Providers here log what
//! they would send; wiring real SMS/email gateways means implementing
//! `ChannelSender` and registering it on the dispatcher.

pub mod channel;
pub mod dispatcher;
pub mod render;

pub use channel::{
    ChannelSender, DeliveryError, LoggingEmailSender, LoggingInAppSender, LoggingSmsSender,
};
pub use dispatcher::RoutedDispatcher;
pub use render::{render, ChannelMessage};
