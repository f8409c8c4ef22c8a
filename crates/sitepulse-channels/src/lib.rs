//! # SitePulse Channels
//!
//! Delivery-side implementations of the `Notifier` trait. Email over
//! SMTP is the only production channel today.

pub mod email;

pub use email::EmailChannel;
