//! Chat platform interface for the shopping list bot
//!
//! - **Gateway** (`socket`) - inbound event pump with reconnection logic
//! - **Slash Commands** (`commands`) - `/shop create`, `/shop add`, `/shop list`, ...
//! - **Events** (`events`) - reactions on list cards and follow-up replies
//! - **Cards** (`blocks`) - list card, help card and notices
//! - **Platform** (`platform`) - outbound messaging and marker operations
//! - **Follow-ups** (`follow_up`) - single-shot "next message from this user" waits
//!
//! # Architecture
//!
//! ```text
//! Gateway → EventDispatcher → Handlers → ShoppingService → ListStore
//!                                              ↓
//!                         MessagingPlatform ← card + Reconciler
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - event loop with reconnection logic
//! - `EventDispatcher` - routes envelopes to handlers
//! - `ShoppingService` - command and reaction behavior
//! - `MessagingPlatform` - what the bot needs from the platform

pub mod blocks;
pub mod commands;
pub mod events;
pub mod follow_up;
pub mod platform;
pub mod service;
pub mod socket;

pub use platform::{MessagingPlatform, NoopPlatform, PlatformError, SharedPlatform};
pub use service::{ServiceOptions, ShoppingService};
pub use socket::{GatewayRunner, GatewayTransport, NoopGatewayTransport, ReconnectPolicy};
