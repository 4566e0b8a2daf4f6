pub mod config;
pub mod domain;
pub mod errors;
pub mod markers;
pub mod reconcile;

pub use domain::list::{Item, ItemId, ShoppingList};
pub use domain::settings::ChannelSetting;
pub use domain::{ChannelId, GuildId, MessageId, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use markers::{ActionMarker, Marker, MarkerKind};
pub use reconcile::{
    MarkerError, MarkerSurface, ReconcileMode, ReconcilePlan, ReconcileReport, Reconciler,
    RemovalScope,
};
