use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use shoplist_core::domain::{ChannelId, GuildId, MessageId, UserId};
use shoplist_core::markers::Marker;
use shoplist_core::reconcile::{MarkerError, MarkerSurface, RemovalScope};

use crate::blocks::MessageTemplate;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("missing permission: {0}")]
    Permission(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("platform call failed: {0}")]
    Other(String),
}

impl From<PlatformError> for MarkerError {
    fn from(value: PlatformError) -> Self {
        match value {
            PlatformError::Permission(detail) => Self::Permission(detail),
            PlatformError::NotFound(detail) => Self::NotFound(detail),
            PlatformError::RateLimited(detail) => Self::RateLimited(detail),
            PlatformError::Other(detail) => Self::Other(detail),
        }
    }
}

/// Whose placement of a marker a removal targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    Everyone,
    Bot,
    User(UserId),
}

/// Outbound operations the bot needs from the chat platform. Every call may
/// fail; callers treat failures as non-fatal.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &MessageTemplate,
    ) -> Result<MessageId, PlatformError>;

    async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        content: &MessageTemplate,
    ) -> Result<(), PlatformError>;

    async fn delete_message(&self, channel: &ChannelId, message: &MessageId)
        -> Result<(), PlatformError>;

    /// Markers currently attached to a message, in platform order.
    async fn markers(&self, channel: &ChannelId, message: &MessageId)
        -> Result<Vec<Marker>, PlatformError>;

    async fn add_marker(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        marker: &Marker,
    ) -> Result<(), PlatformError>;

    async fn remove_marker(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        marker: &Marker,
        placement: &Placement,
    ) -> Result<(), PlatformError>;

    async fn clear_all_markers(&self, channel: &ChannelId, message: &MessageId)
        -> Result<(), PlatformError>;

    async fn bot_can_manage_messages(&self, channel: &ChannelId) -> bool;

    async fn actor_can_manage_channels(&self, guild: &GuildId, actor: &UserId) -> bool;
}

/// A rendered list message seen as a marker surface.
pub struct RenderTarget<'a> {
    platform: &'a dyn MessagingPlatform,
    channel: &'a ChannelId,
    message: &'a MessageId,
}

impl<'a> RenderTarget<'a> {
    pub fn new(
        platform: &'a dyn MessagingPlatform,
        channel: &'a ChannelId,
        message: &'a MessageId,
    ) -> Self {
        Self { platform, channel, message }
    }
}

#[async_trait]
impl MarkerSurface for RenderTarget<'_> {
    async fn present_markers(&self) -> Result<Vec<Marker>, MarkerError> {
        Ok(self.platform.markers(self.channel, self.message).await?)
    }

    async fn add_marker(&self, marker: &Marker) -> Result<(), MarkerError> {
        Ok(self.platform.add_marker(self.channel, self.message, marker).await?)
    }

    async fn remove_marker(
        &self,
        marker: &Marker,
        scope: RemovalScope,
    ) -> Result<(), MarkerError> {
        let placement = match scope {
            RemovalScope::All => Placement::Everyone,
            RemovalScope::OwnOnly => Placement::Bot,
        };
        Ok(self.platform.remove_marker(self.channel, self.message, marker, &placement).await?)
    }

    async fn can_remove_any(&self) -> bool {
        self.platform.bot_can_manage_messages(self.channel).await
    }
}

/// Accepts every call and keeps nothing. Used when no gateway is configured.
#[derive(Default)]
pub struct NoopPlatform;

#[async_trait]
impl MessagingPlatform for NoopPlatform {
    async fn send_message(
        &self,
        channel: &ChannelId,
        _message: &MessageTemplate,
    ) -> Result<MessageId, PlatformError> {
        Ok(MessageId::from(format!("noop-{channel}")))
    }

    async fn edit_message(
        &self,
        _channel: &ChannelId,
        _message: &MessageId,
        _content: &MessageTemplate,
    ) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn delete_message(
        &self,
        _channel: &ChannelId,
        _message: &MessageId,
    ) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn markers(
        &self,
        _channel: &ChannelId,
        _message: &MessageId,
    ) -> Result<Vec<Marker>, PlatformError> {
        Ok(Vec::new())
    }

    async fn add_marker(
        &self,
        _channel: &ChannelId,
        _message: &MessageId,
        _marker: &Marker,
    ) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn remove_marker(
        &self,
        _channel: &ChannelId,
        _message: &MessageId,
        _marker: &Marker,
        _placement: &Placement,
    ) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn clear_all_markers(
        &self,
        _channel: &ChannelId,
        _message: &MessageId,
    ) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn bot_can_manage_messages(&self, _channel: &ChannelId) -> bool {
        false
    }

    async fn actor_can_manage_channels(&self, _guild: &GuildId, _actor: &UserId) -> bool {
        false
    }
}

pub type SharedPlatform = Arc<dyn MessagingPlatform>;

#[cfg(test)]
mod tests {
    use shoplist_core::domain::{ChannelId, MessageId};
    use shoplist_core::reconcile::{MarkerError, MarkerSurface};

    use super::{NoopPlatform, PlatformError, RenderTarget};

    #[test]
    fn platform_errors_keep_their_category_as_marker_errors() {
        assert!(matches!(
            MarkerError::from(PlatformError::RateLimited("slow down".to_owned())),
            MarkerError::RateLimited(detail) if detail == "slow down"
        ));
        assert!(matches!(
            MarkerError::from(PlatformError::Permission("no".to_owned())),
            MarkerError::Permission(_)
        ));
    }

    #[tokio::test]
    async fn noop_render_target_reports_bare_message() {
        let platform = NoopPlatform;
        let channel = ChannelId::from("C1");
        let message = MessageId::from("M1");
        let target = RenderTarget::new(&platform, &channel, &message);

        assert!(target.present_markers().await.expect("read").is_empty());
        assert!(!target.can_remove_any().await);
    }
}
