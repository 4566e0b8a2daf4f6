use serde::{Deserialize, Serialize};

use crate::domain::ChannelId;

/// Per-guild settings. A guild designates at most one shopping channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSetting {
    #[serde(default, alias = "shoppingChannel", skip_serializing_if = "Option::is_none")]
    pub shopping_channel: Option<ChannelId>,
}
