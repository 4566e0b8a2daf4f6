//! The shopping bot's behavior: slash commands, reaction handling and the
//! render-target refresh that every mutation ends with.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use shoplist_core::config::AppConfig;
use shoplist_core::domain::list::ShoppingList;
use shoplist_core::domain::{ChannelId, MessageId, UserId};
use shoplist_core::errors::{ApplicationError, DomainError};
use shoplist_core::markers::{classify, ActionMarker, MarkerKind};
use shoplist_core::reconcile::{ReconcileMode, Reconciler};
use shoplist_db::ListStore;

use crate::blocks::{self, MessageTemplate};
use crate::commands::{CommandInvocation, CommandReply, ShopCommandService};
use crate::events::{
    CommandHandler, EventContext, EventDispatcher, EventHandlerError, FollowUpHandler,
    MarkerAttachedEvent, MarkerAttachedHandler, MarkerEventService, MarkerOutcome,
};
use crate::follow_up::{FollowUpHub, FollowUpOutcome, PendingReply};
use crate::platform::{MessagingPlatform, Placement, RenderTarget};

pub const DEFAULT_FOLLOW_UP_WINDOW: Duration = Duration::from_secs(30);

const MARKER_SYNC_WARNING: &str = "\u{26a0}\u{fe0f} Some list reactions could not be updated. \
     Check that I can add reactions and manage messages in this channel.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceOptions {
    pub reconcile_mode: ReconcileMode,
    pub follow_up_window: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self { reconcile_mode: ReconcileMode::default(), follow_up_window: DEFAULT_FOLLOW_UP_WINDOW }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            reconcile_mode: config.reactions.reconcile_mode(),
            follow_up_window: config.follow_up.timeout(),
        }
    }
}

/// Cheap to clone: every field is shared.
#[derive(Clone)]
pub struct ShoppingService {
    store: Arc<ListStore>,
    platform: Arc<dyn MessagingPlatform>,
    reconciler: Reconciler,
    follow_ups: Arc<FollowUpHub>,
    follow_up_window: Duration,
    flows: TaskTracker,
    cancel: CancellationToken,
}

impl ShoppingService {
    pub fn new(
        store: Arc<ListStore>,
        platform: Arc<dyn MessagingPlatform>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            store,
            platform,
            reconciler: Reconciler::new(options.reconcile_mode),
            follow_ups: Arc::new(FollowUpHub::new()),
            follow_up_window: options.follow_up_window,
            flows: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<ListStore> {
        &self.store
    }

    pub fn follow_ups(&self) -> &Arc<FollowUpHub> {
        &self.follow_ups
    }

    /// Dispatcher wired with every handler this service backs.
    pub fn dispatcher(&self) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(CommandHandler::new(self.clone()));
        dispatcher.register(MarkerAttachedHandler::new(self.clone()));
        dispatcher.register(FollowUpHandler::new(self.follow_ups.clone()));
        dispatcher
    }

    /// Waits until every detached follow-up flow has finished.
    pub async fn drain_flows(&self) {
        self.flows.close();
        self.flows.wait().await;
        self.flows.reopen();
    }

    /// Abandons pending follow-up flows without mutating anything.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.drain_flows().await;
    }

    /// Re-renders the card on the list's render target and brings its
    /// markers in line. Returns how many platform operations failed; the
    /// channel is told once when any did.
    pub async fn refresh(&self, channel: &ChannelId) -> usize {
        let Some(list) = self.store.get_list(channel).await else {
            return 0;
        };
        let Some(target) = list.render_target.clone() else {
            return 0;
        };

        let mut failures = 0;
        if let Err(error) =
            self.platform.edit_message(channel, &target, &blocks::list_card(&list)).await
        {
            warn!(
                event_name = "shop.render.edit_failed",
                channel_id = %channel,
                message_id = %target,
                error = %error,
                "failed to update list card"
            );
            failures += 1;
        }

        failures += if list.is_empty() {
            self.clear_markers(channel, &target).await
        } else {
            self.reconcile_markers(channel, &target, &list).await
        };

        if failures > 0 {
            self.notify(channel, MARKER_SYNC_WARNING).await;
        }
        failures
    }

    async fn reconcile_markers(
        &self,
        channel: &ChannelId,
        target: &MessageId,
        list: &ShoppingList,
    ) -> usize {
        let surface = RenderTarget::new(self.platform.as_ref(), channel, target);
        let report = self.reconciler.reconcile(&surface, list).await;
        debug!(
            event_name = "shop.render.markers_reconciled",
            channel_id = %channel,
            message_id = %target,
            added = report.added.len(),
            removed = report.removed.len(),
            failed = report.failures.len(),
            "reconciled list markers"
        );
        report.failures.len()
    }

    async fn clear_markers(&self, channel: &ChannelId, target: &MessageId) -> usize {
        match self.platform.clear_all_markers(channel, target).await {
            Ok(()) => 0,
            Err(error) => {
                warn!(
                    event_name = "shop.render.clear_markers_failed",
                    channel_id = %channel,
                    message_id = %target,
                    error = %error,
                    "failed to clear markers from emptied list"
                );
                1
            }
        }
    }

    async fn send(&self, channel: &ChannelId, message: &MessageTemplate) -> Option<MessageId> {
        match self.platform.send_message(channel, message).await {
            Ok(id) => Some(id),
            Err(error) => {
                warn!(
                    event_name = "shop.notify.failed",
                    channel_id = %channel,
                    error = %error,
                    "failed to send channel message"
                );
                None
            }
        }
    }

    async fn notify(&self, channel: &ChannelId, text: impl Into<String>) -> Option<MessageId> {
        self.send(channel, &blocks::notice(text)).await
    }

    async fn delete_quietly(&self, channel: &ChannelId, message: &MessageId) {
        if let Err(error) = self.platform.delete_message(channel, message).await {
            debug!(
                event_name = "shop.message.delete_failed",
                channel_id = %channel,
                message_id = %message,
                error = %error,
                "could not delete message"
            );
        }
    }

    async fn toggle_item(&self, event: &MarkerAttachedEvent, list: &ShoppingList, position: usize) {
        let channel = &event.channel_id;
        let Some(item) = list.item_at(position) else {
            return;
        };
        let Some(updated) = self.store.toggle_item_checked(channel, &item.id).await else {
            return;
        };

        self.refresh(channel).await;
        let (icon, verb) = if updated.checked { ("\u{2705}", "checked") } else { ("\u{2b1c}", "unchecked") };
        self.notify(channel, format!("{icon} {} {verb}: **{}**", mention(&event.user_id), updated.text))
            .await;
    }

    async fn clear_completed(&self, event: &MarkerAttachedEvent) {
        let channel = &event.channel_id;
        let cleared = self.store.clear_completed_items(channel).await;
        self.refresh(channel).await;

        let actor = mention(&event.user_id);
        let text = match cleared {
            0 => format!("{actor}, no completed items to clear."),
            1 => format!("{} {actor} cleared 1 completed item!", ActionMarker::ClearCompleted.symbol()),
            count => format!(
                "{} {actor} cleared {count} completed items!",
                ActionMarker::ClearCompleted.symbol()
            ),
        };
        self.notify(channel, text).await;
    }

    async fn run_add_flow(
        self,
        event: MarkerAttachedEvent,
        pending: PendingReply,
        cancel: CancellationToken,
    ) {
        let channel = &event.channel_id;
        let actor = mention(&event.user_id);
        self.notify(
            channel,
            format!(
                "{} {actor}, what would you like to add to the shopping list?\n*Type `cancel` to cancel.*",
                ActionMarker::AddItem.symbol()
            ),
        )
        .await;

        match self.follow_ups.wait(pending, self.follow_up_window, &cancel).await {
            FollowUpOutcome::Reply(reply) => {
                let text = reply.text.trim();
                if text.is_empty() {
                    self.notify(channel, DomainError::EmptyItem.user_message()).await;
                    return;
                }
                match self.store.add_item(channel, text, 1).await {
                    Some(item) => {
                        self.refresh(channel).await;
                        self.notify(
                            channel,
                            format!(
                                "{} Added \"{}\" to the shopping list!",
                                ActionMarker::AddItem.symbol(),
                                item.text
                            ),
                        )
                        .await;
                    }
                    None => {
                        self.notify(channel, DomainError::ListNotFound(channel.clone()).user_message())
                            .await;
                    }
                }
            }
            FollowUpOutcome::Cancelled => {
                self.notify(channel, "\u{274c} Add cancelled.").await;
            }
            FollowUpOutcome::TimedOut => {
                self.notify(channel, format!("\u{23f0} {actor}, add timeout. Use `/shop add` instead."))
                    .await;
            }
            FollowUpOutcome::Aborted => {
                debug!(event_name = "shop.flow.aborted", channel_id = %channel, "add flow abandoned");
            }
        }
    }

    async fn run_edit_flow(
        self,
        event: MarkerAttachedEvent,
        list: ShoppingList,
        pending: PendingReply,
        cancel: CancellationToken,
    ) {
        let channel = &event.channel_id;
        let actor = mention(&event.user_id);
        let prompt = self.send(channel, &blocks::edit_prompt(&list, &actor)).await;

        let choice = match self.follow_ups.wait(pending, self.follow_up_window, &cancel).await {
            FollowUpOutcome::Reply(reply) => reply,
            FollowUpOutcome::Cancelled => {
                if let Some(prompt) = &prompt {
                    self.delete_quietly(channel, prompt).await;
                }
                return;
            }
            FollowUpOutcome::TimedOut => {
                if let Some(prompt) = &prompt {
                    self.delete_quietly(channel, prompt).await;
                }
                self.notify(channel, format!("\u{23f0} {actor}, edit timeout.")).await;
                return;
            }
            FollowUpOutcome::Aborted => return,
        };

        let number = choice.text.trim().parse::<usize>().ok();
        let Some(item) = number.and_then(|number| number.checked_sub(1)).and_then(|index| list.item_at(index))
        else {
            let error =
                DomainError::ItemOutOfRange { number: number.unwrap_or(0), len: list.items.len() };
            self.notify(channel, error.user_message()).await;
            return;
        };

        let pending = self.follow_ups.register(channel, &event.user_id).await;
        if let Some(prompt) = &prompt {
            self.delete_quietly(channel, prompt).await;
        }
        self.delete_quietly(channel, &choice.message_id).await;
        self.notify(
            channel,
            format!(
                "{} {actor}, enter the new text for: **{}**\n*Type `cancel` to cancel editing.*",
                ActionMarker::Edit.symbol(),
                item.text
            ),
        )
        .await;

        match self.follow_ups.wait(pending, self.follow_up_window, &cancel).await {
            FollowUpOutcome::Reply(reply) => {
                let new_text = reply.text.trim();
                if new_text.is_empty() {
                    self.notify(channel, DomainError::EmptyItem.user_message()).await;
                    return;
                }
                if self.store.edit_item(channel, &item.id, new_text).await.is_none() {
                    self.notify(channel, "\u{274c} That item is no longer on the list.").await;
                    return;
                }
                self.refresh(channel).await;
                self.notify(
                    channel,
                    format!(
                        "{} Updated \"{}\" \u{2192} \"{new_text}\"",
                        ActionMarker::Edit.symbol(),
                        item.text
                    ),
                )
                .await;
            }
            FollowUpOutcome::Cancelled => {
                self.notify(channel, "\u{274c} Edit cancelled.").await;
            }
            FollowUpOutcome::TimedOut => {
                self.notify(
                    channel,
                    format!("\u{23f0} {actor}, edit timeout. Please try again if needed."),
                )
                .await;
            }
            FollowUpOutcome::Aborted => {
                debug!(event_name = "shop.flow.aborted", channel_id = %channel, "edit flow abandoned");
            }
        }
    }
}

fn mention(user: &UserId) -> String {
    format!("<@{user}>")
}

#[async_trait]
impl ShopCommandService for ShoppingService {
    async fn create_list(
        &self,
        title: &str,
        items: &[String],
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, ApplicationError> {
        let channel = &invocation.channel_id;
        if let Some(guild) = &invocation.guild_id {
            if let Some(expected) = self.store.get_shopping_channel(guild).await {
                if &expected != channel {
                    return Err(DomainError::WrongChannel { expected }.into());
                }
            }
        }

        // The previous list stays in place until the new card exists.
        let mut list = ShoppingList::new(title, items);
        let target = self
            .platform
            .send_message(channel, &blocks::list_card(&list))
            .await
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;
        list.render_target = Some(target.clone());
        let list = self.store.insert_list(channel, list).await;

        if self.reconcile_markers(channel, &target, &list).await > 0 {
            self.notify(channel, MARKER_SYNC_WARNING).await;
        }

        info!(
            event_name = "shop.list.created",
            correlation_id = %invocation.request_id,
            channel_id = %channel,
            message_id = %target,
            items = list.items.len(),
            "created shopping list"
        );
        Ok(CommandReply::ephemeral(blocks::notice(format!(
            "\u{2705} Created shopping list \"{title}\" with {} items!",
            list.items.len()
        ))))
    }

    async fn add_item(
        &self,
        item: &str,
        quantity: u32,
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, ApplicationError> {
        let channel = &invocation.channel_id;
        let added = self
            .store
            .add_item(channel, item, quantity)
            .await
            .ok_or_else(|| DomainError::ListNotFound(channel.clone()))?;

        self.refresh(channel).await;
        Ok(CommandReply::ephemeral(blocks::notice(format!(
            "\u{2705} Added \"{}\" to the shopping list!",
            added.text
        ))))
    }

    async fn show_list(
        &self,
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, ApplicationError> {
        let list = self
            .store
            .get_list(&invocation.channel_id)
            .await
            .ok_or_else(|| DomainError::ListNotFound(invocation.channel_id.clone()))?;
        Ok(CommandReply::ephemeral(blocks::list_card(&list)))
    }

    async fn clear_list(
        &self,
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, ApplicationError> {
        let channel = &invocation.channel_id;
        if !self.store.clear_list(channel).await {
            return Err(DomainError::ListNotFound(channel.clone()).into());
        }

        self.refresh(channel).await;
        Ok(CommandReply::ephemeral(blocks::notice("\u{2705} Shopping list cleared!")))
    }

    async fn set_channel(
        &self,
        channel: &ChannelId,
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, ApplicationError> {
        let Some(guild) = &invocation.guild_id else {
            return Err(DomainError::PermissionDenied(
                "The shopping channel can only be set inside a server.".to_owned(),
            )
            .into());
        };
        if !self.platform.actor_can_manage_channels(guild, &invocation.user_id).await {
            return Err(DomainError::PermissionDenied(
                "You need the \"Manage Channels\" permission to set the shopping channel."
                    .to_owned(),
            )
            .into());
        }

        self.store.set_shopping_channel(guild, channel).await;
        info!(
            event_name = "shop.channel.configured",
            correlation_id = %invocation.request_id,
            guild_id = %guild,
            channel_id = %channel,
            "set shopping channel"
        );
        Ok(CommandReply::ephemeral(blocks::notice(format!(
            "\u{2705} Set <#{channel}> as the shopping list channel!"
        ))))
    }

    async fn delete_list(
        &self,
        invocation: &CommandInvocation,
    ) -> Result<CommandReply, ApplicationError> {
        let channel = &invocation.channel_id;
        let list = self
            .store
            .get_list(channel)
            .await
            .ok_or_else(|| DomainError::ListNotFound(channel.clone()))?;

        self.store.delete_list(channel).await;
        if let Some(target) = &list.render_target {
            self.delete_quietly(channel, target).await;
        }
        Ok(CommandReply::ephemeral(blocks::notice(format!(
            "\u{1f5d1}\u{fe0f} Deleted shopping list \"{}\".",
            list.title
        ))))
    }
}

#[async_trait]
impl MarkerEventService for ShoppingService {
    async fn marker_attached(
        &self,
        event: &MarkerAttachedEvent,
        ctx: &EventContext,
    ) -> Result<MarkerOutcome, EventHandlerError> {
        if event.user_is_bot {
            return Ok(MarkerOutcome::Ignored);
        }
        let channel = &event.channel_id;
        let Some(list) = self.store.get_list(channel).await else {
            return Ok(MarkerOutcome::Ignored);
        };
        if list.render_target.as_ref() != Some(&event.message_id) {
            return Ok(MarkerOutcome::Ignored);
        }

        let placement = Placement::User(event.user_id.clone());
        if let Err(error) =
            self.platform.remove_marker(channel, &event.message_id, &event.marker, &placement).await
        {
            warn!(
                event_name = "shop.reaction.remove_user_marker_failed",
                correlation_id = %ctx.correlation_id,
                channel_id = %channel,
                marker = %event.marker,
                error = %error,
                "could not remove the user's reaction"
            );
        }

        match classify(&event.marker) {
            Some(MarkerKind::Item(position)) => self.toggle_item(event, &list, position).await,
            Some(MarkerKind::Action(ActionMarker::ClearCompleted)) => {
                self.clear_completed(event).await;
            }
            Some(MarkerKind::Action(ActionMarker::AddItem)) => {
                let pending = self.follow_ups.register(channel, &event.user_id).await;
                let flow = self.clone().run_add_flow(event.clone(), pending, self.cancel.child_token());
                self.flows.spawn(flow);
            }
            Some(MarkerKind::Action(ActionMarker::Edit)) => {
                if list.is_empty() {
                    return Ok(MarkerOutcome::Handled);
                }
                let pending = self.follow_ups.register(channel, &event.user_id).await;
                let flow =
                    self.clone().run_edit_flow(event.clone(), list, pending, self.cancel.child_token());
                self.flows.spawn(flow);
            }
            None => {
                debug!(
                    event_name = "shop.reaction.unknown_marker",
                    correlation_id = %ctx.correlation_id,
                    marker = %event.marker,
                    "ignoring marker without meaning"
                );
            }
        }

        Ok(MarkerOutcome::Handled)
    }
}
