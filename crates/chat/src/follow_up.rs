//! Single-shot follow-up replies.
//!
//! A flow registers interest in the next message one user sends in one
//! channel, then waits for it within a bounded window. At most one waiter
//! exists per (channel, user); registering again aborts the older one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use shoplist_core::domain::{ChannelId, UserId};

use crate::events::FollowUpMessageEvent;

pub const CANCEL_KEYWORD: &str = "cancel";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FollowUpOutcome {
    Reply(FollowUpMessageEvent),
    /// The user answered with the cancel keyword.
    Cancelled,
    TimedOut,
    /// Superseded by a newer waiter, or the flow was cancelled.
    Aborted,
}

type WaiterKey = (ChannelId, UserId);

struct Waiter {
    ticket: u64,
    sender: oneshot::Sender<FollowUpMessageEvent>,
}

/// Handle returned by [`FollowUpHub::register`]; consumed by [`FollowUpHub::wait`].
pub struct PendingReply {
    key: WaiterKey,
    ticket: u64,
    receiver: oneshot::Receiver<FollowUpMessageEvent>,
}

#[derive(Default)]
pub struct FollowUpHub {
    waiters: Mutex<HashMap<WaiterKey, Waiter>>,
    next_ticket: AtomicU64,
}

impl FollowUpHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, channel: &ChannelId, actor: &UserId) -> PendingReply {
        let (sender, receiver) = oneshot::channel();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let key = (channel.clone(), actor.clone());

        let previous =
            self.waiters.lock().await.insert(key.clone(), Waiter { ticket, sender });
        if previous.is_some() {
            debug!(
                event_name = "follow_up.waiter_replaced",
                channel_id = %channel,
                user_id = %actor,
                "newer follow-up replaced a pending one"
            );
        }

        PendingReply { key, ticket, receiver }
    }

    pub async fn wait(
        &self,
        pending: PendingReply,
        window: Duration,
        cancel: &CancellationToken,
    ) -> FollowUpOutcome {
        let PendingReply { key, ticket, receiver } = pending;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => FollowUpOutcome::Aborted,
            received = tokio::time::timeout(window, receiver) => match received {
                Ok(Ok(message)) if is_cancel(&message.text) => FollowUpOutcome::Cancelled,
                Ok(Ok(message)) => FollowUpOutcome::Reply(message),
                Ok(Err(_)) => FollowUpOutcome::Aborted,
                Err(_) => FollowUpOutcome::TimedOut,
            },
        };

        let mut waiters = self.waiters.lock().await;
        if waiters.get(&key).is_some_and(|waiter| waiter.ticket == ticket) {
            waiters.remove(&key);
        }
        outcome
    }

    /// Hands a channel message to the matching waiter. Returns whether it was
    /// consumed.
    pub async fn offer(&self, message: &FollowUpMessageEvent) -> bool {
        if message.user_is_bot {
            return false;
        }

        let key = (message.channel_id.clone(), message.user_id.clone());
        let Some(waiter) = self.waiters.lock().await.remove(&key) else {
            return false;
        };
        waiter.sender.send(message.clone()).is_ok()
    }

    pub async fn pending(&self) -> usize {
        self.waiters.lock().await.len()
    }
}

fn is_cancel(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(CANCEL_KEYWORD)
}
