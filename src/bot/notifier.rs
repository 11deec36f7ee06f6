//! Discord direct-message delivery of purchase notices.
//!
//! The customer's external messaging reference is their Discord user id.

use crate::{
    core::notify::{Notifier, TransactionNotice},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::debug;

/// Sends notices as direct messages through the bot's HTTP client.
#[derive(Clone)]
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
}

impl DiscordNotifier {
    /// Wraps the HTTP client of a running bot.
    #[must_use]
    pub const fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

/// Converts a stored chat id into a Discord user id.
fn recipient(chat_id: i64) -> Result<serenity::UserId> {
    u64::try_from(chat_id)
        .ok()
        .filter(|id| *id > 0)
        .map(serenity::UserId::new)
        .ok_or_else(|| Error::Notification {
            message: format!("chat id {chat_id} is not a Discord user id"),
        })
}

impl Notifier for DiscordNotifier {
    async fn notify(&self, notice: &TransactionNotice) -> Result<()> {
        let user = recipient(notice.chat_id)?;
        user.direct_message(&*self.http, serenity::CreateMessage::new().content(notice.render()))
            .await?;
        debug!(chat_id = notice.chat_id, "Transaction notice delivered");
        Ok(())
    }
}
