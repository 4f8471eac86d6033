use async_trait::async_trait;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::ChannelId,
};
use std::sync::Arc;

use crate::{
    audio::status::{MessageRef, NotificationSink, Notice},
    ui::embeds,
};

/// Publica los avisos del engine como embeds en el canal de texto de la sesión
pub struct SerenityNotifier {
    http: Arc<Http>,
}

impl SerenityNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl NotificationSink for SerenityNotifier {
    async fn send(&self, channel_id: ChannelId, notice: Notice) -> anyhow::Result<MessageRef> {
        let message = channel_id
            .send_message(&*self.http, CreateMessage::new().embed(embeds::render(&notice)))
            .await?;

        Ok(MessageRef {
            channel_id,
            message_id: message.id,
        })
    }

    async fn edit(&self, message: &MessageRef, notice: Notice) -> anyhow::Result<()> {
        message
            .channel_id
            .edit_message(
                &*self.http,
                message.message_id,
                EditMessage::new().embed(embeds::render(&notice)),
            )
            .await?;
        Ok(())
    }
}
