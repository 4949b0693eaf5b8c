use super::reconcile::{ChannelHost, ChannelState, CreateCounterChannel, HostError};
use async_trait::async_trait;
use poise::serenity_prelude::{
    ChannelId, ChannelType, Context, CreateChannel, EditChannel, GuildId, PermissionOverwrite,
    PermissionOverwriteType, Permissions, RoleId,
};
use tracing::warn;

/// Discord-backed [`ChannelHost`]. Counter channels are voice channels with
/// @everyone's Connect denied, so they show a number without being joinable.
pub struct DiscordHost<'a> {
    ctx: &'a Context,
    guild_id: GuildId,
}

impl<'a> DiscordHost<'a> {
    pub fn new(ctx: &'a Context, guild_id: GuildId) -> Self {
        Self { ctx, guild_id }
    }
}

#[async_trait]
impl ChannelHost for DiscordHost<'_> {
    async fn fetch(&self, channel_id: u64) -> Option<ChannelState> {
        match ChannelId::new(channel_id).to_channel(self.ctx).await {
            Ok(channel) => channel.guild().map(|c| ChannelState {
                name: c.name.clone(),
                parent_id: c.parent_id.map(|p| p.get()),
            }),
            Err(e) => {
                warn!("Counter channel {} is not reachable: {}", channel_id, e);
                None
            }
        }
    }

    async fn create(&self, request: CreateCounterChannel) -> Result<u64, HostError> {
        let everyone = RoleId::new(self.guild_id.get());
        let mut builder = CreateChannel::new(request.name)
            .kind(ChannelType::Voice)
            .position(0)
            .permissions(vec![PermissionOverwrite {
                allow: Permissions::empty(),
                deny: Permissions::CONNECT,
                kind: PermissionOverwriteType::Role(everyone),
            }]);
        if let Some(category_id) = request.category_id {
            builder = builder.category(ChannelId::new(category_id));
        }

        let channel = self.guild_id.create_channel(self.ctx, builder).await?;
        Ok(channel.id.get())
    }

    async fn rename(&self, channel_id: u64, name: &str) -> Result<(), HostError> {
        ChannelId::new(channel_id)
            .edit(self.ctx, EditChannel::default().name(name))
            .await?;
        Ok(())
    }

    async fn reparent(&self, channel_id: u64, category_id: Option<u64>) -> Result<(), HostError> {
        ChannelId::new(channel_id)
            .edit(
                self.ctx,
                EditChannel::default().category(category_id.map(ChannelId::new)),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, channel_id: u64) -> Result<(), HostError> {
        ChannelId::new(channel_id).delete(self.ctx).await?;
        Ok(())
    }
}
