use super::database::{ServerStatsHandler, StatConfig, StatSelection, StatType};
use super::host::DiscordHost;
use super::reconcile::{self, ChannelHost, Outcome};
use super::snapshot::{self, Snapshot};
use crate::{Context, Error};
use poise::{command, serenity_prelude as serenity};
use tracing::{error, warn};

/// Configure server stats counters
#[command(
    slash_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Which stat to track"] stat: StatSelection,
    #[description = "Enable or disable this stat"] active: bool,
    #[description = "Category to place counter channels under"]
    #[channel_types("Category")]
    category: Option<serenity::Channel>,
    #[description = "Custom channel name (use {count})"] name: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap();

    if !bot_has_manage_channels(&ctx) {
        ctx.say("❌ I need the `Manage Channels` permission!").await?;
        return Ok(());
    }

    ctx.defer_ephemeral().await?;

    let category_id = category.map(|c| c.id().get());

    let stats = match snapshot::fetch_snapshot(&ctx.serenity_context().http, guild_id).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Failed to fetch stats snapshot for guild {}: {}", guild_id, e);
            Snapshot::unavailable()
        }
    };

    let host = DiscordHost::new(ctx.serenity_context(), guild_id);
    let db = &ctx.data().dbs.serverstats;

    let mut created = Vec::new();
    let mut updated = Vec::new();
    let mut errors = Vec::new();

    for kind in stat.expand() {
        let desired = StatConfig {
            guild_id: guild_id.get(),
            kind,
            channel_id: None,
            category_id,
            active,
            custom_name: name
                .clone()
                .unwrap_or_else(|| kind.default_template().to_string()),
        };

        match setup_stat(db, &host, desired, &stats).await {
            Ok(Outcome::Created) => created.push(kind),
            Ok(Outcome::Updated) => updated.push(kind),
            Ok(_) => {}
            Err(e) => {
                error!(
                    "Error setting up {} stat for guild {}: {}",
                    kind, guild_id, e
                );
                errors.push(kind);
            }
        }
    }

    ctx.data().refresh.request(guild_id.get());

    ctx.say(summarize_setup(stat, active, &created, &updated, &errors))
        .await?;
    Ok(())
}

/// Runs the reconciler for one stat type and persists its best knowledge of
/// the channel reference, whether or not the platform calls succeeded.
async fn setup_stat(
    db: &ServerStatsHandler,
    host: &dyn ChannelHost,
    mut desired: StatConfig,
    stats: &Snapshot,
) -> Result<Outcome, Error> {
    desired.channel_id = db
        .get_config(desired.guild_id, desired.kind)
        .await
        .and_then(|c| c.channel_id);

    let existing = match desired.channel_id {
        Some(id) => host.fetch(id).await.map(|state| (id, state)),
        None => None,
    };
    let existing_id = existing.as_ref().map(|(id, _)| *id);

    let result = reconcile::apply(host, &desired, existing, &stats.value_of(desired.kind)).await;

    let channel_id = match &result {
        Ok(reconciled) => reconciled.channel_id,
        // Failed reconciliation: an active counter keeps the channel that
        // was seen live, an inactive one is considered gone.
        Err(_) => existing_id.filter(|_| desired.active),
    };

    db.upsert_config(StatConfig {
        channel_id,
        ..desired
    })
    .await?;

    Ok(result?.outcome)
}

/// View the current server stats setup
#[command(
    slash_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn view(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap().get();
    let configs = ctx.data().dbs.serverstats.list_configs(guild_id).await;

    if configs.is_empty() {
        ctx.say("📊 No server stats are currently set up.").await?;
        return Ok(());
    }

    let mut response = String::from("📊 **Server Stats Configuration**\n");
    for (i, config) in configs.iter().enumerate() {
        response.push_str(&format!(
            "**{}. {}** ({})\n  Channel: {} | Category: {} | Format: `{}`\n",
            i + 1,
            config.kind,
            if config.active {
                "✅ active"
            } else {
                "❌ inactive"
            },
            config
                .channel_id
                .map_or("None".into(), |id| format!("<#{}>", id)),
            config
                .category_id
                .map_or("None".into(), |id| format!("<#{}>", id)),
            config.custom_name,
        ));
    }

    ctx.say(response).await?;
    Ok(())
}

/// Delete a specific server stat entry
#[command(
    slash_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Index of the stat to delete (from /serverstats view)"] index: u64,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap();

    if !bot_has_manage_channels(&ctx) {
        ctx.say("❌ I need the `Manage Channels` permission!").await?;
        return Ok(());
    }

    let db = &ctx.data().dbs.serverstats;
    let configs = db.list_configs(guild_id.get()).await;

    let Some(position) = resolve_index(index, configs.len()) else {
        ctx.say("❌ Invalid index provided.").await?;
        return Ok(());
    };

    let target = configs[position].clone();
    db.remove_config(guild_id.get(), target.kind).await?;

    if let Some(channel_id) = target.channel_id {
        let host = DiscordHost::new(ctx.serenity_context(), guild_id);
        if let Err(e) = host.delete(channel_id).await {
            error!(
                "Failed to delete channel for {} stat in guild {}: {}",
                target.kind, guild_id, e
            );
            // The record is already gone; report the leftover channel
            // instead of rolling back.
            ctx.say(format!(
                "✅ Deleted **{}** from the configuration, but failed to delete <#{}>. \
                 You may need to remove it manually.",
                target.kind, channel_id
            ))
            .await?;
            return Ok(());
        }
    }

    ctx.say(format!(
        "✅ Successfully deleted the **{}** server stat.",
        target.kind
    ))
    .await?;
    Ok(())
}

/// Delete all server stats setups
#[command(
    slash_command,
    guild_only,
    ephemeral,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn clear(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap();

    if !bot_has_manage_channels(&ctx) {
        ctx.say("❌ I need the `Manage Channels` permission!").await?;
        return Ok(());
    }

    ctx.defer_ephemeral().await?;

    let db = &ctx.data().dbs.serverstats;
    let configs = db.list_configs(guild_id.get()).await;

    let host = DiscordHost::new(ctx.serenity_context(), guild_id);
    let channel_ids: Vec<u64> = configs.iter().filter_map(|c| c.channel_id).collect();
    let (deleted, failed) = reconcile::remove_channels(&host, &channel_ids).await;

    db.clear_configs(guild_id.get()).await?;

    let mut response = String::from("✅ All server stats configurations have been deleted.");
    if deleted > 0 {
        response.push_str(&format!("\n🗑️ Deleted {} stat channels.", deleted));
    }
    if failed > 0 {
        response.push_str(&format!(
            "\n⚠️ Failed to delete {} channels. You may need to remove them manually.",
            failed
        ));
    }

    ctx.say(response).await?;
    Ok(())
}

fn bot_has_manage_channels(ctx: &Context<'_>) -> bool {
    let Some(guild) = ctx.guild() else {
        return false;
    };
    let Some(bot_member) = guild.members.get(&ctx.framework().bot_id) else {
        return false;
    };
    guild.member_permissions(bot_member).manage_channels()
}

/// Maps a user-facing 1-based index onto the listing, rejecting anything
/// outside 1..=len.
fn resolve_index(index: u64, len: usize) -> Option<usize> {
    if index >= 1 && index <= len as u64 {
        Some((index - 1) as usize)
    } else {
        None
    }
}

fn summarize_setup(
    stat: StatSelection,
    active: bool,
    created: &[StatType],
    updated: &[StatType],
    errors: &[StatType],
) -> String {
    let mut response = format!(
        "✅ **{}** now **{}**.",
        stat,
        if active { "enabled" } else { "disabled" }
    );
    if !created.is_empty() {
        response.push_str(&format!("\n📊 Created channels for: {}", join_kinds(created)));
    }
    if !updated.is_empty() {
        response.push_str(&format!("\n🔄 Updated settings for: {}", join_kinds(updated)));
    }
    if !errors.is_empty() {
        response.push_str(&format!("\n❌ Errors with: {}", join_kinds(errors)));
    }
    response
}

fn join_kinds(kinds: &[StatType]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
