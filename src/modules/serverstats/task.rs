use super::database::ServerStatsDatabase;
use super::host::DiscordHost;
use super::reconcile::{render_name, ChannelHost};
use super::snapshot;
use crate::database::Database;
use crate::tasks::Task;
use async_trait::async_trait;
use poise::serenity_prelude::{Context, GuildId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

const FULL_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
const RENAME_COOLDOWN: Duration = Duration::from_secs(10);

/// Guild-scoped "stats changed" signal. `setup` pushes a guild id here and
/// the refresh task picks it up on its next tick.
#[derive(Debug, Default)]
pub struct RefreshQueue {
    pending: Mutex<HashSet<u64>>,
}

impl RefreshQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, guild_id: u64) {
        self.pending.lock().unwrap().insert(guild_id);
    }

    pub fn drain(&self) -> HashSet<u64> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

/// Keeps counter channel names current. Each tick refreshes the guilds that
/// were just reconfigured; a full pass over every configured guild runs
/// every few minutes.
pub struct StatsRefreshTask {
    db: Database<ServerStatsDatabase>,
    queue: Arc<RefreshQueue>,
    renames: HashMap<u64, Instant>,
    last_full: Option<Instant>,
}

impl StatsRefreshTask {
    pub fn new(db: Database<ServerStatsDatabase>, queue: Arc<RefreshQueue>) -> Self {
        Self {
            db,
            queue,
            renames: HashMap::new(),
            last_full: None,
        }
    }

    async fn refresh_guild(
        &mut self,
        ctx: &Context,
        guild_id: u64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let configs = self
            .db
            .read(|db| db.configs.get(&guild_id).cloned().unwrap_or_default())
            .await;

        let counters: Vec<_> = configs
            .into_iter()
            .filter(|c| c.active && c.channel_id.is_some())
            .collect();
        if counters.is_empty() {
            return Ok(());
        }

        let stats = snapshot::fetch_snapshot(&ctx.http, GuildId::new(guild_id)).await?;
        let host = DiscordHost::new(ctx, GuildId::new(guild_id));

        for config in counters {
            let Some(channel_id) = config.channel_id else {
                continue;
            };

            if let Some(last) = self.renames.get(&channel_id) {
                if last.elapsed() < RENAME_COOLDOWN {
                    continue;
                }
            }

            let Some(state) = host.fetch(channel_id).await else {
                // Dangling reference; the next setup run will recreate it.
                debug!("Counter channel {} is gone, skipping", channel_id);
                continue;
            };

            let rendered = render_name(&config.custom_name, &stats.value_of(config.kind));
            if state.name == rendered {
                debug!("Counter channel {} already current", channel_id);
                continue;
            }

            sleep(Duration::from_millis(250)).await;
            match host.rename(channel_id, &rendered).await {
                Ok(()) => {
                    self.renames.insert(channel_id, Instant::now());
                    debug!("Renamed counter channel {} to \"{}\"", channel_id, rendered);
                }
                Err(e) => warn!("Failed to rename counter channel {}: {}", channel_id, e),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Task for StatsRefreshTask {
    fn name(&self) -> &str {
        "StatsRefresh"
    }

    fn schedule(&self) -> Option<Duration> {
        Some(Duration::from_secs(30))
    }

    async fn execute(
        &mut self,
        ctx: &Context,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let start = Instant::now();

        let due_full = self
            .last_full
            .map_or(true, |t| t.elapsed() >= FULL_REFRESH_INTERVAL);

        let requested = self.queue.drain();
        let guilds: Vec<u64> = if due_full {
            self.last_full = Some(Instant::now());
            self.db.read(|db| db.configs.keys().copied().collect()).await
        } else {
            requested.into_iter().collect()
        };

        if guilds.is_empty() {
            return Ok(());
        }

        info!("Refreshing counters for {} guilds", guilds.len());
        for guild_id in guilds {
            if let Err(e) = self.refresh_guild(ctx, guild_id).await {
                warn!("Failed to refresh stats for guild {}: {}", guild_id, e);
            }
        }
        info!("Counter refresh completed in {:?}", start.elapsed());

        Ok(())
    }
}
