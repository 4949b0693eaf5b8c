use crate::database::Database;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, poise::ChoiceParameter)]
pub enum StatType {
    #[name = "Members"]
    Members,
    #[name = "Bots"]
    Bots,
    #[name = "Text Channels"]
    TextChannels,
    #[name = "Voice Channels"]
    VoiceChannels,
    #[name = "Categories"]
    Categories,
    #[name = "Roles"]
    Roles,
    #[name = "Date"]
    Date,
}

impl StatType {
    pub const ALL: [StatType; 7] = [
        Self::Members,
        Self::Bots,
        Self::TextChannels,
        Self::VoiceChannels,
        Self::Categories,
        Self::Roles,
        Self::Date,
    ];

    /// Channel name template used when the admin does not supply one.
    pub fn default_template(&self) -> &'static str {
        match self {
            Self::Members => "👥 Members: {count}",
            Self::Bots => "🤖 Bots: {count}",
            Self::TextChannels => "💬 Text Channels: {count}",
            Self::VoiceChannels => "🔊 Voice Channels: {count}",
            Self::Categories => "📁 Categories: {count}",
            Self::Roles => "🏷️ Roles: {count}",
            Self::Date => "📅 Date: {count}",
        }
    }
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Members => write!(f, "members"),
            Self::Bots => write!(f, "bots"),
            Self::TextChannels => write!(f, "textchannels"),
            Self::VoiceChannels => write!(f, "voicechannels"),
            Self::Categories => write!(f, "categories"),
            Self::Roles => write!(f, "roles"),
            Self::Date => write!(f, "date"),
        }
    }
}

/// What the admin picked in `/serverstats setup`: one stat, or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum StatSelection {
    #[name = "All Stats"]
    All,
    #[name = "Members"]
    Members,
    #[name = "Bots"]
    Bots,
    #[name = "Text Channels"]
    TextChannels,
    #[name = "Voice Channels"]
    VoiceChannels,
    #[name = "Categories"]
    Categories,
    #[name = "Roles"]
    Roles,
    #[name = "Date"]
    Date,
}

impl StatSelection {
    pub fn expand(&self) -> Vec<StatType> {
        match self {
            Self::All => StatType::ALL.to_vec(),
            Self::Members => vec![StatType::Members],
            Self::Bots => vec![StatType::Bots],
            Self::TextChannels => vec![StatType::TextChannels],
            Self::VoiceChannels => vec![StatType::VoiceChannels],
            Self::Categories => vec![StatType::Categories],
            Self::Roles => vec![StatType::Roles],
            Self::Date => vec![StatType::Date],
        }
    }
}

impl fmt::Display for StatSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All Stats"),
            Self::Members => write!(f, "members"),
            Self::Bots => write!(f, "bots"),
            Self::TextChannels => write!(f, "textchannels"),
            Self::VoiceChannels => write!(f, "voicechannels"),
            Self::Categories => write!(f, "categories"),
            Self::Roles => write!(f, "roles"),
            Self::Date => write!(f, "date"),
        }
    }
}

/// One configured counter. `channel_id` is a weak reference: the channel may
/// be deleted out-of-band, so it is re-validated on every use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatConfig {
    pub guild_id: u64,
    pub kind: StatType,
    pub channel_id: Option<u64>,
    pub category_id: Option<u64>,
    pub active: bool,
    pub custom_name: String,
}

/// Per-guild configs are kept in insertion order so `view` numbering and
/// `delete`-by-index stay stable.
#[derive(Default, Serialize, Deserialize, Clone, Debug)]
pub struct ServerStatsDatabase {
    pub configs: HashMap<u64, Vec<StatConfig>>,
}

pub type ServerStatsHandler = Database<ServerStatsDatabase>;

impl ServerStatsHandler {
    pub async fn get_config(&self, guild_id: u64, kind: StatType) -> Option<StatConfig> {
        self.read(|db| {
            db.configs
                .get(&guild_id)
                .and_then(|configs| configs.iter().find(|c| c.kind == kind).cloned())
        })
        .await
    }

    pub async fn list_configs(&self, guild_id: u64) -> Vec<StatConfig> {
        self.read(|db| db.configs.get(&guild_id).cloned().unwrap_or_default())
            .await
    }

    /// Insert or fully replace the config for (guild, kind).
    pub async fn upsert_config(&self, config: StatConfig) -> Result<(), String> {
        self.write(|db| {
            let configs = db.configs.entry(config.guild_id).or_default();
            match configs.iter_mut().find(|c| c.kind == config.kind) {
                Some(existing) => *existing = config,
                None => configs.push(config),
            }
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())
    }

    pub async fn remove_config(
        &self,
        guild_id: u64,
        kind: StatType,
    ) -> Result<Option<StatConfig>, String> {
        self.write(|db| {
            let Some(configs) = db.configs.get_mut(&guild_id) else {
                return Ok(None);
            };
            let removed = configs
                .iter()
                .position(|c| c.kind == kind)
                .map(|i| configs.remove(i));
            if configs.is_empty() {
                db.configs.remove(&guild_id);
            }
            Ok(removed)
        })
        .await
        .map_err(|e| e.to_string())
    }

    pub async fn clear_configs(&self, guild_id: u64) -> Result<usize, String> {
        self.write(|db| Ok(db.configs.remove(&guild_id).map_or(0, |c| c.len())))
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_handler(dir: &TempDir) -> ServerStatsHandler {
        Database::new(dir.path().join("serverstats.db"))
            .await
            .unwrap()
    }

    fn config(guild_id: u64, kind: StatType) -> StatConfig {
        StatConfig {
            guild_id,
            kind,
            channel_id: None,
            category_id: None,
            active: true,
            custom_name: kind.default_template().to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_keeps_one_config_per_kind() {
        let dir = TempDir::new().unwrap();
        let db = open_handler(&dir).await;

        db.upsert_config(config(1, StatType::Members)).await.unwrap();
        db.upsert_config(StatConfig {
            channel_id: Some(42),
            custom_name: "People: {count}".into(),
            ..config(1, StatType::Members)
        })
        .await
        .unwrap();

        let configs = db.list_configs(1).await;
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].channel_id, Some(42));
        assert_eq!(configs[0].custom_name, "People: {count}");
    }

    #[tokio::test]
    async fn list_preserves_insertion_order() {
        let dir = TempDir::new().unwrap();
        let db = open_handler(&dir).await;

        db.upsert_config(config(1, StatType::Roles)).await.unwrap();
        db.upsert_config(config(1, StatType::Members)).await.unwrap();
        db.upsert_config(config(1, StatType::Date)).await.unwrap();
        // Re-upserting must not move a record to the back.
        db.upsert_config(config(1, StatType::Roles)).await.unwrap();

        let kinds: Vec<_> = db.list_configs(1).await.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![StatType::Roles, StatType::Members, StatType::Date]);
    }

    #[tokio::test]
    async fn remove_config_only_touches_one_kind() {
        let dir = TempDir::new().unwrap();
        let db = open_handler(&dir).await;

        db.upsert_config(config(1, StatType::Members)).await.unwrap();
        db.upsert_config(config(1, StatType::Bots)).await.unwrap();

        let removed = db.remove_config(1, StatType::Members).await.unwrap();
        assert_eq!(removed.map(|c| c.kind), Some(StatType::Members));

        let kinds: Vec<_> = db.list_configs(1).await.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![StatType::Bots]);

        let missing = db.remove_config(1, StatType::Date).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn clear_configs_is_scoped_to_the_guild() {
        let dir = TempDir::new().unwrap();
        let db = open_handler(&dir).await;

        db.upsert_config(config(1, StatType::Members)).await.unwrap();
        db.upsert_config(config(1, StatType::Bots)).await.unwrap();
        db.upsert_config(config(2, StatType::Members)).await.unwrap();

        let removed = db.clear_configs(1).await.unwrap();
        assert_eq!(removed, 2);
        assert!(db.list_configs(1).await.is_empty());
        assert_eq!(db.list_configs(2).await.len(), 1);
    }

    #[tokio::test]
    async fn selection_all_expands_to_every_kind() {
        assert_eq!(StatSelection::All.expand(), StatType::ALL.to_vec());
        assert_eq!(StatSelection::Bots.expand(), vec![StatType::Bots]);
    }
}
