use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use super::database::StatConfig;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("platform api error: {0}")]
    Api(#[from] poise::serenity_prelude::Error),
    #[error("{0}")]
    Custom(String),
}

/// Live state of a counter channel as the platform reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    pub name: String,
    pub parent_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCounterChannel {
    pub name: String,
    pub category_id: Option<u64>,
}

/// The channel operations a counter needs from the platform. `fetch` returns
/// `None` for a dangling reference so stored ids never have to be trusted.
#[async_trait]
pub trait ChannelHost: Send + Sync {
    async fn fetch(&self, channel_id: u64) -> Option<ChannelState>;
    async fn create(&self, request: CreateCounterChannel) -> Result<u64, HostError>;
    async fn rename(&self, channel_id: u64, name: &str) -> Result<(), HostError>;
    async fn reparent(&self, channel_id: u64, category_id: Option<u64>) -> Result<(), HostError>;
    async fn delete(&self, channel_id: u64) -> Result<(), HostError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Removed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub channel_id: Option<u64>,
    pub outcome: Outcome,
}

pub fn render_name(template: &str, value: &str) -> String {
    template.replace("{count}", value)
}

/// Brings one counter channel into agreement with its desired config.
///
/// `existing` is the re-validated live channel, if any. Create, rename and
/// reparent failures propagate so the caller can bucket the stat as errored;
/// a failed delete during deactivation is only logged and the stored id is
/// cleared either way, since the reference is weak.
pub async fn apply(
    host: &dyn ChannelHost,
    desired: &StatConfig,
    existing: Option<(u64, ChannelState)>,
    value: &str,
) -> Result<Reconciled, HostError> {
    let rendered = render_name(&desired.custom_name, value);

    match (desired.active, existing) {
        (true, None) => {
            let channel_id = host
                .create(CreateCounterChannel {
                    name: rendered,
                    category_id: desired.category_id,
                })
                .await?;
            Ok(Reconciled {
                channel_id: Some(channel_id),
                outcome: Outcome::Created,
            })
        }
        (false, Some((channel_id, _))) => {
            if let Err(e) = host.delete(channel_id).await {
                warn!("Failed to delete counter channel {}: {}", channel_id, e);
            }
            Ok(Reconciled {
                channel_id: None,
                outcome: Outcome::Removed,
            })
        }
        (true, Some((channel_id, state))) => {
            if state.parent_id != desired.category_id {
                host.reparent(channel_id, desired.category_id).await?;
            }
            if state.name != rendered {
                host.rename(channel_id, &rendered).await?;
            } else {
                debug!("Counter channel {} already up to date", channel_id);
            }
            Ok(Reconciled {
                channel_id: Some(channel_id),
                outcome: Outcome::Updated,
            })
        }
        (false, None) => Ok(Reconciled {
            channel_id: None,
            outcome: Outcome::Skipped,
        }),
    }
}

/// Best-effort teardown of a batch of counter channels. Every id is
/// attempted; a dangling id counts as failed. Returns (deleted, failed).
pub async fn remove_channels(host: &dyn ChannelHost, channel_ids: &[u64]) -> (usize, usize) {
    let mut deleted = 0;
    let mut failed = 0;
    for &channel_id in channel_ids {
        match host.delete(channel_id).await {
            Ok(()) => deleted += 1,
            Err(e) => {
                warn!("Failed to delete counter channel {}: {}", channel_id, e);
                failed += 1;
            }
        }
    }
    (deleted, failed)
}


#[cfg(test)]
mod tests {
    use super::testing::{Call, MockHost};
    use super::*;
    use crate::modules::serverstats::database::StatType;

    fn config(active: bool, channel_id: Option<u64>, category_id: Option<u64>) -> StatConfig {
        StatConfig {
            guild_id: 1,
            kind: StatType::Members,
            channel_id,
            category_id,
            active,
            custom_name: "👥 Members: {count}".to_string(),
        }
    }

    async fn resolve(host: &MockHost, channel_id: Option<u64>) -> Option<(u64, ChannelState)> {
        match channel_id {
            Some(id) => host.fetch(id).await.map(|state| (id, state)),
            None => None,
        }
    }

    #[tokio::test]
    async fn active_without_channel_creates_one() {
        let host = MockHost::default();
        let desired = config(true, None, Some(77));

        let result = apply(&host, &desired, None, "12").await.unwrap();

        assert_eq!(result.outcome, Outcome::Created);
        let id = result.channel_id.unwrap();
        assert_eq!(
            host.state(id).unwrap(),
            ChannelState {
                name: "👥 Members: 12".to_string(),
                parent_id: Some(77),
            }
        );
    }

    #[tokio::test]
    async fn stale_reference_is_treated_as_absent() {
        let host = MockHost::default();
        let desired = config(true, Some(999), None);

        let existing = resolve(&host, desired.channel_id).await;
        assert!(existing.is_none());

        let result = apply(&host, &desired, existing, "3").await.unwrap();
        assert_eq!(result.outcome, Outcome::Created);
        assert_ne!(result.channel_id, Some(999));
    }

    #[tokio::test]
    async fn second_pass_makes_no_channel_calls() {
        let host = MockHost::default();
        let first = apply(&host, &config(true, None, None), None, "5")
            .await
            .unwrap();

        let desired = config(true, first.channel_id, None);
        let existing = resolve(&host, desired.channel_id).await;
        let second = apply(&host, &desired, existing, "5").await.unwrap();

        assert_eq!(second.outcome, Outcome::Updated);
        assert_eq!(second.channel_id, first.channel_id);
        let mutations: Vec<_> = host
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Rename(..) | Call::Reparent(..)))
            .collect();
        assert!(mutations.is_empty(), "unexpected calls: {:?}", mutations);
    }

    #[tokio::test]
    async fn drifted_name_and_category_are_corrected() {
        let host = MockHost::default().with_channel(10, "👥 Members: 5", None);
        let desired = config(true, Some(10), Some(42));

        let existing = resolve(&host, desired.channel_id).await;
        let result = apply(&host, &desired, existing, "6").await.unwrap();

        assert_eq!(result.outcome, Outcome::Updated);
        assert_eq!(
            host.calls(),
            vec![
                Call::Reparent(10, Some(42)),
                Call::Rename(10, "👥 Members: 6".to_string()),
            ]
        );
        assert_eq!(
            host.state(10).unwrap(),
            ChannelState {
                name: "👥 Members: 6".to_string(),
                parent_id: Some(42),
            }
        );
    }

    #[tokio::test]
    async fn deactivation_deletes_and_clears_the_reference() {
        let host = MockHost::default().with_channel(10, "👥 Members: 5", None);
        let desired = config(false, Some(10), None);

        let existing = resolve(&host, desired.channel_id).await;
        let result = apply(&host, &desired, existing, "5").await.unwrap();

        assert_eq!(result.outcome, Outcome::Removed);
        assert_eq!(result.channel_id, None);
        assert!(host.state(10).is_none());
    }

    #[tokio::test]
    async fn failed_deactivation_delete_still_clears_the_reference() {
        let host = MockHost {
            fail_delete: true,
            ..MockHost::default()
        }
        .with_channel(10, "👥 Members: 5", None);
        let desired = config(false, Some(10), None);

        let existing = resolve(&host, desired.channel_id).await;
        let result = apply(&host, &desired, existing, "5").await.unwrap();

        assert_eq!(result.outcome, Outcome::Removed);
        assert_eq!(result.channel_id, None);
    }

    #[tokio::test]
    async fn inactive_without_channel_is_a_noop() {
        let host = MockHost::default();
        let result = apply(&host, &config(false, None, None), None, "5")
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Skipped);
        assert_eq!(result.channel_id, None);
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn create_failure_propagates() {
        let host = MockHost {
            fail_create: true,
            ..MockHost::default()
        };
        let err = apply(&host, &config(true, None, None), None, "5")
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Custom(_)));
    }

    #[tokio::test]
    async fn rename_failure_propagates() {
        let host = MockHost {
            fail_rename: true,
            ..MockHost::default()
        }
        .with_channel(10, "👥 Members: 5", None);
        let desired = config(true, Some(10), None);

        let existing = resolve(&host, desired.channel_id).await;
        let err = apply(&host, &desired, existing, "6").await.unwrap_err();
        assert!(matches!(err, HostError::Custom(_)));
    }

    #[tokio::test]
    async fn remove_channels_counts_stale_ids_as_failed() {
        let host = MockHost::default()
            .with_channel(1, "a", None)
            .with_channel(2, "b", None);

        let (deleted, failed) = remove_channels(&host, &[1, 2, 999]).await;
        assert_eq!((deleted, failed), (2, 1));
        assert!(host.state(1).is_none());
        assert!(host.state(2).is_none());
    }
}
