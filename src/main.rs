use databases::Databases;
use modules::{
    serverstats::{
        serverstats,
        task::{RefreshQueue, StatsRefreshTask},
    },
    system::events::ReadyHandler,
};
use poise::serenity_prelude::{self as serenity, CreateAllowedMentions};
use std::sync::Arc;
use tasks::TaskManager;
use tracing::{error, info, trace};

mod database;
mod databases;
mod events;
mod modules;
mod tasks;

use crate::events::EventManager;

#[derive(Clone)]
pub struct Data {
    pub dbs: Arc<Databases>,
    pub task_manager: Arc<TaskManager>,
    pub event_manager: Arc<EventManager>,
    pub refresh: Arc<RefreshQueue>,
}

impl Data {
    pub async fn init_tasks(&self, ctx: &serenity::Context) {
        let refresh_task = StatsRefreshTask::new(self.dbs.serverstats.clone(), self.refresh.clone());
        self.task_manager.add_task(refresh_task).await;

        self.task_manager.start_tasks(ctx.clone()).await;
    }
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    info!("starting tallybot");

    let token = std::env::var("DISCORD_TOKEN").expect("missing DISCORD_TOKEN");
    let intents = serenity::GatewayIntents::non_privileged();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions::<Data, Error> {
            allowed_mentions: Some(CreateAllowedMentions::new().empty_roles().empty_users()),
            commands: vec![register(), serverstats()],
            pre_command: |ctx| {
                Box::pin(async move {
                    trace!(
                        "Command {} used by {} in {}",
                        ctx.command().qualified_name,
                        ctx.author().tag(),
                        ctx.guild_id()
                            .map_or_else(|| "DM".to_string(), |id| id.to_string())
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command {} completed for {} in {}",
                        ctx.command().qualified_name,
                        ctx.author().tag(),
                        ctx.guild_id()
                            .map_or_else(|| "DM".to_string(), |id| id.to_string())
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!(
                                "Command {} failed for {} in {}: {:?}",
                                ctx.command().qualified_name,
                                ctx.author().tag(),
                                ctx.guild_id()
                                    .map_or_else(|| "DM".to_string(), |id| id.to_string()),
                                error
                            );
                        }
                        err => error!("Other framework error: {:?}", err),
                    }
                })
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    data.event_manager.handle_event(ctx, event).await;
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                info!("registering commands");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let dbs = Arc::new(Databases::default().await?);
                let task_manager = Arc::new(TaskManager::new());
                let event_manager = Arc::new(EventManager::new());
                let refresh = Arc::new(RefreshQueue::new());

                event_manager.add_handler(ReadyHandler).await;

                let data = Data {
                    dbs,
                    task_manager,
                    event_manager,
                    refresh,
                };
                data.init_tasks(ctx).await;

                Ok(data)
            })
        })
        .build();

    let client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await;

    client.unwrap().start().await.unwrap();
}
