use std::sync::Arc;

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinSet,
};

use mcf_core::{
    config::Config,
    ports::{ProfileApi, StaticGuildContext, UserStore},
    store::MemoryUserStore,
    EnginePorts, MentionEngine,
};
use mcf_http::{
    throttled::{ThrottleConfig, ThrottledProfileApi},
    DiscordHttpClient,
};

mod host;

use host::{Host, HostEvent, StdoutRefresh};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mcf_core::logging::init("mcf")?;

    let cfg = Config::load()?;

    let http = DiscordHttpClient::new(&cfg.api_base_url, &cfg.token, cfg.request_timeout)?;
    let api: Arc<dyn ProfileApi> = Arc::new(ThrottledProfileApi::new(
        Arc::new(http),
        ThrottleConfig {
            global_min_interval: cfg.global_min_interval,
            per_guild_min_interval: cfg.guild_min_interval,
        },
    ));

    let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let guilds = Arc::new(StaticGuildContext::new(cfg.guild_id.clone()));

    let engine = MentionEngine::install(
        EnginePorts {
            api,
            store: store.clone(),
            guilds: guilds.clone(),
            refresh: Arc::new(StdoutRefresh),
        },
        cfg.engine,
    );

    let host = Host {
        engine: engine.clone(),
        store,
        guilds,
    };

    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match HostEvent::parse(&line) {
            Ok(Some(event)) => host.handle(event, &mut tasks),
            Ok(None) => {}
            Err(e) => tracing::warn!("skipping input line: {e:#}"),
        }
    }

    // Let passes started before EOF finish and print.
    while let Some(res) = tasks.join_next().await {
        if let Err(e) = res {
            tracing::warn!("mention pass failed: {e}");
        }
    }

    engine.uninstall();
    Ok(())
}
