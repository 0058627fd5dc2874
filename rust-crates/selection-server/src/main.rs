use anyhow::Context;
use clap::Parser;
use selection_server::{
    app::{
        App,
        RunState,
        actix_query_api::{
            ActixQueryApi,
            DEFAULT_PORT,
        },
        in_memory_selection_storage::InMemorySelectionStorage,
        init_tracing,
        query_api::QueryAPI,
        selection_storage::SelectionStorage,
        sled_storage::SledSelectionStorage,
    },
    selection::{
        DEFAULT_MAX_COUNTRIES,
        SelectionPolicy,
    },
};
use std::{
    env::current_dir,
    fs,
    path::PathBuf,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Where the sled database lives; defaults to ./country_roulette_data
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep lists in memory only; everything is lost on exit
    #[arg(long, conflicts_with = "data_dir")]
    in_memory: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_COUNTRIES)]
    max_countries: usize,

    /// Forget lists that have not been written for this many days
    #[arg(long)]
    ttl_days: Option<u32>,

    #[arg(short, long, default_value = "false")]
    tracing: bool,
}

async fn handle_interupt() {
    let res = tokio::signal::ctrl_c().await;
    match res {
        Ok(_) => {
            tracing::info!("Received interrupt, exiting");
        }
        Err(_) => {
            tracing::warn!("Received interrupt error, exiting anyway");
        }
    }
}

async fn serve<API: QueryAPI, Storage: SelectionStorage>(
    mut app: App<API, Storage>,
) -> anyhow::Result<()> {
    tracing::info!("Starting selection service");
    loop {
        let interrupt = handle_interupt();
        match app.run(interrupt).await? {
            RunState::Continue => continue,
            RunState::Exit => {
                tracing::info!("Exiting selection service");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.tracing {
        init_tracing();
    }
    let policy = SelectionPolicy::new(args.max_countries, args.ttl_days);
    tracing::info!(
        max_countries = policy.max_countries,
        ttl_days = ?args.ttl_days,
        "selection policy"
    );
    let api = ActixQueryApi::new(Some(args.port)).await?;

    if args.in_memory {
        tracing::info!("Using in-memory selection storage");
        return serve(App::new(api, InMemorySelectionStorage::new(), policy)).await;
    }

    let storage_path = match &args.data_dir {
        Some(path) => path.clone(),
        None => current_dir()
            .context("determine process working directory")?
            .join("country_roulette_data"),
    };
    fs::create_dir_all(&storage_path)
        .with_context(|| format!("create {}", storage_path.display()))?;
    tracing::info!(
        "Using sled storage directory: {}",
        storage_path.display()
    );
    let storage = SledSelectionStorage::open(&storage_path)?;
    serve(App::new(api, storage, policy)).await
}
