use clap::Parser;
use color_eyre::eyre::Result;
use std::path::PathBuf;

mod api_client;
mod client;
mod device;
mod ui;

#[derive(Parser, Debug)]
#[command(name = "country-roulette", about = "Spin a roulette across the world map")]
struct Args {
    /// Base URL of the selection server
    #[arg(long, default_value = api_client::DEFAULT_SERVER_URL)]
    server_url: String,

    /// GeoJSON feature collection of the countries to spin over
    #[arg(long, default_value = "world.geojson")]
    geojson: PathBuf,

    /// Directory holding the device file and logs (defaults to the current directory)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Use this device id instead of the stored one
    #[arg(long)]
    device_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let root = match args.data_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let store = device::DeviceStore::new(&root)?;
    let _guard = client::init_tracing(&device::data_dir(&root))?;
    tracing::info!(device_file = %store.path().display(), "starting country roulette");

    let device_id = match args.device_id {
        Some(id) => id,
        None => store.load_or_create()?.device_id,
    };

    let config = client::AppConfig {
        server_url: args.server_url,
        geojson: args.geojson,
        device_id,
    };
    client::run_app(config).await
}
