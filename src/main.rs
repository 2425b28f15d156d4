use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use canteen_backend::api;
use canteen_backend::config::ChatConfig;
use canteen_backend::database::Database;

#[derive(Parser, Debug)]
#[command(author, version, about = "Campus canteen ordering backend", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Path to the SQLite database file
    #[arg(long, default_value = "canteen.db")]
    db: String,

    /// Populate the database with demo canteens, dishes and accounts
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let db = Database::open(&args.db)
        .await
        .with_context(|| format!("failed to open database at {}", args.db))?;
    if args.seed {
        db.seed_demo_data().await.context("failed to seed demo data")?;
    }

    let chat_config = ChatConfig::from_env();
    if chat_config.api_key.is_none() {
        info!("MOONSHOT_API_KEY not set; /chat will report a configuration error");
    }

    let app = api::create_api(db, chat_config);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
