use std::fs;
use std::path::Path;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

mod games;
mod models;
mod repositories;
pub mod services;
pub mod settings;
pub mod utils;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log4rs)?;

    let mut settings = settings::Settings::new(&args.config)?;
    if let Some(listen) = args.listen {
        settings.server.listen = listen;
    }

    let conn = PgPoolOptions::new()
        .max_connections(settings.postgres.max_connections)
        .connect(&settings.postgres.url)
        .await?;

    sqlx::migrate!("./migrations").run(&conn).await?;
    log::info!("Database migrations applied.");

    if !Path::new(&settings.uploads.dir).exists() {
        fs::create_dir_all(&settings.uploads.dir)?;
    }

    log::info!("Starting services.");
    services::start_services(conn, settings).await
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
