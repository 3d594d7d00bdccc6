// Cdxserve is a web-archive CDX index server.
// Copyright (C) 2024 Cdxserve contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cdxserve::api::{self, AppState};
use cdxserve::config::{self, Config};
use cdxserve::datastore::{self, DataStore};
use tracing_subscriber::FmtSubscriber;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(name = "cdxserve", version, about = "A web-archive CDX index server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server for a single node, primary or secondary.
    Serve {
        /// Path to a TOML config file (see `Config`).
        config_path: PathBuf,
    },
    /// Operate on collections without starting the server.
    Collections {
        #[command(subcommand)]
        command: CollectionsCommand,
    },
}

#[derive(Subcommand)]
enum CollectionsCommand {
    /// List every collection directory under `data_dir`.
    List { data_dir: PathBuf },
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config_path } => {
            let config: Config = config::load_toml_config(&config_path)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(serve(config))
        }
        Command::Collections {
            command: CollectionsCommand::List { data_dir },
        } => {
            for name in datastore::list_collections(&data_dir)? {
                println!("{name}");
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let host = config.host;
    tracing::info!(%host, data_dir = %config.data_dir.display(), "starting cdxserve");

    let data_store = DataStore::new(config.data_dir.clone());
    let state = Arc::new(AppState { data_store, config });
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(host).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
