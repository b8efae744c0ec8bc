use std::path::PathBuf;

use clap::Parser;

mod catalog;
mod client;
mod gdb;
mod outbox;
mod paths;
mod savefolder;
mod session;
mod snapshot;
mod tasks;

#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Address of the multiworld coordination service
    #[arg(long, default_value = "127.0.0.1:38281")]
    server: String,
    /// Slot (player) name registered with the session
    #[arg(long)]
    slot: String,
    /// Password of the session, if one is set
    #[arg(long)]
    password: Option<String>,
    /// The game's documents folder (defaults to the first known folder
    /// under ~/Documents)
    #[arg(long, name("path"))]
    game_dir: Option<PathBuf>,
    /// Override the state file path (defaults to <game dir>/Data/GDB.bin)
    #[arg(long)]
    state_file: Option<PathBuf>,
    /// Override the save-folder directory (defaults to <game dir>/SaveGames)
    #[arg(long)]
    saves_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let game_dir = match args.game_dir {
        Some(dir) => dir,
        None => {
            let documents = paths::documents_dir()
                .ok_or_else(|| anyhow::anyhow!("No home directory found, pass --path"))?;
            paths::game_documents_dir(&documents)
        }
    };
    let config = client::Config {
        server: args.server,
        slot_name: args.slot,
        password: args.password,
        state_path: args
            .state_file
            .unwrap_or_else(|| paths::state_file(&game_dir)),
        saves_dir: args.saves_dir.unwrap_or_else(|| paths::saves_dir(&game_dir)),
    };

    client::run(config).await
}
