use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "todo_api")]
#[command(about = "Shared todo list served over HTTP with OAuth sign-in", long_about = None)]
pub struct Cli {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, overrides the config file
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,

    /// SQLite database URL, overrides the config file
    #[arg(long)]
    pub database_url: Option<String>,
}
