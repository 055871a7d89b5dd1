use clap::Parser;
use keygate::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::Create(args) => cli::keys::create(args).await,
        Command::List(args) => cli::keys::list(args).await,
        Command::Delete(args) => cli::keys::delete(args).await,
        Command::Refresh(args) => cli::refresh::run(args).await,
    }
}
