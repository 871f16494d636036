use clap::{Parser, Subcommand};

mod cmd;

#[derive(Parser, Debug)]
#[command(name = "lotrecon", version, about = "FIFO lot reconciliation for purchases and disposals")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Match disposals to purchase lots and write the report files
    Reconcile(cmd::reconcile::ReconcileCommand),
    /// List disposals that are underfunded or need review
    Validate(cmd::validate::ValidateCommand),
    /// Show lots left open (or fully disposed) after matching
    Pools(cmd::pools::PoolsCommand),
    /// Show the normalized transaction feed
    Transactions(cmd::transactions::TransactionsCommand),
    /// Print input and output formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Reconcile(c) => c.exec(),
        Command::Validate(c) => c.exec(),
        Command::Pools(c) => c.exec(),
        Command::Transactions(c) => c.exec(),
        Command::Schema(c) => c.exec(),
    }
}
