use clap::{Parser, Subcommand, ValueEnum};
use rowguard_core::OperationClass;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "rowguard", version, about = "Row-level access control and aggregation")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate a configuration file.
    Check {
        #[arg(long, short)]
        config: PathBuf,
    },

    /// Report whether a user belongs to the administrator group.
    IsAdmin {
        #[arg(long, short)]
        config: PathBuf,

        /// Reference id of the user.
        user: String,
    },

    /// Run the table-level gate for one caller.
    Can {
        #[arg(long, short)]
        config: PathBuf,

        #[arg(long)]
        table: String,

        /// Reference id of the user; omit for an anonymous caller.
        #[arg(long)]
        user: Option<String>,

        /// Reference ids of the caller's groups.
        #[arg(long = "group")]
        groups: Vec<String>,

        operation: Operation,
    },

    /// Run an aggregation request and print the rows as JSON.
    Aggregate {
        #[arg(long, short)]
        config: PathBuf,

        /// JSON file holding the request.
        #[arg(long)]
        request: PathBuf,

        /// Give up after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Operation {
    Read,
    Write,
}

impl From<Operation> for OperationClass {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Read => OperationClass::Read,
            Operation::Write => OperationClass::Write,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let ok = match cli.cmd {
        Command::Check { config } => commands::check::run(&config)?,
        Command::IsAdmin { config, user } => commands::admin::run(&config, &user).await?,
        Command::Can {
            config,
            table,
            user,
            groups,
            operation,
        } => {
            commands::can::run(&config, &table, user.as_deref(), groups, operation.into()).await?
        }
        Command::Aggregate {
            config,
            request,
            timeout_secs,
        } => commands::aggregate::run(&config, &request, timeout_secs).await?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
