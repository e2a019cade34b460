use budget_sync::args::{Args, Command, UpDown};
use budget_sync::commands::{self, TransactionFilter};
use budget_sync::model::MonthKey;
use budget_sync::{Config, Error, ErrorType, Mode, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().budget_home().path();

    // This allows for testing the program without hitting the Google APIs. When
    // BUDGET_SYNC_IN_TEST_MODE is set and non-empty, then the mode will be Mode::Testing,
    // otherwise it will be Mode::Google.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.sheet_url(), init_args.client_secret())
                .await?
                .print()
        }

        Command::Auth(auth_args) => {
            let config = load(home).await?;
            if auth_args.verify() {
                commands::auth_verify(&config).await?.print()
            } else {
                commands::auth(&config).await?.print()
            }
        }

        Command::List(list_args) => {
            let config = load(home).await?;
            let month = list_args
                .month()
                .map(MonthKey::parse_numeric)
                .transpose()
                .map_err(Error::request)?;
            let filter = TransactionFilter {
                kind: list_args.kind(),
                month,
            };
            commands::list_transactions(&config, filter).await?.print()
        }

        Command::Get(id_args) => commands::get_transaction(&load(home).await?, id_args.id())
            .await?
            .print(),

        Command::Add(add_args) => {
            let config = load(home).await?;
            commands::create_transaction(&config, mode, add_args.input()?)
                .await?
                .print()
        }

        Command::Update(update_args) => {
            let config = load(home).await?;
            commands::update_transaction(&config, mode, update_args.id(), update_args.input()?)
                .await?
                .print()
        }

        Command::Delete(id_args) => {
            let config = load(home).await?;
            commands::delete_transaction(&config, mode, id_args.id())
                .await?
                .print()
        }

        Command::Batch(batch_args) => {
            let config = load(home).await?;
            let inputs = commands::read_batch_file(batch_args.file()).await?;
            commands::save_all(&config, mode, inputs).await?.print()
        }

        Command::Clear => commands::clear_all(&load(home).await?, mode)
            .await?
            .print(),

        Command::Summary => commands::summary(&load(home).await?).await?.print(),

        Command::Backup => commands::backup(&load(home).await?).await?.print(),

        Command::Download(download_args) => {
            let config = load(home).await?;
            commands::download_to(&config, download_args.output())
                .await?
                .print()
        }

        Command::Sync(sync_args) => {
            let config = load(home).await?;
            match sync_args.direction() {
                UpDown::Up => commands::sync_up(&config, mode).await?.print(),
                UpDown::Down => commands::sync_down(&config, mode, sync_args.apply())
                    .await?
                    .print(),
            }
        }

        Command::Serve(serve_args) => {
            let config = load(home).await?;
            commands::serve(config, mode, serve_args.host(), serve_args.port())
                .await?
                .print()
        }
    };
    Ok(())
}

async fn load(home: &Path) -> Result<Config> {
    Config::load(home)
        .await
        .map_err(|e| Error::new(ErrorType::Config, e))
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            let level = level.to_string().to_lowercase();
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
