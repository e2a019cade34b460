//! These structs provide the CLI interface for the budget CLI.

use crate::model::{RecordInput, RecordKind};
use crate::Result;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// budget: A personal budget tracker.
///
/// Income and expense transactions are kept in a workbook file in your budget home directory.
/// Every transaction also shows up in a tab for its month and the Summary tab keeps the totals.
/// The data can be served over HTTP with `budget serve` and mirrored to a Google Sheet with
/// `budget sync`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, the configuration file and an empty dataset.
    ///
    /// This is the first command you should run. Pass --sheet-url if you want to mirror your data
    /// to a Google Sheet, along with --client-secret pointing at the OAuth client credentials you
    /// downloaded from the Google Cloud console. Both can be left out and added to config.json
    /// later.
    Init(InitArgs),
    /// Authenticate with Google Sheets via OAuth.
    Auth(AuthArgs),
    /// List transactions in chronological order.
    List(ListArgs),
    /// Show one transaction.
    Get(IdArgs),
    /// Add a transaction.
    Add(AddArgs),
    /// Change some fields of a transaction.
    Update(UpdateArgs),
    /// Delete a transaction.
    Delete(IdArgs),
    /// Replace the stored transactions with the ones in a JSON file.
    ///
    /// The file holds an array of transaction objects. Each kind (income or expense) that appears
    /// in the file replaces all stored transactions of that kind.
    Batch(BatchArgs),
    /// Delete every transaction.
    Clear,
    /// Show the totals.
    Summary,
    /// Copy the dataset file into the backups directory.
    Backup,
    /// Copy the dataset file somewhere else.
    Download(DownloadArgs),
    /// Push the local data to your Google Sheet, or read it back.
    Sync(SyncArgs),
    /// Serve the HTTP API.
    Serve(ServeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where budget data and configuration is held. Defaults to ~/budget
    #[arg(long, env = "BUDGET_HOME", default_value_t = default_budget_home())]
    budget_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, budget_home: PathBuf) -> Self {
        Self {
            log_level,
            budget_home: budget_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn budget_home(&self) -> &DisplayPath {
        &self.budget_home
    }
}

/// (Not shown): Args for the `budget init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL of the Google Sheet to mirror to. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long, default_value = "")]
    sheet_url: String,

    /// The path to your downloaded OAuth client credentials. This file will be copied to the
    /// default secrets location in the main data directory.
    #[arg(long)]
    client_secret: Option<PathBuf>,
}

impl InitArgs {
    pub fn new(sheet_url: impl Into<String>, client_secret: Option<PathBuf>) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            client_secret,
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn client_secret(&self) -> Option<&Path> {
        self.client_secret.as_deref()
    }
}

/// (Not shown): Args for the `budget auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `budget list` command.
#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    /// Only list transactions of this type.
    #[arg(long = "type", value_enum)]
    kind: Option<RecordKind>,

    /// Only list transactions in this month, e.g. 2024-01
    #[arg(long)]
    month: Option<String>,
}

impl ListArgs {
    pub fn kind(&self) -> Option<RecordKind> {
        self.kind
    }

    pub fn month(&self) -> Option<&str> {
        self.month.as_deref()
    }
}

/// (Not shown): Args for commands that address one transaction.
#[derive(Debug, Parser, Clone)]
pub struct IdArgs {
    /// The ID of the transaction.
    id: u64,
}

impl IdArgs {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// The fields of a transaction. Anything left out keeps its stored value on update, or its
/// default on add.
#[derive(Debug, Parser, Clone, Default)]
pub struct RecordFields {
    /// The amount, e.g. 12.50. Currency symbols and thousands separators are accepted.
    #[arg(long)]
    amount: Option<String>,

    /// The date, YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    date: Option<String>,

    /// The time of day, HH:MM:SS. Defaults to now.
    #[arg(long)]
    time: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    subcategory: Option<String>,

    #[arg(long)]
    description: Option<String>,
}

impl RecordFields {
    /// Builds the input through the same field validation the HTTP API uses.
    fn input(&self, kind: Option<RecordKind>) -> Result<RecordInput> {
        let mut fields = Map::new();
        if let Some(kind) = kind {
            fields.insert("type".into(), Value::String(kind.to_string()));
        }
        for (key, value) in [
            ("amount", &self.amount),
            ("date", &self.date),
            ("time", &self.time),
            ("category", &self.category),
            ("subcategory", &self.subcategory),
            ("description", &self.description),
        ] {
            if let Some(value) = value {
                fields.insert(key.into(), Value::String(value.clone()));
            }
        }
        RecordInput::from_fields(&fields)
    }
}

/// (Not shown): Args for the `budget add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// Income or expense.
    #[arg(long = "type", value_enum)]
    kind: RecordKind,

    #[clap(flatten)]
    fields: RecordFields,
}

impl AddArgs {
    pub fn new(kind: RecordKind, fields: RecordFields) -> Self {
        Self { kind, fields }
    }

    pub fn input(&self) -> Result<RecordInput> {
        self.fields.input(Some(self.kind))
    }
}

/// (Not shown): Args for the `budget update` command.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    /// The ID of the transaction.
    id: u64,

    /// Move the transaction to the other type.
    #[arg(long = "type", value_enum)]
    kind: Option<RecordKind>,

    #[clap(flatten)]
    fields: RecordFields,
}

impl UpdateArgs {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn input(&self) -> Result<RecordInput> {
        self.fields.input(self.kind)
    }
}

/// (Not shown): Args for the `budget batch` command.
#[derive(Debug, Parser, Clone)]
pub struct BatchArgs {
    /// A JSON file holding an array of transactions.
    file: PathBuf,
}

impl BatchArgs {
    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// (Not shown): Args for the `budget download` command.
#[derive(Debug, Parser, Clone)]
pub struct DownloadArgs {
    /// Where to write the copy. Defaults to the dataset file name in the current directory.
    #[arg(long)]
    output: Option<PathBuf>,
}

impl DownloadArgs {
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpDown {
    Up,
    #[default]
    Down,
}

serde_plain::derive_display_from_serialize!(UpDown);
serde_plain::derive_fromstr_from_deserialize!(UpDown);

/// (Not shown): Args for the `budget sync` command.
#[derive(Debug, Parser, Clone)]
pub struct SyncArgs {
    /// The direction to sync: "up" or "down"
    direction: UpDown,

    /// With "down": replace the local income and expense transactions with the ones read from
    /// the sheet. Without it the sheet is only read and shown.
    #[arg(long)]
    apply: bool,
}

impl SyncArgs {
    pub fn new(direction: UpDown, apply: bool) -> Self {
        Self { direction, apply }
    }

    pub fn direction(&self) -> UpDown {
        self.direction
    }

    pub fn apply(&self) -> bool {
        self.apply
    }
}

/// (Not shown): Args for the `budget serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The IP address to listen on. Defaults to the host in config.json.
    #[arg(long)]
    host: Option<String>,

    /// The port to listen on. Defaults to the port in config.json.
    #[arg(long)]
    port: Option<u16>,
}

impl ServeArgs {
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

fn default_budget_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("budget"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --budget-home or BUDGET_HOME instead of relying on the default \
                budget home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("budget")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
