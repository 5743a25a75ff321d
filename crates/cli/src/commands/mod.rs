use std::io::Write as _;

use clap::{Args, Parser, Subcommand};
use futures::TryStreamExt as _;
use shelter::{
    bson::{self, Bson, Document},
    AnimalShelter,
    ConfigKey,
    ConnectionArgs,
    DocumentStream,
    ShelterError,
};

/// Command handlers for the shelter CLI.
///
/// Each submodule parses the arguments of one subcommand and calls the
/// matching `AnimalShelter` operation.
/// Create command module.
mod create;
/// Delete command module.
mod delete;
/// Next-rec-num command module.
mod next_rec_num;
/// Read command module.
mod read;
/// Update command module.
mod update;

/// The CLI for the animal shelter collection.
///
/// Connection settings may be given as flags or through `SHELTER_*`
/// environment variables. Anything left unset falls back to the library
/// defaults, except the password, which is required.
#[derive(Parser)]
#[command(name = "shelter-cli", version)]
pub struct Cli {
    #[command(subcommand)]
    /// The subcommand to execute.
    pub command: Commands,

    /// Connection settings shared by every subcommand.
    #[command(flatten)]
    pub connection: ConnectionOpts,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (can be used multiple times: -v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Connection flags. Only the flags actually supplied are passed on, so the
/// library's defaults apply to the rest.
#[derive(Args, Clone, Default)]
pub struct ConnectionOpts {
    /// Database user
    #[arg(long, env = "SHELTER_USERNAME", global = true)]
    pub username:    Option<String>,
    /// Database password
    #[arg(long, env = "SHELTER_PASSWORD", hide_env_values = true, global = true)]
    pub password:    Option<String>,
    /// Server host name or address
    #[arg(long, env = "SHELTER_HOST", global = true)]
    pub host:        Option<String>,
    /// Server port
    #[arg(long, env = "SHELTER_PORT", global = true)]
    pub port:        Option<String>,
    /// Database holding the collection
    #[arg(long, env = "SHELTER_DATABASE", global = true)]
    pub database:    Option<String>,
    /// Collection name
    #[arg(long, env = "SHELTER_COLLECTION", global = true)]
    pub collection:  Option<String>,
    /// Database to authenticate against (default: the target database)
    #[arg(long, env = "SHELTER_AUTH_SOURCE", global = true)]
    pub auth_source: Option<String>,
}

impl ConnectionOpts {
    /// Converts the supplied flags into named connection arguments.
    pub fn to_args(&self) -> ConnectionArgs {
        [
            (ConfigKey::Username, &self.username),
            (ConfigKey::Password, &self.password),
            (ConfigKey::Host, &self.host),
            (ConfigKey::Port, &self.port),
            (ConfigKey::Database, &self.database),
            (ConfigKey::Collection, &self.collection),
            (ConfigKey::AuthSource, &self.auth_source),
        ]
        .into_iter()
        .fold(ConnectionArgs::new(), |args, (key, value)| {
            match *value {
                Some(ref value) => args.named(key, value.as_str()),
                None => args,
            }
        })
    }
}

/// Enumeration of all available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Insert one document or a JSON array of documents.
    ///
    /// Each inserted document receives the next rec_num.
    Create(create::CreateArgs),
    /// Print every document matching a filter, one JSON document per line.
    Read(read::ReadArgs),
    /// Set fields on every document matching a filter.
    Update(update::UpdateArgs),
    /// Delete every document matching a filter.
    Delete(delete::DeleteArgs),
    /// Print the rec_num the next created document would receive.
    NextRecNum,
}

/// Execute the specified CLI command.
///
/// Connects to the collection described by the connection flags, then
/// dispatches to the command handler.
pub async fn run_command(cli: Cli) -> shelter::Result<()> {
    let shelter = AnimalShelter::connect(&cli.connection.to_args()).await?;

    match cli.command {
        Commands::Create(args) => create::run(&shelter, args).await,
        Commands::Read(args) => read::run(&shelter, args).await,
        Commands::Update(args) => update::run(&shelter, args).await,
        Commands::Delete(args) => delete::run(&shelter, args).await,
        Commands::NextRecNum => next_rec_num::run(&shelter).await,
    }
}

/// Parses a JSON object given on the command line into a BSON document.
///
/// `what` names the argument in the error message.
pub fn parse_document(text: &str, what: &str) -> shelter::Result<Document> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    match bson::to_bson(&value)? {
        Bson::Document(doc) => Ok(doc),
        other => {
            Err(ShelterError::ConfigError {
                message: format!(
                    "{} must be a JSON object, found {:?}",
                    what,
                    other.element_type()
                ),
            })
        },
    }
}

/// Writes each document of `stream` to `out` as one line of relaxed extended
/// JSON, returning how many were written.
pub async fn write_documents<W>(mut stream: DocumentStream, out: &mut W) -> shelter::Result<usize>
where
    W: std::io::Write,
{
    let mut written = 0_usize;
    while let Some(doc) = stream.try_next().await? {
        writeln!(out, "{}", Bson::Document(doc).into_relaxed_extjson())?;
        written = written.saturating_add(1);
    }
    out.flush()?;
    Ok(written)
}

/// Writes a single value followed by a newline to stdout.
pub fn write_line<T>(value: T) -> shelter::Result<()>
where
    T: std::fmt::Display,
{
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", value)?;
    Ok(())
}

/// Writes an affected-document count to stdout.
pub fn write_count(count: u64) -> shelter::Result<()> { write_line(count) }
