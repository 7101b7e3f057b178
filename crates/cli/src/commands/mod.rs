//! CLI command definitions and execution
//!
//! Every command that talks to the catalog shares one `StorageProvider`, and
//! with it one session, which is shut down before the process exits.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use irs_core::{
    ConfigManager, Error, LogicalPath, RemoteObject, Result, Secret, SslVerify, StorageProvider,
    StorageSettings, TransferSummary, parse_query,
};
use irs_http::HttpConnector;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod completions;
mod config;
mod df;
mod exists;
mod get;
mod put;
mod rm;
mod stat;

/// irs - iRODS storage client
///
/// Inspect and transfer data objects and collections in an iRODS zone.
/// Connection settings come from the flags, the irs config file and the
/// iRODS environment file, in that order of precedence.
#[derive(Parser, Debug)]
#[command(name = "irs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress display
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection settings; each overrides the config file and environment file
#[derive(Args, Debug, Default, Clone)]
#[command(next_help_heading = "Connection")]
pub struct ConnectionArgs {
    /// Catalog host name
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Catalog port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// User name
    #[arg(long, global = true, env = "IRODS_USER_NAME")]
    pub user: Option<String>,

    /// Password
    #[arg(long, global = true, env = "IRODS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Pre-issued authentication token
    #[arg(long, global = true)]
    pub auth_token: Option<String>,

    /// Zone name
    #[arg(long, global = true)]
    pub zone: Option<String>,

    /// Home collection; relative paths resolve against it
    #[arg(long, global = true)]
    pub home: Option<String>,

    /// Default storage resource for uploads
    #[arg(long, global = true)]
    pub resource: Option<String>,

    /// Authentication scheme (native, pam_password, ...)
    #[arg(long, global = true)]
    pub authentication_scheme: Option<String>,

    /// Connect over TLS
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    pub ssl_enabled: Option<bool>,

    /// Server certificate verification: none, cert or hostname
    #[arg(long, global = true, value_parser = parse_ssl_verify)]
    pub ssl_verify: Option<SslVerify>,

    /// Additional trusted CA certificates (PEM)
    #[arg(long, global = true)]
    pub ssl_ca_file: Option<PathBuf>,

    /// iRODS environment file to read instead of the default
    #[arg(long, global = true)]
    pub environment_file: Option<PathBuf>,

    /// Client-server negotiation request
    #[arg(long, global = true)]
    pub client_server_negotiation: Option<String>,

    /// Client-server negotiation policy
    #[arg(long, global = true)]
    pub client_server_policy: Option<String>,

    /// Encryption algorithm for parallel transfers
    #[arg(long, global = true)]
    pub encryption_algorithm: Option<String>,

    /// Encryption key size
    #[arg(long, global = true)]
    pub encryption_key_size: Option<u32>,

    /// Encryption hash rounds
    #[arg(long, global = true)]
    pub encryption_num_hash_rounds: Option<u32>,

    /// Encryption salt size
    #[arg(long, global = true)]
    pub encryption_salt_size: Option<u32>,

    /// Connect timeout in milliseconds
    #[arg(long, global = true)]
    pub connect_timeout_ms: Option<u64>,

    /// Read timeout in milliseconds
    #[arg(long, global = true)]
    pub read_timeout_ms: Option<u64>,

    /// Port of the iRODS HTTP API
    #[arg(long, global = true)]
    pub api_port: Option<u16>,

    /// Base path of the iRODS HTTP API
    #[arg(long, global = true)]
    pub api_base_path: Option<String>,
}

impl ConnectionArgs {
    /// The explicit settings layer given on the command line
    pub fn into_settings(self) -> StorageSettings {
        StorageSettings {
            host: self.host,
            port: self.port,
            user: self.user,
            password: self.password.map(Secret::new),
            auth_token: self.auth_token.map(Secret::new),
            zone: self.zone,
            home: self.home,
            resource: self.resource,
            authentication_scheme: self.authentication_scheme,
            ssl_enabled: self.ssl_enabled,
            ssl_verify: self.ssl_verify,
            ssl_ca_file: self.ssl_ca_file,
            environment_file_path: self.environment_file,
            client_server_negotiation: self.client_server_negotiation,
            client_server_policy: self.client_server_policy,
            encryption_algorithm: self.encryption_algorithm,
            encryption_key_size: self.encryption_key_size,
            encryption_num_hash_rounds: self.encryption_num_hash_rounds,
            encryption_salt_size: self.encryption_salt_size,
            connect_timeout_ms: self.connect_timeout_ms,
            read_timeout_ms: self.read_timeout_ms,
            api_port: self.api_port,
            api_base_path: self.api_base_path,
        }
    }
}

fn parse_ssl_verify(value: &str) -> std::result::Result<SslVerify, String> {
    value.parse().map_err(|e: Error| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Remote(RemoteCommands),

    /// Show or write the irs configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Commands that need a catalog session
#[derive(Subcommand, Debug)]
pub enum RemoteCommands {
    /// Check whether a data object or collection exists
    Exists(exists::ExistsArgs),

    /// Show size, modification time and checksum
    Stat(stat::StatArgs),

    /// Download a data object or collection
    Get(get::GetArgs),

    /// Upload a file or directory
    Put(put::PutArgs),

    /// Remove data objects or collections
    Rm(rm::RmArgs),

    /// Show free space on a storage resource
    Df(df::DfArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let config_manager = match ConfigManager::new() {
        Ok(manager) => manager,
        Err(e) => {
            Formatter::default().error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };
    let config = match config_manager.load() {
        Ok(config) => config,
        Err(e) => {
            Formatter::default().error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    let output_config = OutputConfig::from_flags(
        cli.json,
        cli.no_color,
        cli.no_progress,
        cli.quiet,
        &config.defaults,
    );
    let formatter = Formatter::new(output_config);
    let settings = config
        .settings
        .clone()
        .overlay(cli.connection.into_settings());

    match cli.command {
        Commands::Completions(args) => completions::execute(args),
        Commands::Config(command) => {
            config::execute(command, &config_manager, config, settings, &formatter)
        }
        Commands::Remote(command) => execute_remote(command, &settings, formatter).await,
    }
}

async fn execute_remote(
    command: RemoteCommands,
    settings: &StorageSettings,
    formatter: Formatter,
) -> ExitCode {
    let provider = match StorageProvider::new(settings, Arc::new(HttpConnector::new())) {
        Ok(provider) => provider,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };
    let ctx = Context {
        provider,
        formatter,
    };

    // The session is closed on interrupt too
    let code = tokio::select! {
        code = dispatch(command, &ctx) => code,
        _ = tokio::signal::ctrl_c() => {
            ctx.formatter.warning("Interrupted");
            ExitCode::Interrupted
        }
    };

    if let Err(e) = ctx.provider.shutdown().await {
        tracing::warn!(error = %e, "Failed to close iRODS session");
    }
    code
}

async fn dispatch(command: RemoteCommands, ctx: &Context) -> ExitCode {
    match command {
        RemoteCommands::Exists(args) => exists::execute(args, ctx).await,
        RemoteCommands::Stat(args) => stat::execute(args, ctx).await,
        RemoteCommands::Get(args) => get::execute(args, ctx).await,
        RemoteCommands::Put(args) => put::execute(args, ctx).await,
        RemoteCommands::Rm(args) => rm::execute(args, ctx).await,
        RemoteCommands::Df(args) => df::execute(args, ctx).await,
    }
}

/// State shared by the remote commands
pub struct Context {
    pub provider: StorageProvider,
    pub formatter: Formatter,
}

impl Context {
    /// Resolve a command line path
    ///
    /// Accepts `irods://zone/path` queries, absolute logical paths, and paths
    /// relative to the home collection.
    pub fn resolve(&self, arg: &str) -> Result<LogicalPath> {
        if arg.contains("://") {
            return parse_query(arg);
        }
        let home = self.provider.descriptor().home_collection()?;
        LogicalPath::resolve(arg, Some(&home))
    }

    /// Reference a remote object, connecting on first use
    pub async fn object(&self, arg: &str) -> Result<RemoteObject<'_>> {
        let path = self.resolve(arg)?;
        let session = self.provider.session_manager().get_session().await?;
        Ok(session.object(path))
    }

    /// Report an error and map it to an exit code
    pub fn fail(&self, error: &Error) -> ExitCode {
        self.formatter.error(&error.to_string());
        ExitCode::from_error(error)
    }
}

/// Result of a download or upload
#[derive(Debug, Serialize)]
pub(crate) struct TransferOutput {
    pub status: &'static str,
    pub source: String,
    pub target: String,
    pub files: usize,
    pub size_bytes: u64,
    pub size_human: String,
}

impl TransferOutput {
    pub(crate) fn new(source: String, target: String, summary: TransferSummary) -> Self {
        Self {
            status: "success",
            source,
            target,
            files: summary.files,
            size_bytes: summary.bytes,
            size_human: humansize::format_size(summary.bytes, humansize::BINARY),
        }
    }
}

impl std::fmt::Display for TransferOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let noun = if self.files == 1 { "file" } else { "files" };
        write!(
            f,
            "{} -> {} ({} {noun}, {})",
            self.source, self.target, self.files, self.size_human
        )
    }
}
