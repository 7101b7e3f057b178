//! config command - Show or write the irs configuration
//!
//! `show` resolves the connection settings without connecting, so it is the
//! quickest way to see which layer a value came from.

use clap::Subcommand;
use irs_core::{
    Config, ConfigManager, ConnectionDescriptor, CredentialResolver, StorageSettings,
};
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved connection settings (secrets are not printed)
    Show,

    /// Save the current connection flags to the configuration file
    Init,

    /// Print the configuration file location
    Path,
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    host: String,
    port: u16,
    zone: String,
    user: Option<String>,
    home: String,
    resource: Option<String>,
    authentication_scheme: String,
    auth: &'static str,
    ssl_enabled: bool,
    ssl_verify: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssl_ca_file: Option<String>,
    client_server_policy: String,
    api_url: String,
    connect_timeout_ms: u128,
    read_timeout_ms: u128,
}

impl ConfigOutput {
    fn from_descriptor(descriptor: &ConnectionDescriptor) -> irs_core::Result<Self> {
        Ok(Self {
            host: descriptor.host.clone(),
            port: descriptor.port,
            zone: descriptor.zone.clone(),
            user: descriptor.user.clone(),
            home: descriptor.home_collection()?.to_string(),
            resource: descriptor.resource.clone(),
            authentication_scheme: descriptor.authentication_scheme.clone(),
            auth: descriptor.auth.kind(),
            ssl_enabled: descriptor.tls.enabled,
            ssl_verify: descriptor.tls.verify.to_string(),
            ssl_ca_file: descriptor
                .tls
                .ca_file
                .as_ref()
                .map(|p| p.display().to_string()),
            client_server_policy: descriptor.tls.client_server_policy.clone(),
            api_url: irs_http::tls::base_url(descriptor)?,
            connect_timeout_ms: descriptor.connect_timeout.as_millis(),
            read_timeout_ms: descriptor.read_timeout.as_millis(),
        })
    }
}

impl std::fmt::Display for ConfigOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Host       : {}:{}", self.host, self.port)?;
        writeln!(f, "Zone       : {}", self.zone)?;
        writeln!(f, "User       : {}", self.user.as_deref().unwrap_or("-"))?;
        writeln!(f, "Home       : {}", self.home)?;
        writeln!(f, "Resource   : {}", self.resource.as_deref().unwrap_or("-"))?;
        writeln!(
            f,
            "Auth       : {} ({})",
            self.authentication_scheme, self.auth
        )?;
        if self.ssl_enabled {
            writeln!(f, "TLS        : on, verify {}", self.ssl_verify)?;
        } else {
            writeln!(f, "TLS        : off")?;
        }
        write!(f, "API        : {}", self.api_url)
    }
}

/// Execute a config subcommand
pub fn execute(
    command: ConfigCommands,
    manager: &ConfigManager,
    mut config: Config,
    settings: StorageSettings,
    formatter: &Formatter,
) -> ExitCode {
    match command {
        ConfigCommands::Show => {
            let output = CredentialResolver::new()
                .resolve(&settings)
                .and_then(|descriptor| ConfigOutput::from_descriptor(&descriptor));
            match output {
                Ok(output) => {
                    formatter.output(&output);
                    ExitCode::Success
                }
                Err(e) => {
                    formatter.error(&e.to_string());
                    ExitCode::from_error(&e)
                }
            }
        }
        ConfigCommands::Init => {
            config.settings = settings;
            match manager.save(&config) {
                Ok(()) => {
                    formatter.success(&format!(
                        "Configuration written to {}",
                        manager.config_path().display()
                    ));
                    ExitCode::Success
                }
                Err(e) => {
                    formatter.error(&format!("Failed to save configuration: {e}"));
                    ExitCode::from_error(&e)
                }
            }
        }
        ConfigCommands::Path => {
            let path = manager.config_path().display().to_string();
            if formatter.is_json() {
                formatter.json(&serde_json::json!({ "path": path }));
            } else {
                println!("{path}");
            }
            ExitCode::Success
        }
    }
}
