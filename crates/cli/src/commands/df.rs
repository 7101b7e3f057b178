//! df command - Show free space on a storage resource

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Show free space on a storage resource
#[derive(Args, Debug)]
pub struct DfArgs {
    /// Resource name (default: the configured default resource)
    pub resource: Option<String>,
}

#[derive(Debug, Serialize)]
struct DfOutput {
    resource: String,
    /// None when the catalog does not track free space for the resource
    available_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_human: Option<String>,
}

impl std::fmt::Display for DfOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.available_human, self.available_bytes) {
            (Some(human), Some(bytes)) => {
                write!(f, "{}: {human} free ({bytes} bytes)", self.resource)
            }
            _ => write!(f, "{}: free space unknown", self.resource),
        }
    }
}

/// Execute the df command
pub async fn execute(args: DfArgs, ctx: &Context) -> ExitCode {
    let resource = match args
        .resource
        .or_else(|| ctx.provider.descriptor().resource.clone())
    {
        Some(resource) => resource,
        None => {
            ctx.formatter
                .error("No resource given and no default resource configured");
            return ExitCode::UsageError;
        }
    };

    let session = match ctx.provider.session_manager().get_session().await {
        Ok(session) => session,
        Err(e) => return ctx.fail(&e),
    };

    match session.quota().available_space(&resource).await {
        Ok(available) => {
            ctx.formatter.output(&DfOutput {
                available_human: available
                    .map(|bytes| humansize::format_size(bytes, humansize::BINARY)),
                available_bytes: available,
                resource,
            });
            ExitCode::Success
        }
        Err(e) => ctx.fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_space_display() {
        let output = DfOutput {
            resource: "demoResc".into(),
            available_bytes: None,
            available_human: None,
        };
        assert_eq!(output.to_string(), "demoResc: free space unknown");
        let json = serde_json::to_value(&output).unwrap();
        assert!(json["available_bytes"].is_null());
    }

    #[test]
    fn test_known_space_display() {
        let output = DfOutput {
            resource: "demoResc".into(),
            available_bytes: Some(1 << 30),
            available_human: Some("1 GiB".into()),
        };
        assert_eq!(
            output.to_string(),
            "demoResc: 1 GiB free (1073741824 bytes)"
        );
    }
}
