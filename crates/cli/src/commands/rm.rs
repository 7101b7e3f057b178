//! rm command - Remove data objects or collections
//!
//! Collections are removed with everything below them.

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Remove data objects or collections
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Paths to remove
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Ignore paths that do not exist
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<String>,
}

impl std::fmt::Display for RmOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Removed {} path(s)", self.deleted.len())?;
        if !self.failed.is_empty() {
            write!(f, ", {} failed", self.failed.len())?;
        }
        Ok(())
    }
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: &Context) -> ExitCode {
    let mut output = RmOutput {
        status: "success",
        deleted: Vec::new(),
        failed: Vec::new(),
    };
    let mut code = ExitCode::Success;

    for path in &args.paths {
        let object = match ctx.object(path).await {
            Ok(object) => object,
            Err(e) => {
                // Session and configuration problems affect every path
                return ctx.fail(&e);
            }
        };

        match object.remove().await {
            Ok(()) => output.deleted.push(object.path().to_string()),
            Err(e) if e.is_not_found() && args.force => {
                tracing::debug!(path = %object.path(), "Nothing to remove");
            }
            Err(e) => {
                code = ctx.fail(&e);
                output.failed.push(object.path().to_string());
                if code == ExitCode::AuthError || code == ExitCode::NetworkError {
                    break;
                }
            }
        }
    }

    if code != ExitCode::Success {
        output.status = "partial";
    }
    ctx.formatter.output(&output);
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_display() {
        let output = RmOutput {
            status: "partial",
            deleted: vec!["/z/a".into(), "/z/b".into()],
            failed: vec!["/z/c".into()],
        };
        assert_eq!(output.to_string(), "Removed 2 path(s), 1 failed");
    }

    #[test]
    fn test_output_json_omits_empty_failures() {
        let output = RmOutput {
            status: "success",
            deleted: vec!["/z/a".into()],
            failed: Vec::new(),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("failed").is_none());
    }
}
