//! exists command - Check for a data object or collection
//!
//! Exits with 0 when the path exists and 5 when it does not, so scripts can
//! branch on the status alone.

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Check whether a path exists
#[derive(Args, Debug)]
pub struct ExistsArgs {
    /// Logical path, path relative to the home collection, or irods:// query
    pub path: String,
}

#[derive(Debug, Serialize)]
struct ExistsOutput {
    path: String,
    exists: bool,
}

impl std::fmt::Display for ExistsOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.exists {
            write!(f, "{}: exists", self.path)
        } else {
            write!(f, "{}: not found", self.path)
        }
    }
}

/// Execute the exists command
pub async fn execute(args: ExistsArgs, ctx: &Context) -> ExitCode {
    let object = match ctx.object(&args.path).await {
        Ok(object) => object,
        Err(e) => return ctx.fail(&e),
    };

    match object.exists().await {
        Ok(exists) => {
            ctx.formatter.output(&ExistsOutput {
                path: object.path().to_string(),
                exists,
            });
            if exists {
                ExitCode::Success
            } else {
                ExitCode::NotFound
            }
        }
        Err(e) => ctx.fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_display() {
        let output = ExistsOutput {
            path: "/tempZone/home/alice/a.txt".into(),
            exists: false,
        };
        assert_eq!(output.to_string(), "/tempZone/home/alice/a.txt: not found");
    }

    #[test]
    fn test_output_json() {
        let output = ExistsOutput {
            path: "/tempZone/a".into(),
            exists: true,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["exists"], true);
        assert_eq!(json["path"], "/tempZone/a");
    }
}
