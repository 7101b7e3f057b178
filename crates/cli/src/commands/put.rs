//! put command - Upload a file or directory
//!
//! Missing collections along the remote path are created. Existing data
//! objects are overwritten.

use std::path::PathBuf;

use clap::Args;

use super::{Context, TransferOutput};
use crate::exit_code::ExitCode;
use crate::output::Spinner;

/// Upload a file or directory
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file or directory
    pub local: PathBuf,

    /// Remote destination; a trailing '/' uploads into that collection
    pub remote: String,
}

/// Execute the put command
pub async fn execute(args: PutArgs, ctx: &Context) -> ExitCode {
    let remote = match remote_target(&args.remote, &args.local) {
        Some(remote) => remote,
        None => {
            ctx.formatter.error(&format!(
                "Cannot derive a remote name from '{}'",
                args.local.display()
            ));
            return ExitCode::UsageError;
        }
    };
    let object = match ctx.object(&remote).await {
        Ok(object) => object,
        Err(e) => return ctx.fail(&e),
    };

    let spinner = Spinner::new(
        ctx.formatter.config(),
        &format!("Uploading {}", args.local.display()),
    );
    let result = object.upload(&args.local).await;
    spinner.finish_and_clear();

    match result {
        Ok(summary) => {
            ctx.formatter.output(&TransferOutput::new(
                args.local.display().to_string(),
                object.path().to_string(),
                summary,
            ));
            ExitCode::Success
        }
        Err(e) => ctx.fail(&e),
    }
}

fn remote_target(remote: &str, local: &std::path::Path) -> Option<String> {
    if !remote.ends_with('/') {
        return Some(remote.to_string());
    }
    let name = local.file_name()?.to_str()?;
    Some(format!("{remote}{name}"))
}
