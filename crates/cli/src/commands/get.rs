//! get command - Download a data object or collection
//!
//! Missing local directories are created and existing files overwritten.

use std::path::{Path, PathBuf};

use clap::Args;
use irs_core::LogicalPath;

use super::{Context, TransferOutput};
use crate::exit_code::ExitCode;
use crate::output::Spinner;

/// Download a data object or collection
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Remote path, path relative to the home collection, or irods:// query
    pub remote: String,

    /// Local destination (default: the remote name in the current directory)
    pub local: Option<PathBuf>,
}

/// Execute the get command
pub async fn execute(args: GetArgs, ctx: &Context) -> ExitCode {
    let object = match ctx.object(&args.remote).await {
        Ok(object) => object,
        Err(e) => return ctx.fail(&e),
    };
    let target = local_target(args.local, object.path());

    let spinner = Spinner::new(
        ctx.formatter.config(),
        &format!("Downloading {}", object.path()),
    );
    let result = object.download(&target).await;
    spinner.finish_and_clear();

    match result {
        Ok(summary) => {
            ctx.formatter.output(&TransferOutput::new(
                object.path().to_string(),
                target.display().to_string(),
                summary,
            ));
            ExitCode::Success
        }
        Err(e) => ctx.fail(&e),
    }
}

fn local_target(local: Option<PathBuf>, remote: &LogicalPath) -> PathBuf {
    let name = remote.file_name().unwrap_or(".");
    match local {
        Some(local) if local.is_dir() => local.join(name),
        Some(local) => local,
        None => Path::new(".").join(name),
    }
}
