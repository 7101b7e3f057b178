//! stat command - Show data object or collection metadata

use clap::Args;
use irs_core::{Checksum, RemoteObject, Result};
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Show size, modification time and checksum
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Logical path, path relative to the home collection, or irods:// query
    pub path: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    path: String,
    size_bytes: u64,
    size_human: String,
    mtime: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    checksum: Checksum,
}

impl std::fmt::Display for StatOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Path      : {}", self.path)?;
        writeln!(f, "Size      : {} ({} bytes)", self.size_human, self.size_bytes)?;
        match &self.last_modified {
            Some(modified) => writeln!(f, "Modified  : {modified} ({:.3})", self.mtime)?,
            None => writeln!(f, "Modified  : {:.3}", self.mtime)?,
        }
        write!(
            f,
            "Checksum  : {}",
            self.checksum.value().unwrap_or("(not recorded)")
        )
    }
}

/// Execute the stat command
pub async fn execute(args: StatArgs, ctx: &Context) -> ExitCode {
    let object = match ctx.object(&args.path).await {
        Ok(object) => object,
        Err(e) => return ctx.fail(&e),
    };

    match collect(&object).await {
        Ok(output) => {
            ctx.formatter.output(&output);
            ExitCode::Success
        }
        Err(e) => ctx.fail(&e),
    }
}

async fn collect(object: &RemoteObject<'_>) -> Result<StatOutput> {
    let size = object.size().await?;
    let mtime = object.mtime().await?;
    let checksum = object.checksum().await?;
    Ok(StatOutput {
        path: object.path().to_string(),
        size_bytes: size,
        size_human: humansize::format_size(size, humansize::BINARY),
        mtime,
        last_modified: format_epoch(mtime),
        checksum,
    })
}

fn format_epoch(secs: f64) -> Option<String> {
    let duration = SignedDuration::try_from_secs_f64(secs).ok()?;
    let ts = Timestamp::from_duration(duration).ok()?;
    Some(ts.strftime("%Y-%m-%d %H:%M:%S UTC").to_string())
}
