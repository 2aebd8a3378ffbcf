//! Command line.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{ENV_INSTANCE_ID, INSTANCE_ID};

#[derive(Debug, Parser)]
#[command(version, about = "Image viewer")]
pub struct Args {
    /// Image file to open
    #[arg(short, long = "file", value_name = "PATH", conflicts_with = "path")]
    pub file: Option<PathBuf>,

    /// Image file to open (same as --file)
    #[arg(value_name = "FILE")]
    pub path: Option<PathBuf>,

    /// Token naming the single-instance endpoint
    #[arg(long, value_name = "TOKEN", env = ENV_INSTANCE_ID, default_value = INSTANCE_ID)]
    pub instance_id: String,
}

impl Args {
    /// The file given either as `--file` or positionally.
    #[must_use]
    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref().or(self.path.as_ref())
    }
}
