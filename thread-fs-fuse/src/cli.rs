use std::path::PathBuf;

use clap::{Parser, Subcommand};
use typed_bytesize::ByteSizeIec;

#[derive(Parser)]
pub struct Cli {
    /// Volume image file
    #[arg(long, short)]
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the image and format a fresh volume
    Format {
        /// Volume size, e.g. "512KiB"
        #[arg(long, default_value = "512KiB")]
        size: ByteSizeIec,

        /// Number of inodes the volume will carry
        #[arg(long, default_value_t = 64)]
        inodes: usize,
    },

    /// Copy a host file into the volume
    Push {
        source: PathBuf,

        /// Name inside the volume; defaults to the source file name
        #[arg(long)]
        name: Option<String>,
    },

    /// Write a file from the volume to stdout
    Cat { name: String },

    /// List directory entries
    Ls,

    /// Delete a file
    Rm { name: String },
}
