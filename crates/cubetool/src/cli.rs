use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints the header of the disc and its apploader
    Info,
    /// Lists the files in the filesystem table of the disc
    Files,
    /// Extracts a single file from the disc
    Extract {
        /// Path of the file in the disc, e.g. `/opening.bnr`
        path: String,
        /// Where to write the file to
        out: PathBuf,
    },
    /// Lists the partitions of a Wii disc and where their title metadata is
    Tmd,
}

/// Cubetool: GameCube and Wii disc inspector
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Path to the .iso disc image
    #[arg(short('i'), long)]
    pub disc: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}
