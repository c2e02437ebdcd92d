use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "playd", version, about = "Background music player for a local playlist")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a music file, a folder, or an HTTP(S) URL to the playlist
    Add {
        /// File path, folder path, or URL
        source: String,
    },

    /// Remove a song by its playlist number or file name
    Remove {
        /// 1-based playlist number or exact file name
        selector: String,
    },

    /// Show the current playlist
    Playlist,

    /// Start playing the playlist as a background process
    Run {
        /// Shuffle the playlist before playing
        #[arg(long, short)]
        shuffle: bool,

        /// Use a specific output device by substring match
        #[arg(long)]
        device: Option<String>,
    },

    /// Show whether the player is running
    Status,

    /// Stop the running player after the current song finishes
    Stop,

    /// Detached player process entry point
    #[command(hide = true)]
    Player {
        #[arg(long, short)]
        shuffle: bool,

        #[arg(long)]
        device: Option<String>,
    },
}
