use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "seqren",
    about = "Rename files to 01, 02, ... in order, collecting paths from concurrent launches",
    version
)]
pub struct Cli {
    /// Files to rename (absolute paths)
    #[arg(value_name = "FILE", allow_hyphen_values = true)]
    pub files: Vec<PathBuf>,

    /// Show the channel endpoint and the running leader, then exit
    #[arg(long, conflicts_with_all = ["files", "init_config"])]
    pub status: bool,

    /// Write a config file with the default settings if none exists, then exit
    #[arg(long, conflicts_with = "files")]
    pub init_config: bool,
}

impl Cli {
    /// Arguments as absolute UTF-8 path strings, in argument order.
    ///
    /// Paths that are not valid UTF-8 cannot travel over the channel and are
    /// dropped with a warning.
    pub fn paths(&self) -> Vec<String> {
        let cwd = std::env::current_dir().ok();
        self.files
            .iter()
            .filter_map(|p| {
                let absolute = absolutize(p, cwd.as_deref());
                match absolute.to_str() {
                    Some(s) => Some(s.to_string()),
                    None => {
                        warn!(path = %absolute.display(), "Skipping non UTF-8 path");
                        None
                    }
                }
            })
            .collect()
    }
}

fn absolutize(path: &Path, cwd: Option<&Path>) -> PathBuf {
    match cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    }
}
