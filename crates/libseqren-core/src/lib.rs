pub mod config;
pub mod error;
pub mod renamer;

pub use config::{load_config, save_config, SeqrenConfig};
pub use error::SeqrenError;
pub use renamer::{
    calculate_padding, execute_plan, rename_files, RenameFailure, RenamePlan, RenameReport,
};
