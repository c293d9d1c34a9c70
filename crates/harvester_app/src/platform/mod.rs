//! File-backed collaborators and the wiring of one harvest pass.
mod config;
mod media;
mod persistence;
mod run;

pub use config::{load_config, AppConfig};
pub use media::FsMediaStore;
pub use persistence::FsSink;
pub use run::{run_harvest, summary};
