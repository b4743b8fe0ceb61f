use crate::query::Verbosity;
use std::path::PathBuf;

pub enum Command {
    /// The fixed query sequence.
    Run {
        memory: bool,
        seed: bool,
    },
    /// Insert the sample books, or documents from a file.
    Seed {
        file: Option<PathBuf>,
        drop: bool,
    },
    Explain {
        title: String,
        verbosity: Verbosity,
        memory: bool,
    },
    Indexes {
        memory: bool,
    },
}

impl Default for Command {
    fn default() -> Self {
        Self::Run { memory: false, seed: false }
    }
}
