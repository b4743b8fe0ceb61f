mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::run_with_format;
pub use util::{parse_output_mode, parse_verbosity, summarize};
