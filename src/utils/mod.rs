//! Utility modules: logger setup, developer log sink, JSON conversion, numeric helpers.
pub mod devlog;
pub mod json;
pub mod logger;
pub mod num;
