//! Subcommand implementations for the `apuntes` binary

pub mod generate;
pub mod serve;

pub use generate::generate;
pub use serve::serve;
