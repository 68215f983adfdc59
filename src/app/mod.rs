mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod types;
mod view;

#[cfg(test)]
mod tests;

pub use orchestrator::PoetryCamApp;
pub use types::{AppCommand, ShutdownReason};
pub use view::StatusView;
