//! Daemon runtime: the power-event loop and one-shot status commands.

pub mod power_loop;
pub mod status;

pub use power_loop::{Collaborators, PowerEventLoop};
