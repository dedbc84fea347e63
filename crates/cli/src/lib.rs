//! harbinger command-line front end.
//!
//! Everything the binary needs apart from argument parsing: subcommands,
//! terminal presentation, the polling scheduler, signal handling and the
//! bookkeeping for detached monitors.

pub mod commands;
pub mod daemon;
pub mod logging;
pub mod platform;
pub mod scheduler;
pub mod signals;
pub mod ui;
