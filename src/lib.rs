//! Crossbuild core library.
//!
//! Resolves a JSON-with-comments description of toolchains, targets and
//! build configurations, turns the selected configuration into a Ninja
//! build graph and drives Ninja plus any post-build tasks. The
//! [`session`] module exposes the pieces an editor integration needs:
//! target enumeration, change notifications and the hand-off file consumed
//! by the command line tool.

pub mod cli;
pub mod config;
pub mod graph;
pub mod hasher;
pub mod hints;
pub mod ninja_gen;
pub mod runner;
pub mod session;
pub mod sources;
pub mod status;
pub mod substitute;
