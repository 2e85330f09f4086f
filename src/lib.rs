//! Toad - extract inline style templates into virtual stylesheet modules.
//!
//! A host bundler drives [`pipeline::Pipeline`] through its hooks; `toad`
//! (the binary) drives it against the filesystem.

pub mod logger;

pub mod address;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod entry;
pub mod export;
pub mod extract;
pub mod host;
pub mod ident;
pub mod pipeline;
pub mod registry;
pub mod reload;
pub mod stylesheet;
pub mod utils;
