//! Caty Common Library
//!
//! Shared building blocks for the Caty bridge between a PLC variable table
//! (the *source*) and a robot controller's I/O signal table (the *target*).
//!
//! # Module Structure
//!
//! - [`mapping`] - Mapping file grammar and the ordered directive table
//! - [`codec`] - Width tags and value coercion between both sides
//! - [`link`] - `SourceSystem` / `TargetSystem` collaborator traits
//! - [`report`] - Per-cycle log entries and reports
//! - [`config`] - TOML configuration loading and validation
//! - [`consts`] - Defaults shared by all crates
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use caty_common::mapping::{Direction, MappingTable};
//!
//! let table = MappingTable::parse_str("r# MAIN.bTrig: DI_Start[1]\n");
//! assert_eq!(table.len(), 1);
//! assert_eq!(table.directives()[0].direction, Direction::SourceToTarget);
//! ```

pub mod codec;
pub mod config;
pub mod consts;
pub mod link;
pub mod mapping;
pub mod prelude;
pub mod report;
