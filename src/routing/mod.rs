//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     path string ("/user/:id?name&age")
//!     → pattern.rs (strip query declaration, normalize, compile segments)
//!     → table.rs (create entry or merge method handlers)
//!     → files.rs feeds the same table from a directory tree
//!
//! Route Compilation (before serving):
//!     RouteTable
//!     → expand optional segments into matcher paths
//!     → insert into radix tree
//!     → Freeze as immutable RouteSnapshot
//!
//! Incoming Request (path)
//!     → RouteSnapshot::resolve
//!     → Return: RouteEntry + params, or no match
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Static segments take priority over parameters, parameters over wildcards
//! - Deterministic: same input always matches same route

pub mod files;
pub mod pattern;
pub mod table;

pub use files::{LoadError, LoadReport, ModuleLoader, ModuleRegistry, RouteFile, RouteModule};
pub use pattern::{PathPattern, PatternError, Segment};
pub use table::{RouteEntry, RouteError, RouteMatch, RouteSnapshot, RouteTable};
