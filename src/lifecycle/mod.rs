//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (App::listen / App::serve):
//!     Freeze routes → Build dispatcher → Bind listener → Accept traffic
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain in-flight requests → Return
//!
//! Signals (signals.rs):
//!     SIGINT / SIGTERM → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Route table is frozen before the listener is bound
//! - Shutdown is cooperative: in-flight requests finish

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
