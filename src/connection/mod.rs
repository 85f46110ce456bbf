//! Connection machinery: lifecycle state, outbound queue and
//! fragmentation, and the background worker.

pub mod fragmenter;
pub(crate) mod queue;
pub mod state;
pub(crate) mod worker;

pub use fragmenter::Fragmenter;
pub use state::SessionState;
