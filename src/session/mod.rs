//! Session coordination: the single decision point for mode arbitration

mod coordinator;
mod worker;

pub use coordinator::{SessionCoordinator, SessionMsg};
