//! Process lifecycle: OS signals and ordered teardown

mod shutdown;

pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
