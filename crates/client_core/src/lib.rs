//! Client side of the person collection: a view-model that keeps a displayed
//! list in step with the backend by re-querying after every mutation.

pub mod controller;
pub mod error;
pub mod transport;

pub use controller::{ControllerConfig, ControllerEvent, PersonController, UpdateStrategy};
pub use error::ClientError;
pub use transport::{Endpoint, HttpPersonTransport, PersonTransport};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
