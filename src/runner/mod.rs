//! Script execution under the resolved invocation

mod driver;

pub use driver::{execute, Invocation, Outcome};
