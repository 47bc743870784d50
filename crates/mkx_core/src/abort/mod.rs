//! Cooperative cancellation.

mod controller;

pub use controller::{AbortController, AbortScope};
