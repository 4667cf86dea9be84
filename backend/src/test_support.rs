//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for `cfg(test)` and behind the `test-support` feature.

pub mod clock;
pub mod harness;

pub use clock::MutableClock;
pub use harness::{Harness, RecordingNotifier, RecordingRenderer};
