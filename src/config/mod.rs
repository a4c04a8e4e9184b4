//! Settings loading: environment, `.env`, YAML file and command line.
//!
//! Only the binary reads configuration. The enumerator and the scheduler
//! receive the resolved plain values in [`RunConfig`].

mod settings;

pub use settings::{PolicyKind, RunConfig, Settings};
