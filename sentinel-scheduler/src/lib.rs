//! Background site checker: probes due sites on a fixed tick and records
//! the results through the repositories in `sentinel-core`.

pub mod probe;
pub mod scheduler;

pub use probe::{HttpProber, ProbeOutcome, Prober};
pub use scheduler::{CheckScheduler, TickReport};
