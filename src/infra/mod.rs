pub mod admission;
pub mod counters;
pub mod metrics;
pub mod rate_budget;

pub use admission::{AdmissionGate, AdmissionPermit};
pub use counters::{CountersSnapshot, MetricsCounters};
pub use rate_budget::RateBudget;
