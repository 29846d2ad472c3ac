pub mod configmaps;
pub mod errors;
pub mod finalizers;
pub mod keys;
pub mod logs;
pub mod metrics;
pub mod secrets;
pub mod telemetry;
