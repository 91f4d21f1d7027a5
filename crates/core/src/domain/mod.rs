pub mod comparison;
pub mod intent;
pub mod metrics;
