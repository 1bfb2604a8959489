pub mod api;
pub mod metrics;
pub mod runs;
pub mod state;
