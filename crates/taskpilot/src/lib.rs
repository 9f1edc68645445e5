pub mod agents;
pub mod bridge;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod packager;
pub mod session;
pub mod task;
pub mod workspace;
