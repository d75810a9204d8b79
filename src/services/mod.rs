pub mod pipeline;
pub mod processing;
pub mod store;
