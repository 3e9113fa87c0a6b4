//! Service layer

pub mod workflow;

pub use workflow::WorkflowService;
