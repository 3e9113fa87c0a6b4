//! Git publishing: branch, commit and pull request

pub mod fsm;
pub mod orchestrator;

pub use fsm::{PublishEvent, PublishFsm, PublishState};
pub use orchestrator::{PublishMode, PublishPlan, Publisher, DEFAULT_OPERATION_TIMEOUT};
