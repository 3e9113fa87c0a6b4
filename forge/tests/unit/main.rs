//! Integration tests for Workflow Forge


mod test_fsm;
mod test_publish;
mod test_server;
