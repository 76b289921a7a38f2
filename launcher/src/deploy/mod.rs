//! Provisioning and teardown flows

pub mod docker;
pub mod drain;
pub mod fsm;
pub mod provision;
pub mod teardown;
