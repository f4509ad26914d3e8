//! Economic stability control loop for a dual-token point economy.

pub mod aggregate;
pub mod collaborators;
pub mod control;
pub mod error;
pub mod logging;
pub mod policy;
pub mod reliability;
pub mod risk;
pub mod state;
pub mod store;
