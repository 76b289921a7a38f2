//! Domain models shared by the flows and the cloud layer

pub mod resources;
pub mod tags;
