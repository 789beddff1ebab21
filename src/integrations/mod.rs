//! External collaborators: device listing and privileged command execution

pub mod devices;
pub mod runner;
