//! Git module
//!
//! Repository references, location parsing, clone planning and host key
//! registration

pub mod known_hosts;
pub mod location;
pub mod plan;
pub mod reference;

pub use known_hosts::KnownHostsRegistrar;
pub use location::SshLocation;
pub use plan::{CloneCommand, ClonePlan, CloneStep};
pub use reference::{BaseTree, ExecutionTarget, RepositoryReference};
