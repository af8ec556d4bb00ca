//! # Cloudspec
//!
//! Typed builders for declaring a cloud topology on top of
//! [`topograph`].
//!
//! Each builder takes an explicit `&mut Scope` parent handle, registers
//! the graph nodes it owns, and returns a cheap handle for wiring later
//! declarations to it. Nothing talks to a cloud account: the output is a
//! resource graph for an external reconciliation engine.
//!
//! ## Building blocks
//!
//! - [`Vpc`]: an address block carved into per-zone subnets of three
//!   routing classes (public, egress-only, isolated)
//! - [`SecurityGroup`]: a stateful inbound allow-list; peers may be
//!   address ranges or other groups
//! - [`DatabaseCluster`]: a managed relational cluster with
//!   secret-reference credentials
//! - [`Instance`]: a compute node with image, size, pinned zone, opaque
//!   boot payload and an external identity role
//! - [`ApplicationLoadBalancer`] / [`Listener`]: traffic distribution
//!   into a pool of instances

pub mod compute;
pub mod database;
pub mod error;
pub mod loadbalancer;
pub mod network;
pub mod security;

// Re-export main types at crate root
pub use compute::{Instance, InstanceProps, InstanceType, MachineImage, UserData};
pub use database::{Credentials, DatabaseCluster, DatabaseClusterProps, DatabaseEngine};
pub use error::SpecError;
pub use loadbalancer::{
    ApplicationLoadBalancer, ApplicationLoadBalancerProps, Listener, verify_target_pools,
};
pub use network::{Subnet, SubnetClass, SubnetConfiguration, Vpc, VpcProps};
pub use security::{Peer, Port, Protocol, SecurityGroup};
