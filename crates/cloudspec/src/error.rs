//! Errors raised by the typed builders

use std::path::PathBuf;
use thiserror::Error;
use topograph::GraphError;

/// Declaration-evaluation failures in builder code
///
/// Every variant is detectable without touching a cloud account.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Structural graph problem bubbled up from topograph
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A CIDR block failed to parse
    #[error("invalid CIDR '{cidr}': {reason}")]
    InvalidCidr { cidr: String, reason: String },

    /// A subnet mask that cannot be carved out of the parent block
    #[error("subnet mask /{mask} does not fit inside '{cidr}'")]
    InvalidSubnetMask { cidr: String, mask: u8 },

    /// The parent block ran out of address space for the requested subnets
    #[error("address space of '{cidr}' exhausted while carving subnets")]
    SubnetSpaceExhausted { cidr: String },

    /// A VPC was declared without any availability zone
    #[error("VPC '{vpc}' needs at least one availability zone")]
    NoAvailabilityZones { vpc: String },

    /// NAT gateways need a public subnet to live in
    #[error("VPC '{vpc}' requests NAT gateways but configures no public subnet")]
    NatRequiresPublicSubnet { vpc: String },

    /// An instance was pinned to a zone its VPC does not span
    #[error("availability zone '{az}' is not one of VPC '{vpc}'")]
    UnknownAvailabilityZone { az: String, vpc: String },

    /// A placement asked for a subnet class the VPC never configured
    #[error("VPC '{vpc}' configures no '{class}' subnets")]
    SubnetClassNotConfigured { vpc: String, class: &'static str },

    /// The boot payload file could not be read
    ///
    /// Fails evaluation before any resource graph is produced.
    #[error("failed to read user data file '{path}'")]
    UserData {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A listener was given an empty target pool
    #[error("listener '{listener}' has no targets")]
    NoTargets { listener: String },
}
