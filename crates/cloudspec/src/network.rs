//! Network topology - VPC, subnet classes, gateways
//!
//! A VPC carves its address block into one subnet per (configuration x zone)
//! pair, in declaration order, so subnet CIDRs are a pure function of the
//! declaration. Routing policy is fixed by subnet class: public subnets
//! route out through the internet gateway, egress subnets only through a
//! shared NAT gateway, isolated subnets have no outbound route at all.

use crate::error::SpecError;
use serde_json::json;
use std::net::Ipv4Addr;
use topograph::{Construct, LogicalId, Scope};

/// Routing policy class of a subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetClass {
    /// Internet-facing: routable from and to the internet
    Public,
    /// Outbound-only: reaches the internet through a shared NAT gateway
    PrivateWithEgress,
    /// No internet route in either direction
    Isolated,
}

impl SubnetClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::PrivateWithEgress => "private-with-egress",
            Self::Isolated => "isolated",
        }
    }
}

/// One subnet group to replicate across every availability zone
#[derive(Debug, Clone)]
pub struct SubnetConfiguration {
    /// Name prefix for the per-zone subnets ("Public" -> "PublicSubnet1")
    pub name: String,
    pub class: SubnetClass,
    /// Prefix length of each carved subnet
    pub cidr_mask: u8,
}

/// Inputs for a VPC declaration
#[derive(Debug, Clone)]
pub struct VpcProps {
    pub cidr: String,
    /// Shared NAT gateways serving the egress subnets (capped at one per
    /// availability zone)
    pub nat_gateways: u32,
    pub availability_zones: Vec<String>,
    pub subnet_configuration: Vec<SubnetConfiguration>,
}

/// Handle to one declared subnet
#[derive(Debug, Clone)]
pub struct Subnet {
    logical_id: LogicalId,
    class: SubnetClass,
    availability_zone: String,
    cidr: String,
}

impl Subnet {
    pub fn class(&self) -> SubnetClass {
        self.class
    }

    pub fn availability_zone(&self) -> &str {
        &self.availability_zone
    }

    pub fn cidr(&self) -> &str {
        &self.cidr
    }
}

impl Construct for Subnet {
    fn node_id(&self) -> &LogicalId {
        &self.logical_id
    }
}

/// Handle to a declared VPC and its subnets
#[derive(Debug, Clone)]
pub struct Vpc {
    logical_id: LogicalId,
    availability_zones: Vec<String>,
    subnets: Vec<Subnet>,
}

impl Vpc {
    /// Declare a VPC with its subnets and gateways under `scope`
    pub fn new(scope: &mut Scope<'_>, id: &str, props: VpcProps) -> Result<Self, SpecError> {
        if props.availability_zones.is_empty() {
            return Err(SpecError::NoAvailabilityZones { vpc: id.to_string() });
        }
        let (base, prefix) = parse_cidr(&props.cidr)?;

        let vpc_id = scope
            .add_node(id, "network/vpc")?
            .set("cidr", json!(props.cidr))
            .logical_id()
            .clone();
        let mut vpc_scope = scope.child(id)?;

        let has_public = props
            .subnet_configuration
            .iter()
            .any(|c| c.class == SubnetClass::Public);
        if props.nat_gateways > 0 && !has_public {
            return Err(SpecError::NatRequiresPublicSubnet { vpc: id.to_string() });
        }

        let igw_id = if has_public {
            let node = vpc_scope.add_node("InternetGateway", "network/internet-gateway")?;
            node.set_ref("vpc", &vpc_id);
            Some(node.logical_id().clone())
        } else {
            None
        };

        // Carve subnets: configuration order outer, zone order inner
        let mut cursor = u64::from(base);
        let space_end = u64::from(base) + block_size(prefix);
        let mut subnets = Vec::new();
        for config in &props.subnet_configuration {
            if config.cidr_mask <= prefix || config.cidr_mask > 28 {
                return Err(SpecError::InvalidSubnetMask {
                    cidr: props.cidr.clone(),
                    mask: config.cidr_mask,
                });
            }
            for (zone_index, az) in props.availability_zones.iter().enumerate() {
                let size = block_size(config.cidr_mask);
                // Align the cursor in case earlier subnets were smaller
                let start = cursor.div_ceil(size) * size;
                if start + size > space_end {
                    return Err(SpecError::SubnetSpaceExhausted { cidr: props.cidr.clone() });
                }
                cursor = start + size;

                let cidr = format_cidr(start as u32, config.cidr_mask);
                let child_id = format!("{}Subnet{}", config.name, zone_index + 1);
                let node = vpc_scope.add_node(&child_id, "network/subnet")?;
                node.set("availability-zone", json!(az))
                    .set("cidr", json!(cidr))
                    .set("class", json!(config.class.as_str()))
                    .set_ref("vpc", &vpc_id);
                subnets.push(Subnet {
                    logical_id: node.logical_id().clone(),
                    class: config.class,
                    availability_zone: az.clone(),
                    cidr,
                });
            }
        }

        // NAT gateways live in the public subnets, one per zone at most
        let nat_count = (props.nat_gateways as usize).min(props.availability_zones.len());
        let mut nat_ids = Vec::new();
        for nat_index in 0..nat_count {
            let az = &props.availability_zones[nat_index];
            let public = subnets
                .iter()
                .find(|s| s.class == SubnetClass::Public && &s.availability_zone == az)
                .ok_or_else(|| SpecError::NatRequiresPublicSubnet { vpc: id.to_string() })?
                .logical_id
                .clone();
            let node =
                vpc_scope.add_node(&format!("NatGateway{}", nat_index + 1), "network/nat-gateway")?;
            node.set_ref("vpc", &vpc_id).set_ref("subnet", &public);
            nat_ids.push(node.logical_id().clone());
        }

        // Outbound routes per class; isolated subnets get none
        for subnet in &subnets {
            match subnet.class {
                SubnetClass::Public => {
                    if let Some(igw) = &igw_id {
                        vpc_scope
                            .node_mut(&subnet.logical_id)?
                            .set_ref("outbound-route", igw);
                    }
                }
                SubnetClass::PrivateWithEgress => {
                    if !nat_ids.is_empty() {
                        let zone_index = props
                            .availability_zones
                            .iter()
                            .position(|z| z == &subnet.availability_zone)
                            .unwrap_or(0);
                        let nat = &nat_ids[zone_index % nat_ids.len()];
                        vpc_scope
                            .node_mut(&subnet.logical_id)?
                            .set_ref("outbound-route", nat);
                    }
                }
                SubnetClass::Isolated => {}
            }
        }

        Ok(Self {
            logical_id: vpc_id,
            availability_zones: props.availability_zones,
            subnets,
        })
    }

    pub fn availability_zones(&self) -> &[String] {
        &self.availability_zones
    }

    /// Subnets of one class, in declaration order
    pub fn subnets(&self, class: SubnetClass) -> Vec<&Subnet> {
        self.subnets.iter().filter(|s| s.class == class).collect()
    }

    /// The subnet of `class` pinned to `az`, if the VPC has one
    pub fn subnet_in(&self, class: SubnetClass, az: &str) -> Option<&Subnet> {
        self.subnets
            .iter()
            .find(|s| s.class == class && s.availability_zone == az)
    }

    pub fn has_class(&self, class: SubnetClass) -> bool {
        self.subnets.iter().any(|s| s.class == class)
    }

    pub(crate) fn require_class(&self, class: SubnetClass) -> Result<(), SpecError> {
        if self.has_class(class) {
            Ok(())
        } else {
            Err(SpecError::SubnetClassNotConfigured {
                vpc: self.logical_id.to_string(),
                class: class.as_str(),
            })
        }
    }

    pub(crate) fn require_zone(&self, az: &str) -> Result<(), SpecError> {
        if self.availability_zones.iter().any(|z| z == az) {
            Ok(())
        } else {
            Err(SpecError::UnknownAvailabilityZone {
                az: az.to_string(),
                vpc: self.logical_id.to_string(),
            })
        }
    }
}

impl Construct for Vpc {
    fn node_id(&self) -> &LogicalId {
        &self.logical_id
    }
}

fn parse_cidr(cidr: &str) -> Result<(u32, u8), SpecError> {
    let err = |reason: &str| SpecError::InvalidCidr {
        cidr: cidr.to_string(),
        reason: reason.to_string(),
    };
    let (addr, prefix) = cidr.split_once('/').ok_or_else(|| err("missing prefix length"))?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| err("bad address"))?;
    let prefix: u8 = prefix.parse().map_err(|_| err("bad prefix length"))?;
    if !(8..=28).contains(&prefix) {
        return Err(err("prefix length must be between 8 and 28"));
    }
    let base = u32::from(addr);
    if u64::from(base) % block_size(prefix) != 0 {
        return Err(err("host bits set"));
    }
    Ok((base, prefix))
}

fn block_size(prefix: u8) -> u64 {
    1u64 << (32 - u32::from(prefix))
}

fn format_cidr(base: u32, prefix: u8) -> String {
    format!("{}/{prefix}", Ipv4Addr::from(base))
}
