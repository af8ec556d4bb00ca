//! Access policies - security groups and their ingress rules
//!
//! A security group is a stateful inbound allow-list. Rules are recorded
//! in authored order; a peer may be an address range or another security
//! group, which turns the rule set into an allow-chain.

use crate::error::SpecError;
use crate::network::Vpc;
use serde_json::{Value, json};
use topograph::{Construct, LogicalId, Scope};

/// Transport protocol of an allowed flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// A single allowed port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    protocol: Protocol,
    number: u16,
}

impl Port {
    pub fn tcp(number: u16) -> Self {
        Self { protocol: Protocol::Tcp, number }
    }

    pub fn udp(number: u16) -> Self {
        Self { protocol: Protocol::Udp, number }
    }

    pub fn number(self) -> u16 {
        self.number
    }
}

/// Source of an allowed inbound flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    /// Any IPv4 address
    AnyIpv4,
    /// A literal address range
    Ipv4(String),
    /// Traffic from resources attached to another security group
    SecurityGroup(LogicalId),
}

impl Peer {
    pub fn any_ipv4() -> Self {
        Self::AnyIpv4
    }

    pub fn ipv4(cidr: impl Into<String>) -> Self {
        Self::Ipv4(cidr.into())
    }

    pub fn security_group(group: &SecurityGroup) -> Self {
        Self::SecurityGroup(group.node_id().clone())
    }

    fn to_value(&self) -> Value {
        match self {
            Self::AnyIpv4 => json!({ "any-ipv4": true }),
            Self::Ipv4(cidr) => json!({ "cidr": cidr }),
            Self::SecurityGroup(id) => topograph::reference(id),
        }
    }
}

/// Handle to a declared security group
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    logical_id: LogicalId,
}

impl SecurityGroup {
    /// Declare a security group attached to `vpc`
    pub fn new(
        scope: &mut Scope<'_>,
        id: &str,
        vpc: &Vpc,
        allow_all_outbound: bool,
    ) -> Result<Self, SpecError> {
        let node = scope.add_node(id, "network/security-group")?;
        node.set("allow-all-outbound", json!(allow_all_outbound))
            .set("ingress", json!([]))
            .set_ref("vpc", vpc.node_id());
        Ok(Self { logical_id: node.logical_id().clone() })
    }

    /// Allow an inbound flow from `peer` on `port`
    pub fn add_ingress_rule(
        &self,
        scope: &mut Scope<'_>,
        peer: Peer,
        port: Port,
    ) -> Result<(), SpecError> {
        let rule = json!({
            "peer": peer.to_value(),
            "protocol": port.protocol.as_str(),
            "port": port.number,
        });
        let node = scope.node_mut(&self.logical_id)?;
        if let Peer::SecurityGroup(source) = &peer {
            node.add_reference(source);
        }
        let mut rules = node
            .property("ingress")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        rules.push(rule);
        node.set("ingress", Value::Array(rules));
        Ok(())
    }
}

impl Construct for SecurityGroup {
    fn node_id(&self) -> &LogicalId {
        &self.logical_id
    }
}
