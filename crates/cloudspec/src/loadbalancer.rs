//! Traffic distribution - application load balancers and listeners

use crate::compute::Instance;
use crate::error::SpecError;
use crate::network::{SubnetClass, Vpc};
use crate::security::SecurityGroup;
use serde_json::{Value, json};
use topograph::{Construct, LogicalId, ResourceGraph, Scope};

/// Inputs for a load balancer declaration
#[derive(Debug, Clone)]
pub struct ApplicationLoadBalancerProps {
    /// Internet-facing balancers live in the public subnets
    pub internet_facing: bool,
    pub security_group: SecurityGroup,
}

/// Handle to a declared application load balancer
#[derive(Debug, Clone)]
pub struct ApplicationLoadBalancer {
    logical_id: LogicalId,
    local_id: String,
}

impl ApplicationLoadBalancer {
    /// Declare a load balancer placed in `vpc`
    pub fn new(
        scope: &mut Scope<'_>,
        id: &str,
        vpc: &Vpc,
        props: ApplicationLoadBalancerProps,
    ) -> Result<Self, SpecError> {
        let class = if props.internet_facing {
            SubnetClass::Public
        } else {
            SubnetClass::PrivateWithEgress
        };
        vpc.require_class(class)?;
        let subnet_ids: Vec<&LogicalId> =
            vpc.subnets(class).into_iter().map(Construct::node_id).collect();

        let node = scope.add_node(id, "loadbalancer/application")?;
        node.set("internet-facing", json!(props.internet_facing))
            .set_ref("vpc", vpc.node_id())
            .set_ref_list("subnets", &subnet_ids)
            .set_ref("security-group", props.security_group.node_id());

        Ok(Self {
            logical_id: node.logical_id().clone(),
            local_id: id.to_string(),
        })
    }

    /// Declare a listening rule on `port`
    ///
    /// The listener is a child of the balancer; its targets are added
    /// separately once the backing instances exist.
    pub fn add_listener(
        &self,
        scope: &mut Scope<'_>,
        id: &str,
        port: u16,
    ) -> Result<Listener, SpecError> {
        let mut lb_scope = scope.child(&self.local_id)?;
        let node = lb_scope.add_node(id, "loadbalancer/listener")?;
        node.set("port", json!(port))
            .set("protocol", json!("http"))
            .set_ref("load-balancer", &self.logical_id);
        Ok(Listener { logical_id: node.logical_id().clone() })
    }
}

impl Construct for ApplicationLoadBalancer {
    fn node_id(&self) -> &LogicalId {
        &self.logical_id
    }
}

/// Handle to a declared listener
#[derive(Debug, Clone)]
pub struct Listener {
    logical_id: LogicalId,
}

impl Listener {
    /// Set the target pool this listener fans out to
    pub fn add_targets(
        &self,
        scope: &mut Scope<'_>,
        port: u16,
        targets: &[&Instance],
    ) -> Result<(), SpecError> {
        if targets.is_empty() {
            return Err(SpecError::NoTargets { listener: self.logical_id.to_string() });
        }
        let target_ids: Vec<&LogicalId> = targets.iter().map(|t| t.node_id()).collect();
        scope
            .node_mut(&self.logical_id)?
            .set("target-port", json!(port))
            .set_ref_list("targets", &target_ids);
        Ok(())
    }
}

impl Construct for Listener {
    fn node_id(&self) -> &LogicalId {
        &self.logical_id
    }
}

/// Reject any listener that never acquired a target pool
///
/// `add_targets` guards against an empty pool, but a listener the caller
/// simply forgot to point at instances would otherwise render cleanly.
/// Run this after assembly, before the graph is rendered.
pub fn verify_target_pools(graph: &ResourceGraph) -> Result<(), SpecError> {
    for node in graph.nodes() {
        if node.resource_type() != "loadbalancer/listener" {
            continue;
        }
        let populated = matches!(node.property("targets"), Some(Value::Array(t)) if !t.is_empty());
        if !populated {
            return Err(SpecError::NoTargets { listener: node.logical_id().to_string() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{InstanceProps, InstanceType, MachineImage, UserData};
    use crate::network::{SubnetConfiguration, VpcProps};
    use topograph::App;

    fn web_vpc(scope: &mut Scope<'_>) -> Vpc {
        Vpc::new(
            scope,
            "Vpc",
            VpcProps {
                cidr: "10.0.0.0/16".to_string(),
                nat_gateways: 1,
                availability_zones: vec!["zone-a".to_string()],
                subnet_configuration: vec![
                    SubnetConfiguration {
                        name: "Public".to_string(),
                        class: SubnetClass::Public,
                        cidr_mask: 24,
                    },
                    SubnetConfiguration {
                        name: "Egress".to_string(),
                        class: SubnetClass::PrivateWithEgress,
                        cidr_mask: 24,
                    },
                ],
            },
        )
        .unwrap()
    }

    fn instance(scope: &mut Scope<'_>, vpc: &Vpc, id: &str, role_id: &str) -> Instance {
        let sg = SecurityGroup::new(scope, &format!("{id}Sg"), vpc, true).unwrap();
        let role = scope.import(role_id, "iam-role", "some_role").unwrap();
        Instance::new(
            scope,
            id,
            vpc,
            InstanceProps {
                instance_type: InstanceType::of("t2.small"),
                machine_image: MachineImage::AmazonLinux2,
                vpc_subnets: SubnetClass::PrivateWithEgress,
                availability_zone: "zone-a".to_string(),
                security_group: sg,
                user_data: UserData::custom("#!/bin/bash\n"),
                role,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_listener_nests_under_balancer() {
        let mut app = App::new();
        let mut root = app.root();
        let vpc = web_vpc(&mut root);
        let sg = SecurityGroup::new(&mut root, "LbSg", &vpc, true).unwrap();
        let lb = ApplicationLoadBalancer::new(
            &mut root,
            "Lb",
            &vpc,
            ApplicationLoadBalancerProps { internet_facing: true, security_group: sg },
        )
        .unwrap();
        let listener = lb.add_listener(&mut root, "Http", 80).unwrap();

        assert_eq!(listener.node_id().as_str(), "Lb/Http");
        let node = app.graph().node(listener.node_id()).unwrap();
        assert_eq!(node.property("port"), Some(&json!(80)));
    }

    #[test]
    fn test_internet_facing_balancer_uses_public_subnets() {
        let mut app = App::new();
        let mut root = app.root();
        let vpc = web_vpc(&mut root);
        let sg = SecurityGroup::new(&mut root, "LbSg", &vpc, true).unwrap();
        let lb = ApplicationLoadBalancer::new(
            &mut root,
            "Lb",
            &vpc,
            ApplicationLoadBalancerProps { internet_facing: true, security_group: sg },
        )
        .unwrap();

        let node = app.graph().node(lb.node_id()).unwrap();
        assert_eq!(node.property("subnets"), Some(&json!([{ "ref": "Vpc/PublicSubnet1" }])));
    }

    #[test]
    fn test_target_pool_references_instances() {
        let mut app = App::new();
        let mut root = app.root();
        let vpc = web_vpc(&mut root);
        let sg = SecurityGroup::new(&mut root, "LbSg", &vpc, true).unwrap();
        let lb = ApplicationLoadBalancer::new(
            &mut root,
            "Lb",
            &vpc,
            ApplicationLoadBalancerProps { internet_facing: true, security_group: sg },
        )
        .unwrap();
        let listener = lb.add_listener(&mut root, "Http", 80).unwrap();
        let a = instance(&mut root, &vpc, "BoxA", "RoleA");
        let b = instance(&mut root, &vpc, "BoxB", "RoleB");
        listener.add_targets(&mut root, 80, &[&a, &b]).unwrap();

        let node = app.graph().node(listener.node_id()).unwrap();
        assert_eq!(
            node.property("targets"),
            Some(&json!([{ "ref": "BoxA" }, { "ref": "BoxB" }]))
        );
        assert!(node.references().any(|r| r == a.node_id()));
    }

    #[test]
    fn test_empty_target_pool_rejected() {
        let mut app = App::new();
        let mut root = app.root();
        let vpc = web_vpc(&mut root);
        let sg = SecurityGroup::new(&mut root, "LbSg", &vpc, true).unwrap();
        let lb = ApplicationLoadBalancer::new(
            &mut root,
            "Lb",
            &vpc,
            ApplicationLoadBalancerProps { internet_facing: true, security_group: sg },
        )
        .unwrap();
        let listener = lb.add_listener(&mut root, "Http", 80).unwrap();
        let err = listener.add_targets(&mut root, 80, &[]).unwrap_err();
        assert!(matches!(err, SpecError::NoTargets { .. }));
    }

    #[test]
    fn test_targetless_listener_fails_verification() {
        let mut app = App::new();
        let mut root = app.root();
        let vpc = web_vpc(&mut root);
        let sg = SecurityGroup::new(&mut root, "LbSg", &vpc, true).unwrap();
        let lb = ApplicationLoadBalancer::new(
            &mut root,
            "Lb",
            &vpc,
            ApplicationLoadBalancerProps { internet_facing: true, security_group: sg },
        )
        .unwrap();
        lb.add_listener(&mut root, "Http", 80).unwrap();

        let err = verify_target_pools(app.graph()).unwrap_err();
        assert!(matches!(err, SpecError::NoTargets { ref listener } if listener == "Lb/Http"));
    }

    #[test]
    fn test_populated_listener_passes_verification() {
        let mut app = App::new();
        let mut root = app.root();
        let vpc = web_vpc(&mut root);
        let sg = SecurityGroup::new(&mut root, "LbSg", &vpc, true).unwrap();
        let lb = ApplicationLoadBalancer::new(
            &mut root,
            "Lb",
            &vpc,
            ApplicationLoadBalancerProps { internet_facing: true, security_group: sg },
        )
        .unwrap();
        let listener = lb.add_listener(&mut root, "Http", 80).unwrap();
        let a = instance(&mut root, &vpc, "BoxA", "RoleA");
        listener.add_targets(&mut root, 80, &[&a]).unwrap();

        assert!(verify_target_pools(app.graph()).is_ok());
    }
}
