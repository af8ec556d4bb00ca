//! The declared topology
//!
//! One VPC with public, egress and isolated subnets; a security-group
//! allow-chain (world -> load balancer -> web servers -> database); an
//! Aurora-MySQL cluster in the isolated subnets; two zone-spread web
//! servers booting the same payload under a pre-existing role; an
//! internet-facing load balancer fanning port 80 out to them.
//!
//! The explicit ordering edges at the end are deliberate: attribute
//! references would let the engine infer some of this ordering, but the
//! edges guarantee the database is ready before either web server boots,
//! and both web servers are ready before the listener attaches its
//! targets.

use crate::config::StackConfig;
use anyhow::{Context, Result};
use cloudspec::{
    ApplicationLoadBalancer, ApplicationLoadBalancerProps, Credentials, DatabaseCluster,
    DatabaseClusterProps, DatabaseEngine, Instance, InstanceProps, InstanceType, MachineImage,
    Peer, Port, SecurityGroup, SubnetClass, SubnetConfiguration, UserData, Vpc, VpcProps,
};
use topograph::{App, SecretRef};

/// Evaluate the declaration into an [`App`] holding the resource graph
pub fn build(config: &StackConfig) -> Result<App> {
    // Read the boot payload up front: a missing file must fail evaluation
    // before any resource graph is produced
    let user_data = UserData::from_file(&config.compute.user_data_path)
        .context("boot payload is required at evaluation time")?;

    let mut app = App::new();
    let mut root = app.root();
    let mut stack = root.child(&config.stack_name)?;

    let vpc = Vpc::new(
        &mut stack,
        "MyVpc",
        VpcProps {
            cidr: config.network.cidr.clone(),
            nat_gateways: config.network.nat_gateways,
            availability_zones: config.network.availability_zones.clone(),
            subnet_configuration: vec![
                SubnetConfiguration {
                    name: "Public".to_string(),
                    class: SubnetClass::Public,
                    cidr_mask: config.network.subnet_mask,
                },
                SubnetConfiguration {
                    name: "PrivateWithEgress".to_string(),
                    class: SubnetClass::PrivateWithEgress,
                    cidr_mask: config.network.subnet_mask,
                },
                SubnetConfiguration {
                    name: "Rds".to_string(),
                    class: SubnetClass::Isolated,
                    cidr_mask: config.network.subnet_mask,
                },
            ],
        },
    )?;

    // The allow-chain: world -> lb -> app -> db. These are the only
    // inbound rules anywhere in the stack.
    let lb_sg = SecurityGroup::new(&mut stack, "LbSg", &vpc, true)?;
    let app_sg = SecurityGroup::new(&mut stack, "AppSg", &vpc, true)?;
    let db_sg = SecurityGroup::new(&mut stack, "DbSg", &vpc, true)?;

    lb_sg.add_ingress_rule(&mut stack, Peer::any_ipv4(), Port::tcp(config.ports.http))?;
    app_sg.add_ingress_rule(
        &mut stack,
        Peer::security_group(&lb_sg),
        Port::tcp(config.ports.app),
    )?;
    db_sg.add_ingress_rule(
        &mut stack,
        Peer::security_group(&app_sg),
        Port::tcp(config.ports.database),
    )?;
    db_sg.add_ingress_rule(&mut stack, Peer::security_group(&app_sg), Port::tcp(config.ports.ssh))?;

    let cluster = DatabaseCluster::new(
        &mut stack,
        "Database",
        &vpc,
        DatabaseClusterProps {
            engine: DatabaseEngine::aurora_mysql(config.database.engine_version.clone()),
            credentials: Credentials::from_secret(
                config.database.username.clone(),
                SecretRef::new(config.database.secret_name.clone()),
            ),
            default_database_name: config.database.name.clone(),
            instances: 1,
            vpc_subnets: SubnetClass::Isolated,
            security_groups: vec![db_sg],
        },
    )?;

    // Identity is looked up by name in the target account; the engine
    // does not manage its lifecycle
    let role = stack.import("InstanceRole", "iam-role", &config.compute.role_name)?;

    let zones = &config.network.availability_zones;
    let web_a = Instance::new(
        &mut stack,
        "WebServerA",
        &vpc,
        InstanceProps {
            instance_type: InstanceType::of(config.compute.instance_type.as_str()),
            machine_image: MachineImage::AmazonLinux2,
            vpc_subnets: SubnetClass::PrivateWithEgress,
            availability_zone: zones[0].clone(),
            security_group: app_sg.clone(),
            user_data: user_data.clone(),
            role: role.clone(),
        },
    )?;
    let web_b = Instance::new(
        &mut stack,
        "WebServerB",
        &vpc,
        InstanceProps {
            instance_type: InstanceType::of(config.compute.instance_type.as_str()),
            machine_image: MachineImage::AmazonLinux2,
            vpc_subnets: SubnetClass::PrivateWithEgress,
            availability_zone: zones[1].clone(),
            security_group: app_sg,
            user_data,
            role,
        },
    )?;

    let lb = ApplicationLoadBalancer::new(
        &mut stack,
        "LoadBalancer",
        &vpc,
        ApplicationLoadBalancerProps { internet_facing: true, security_group: lb_sg },
    )?;
    let listener = lb.add_listener(&mut stack, "Listener", config.ports.http)?;
    listener.add_targets(&mut stack, config.ports.http, &[&web_a, &web_b])?;

    // Explicit ordering: database ready before either web server boots,
    // both web servers ready before the listener attaches targets
    stack.add_dependency(&web_a, &cluster)?;
    stack.add_dependency(&web_b, &cluster)?;
    stack.add_dependency(&listener, &web_a)?;
    stack.add_dependency(&listener, &web_b)?;

    cloudspec::verify_target_pools(app.graph())?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use std::io::Write;

    fn test_config() -> (StackConfig, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "#!/bin/bash\nsystemctl start webapp\n").unwrap();
        let mut config = StackConfig::default();
        config.compute.user_data_path = file.path().to_path_buf();
        (config, file)
    }

    #[test]
    fn test_stack_builds_and_validates() {
        let (config, _file) = test_config();
        let app = build(&config).unwrap();
        app.synth().unwrap();
    }

    #[test]
    fn test_missing_payload_fails_before_graph_exists() {
        let mut config = StackConfig::default();
        config.compute.user_data_path = "/nonexistent/userdata.sh".into();
        assert!(build(&config).is_err());
    }

    #[test]
    fn test_logical_ids_are_stable() {
        let (config, _file) = test_config();
        let app = build(&config).unwrap();
        let ids: Vec<&str> =
            app.graph().nodes().iter().map(|n| n.logical_id().as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "WebStack/MyVpc",
                "WebStack/MyVpc/InternetGateway",
                "WebStack/MyVpc/PublicSubnet1",
                "WebStack/MyVpc/PublicSubnet2",
                "WebStack/MyVpc/PrivateWithEgressSubnet1",
                "WebStack/MyVpc/PrivateWithEgressSubnet2",
                "WebStack/MyVpc/RdsSubnet1",
                "WebStack/MyVpc/RdsSubnet2",
                "WebStack/MyVpc/NatGateway1",
                "WebStack/LbSg",
                "WebStack/AppSg",
                "WebStack/DbSg",
                "WebStack/Database",
                "WebStack/WebServerA",
                "WebStack/WebServerB",
                "WebStack/LoadBalancer",
                "WebStack/LoadBalancer/Listener",
            ]
        );
    }

    #[test]
    fn test_exactly_four_ordering_edges() {
        let (config, _file) = test_config();
        let app = build(&config).unwrap();
        let edges: Vec<(String, String)> = app
            .graph()
            .nodes()
            .iter()
            .flat_map(|n| {
                n.depends_on()
                    .iter()
                    .map(|d| (n.logical_id().to_string(), d.to_string()))
            })
            .collect();
        assert_eq!(
            edges,
            vec![
                ("WebStack/WebServerA".to_string(), "WebStack/Database".to_string()),
                ("WebStack/WebServerB".to_string(), "WebStack/Database".to_string()),
                ("WebStack/LoadBalancer/Listener".to_string(), "WebStack/WebServerA".to_string()),
                ("WebStack/LoadBalancer/Listener".to_string(), "WebStack/WebServerB".to_string()),
            ]
        );
    }

    #[test]
    fn test_both_instances_share_payload_bytes() {
        let (config, _file) = test_config();
        let app = build(&config).unwrap();
        let payloads: Vec<_> = app
            .graph()
            .nodes()
            .iter()
            .filter(|n| n.resource_type() == "compute/instance")
            .map(|n| n.property("user-data").cloned().unwrap())
            .collect();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], payloads[1]);
        assert_eq!(payloads[0], serde_json::json!("#!/bin/bash\nsystemctl start webapp\n"));
    }
}
