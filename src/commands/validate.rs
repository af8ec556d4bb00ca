//! `cumulo validate` - graph-shape checks over the evaluated declaration
//!
//! These inspect the declaration only; nothing here talks to a cloud
//! account. The checks encode the topology's load-bearing shape: the
//! security-group allow-chain, isolated-subnet occupancy, the zone
//! spread of the web servers, the direction of every ordering edge, and
//! determinism of evaluation.

use crate::config::StackConfig;
use crate::{Context, stack, ui};
use anyhow::{Result, bail};
use serde_json::Value;
use topograph::{App, ResourceNode};

pub fn run(ctx: &Context, config: &StackConfig) -> Result<()> {
    let app = stack::build(config)?;

    if !ctx.quiet {
        ui::header("Validating topology");
        if ctx.verbose > 0 {
            ui::info(&format!(
                "evaluated {} resources, {} externals",
                app.graph().len(),
                app.graph().externals().len()
            ));
        }
    }

    let checks: &[(&str, CheckFn)] = &[
        ("graph is structurally sound (no cycles, all edges resolve)", check_structure),
        ("database accepts inbound from the app policy only", check_database_ingress),
        ("load balancer is open on the http port only", check_lb_ingress),
        ("app policy accepts the load balancer only", check_app_ingress),
        ("web servers share image and size, span distinct zones", check_instances),
        ("isolated subnets host the database cluster only", check_isolated_occupancy),
        ("ordering edges run db -> web servers -> listener", check_ordering_edges),
        ("re-evaluation is byte-identical", check_determinism),
    ];

    let mut failed = 0;
    for (name, check) in checks {
        match check(&app, config) {
            Ok(()) => {
                if !ctx.quiet {
                    ui::check_pass(name);
                }
            }
            Err(reason) => {
                failed += 1;
                ui::check_fail(name, &reason);
            }
        }
    }

    if failed > 0 {
        println!();
        ui::error(&format!("{failed} of {} checks failed", checks.len()));
        bail!("topology validation failed");
    }
    if !ctx.quiet {
        println!();
        ui::success(&format!("all {} checks passed", checks.len()));
    }
    Ok(())
}

type CheckFn = fn(&App, &StackConfig) -> Result<(), String>;

fn check_structure(app: &App, _config: &StackConfig) -> Result<(), String> {
    app.graph().validate().map_err(|e| e.to_string())
}

fn check_database_ingress(app: &App, config: &StackConfig) -> Result<(), String> {
    let cluster = single_node(app, "database/cluster")?;
    let db_sg = first_ref(cluster.property("security-groups"))
        .ok_or("cluster has no security group")?;
    let app_sg = instance_security_group(app)?;

    let rules = ingress_rules(app, &db_sg)?;
    let mut ports: Vec<u64> = Vec::new();
    for rule in &rules {
        let peer = ref_target(&rule["peer"])
            .ok_or_else(|| format!("database rule peer is not a security group: {rule}"))?;
        if peer != app_sg {
            return Err(format!("database allows inbound from '{peer}'"));
        }
        ports.push(rule["port"].as_u64().unwrap_or(0));
    }
    ports.sort_unstable();
    let mut expected = vec![u64::from(config.ports.ssh), u64::from(config.ports.database)];
    expected.sort_unstable();
    if ports == expected { Ok(()) } else { Err(format!("database ports are {ports:?}")) }
}

fn check_lb_ingress(app: &App, config: &StackConfig) -> Result<(), String> {
    let lb = single_node(app, "loadbalancer/application")?;
    let lb_sg = ref_target_opt(lb.property("security-group"))
        .ok_or("load balancer has no security group")?;
    let rules = ingress_rules(app, &lb_sg)?;
    if rules.len() != 1 {
        return Err(format!("expected 1 rule, found {}", rules.len()));
    }
    let rule = &rules[0];
    if rule["peer"] != serde_json::json!({ "any-ipv4": true }) {
        return Err(format!("peer is {}", rule["peer"]));
    }
    if rule["port"] != u64::from(config.ports.http) {
        return Err(format!("port is {}", rule["port"]));
    }
    Ok(())
}

fn check_app_ingress(app: &App, config: &StackConfig) -> Result<(), String> {
    let lb = single_node(app, "loadbalancer/application")?;
    let lb_sg = ref_target_opt(lb.property("security-group"))
        .ok_or("load balancer has no security group")?;
    let app_sg = instance_security_group(app)?;

    let rules = ingress_rules(app, &app_sg)?;
    if rules.len() != 1 {
        return Err(format!("expected 1 rule, found {}", rules.len()));
    }
    let rule = &rules[0];
    match ref_target(&rule["peer"]) {
        Some(peer) if peer == lb_sg => {}
        _ => return Err(format!("peer is {}", rule["peer"])),
    }
    if rule["port"] != u64::from(config.ports.app) {
        return Err(format!("port is {}", rule["port"]));
    }
    Ok(())
}

fn check_instances(app: &App, _config: &StackConfig) -> Result<(), String> {
    let instances = nodes_of_type(app, "compute/instance");
    if instances.len() != 2 {
        return Err(format!("expected 2 instances, found {}", instances.len()));
    }
    let (a, b) = (instances[0], instances[1]);
    if a.property("machine-image") != b.property("machine-image") {
        return Err("machine images differ".to_string());
    }
    if a.property("instance-type") != b.property("instance-type") {
        return Err("instance types differ".to_string());
    }
    if a.property("availability-zone") == b.property("availability-zone") {
        return Err("both instances share one availability zone".to_string());
    }
    Ok(())
}

fn check_isolated_occupancy(app: &App, _config: &StackConfig) -> Result<(), String> {
    let isolated: Vec<&str> = nodes_of_type(app, "network/subnet")
        .into_iter()
        .filter(|n| n.property("class") == Some(&Value::String("isolated".to_string())))
        .map(|n| n.logical_id().as_str())
        .collect();
    if isolated.is_empty() {
        return Err("no isolated subnets declared".to_string());
    }

    for node in app.graph().nodes() {
        let touches_isolated = node
            .references()
            .any(|r| isolated.contains(&r.as_str()));
        if touches_isolated && node.resource_type() != "database/cluster" {
            return Err(format!(
                "'{}' ({}) is placed in an isolated subnet",
                node.logical_id(),
                node.resource_type()
            ));
        }
    }
    Ok(())
}

fn check_ordering_edges(app: &App, _config: &StackConfig) -> Result<(), String> {
    let cluster = single_node(app, "database/cluster")?;
    let listener = single_node(app, "loadbalancer/listener")?;
    let instances = nodes_of_type(app, "compute/instance");
    if instances.len() != 2 {
        return Err(format!("expected 2 instances, found {}", instances.len()));
    }

    for instance in &instances {
        if !instance.depends_on().contains(cluster.logical_id()) {
            return Err(format!("'{}' does not wait for the database", instance.logical_id()));
        }
        if !listener.depends_on().contains(instance.logical_id()) {
            return Err(format!("listener does not wait for '{}'", instance.logical_id()));
        }
        if instance.depends_on().contains(listener.logical_id()) {
            return Err(format!("reversed edge: '{}' waits for listener", instance.logical_id()));
        }
    }
    for instance in &instances {
        if cluster.depends_on().contains(instance.logical_id()) {
            return Err(format!("reversed edge: database waits for '{}'", instance.logical_id()));
        }
    }
    Ok(())
}

fn check_determinism(_app: &App, config: &StackConfig) -> Result<(), String> {
    let once = synth_json(config)?;
    let twice = synth_json(config)?;
    if once == twice { Ok(()) } else { Err("two evaluations differ".to_string()) }
}

fn synth_json(config: &StackConfig) -> Result<String, String> {
    let app = stack::build(config).map_err(|e| e.to_string())?;
    let template = app.synth().map_err(|e| e.to_string())?;
    template.to_json().map_err(|e| e.to_string())
}

// -- graph inspection helpers ------------------------------------------------

fn nodes_of_type<'a>(app: &'a App, resource_type: &str) -> Vec<&'a ResourceNode> {
    app.graph()
        .nodes()
        .iter()
        .filter(|n| n.resource_type() == resource_type)
        .collect()
}

fn single_node<'a>(app: &'a App, resource_type: &str) -> Result<&'a ResourceNode, String> {
    let nodes = nodes_of_type(app, resource_type);
    match nodes.as_slice() {
        [node] => Ok(node),
        other => Err(format!("expected 1 '{resource_type}', found {}", other.len())),
    }
}

/// The security group both instances are attached to
fn instance_security_group(app: &App) -> Result<String, String> {
    let instances = nodes_of_type(app, "compute/instance");
    let mut groups: Vec<String> = instances
        .iter()
        .filter_map(|n| ref_target_opt(n.property("security-group")))
        .collect();
    groups.dedup();
    match groups.as_slice() {
        [group] => Ok(group.clone()),
        _ => Err("instances do not share a single security group".to_string()),
    }
}

fn ingress_rules(app: &App, security_group: &str) -> Result<Vec<Value>, String> {
    let node = app
        .graph()
        .nodes()
        .iter()
        .find(|n| n.logical_id().as_str() == security_group)
        .ok_or_else(|| format!("security group '{security_group}' not found"))?;
    node.property("ingress")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| format!("'{security_group}' has no ingress list"))
}

fn ref_target(value: &Value) -> Option<&str> {
    value.get("ref")?.as_str()
}

fn ref_target_opt(value: Option<&Value>) -> Option<String> {
    value.and_then(ref_target).map(ToString::to_string)
}

fn first_ref(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .and_then(ref_target)
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn stock_app() -> (App, StackConfig, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "#!/bin/bash\n").unwrap();
        let mut config = StackConfig::default();
        config.compute.user_data_path = file.path().to_path_buf();
        let app = stack::build(&config).unwrap();
        (app, config, file)
    }

    #[test]
    fn test_stock_topology_passes_every_check() {
        let (app, config, _file) = stock_app();
        check_structure(&app, &config).unwrap();
        check_database_ingress(&app, &config).unwrap();
        check_lb_ingress(&app, &config).unwrap();
        check_app_ingress(&app, &config).unwrap();
        check_instances(&app, &config).unwrap();
        check_isolated_occupancy(&app, &config).unwrap();
        check_ordering_edges(&app, &config).unwrap();
    }

    #[test]
    fn test_determinism_check_passes_on_stock_config() {
        let (_app, config, _file) = stock_app();
        check_determinism(&_app, &config).unwrap();
    }

    #[test]
    fn test_database_ports_follow_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "#!/bin/bash\n").unwrap();
        let mut config = StackConfig::default();
        config.compute.user_data_path = file.path().to_path_buf();
        config.ports.database = 5432;
        let app = stack::build(&config).unwrap();
        check_database_ingress(&app, &config).unwrap();

        // the check is against the config, so the stock ports must now fail
        let stock = StackConfig::default();
        assert!(check_database_ingress(&app, &stock).is_err());
    }
}
