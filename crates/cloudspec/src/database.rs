//! Managed relational database clusters

use crate::error::SpecError;
use crate::network::{SubnetClass, Vpc};
use crate::security::SecurityGroup;
use serde_json::json;
use topograph::{Construct, LogicalId, Scope, SecretRef};

/// Engine family and version of a managed cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseEngine {
    AuroraMysql { version: String },
    AuroraPostgres { version: String },
}

impl DatabaseEngine {
    pub fn aurora_mysql(version: impl Into<String>) -> Self {
        Self::AuroraMysql { version: version.into() }
    }

    pub fn aurora_postgres(version: impl Into<String>) -> Self {
        Self::AuroraPostgres { version: version.into() }
    }

    fn family(&self) -> &'static str {
        match self {
            Self::AuroraMysql { .. } => "aurora-mysql",
            Self::AuroraPostgres { .. } => "aurora-postgres",
        }
    }

    fn version(&self) -> &str {
        match self {
            Self::AuroraMysql { version } | Self::AuroraPostgres { version } => version,
        }
    }
}

/// Database credentials: a username and a named secret reference
///
/// The password is a reference into the engine's secret store. No literal
/// value is representable here.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretRef,
}

impl Credentials {
    pub fn from_secret(username: impl Into<String>, secret: SecretRef) -> Self {
        Self { username: username.into(), password: secret }
    }
}

/// Inputs for a database cluster declaration
#[derive(Debug, Clone)]
pub struct DatabaseClusterProps {
    pub engine: DatabaseEngine,
    pub credentials: Credentials,
    /// Logical database created on first boot
    pub default_database_name: String,
    /// Number of engine instances in the cluster
    pub instances: u32,
    /// Subnet class the cluster is placed in
    pub vpc_subnets: SubnetClass,
    pub security_groups: Vec<SecurityGroup>,
}

/// Handle to a declared database cluster
#[derive(Debug, Clone)]
pub struct DatabaseCluster {
    logical_id: LogicalId,
}

impl DatabaseCluster {
    /// Declare a managed cluster placed in `vpc`
    pub fn new(
        scope: &mut Scope<'_>,
        id: &str,
        vpc: &Vpc,
        props: DatabaseClusterProps,
    ) -> Result<Self, SpecError> {
        vpc.require_class(props.vpc_subnets)?;

        let subnet_ids: Vec<&LogicalId> = vpc
            .subnets(props.vpc_subnets)
            .into_iter()
            .map(Construct::node_id)
            .collect();
        let group_ids: Vec<&LogicalId> =
            props.security_groups.iter().map(Construct::node_id).collect();

        let node = scope.add_node(id, "database/cluster")?;
        node.set(
            "engine",
            json!({
                "family": props.engine.family(),
                "version": props.engine.version(),
            }),
        )
        .set(
            "credentials",
            json!({
                "username": props.credentials.username,
                "password": props.credentials.password.to_value(),
            }),
        )
        .set("default-database", json!(props.default_database_name))
        .set("instances", json!(props.instances))
        .set_ref("vpc", vpc.node_id())
        .set_ref_list("subnets", &subnet_ids)
        .set_ref_list("security-groups", &group_ids);

        Ok(Self { logical_id: node.logical_id().clone() })
    }
}

impl Construct for DatabaseCluster {
    fn node_id(&self) -> &LogicalId {
        &self.logical_id
    }
}
