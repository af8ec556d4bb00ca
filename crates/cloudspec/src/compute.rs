//! Compute instances - image, size, placement, boot payload, identity

use crate::error::SpecError;
use crate::network::{SubnetClass, Vpc};
use crate::security::SecurityGroup;
use serde_json::json;
use std::fs;
use std::path::Path;
use topograph::{Construct, ExternalRef, LogicalId, Scope};

/// Instance size class ("t2.small")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceType(String);

impl InstanceType {
    pub fn of(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Machine image an instance boots from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineImage {
    /// Latest Amazon Linux 2, standard edition, HVM, general purpose storage
    AmazonLinux2,
    /// A pinned image id
    Custom { image_id: String },
}

impl MachineImage {
    fn to_value(&self) -> serde_json::Value {
        match self {
            Self::AmazonLinux2 => json!({
                "family": "amazon-linux-2",
                "edition": "standard",
                "virtualization": "hvm",
                "storage": "general-purpose",
            }),
            Self::Custom { image_id } => json!({ "image-id": image_id }),
        }
    }
}

/// Boot-time payload passed to the instance byte-for-byte
///
/// The content is opaque to the declaration; it is read once at
/// evaluation time and embedded as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    content: String,
}

impl UserData {
    pub fn custom(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }

    /// Read the payload from a file; a missing or unreadable file fails
    /// evaluation before any resource graph exists
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SpecError::UserData {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { content })
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Inputs for an instance declaration
#[derive(Debug, Clone)]
pub struct InstanceProps {
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
    /// Subnet class the instance is placed in
    pub vpc_subnets: SubnetClass,
    /// Pinned availability zone; must be one the VPC spans
    pub availability_zone: String,
    pub security_group: SecurityGroup,
    pub user_data: UserData,
    /// Pre-existing identity resolved by name at apply time
    pub role: ExternalRef,
}

/// Handle to a declared compute instance
#[derive(Debug, Clone)]
pub struct Instance {
    logical_id: LogicalId,
    availability_zone: String,
}

impl Instance {
    /// Declare an instance placed in `vpc`
    pub fn new(
        scope: &mut Scope<'_>,
        id: &str,
        vpc: &Vpc,
        props: InstanceProps,
    ) -> Result<Self, SpecError> {
        vpc.require_class(props.vpc_subnets)?;
        vpc.require_zone(&props.availability_zone)?;
        let subnet = vpc
            .subnet_in(props.vpc_subnets, &props.availability_zone)
            .ok_or_else(|| SpecError::UnknownAvailabilityZone {
                az: props.availability_zone.clone(),
                vpc: vpc.node_id().to_string(),
            })?;

        let node = scope.add_node(id, "compute/instance")?;
        node.set("instance-type", json!(props.instance_type.as_str()))
            .set("machine-image", props.machine_image.to_value())
            .set("availability-zone", json!(props.availability_zone))
            .set("user-data", json!(props.user_data.content()))
            .set("role", props.role.to_value())
            .add_reference(props.role.logical_id())
            .set_ref("vpc", vpc.node_id())
            .set_ref("subnet", subnet.node_id())
            .set_ref("security-group", props.security_group.node_id());

        Ok(Self {
            logical_id: node.logical_id().clone(),
            availability_zone: props.availability_zone,
        })
    }

    pub fn availability_zone(&self) -> &str {
        &self.availability_zone
    }
}

impl Construct for Instance {
    fn node_id(&self) -> &LogicalId {
        &self.logical_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{SubnetConfiguration, VpcProps};
    use std::io::Write;
    use topograph::App;

    fn egress_vpc(scope: &mut Scope<'_>) -> Vpc {
        Vpc::new(
            scope,
            "Vpc",
            VpcProps {
                cidr: "10.0.0.0/16".to_string(),
                nat_gateways: 1,
                availability_zones: vec!["zone-a".to_string(), "zone-b".to_string()],
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

    fn props(scope: &mut Scope<'_>, sg: SecurityGroup, az: &str) -> InstanceProps {
        InstanceProps {
            instance_type: InstanceType::of("t2.small"),
            machine_image: MachineImage::AmazonLinux2,
            vpc_subnets: SubnetClass::PrivateWithEgress,
            availability_zone: az.to_string(),
            security_group: sg,
            user_data: UserData::custom("#!/bin/bash\n"),
            role: scope.import("Role", "iam-role", "ec2_instance_role").unwrap(),
        }
    }

    #[test]
    fn test_instance_pinned_to_zone_subnet() {
        let mut app = App::new();
        let mut root = app.root();
        let vpc = egress_vpc(&mut root);
        let sg = SecurityGroup::new(&mut root, "Sg", &vpc, true).unwrap();
        let p = props(&mut root, sg, "zone-b");
        let instance = Instance::new(&mut root, "Box", &vpc, p).unwrap();

        let node = app.graph().node(instance.node_id()).unwrap();
        assert_eq!(node.property("subnet"), Some(&json!({ "ref": "Vpc/EgressSubnet2" })));
        assert_eq!(node.property("availability-zone"), Some(&json!("zone-b")));
    }

    #[test]
    fn test_unknown_zone_rejected() {
        let mut app = App::new();
        let mut root = app.root();
        let vpc = egress_vpc(&mut root);
        let sg = SecurityGroup::new(&mut root, "Sg", &vpc, true).unwrap();
        let p = props(&mut root, sg, "zone-z");
        let err = Instance::new(&mut root, "Box", &vpc, p).unwrap_err();
        assert!(matches!(err, SpecError::UnknownAvailabilityZone { .. }));
    }

    #[test]
    fn test_user_data_read_byte_for_byte() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "#!/bin/bash\nyum install -y httpd\n").unwrap();
        let user_data = UserData::from_file(file.path()).unwrap();
        assert_eq!(user_data.content(), "#!/bin/bash\nyum install -y httpd\n");
    }

    #[test]
    fn test_missing_user_data_file_fails_evaluation() {
        let err = UserData::from_file("/nonexistent/userdata.sh").unwrap_err();
        assert!(matches!(err, SpecError::UserData { .. }));
    }

    #[test]
    fn test_role_is_external_reference() {
        let mut app = App::new();
        let mut root = app.root();
        let vpc = egress_vpc(&mut root);
        let sg = SecurityGroup::new(&mut root, "Sg", &vpc, true).unwrap();
        let p = props(&mut root, sg, "zone-a");
        let role_id = p.role.logical_id().clone();
        let instance = Instance::new(&mut root, "Box", &vpc, p).unwrap();

        assert!(app.graph().is_external(&role_id));
        let node = app.graph().node(instance.node_id()).unwrap();
        assert_eq!(node.property("role"), Some(&json!({ "external": "Role" })));
    }
}
