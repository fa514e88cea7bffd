//! `balanced_gateway`: the NAT instance of one availability zone.

use super::base::{base_template, route_table_association, subnet};
use super::components::{
    allow, dns_statement, instance_profile, instance_role, security_group, SecurityGroupSpec,
};
use crate::render::StorageLayout;
use crate::template::{BuildError, Output, Parameter, Resource, TemplateDef, Value};

/// Catalogue name.
pub const NAME: &str = "balanced_gateway";

/// Gateway template reading its bootstrap objects from `layout`'s buckets.
pub fn template(layout: &StorageLayout) -> Result<TemplateDef, BuildError> {
    let mut def = base_template(NAME, "NAT gateway configuration.")?;
    let objects = layout.objects_arn();

    def.parameter("AvailabilityZone", |_| Ok(Parameter::string().describe("Availability zone.")))?
        .parameter("Cidr", |_| Ok(Parameter::string().describe("CIDR block for this network.")))?
        .parameter("AmiId", |_| Ok(Parameter::string().describe("AMI ID.")))?
        .parameter("PublicRouteTableId", |_| {
            Ok(Parameter::string().describe("Route table to use for public subnet."))
        })?;

    def.resource("Subnet", |scope| subnet(scope, "AvailabilityZone", "Cidr"))?
        .resource("SubnetRouteTableAssociation", |scope| {
            let table = scope.parameter("PublicRouteTableId")?;
            let subnet = scope.resource("Subnet")?;
            Ok(route_table_association(table.reference(), subnet.reference()))
        })?
        .resource("SecurityGroup", |scope| {
            security_group(
                scope,
                "SecurityGroup",
                &SecurityGroupSpec::new("Security group for gateway instance."),
            )
        })?
        .resource("Role", move |_| {
            Ok(instance_role(
                "GatewayInstance",
                vec![allow("s3:GetObject", objects.clone()), dns_statement()],
            ))
        })?
        .resource("InstanceProfile", |scope| {
            let role = scope.resource("Role")?;
            Ok(instance_profile(&role))
        })?
        .resource("GatewayInstance", |scope| {
            let subnet = scope.resource("Subnet")?;
            let zone = subnet
                .as_resource()
                .and_then(|r| r.get("AvailabilityZone"))
                .cloned()
                .unwrap_or(Value::Omit);
            let profile = scope.resource("InstanceProfile")?;
            let ami = scope.parameter("AmiId")?;
            let key_name = scope.parameter("KeyName")?;
            let group = scope.resource("SecurityGroup")?;

            Ok(Resource::new("AWS::EC2::Instance")
                .property("AvailabilityZone", zone)
                .property("IamInstanceProfile", profile.reference())
                .property("ImageId", ami.reference())
                .property("InstanceType", "m1.small")
                .property("KeyName", key_name.reference())
                .property(
                    "NetworkInterfaces",
                    vec![Value::map([
                        ("AssociatePublicIpAddress", Value::from(true)),
                        ("DeviceIndex", "0".into()),
                        ("GroupSet", Value::List(vec![group.reference()])),
                        ("SubnetId", subnet.reference()),
                    ])],
                )
                .property("SourceDestCheck", false))
        })?;

    def.output("Instance", |scope| {
        let instance = scope.resource("GatewayInstance")?;
        Ok(Output::new(instance.reference()).describe("Gateway instance ID."))
    })?
    .output("SecurityGroup", |scope| {
        let group = scope.resource("SecurityGroup")?;
        Ok(Output::new(group.reference()).describe("Gateway security group."))
    })?;

    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Key, Template};

    #[test]
    fn test_instance_reuses_subnet_zone() {
        let def = template(&StorageLayout::default()).unwrap();
        let mut built = Template::new(&def);
        let instance = built.get_or_build(&Key::resource("GatewayInstance")).unwrap();
        assert_eq!(
            instance.as_resource().and_then(|r| r.get("AvailabilityZone")),
            Some(&Value::reference("AvailabilityZone"))
        );
    }

    #[test]
    fn test_gateway_group_has_no_zone_ssh_rules() {
        let def = template(&StorageLayout::default()).unwrap();
        let mut built = Template::new(&def);
        let group = built.get_or_build(&Key::resource("SecurityGroup")).unwrap();
        let Some(Value::List(rules)) = group.as_resource().and_then(|r| r.get("SecurityGroupIngress"))
        else {
            panic!("missing ingress rules");
        };
        assert_eq!(rules.len(), 1);
    }
}
