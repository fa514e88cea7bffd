//! Parameters and nested stack defaults every catalogue template shares.

use crate::template::{
    BuildError, Key, NestedStackLink, Parameter, Resource, Scope, TemplateDef, Value,
};

/// Key pair installed on instances unless a stack overrides it.
pub const DEFAULT_KEY_NAME: &str = "cloudformation";

/// Definition declaring `VpcId` and `KeyName`.
pub fn base_template(name: &str, description: &str) -> Result<TemplateDef, BuildError> {
    let mut def = TemplateDef::new(name).with_description(description);
    def.parameter("VpcId", |_| Ok(Parameter::string().describe("VPC ID.")))?
        .parameter("KeyName", |_| {
            Ok(Parameter::string()
                .with_default(DEFAULT_KEY_NAME)
                .describe("SSH key name."))
        })?;
    Ok(def)
}

/// Nested stack link pre-bound with the template's VPC and key name.
///
/// The VPC comes from the `VpcId` parameter when the template declares one
/// and from its own `Vpc` resource otherwise.
pub fn stack_link(scope: &mut Scope<'_>) -> Result<NestedStackLink, BuildError> {
    let vpc = match scope.find(&Key::parameter("VpcId"))? {
        Some(parameter) => parameter,
        None => scope.resource("Vpc")?,
    };
    let key_name = scope.parameter("KeyName")?;
    Ok(NestedStackLink::new()
        .bind("VpcId", vpc.reference())
        .bind("KeyName", key_name.reference()))
}

/// Subnet in `availability_zone` carved from `cidr`.
pub fn subnet(
    scope: &mut Scope<'_>,
    availability_zone: &str,
    cidr: &str,
) -> Result<Resource, BuildError> {
    let vpc = scope.parameter("VpcId")?;
    let zone = scope.parameter(availability_zone)?;
    let cidr = scope.parameter(cidr)?;
    Ok(Resource::new("AWS::EC2::Subnet")
        .property("VpcId", vpc.reference())
        .property("AvailabilityZone", zone.reference())
        .property("CidrBlock", cidr.reference()))
}

/// Association of `subnet` with `route_table`, both given as values.
pub fn route_table_association(route_table: Value, subnet: Value) -> Resource {
    Resource::new("AWS::EC2::SubnetRouteTableAssociation")
        .property("RouteTableId", route_table)
        .property("SubnetId", subnet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Definition, Template};

    #[test]
    fn test_stack_link_prefers_vpc_parameter() {
        let mut def = base_template("child_host", "host").unwrap();
        def.resource("Vpc", |_| Ok(Resource::new("AWS::EC2::VPC"))).unwrap();
        def.nested_stack("Child", "child", stack_link).unwrap();

        let mut template = Template::new(&def);
        let node = template.get_or_build(&Key::stack("Child")).unwrap();
        let Definition::NestedStack(link) = node.definition() else {
            panic!("expected a nested stack");
        };
        assert_eq!(link.parameters.get("VpcId"), Some(&Value::reference("VpcId")));
        assert_eq!(link.parameters.get("KeyName"), Some(&Value::reference("KeyName")));
    }

    #[test]
    fn test_stack_link_falls_back_to_vpc_resource() {
        let mut def = base_template("region_like", "host").unwrap();
        assert!(def.remove(&Key::parameter("VpcId")));
        def.resource("Vpc", |_| Ok(Resource::new("AWS::EC2::VPC"))).unwrap();
        def.nested_stack("Child", "child", stack_link).unwrap();

        let mut template = Template::new(&def);
        let node = template.get_or_build(&Key::stack("Child")).unwrap();
        let Definition::NestedStack(link) = node.definition() else {
            panic!("expected a nested stack");
        };
        assert_eq!(link.parameters.get("VpcId"), Some(&Value::reference("Vpc")));
    }
}
