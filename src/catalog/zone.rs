//! `balanced_az`: network layout of a single availability zone.

use super::base::{base_template, route_table_association, stack_link, subnet};
use super::gateway;
use crate::template::{BuildError, Output, Parameter, Resource, TemplateDef};

/// Catalogue name.
pub const NAME: &str = "balanced_az";

/// Private networks every zone carves out, as `(name, CIDR parameter)`.
const NETWORKS: [(&str, &str); 3] = [
    ("Production", "ProductionCidr"),
    ("Test", "TestCidr"),
    ("Misc", "MiscCidr"),
];

/// Zone template embedding one gateway stack.
pub fn template() -> Result<TemplateDef, BuildError> {
    let mut def = base_template(NAME, "Network configuration for a single Availability Zone.")?;

    def.parameter("AvailabilityZone", |_| Ok(Parameter::string().describe("Availability zone.")))?
        .parameter("GatewayCidr", |_| {
            Ok(Parameter::string().describe("CIDR block for gateway subnet."))
        })?;
    for (network, cidr) in NETWORKS {
        let description = format!("CIDR block for {} subnet.", network.to_lowercase());
        def.parameter(cidr, move |_| Ok(Parameter::string().describe(description.clone())))?;
    }
    def.parameter("AmiId", |_| Ok(Parameter::string().describe("AMI ID for gateway instances.")))?
        .parameter("PublicRouteTableId", |_| {
            Ok(Parameter::string().describe("Route table to use for public subnet."))
        })?;

    def.nested_stack("Gateway", gateway::NAME, |scope| {
        let ami = scope.parameter("AmiId")?;
        let zone = scope.parameter("AvailabilityZone")?;
        let cidr = scope.parameter("GatewayCidr")?;
        let table = scope.parameter("PublicRouteTableId")?;
        Ok(stack_link(scope)?
            .bind("AmiId", ami.reference())
            .bind("AvailabilityZone", zone.reference())
            .bind("Cidr", cidr.reference())
            .bind("PublicRouteTableId", table.reference()))
    })?;

    def.resource("RouteTable", |scope| {
        let vpc = scope.parameter("VpcId")?;
        Ok(Resource::new("AWS::EC2::RouteTable").property("VpcId", vpc.reference()))
    })?
    .resource("GatewayRoute", |scope| {
        let table = scope.resource("RouteTable")?;
        let gateway = scope.stack("Gateway")?;
        Ok(Resource::new("AWS::EC2::Route")
            .property("RouteTableId", table.reference())
            .property("DestinationCidrBlock", "0.0.0.0/0")
            .property("InstanceId", gateway.output("Instance")))
    })?;

    for (network, cidr) in NETWORKS {
        let subnet_id = format!("{network}Subnet");
        let assoc_id = format!("{network}RouteAssoc");
        def.resource(&subnet_id, move |scope| subnet(scope, "AvailabilityZone", cidr))?;
        let target = subnet_id.clone();
        def.resource(&assoc_id, move |scope| {
            let table = scope.resource("RouteTable")?;
            let subnet = scope.resource(&target)?;
            Ok(route_table_association(table.reference(), subnet.reference()))
        })?;
    }

    def.output("GatewaySecurityGroup", |scope| {
        let gateway = scope.stack("Gateway")?;
        Ok(Output::new(gateway.output("SecurityGroup"))
            .describe("Security group ID for the gateway."))
    })?;
    for (network, _) in NETWORKS {
        let name = format!("{network}Subnet");
        let subnet_id = name.clone();
        let description = format!("Subnet ID for the {} network.", network.to_lowercase());
        def.output(&name, move |scope| {
            let subnet = scope.resource(&subnet_id)?;
            Ok(Output::new(subnet.reference()).describe(description.clone()))
        })?;
    }

    Ok(def)
}
