//! `balanced_region`: the VPC of a whole region and everything in it.
//!
//! The region owns its VPC, so unlike every other template it has no `VpcId`
//! parameter; nested stacks receive a reference to the `Vpc` resource.

use super::apps;
use super::base::{base_template, stack_link};
use super::components::ZONES;
use super::zone;
use crate::template::{
    BuildError, Key, Mapping, NestedStackLink, NodeRef, Parameter, Pseudo, Resource, Scope,
    TemplateDef, Value,
};

/// Catalogue name.
pub const NAME: &str = "balanced_region";

/// Gateway AMI for each region the catalogue deploys to.
pub const REGION_AMIS: [(&str, &str); 3] = [
    ("us-west-1", "ami-dac4f89f"),
    ("us-west-2", "ami-3e167a0e"),
    ("us-east-1", "ami-21898948"),
];

/// Address blocks inside `10.<Ip>.0.0/16`, as the text after the second octet.
const NETWORKS: [(&str, &str); 13] = [
    ("Vpc", ".0.0/16"),
    ("GatewayA", ".0.0/28"),
    ("GatewayB", ".0.16/28"),
    ("GatewayC", ".0.32/28"),
    ("ProductionA", ".16.0/20"),
    ("ProductionB", ".32.0/20"),
    ("ProductionC", ".64.0/20"),
    ("TestA", ".80.0/20"),
    ("TestB", ".96.0/20"),
    ("TestC", ".112.0/20"),
    ("MiscA", ".128.0/20"),
    ("MiscB", ".144.0/20"),
    ("MiscC", ".160.0/20"),
];

/// CIDR of network `name` with the second octet taken from the `Ip` parameter.
fn cidr(scope: &mut Scope<'_>, name: &str) -> Result<Value, BuildError> {
    let ip = scope.parameter("Ip")?;
    let tail = NETWORKS
        .iter()
        .find(|(network, _)| *network == name)
        .map(|(_, tail)| *tail)
        .ok_or_else(|| BuildError::MissingConfiguration {
            template: scope.template_name().to_string(),
            setting: format!("network {name}"),
        })?;
    Ok(Value::join([Value::from("10."), ip.reference(), Value::from(tail)]))
}

fn region_ami(scope: &mut Scope<'_>) -> Result<Value, BuildError> {
    let map = scope.mapping("RegionMap")?;
    Ok(map.lookup(Pseudo::Region, "AmiId"))
}

fn zone_stack(scope: &mut Scope<'_>, letter: char) -> Result<NestedStackLink, BuildError> {
    let table = scope.resource("PublicRouteTable")?;
    let attachment = scope.resource("GatewayAttachment")?;
    let dhcp = scope.resource("DhcpOptionsAssociation")?;
    let mut link = stack_link(scope)?
        .bind("PublicRouteTableId", table.reference())
        .bind(
            "AvailabilityZone",
            Value::join([
                Value::pseudo(Pseudo::Region),
                Value::from(letter.to_ascii_lowercase().to_string()),
            ]),
        );
    for network in ["Gateway", "Production", "Test", "Misc"] {
        let block = cidr(scope, &format!("{network}{letter}"))?;
        link = link.bind(format!("{network}Cidr"), block);
    }
    Ok(link
        .bind("AmiId", region_ami(scope)?)
        .depends_on(attachment.logical_id())
        .depends_on(dhcp.logical_id()))
}

fn zones(scope: &mut Scope<'_>) -> Result<Vec<(char, NodeRef)>, BuildError> {
    let mut zones = Vec::with_capacity(ZONES.len());
    for letter in ZONES {
        zones.push((letter, scope.stack(&format!("Zone{letter}"))?));
    }
    Ok(zones)
}

/// Region template embedding the three zones and the docs application.
pub fn template() -> Result<TemplateDef, BuildError> {
    let mut def = base_template(NAME, "Template for a whole AWS region.")?;
    def.remove(&Key::parameter("VpcId"));

    def.parameter("Ip", |_| {
        Ok(Parameter::string()
            .with_default("5")
            .describe("Second octet to use for VPC subnets."))
    })?
    .mapping("RegionMap", |_| {
        Ok(REGION_AMIS
            .iter()
            .fold(Mapping::new(), |map, (region, ami)| map.entry(*region, "AmiId", *ami)))
    })?;

    def.resource("Vpc", |scope| {
        Ok(Resource::new("AWS::EC2::VPC").property("CidrBlock", cidr(scope, "Vpc")?))
    })?
    .resource("InternetGateway", |_| Ok(Resource::new("AWS::EC2::InternetGateway")))?
    .resource("GatewayAttachment", |scope| {
        let vpc = scope.resource("Vpc")?;
        let gateway = scope.resource("InternetGateway")?;
        Ok(Resource::new("AWS::EC2::VPCGatewayAttachment")
            .property("VpcId", vpc.reference())
            .property("InternetGatewayId", gateway.reference()))
    })?
    .resource("DhcpOptions", |_| {
        Ok(Resource::new("AWS::EC2::DHCPOptions")
            .property("DomainName", "vandelay.io")
            .property("DomainNameServers", Value::list(["AmazonProvidedDNS"])))
    })?
    .resource("DhcpOptionsAssociation", |scope| {
        let vpc = scope.resource("Vpc")?;
        let options = scope.resource("DhcpOptions")?;
        Ok(Resource::new("AWS::EC2::VPCDHCPOptionsAssociation")
            .property("VpcId", vpc.reference())
            .property("DhcpOptionsId", options.reference()))
    })?
    .resource("PublicRouteTable", |scope| {
        let vpc = scope.resource("Vpc")?;
        Ok(Resource::new("AWS::EC2::RouteTable").property("VpcId", vpc.reference()))
    })?
    .resource("GatewayRoute", |scope| {
        let table = scope.resource("PublicRouteTable")?;
        let gateway = scope.resource("InternetGateway")?;
        Ok(Resource::new("AWS::EC2::Route")
            .property("RouteTableId", table.reference())
            .property("DestinationCidrBlock", "0.0.0.0/0")
            .property("GatewayId", gateway.reference()))
    })?;

    for letter in ZONES {
        def.nested_stack(&format!("Zone{letter}"), zone::NAME, move |scope| {
            zone_stack(scope, letter)
        })?;
    }

    def.nested_stack("BalancedDocs", apps::DOCS, |scope| {
        let mut link = stack_link(scope)?
            .bind("Env", "misc")
            .bind("AmiId", region_ami(scope)?);
        for (letter, zone) in zones(scope)? {
            link = link
                .bind(format!("Subnet{letter}"), zone.output("MiscSubnet"))
                .bind(
                    format!("GatewaySecurityGroup{letter}"),
                    zone.output("GatewaySecurityGroup"),
                );
        }
        Ok(link)
    })?;

    Ok(def)
}
