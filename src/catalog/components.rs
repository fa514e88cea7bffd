//! Resource shapes shared by several catalogue templates.
//!
//! Multi-zone resources take a [`ZoneBindings`] value rather than looking
//! the per-zone parameters up themselves, so the same constructors work in
//! templates with one, two or three usable zones.

use crate::template::{BuildError, Key, Node, NodeRef, Pseudo, Resource, Scope, Value};

/// Zone letters, in order.
pub const ZONES: [char; 3] = ['A', 'B', 'C'];

/// Hosted zone the instances register themselves in.
pub const HOSTED_ZONE_ARN: &str = "arn:aws:route53:::hostedzone/Z2IP8RX9IARH86";

/// Certificate served on 443 unless a template picks another one.
pub const DEFAULT_SSL_CERTIFICATE: &str = "balancedpayments-2014";

const ANYWHERE: &str = "0.0.0.0/0";

/// One usable availability zone of a template.
#[derive(Debug, Clone)]
pub struct Zone {
    /// Zone letter, `A` to `C`
    pub letter: char,
    /// `Has<letter>` condition gating everything placed in the zone
    pub condition: NodeRef,
    /// Subnet to place resources in, or omitted
    pub subnet: Value,
    /// Security group of the zone's gateway, or omitted
    pub gateway_security_group: Value,
}

/// Per-zone conditions and references of a template.
#[derive(Debug, Clone, Default)]
pub struct ZoneBindings {
    zones: Vec<Zone>,
}

impl ZoneBindings {
    /// Bindings for every zone whose `Has<letter>` condition the template
    /// declares. Zones without a condition are left out entirely.
    pub fn from_scope(scope: &mut Scope<'_>) -> Result<Self, BuildError> {
        let mut zones = Vec::new();
        for letter in ZONES {
            let Some(condition) = scope.find(&Key::condition(format!("Has{letter}")))? else {
                continue;
            };
            let subnet = optional_reference(scope, &format!("Subnet{letter}"))?;
            let gateway_security_group =
                optional_reference(scope, &format!("GatewaySecurityGroup{letter}"))?;
            zones.push(Zone {
                letter,
                condition,
                subnet,
                gateway_security_group,
            });
        }
        Ok(Self { zones })
    }

    /// Usable zones.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// One element per zone holding `value(zone)` when the zone's condition
    /// holds and nothing otherwise.
    pub fn per_zone(&self, value: impl Fn(&Zone) -> Value) -> Vec<Value> {
        self.zones.iter().map(|zone| zone.condition.only(value(zone))).collect()
    }

    /// Subnet of every usable zone.
    pub fn subnets(&self) -> Vec<Value> {
        self.per_zone(|zone| zone.subnet.clone())
    }

    /// Availability zone name of every usable zone, e.g. `us-west-1a`.
    pub fn availability_zones(&self) -> Vec<Value> {
        self.per_zone(|zone| {
            Value::join([
                Value::pseudo(Pseudo::Region),
                Value::from(zone.letter.to_ascii_lowercase().to_string()),
            ])
        })
    }
}

fn optional_reference(scope: &mut Scope<'_>, parameter: &str) -> Result<Value, BuildError> {
    Ok(scope
        .find(&Key::parameter(parameter))?
        .map(|node| node.reference())
        .unwrap_or(Value::Omit))
}

fn port_rule(protocol: &str, from: &str, to: &str) -> Vec<(&'static str, Value)> {
    vec![
        ("IpProtocol", protocol.into()),
        ("FromPort", from.into()),
        ("ToPort", to.into()),
    ]
}

/// Options for [`security_group`].
#[derive(Debug, Clone)]
pub struct SecurityGroupSpec {
    /// Group description
    pub description: String,
    /// TCP ports open to the world
    pub allow: Vec<u16>,
    /// Open all traffic between members of the group
    pub allow_self: bool,
    /// Open SSH to the world instead of to each zone's gateway
    pub allow_ssh: bool,
}

impl SecurityGroupSpec {
    /// Group open to itself, with SSH from the zone gateways only.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            allow: Vec::new(),
            allow_self: true,
            allow_ssh: false,
        }
    }

    /// Open a TCP port to the world.
    pub fn allow(mut self, port: u16) -> Self {
        self.allow.push(port);
        self
    }
}

/// Security group in the template's VPC.
///
/// ICMP is always open. SSH is open to each zone's gateway security group
/// (or to the world with `allow_ssh`). When `allow_self` is set, ingress
/// rules named `<owner>SelfTCPIngress`, `<owner>SelfUDPIngress` and
/// `<owner>SelfICMPIngress` are attached to the template.
pub fn security_group(
    scope: &mut Scope<'_>,
    owner: &str,
    spec: &SecurityGroupSpec,
) -> Result<Resource, BuildError> {
    let vpc = scope.parameter("VpcId")?;
    let zones = ZoneBindings::from_scope(scope)?;

    let mut rules = vec![Value::map(
        port_rule("icmp", "-1", "-1").into_iter().chain([("CidrIp", ANYWHERE.into())]),
    )];
    if spec.allow_ssh {
        rules.push(Value::map(
            port_rule("tcp", "22", "22").into_iter().chain([("CidrIp", ANYWHERE.into())]),
        ));
    } else {
        rules.extend(zones.per_zone(|zone| {
            Value::map(port_rule("tcp", "22", "22").into_iter().chain([(
                "SourceSecurityGroupId",
                zone.gateway_security_group.clone(),
            )]))
        }));
    }
    for port in &spec.allow {
        let port = port.to_string();
        rules.push(Value::map(
            port_rule("tcp", &port, &port).into_iter().chain([("CidrIp", ANYWHERE.into())]),
        ));
    }

    if spec.allow_self {
        for (suffix, protocol, from, to) in [
            ("SelfTCPIngress", "tcp", "0", "65535"),
            ("SelfUDPIngress", "udp", "0", "65535"),
            ("SelfICMPIngress", "icmp", "-1", "-1"),
        ] {
            let mut ingress = Resource::new("AWS::EC2::SecurityGroupIngress");
            for (name, value) in port_rule(protocol, from, to) {
                ingress = ingress.property(name, value);
            }
            ingress = ingress
                .property("GroupId", Value::reference(owner))
                .property("SourceSecurityGroupId", Value::reference(owner));
            scope.attach(format!("{owner}{suffix}"), ingress)?;
        }
    }

    Ok(Resource::new("AWS::EC2::SecurityGroup")
        .property("GroupDescription", spec.description.as_str())
        .property("VpcId", vpc.reference())
        .property("SecurityGroupIngress", rules))
}

/// Options for [`load_balancer`].
#[derive(Debug, Clone)]
pub struct LoadBalancerSpec {
    /// Instance port both listeners forward to
    pub port: u16,
    /// Server certificate name; no HTTPS listener when unset
    pub ssl_certificate_id: Option<String>,
    /// Security group attached to the load balancer
    pub security_group: Option<Value>,
    /// Path probed by the health check; no health check when unset
    pub health_url: Option<String>,
}

impl Default for LoadBalancerSpec {
    fn default() -> Self {
        Self {
            port: 80,
            ssl_certificate_id: Some(DEFAULT_SSL_CERTIFICATE.to_string()),
            security_group: None,
            health_url: Some("/health".to_string()),
        }
    }
}

/// Cross-zone classic load balancer spanning every usable zone.
pub fn load_balancer(zones: &ZoneBindings, spec: &LoadBalancerSpec) -> Resource {
    let instance_port = spec.port.to_string();
    let mut listeners = vec![Value::map([
        ("LoadBalancerPort", Value::from("80")),
        ("InstancePort", instance_port.as_str().into()),
        ("Protocol", "HTTP".into()),
        ("InstanceProtocol", "HTTP".into()),
    ])];
    if let Some(certificate) = &spec.ssl_certificate_id {
        listeners.push(Value::map([
            ("LoadBalancerPort", Value::from("443")),
            ("InstancePort", instance_port.as_str().into()),
            ("Protocol", "HTTPS".into()),
            ("InstanceProtocol", "HTTP".into()),
            (
                "SSLCertificateId",
                Value::join([
                    Value::from("arn:aws:iam::"),
                    Value::pseudo(Pseudo::AccountId),
                    Value::from(":server-certificate/"),
                    Value::from(certificate),
                ]),
            ),
        ]));
    }

    let mut resource = Resource::new("AWS::ElasticLoadBalancing::LoadBalancer")
        .property("CrossZone", true)
        .property("Listeners", listeners)
        .property("Subnets", zones.subnets());
    if let Some(group) = &spec.security_group {
        resource = resource.property("SecurityGroups", vec![group.clone()]);
    }
    if let Some(url) = &spec.health_url {
        resource = resource.property(
            "HealthCheck",
            Value::map([
                ("Target", Value::join(["HTTP:", "80", url.as_str()])),
                ("HealthyThreshold", "3".into()),
                ("UnhealthyThreshold", "5".into()),
                ("Interval", "30".into()),
                ("Timeout", "5".into()),
            ]),
        );
    }
    resource
}

/// Options for [`launch_configuration`].
#[derive(Debug, Clone)]
pub struct LaunchConfigurationSpec {
    /// Security group instances join
    pub security_group: Option<Value>,
    /// Chef recipe run at boot
    pub chef_recipe: Value,
    /// Chef environment
    pub chef_env: Value,
    /// Name tag passed to the bootstrap script
    pub name_tag: Value,
    /// Instance type
    pub instance_type: Value,
}

/// Launch configuration booting instances through the bootstrap script.
///
/// Uses the template's `InstanceProfile` resource and `AmiId`/`KeyName`
/// parameters.
pub fn launch_configuration(
    scope: &mut Scope<'_>,
    spec: &LaunchConfigurationSpec,
) -> Result<Resource, BuildError> {
    let profile = scope.resource("InstanceProfile")?;
    let ami = scope.parameter("AmiId")?;
    let key_name = scope.parameter("KeyName")?;

    let user_data = Value::base64(Value::join([
        Value::from("#!/bin/bash -xe\n"),
        Value::from("/opt/bootstrap.sh \""),
        spec.name_tag.clone(),
        Value::from("\" \""),
        spec.chef_env.clone(),
        Value::from("\" \""),
        spec.chef_recipe.clone(),
        Value::from("\"\n"),
    ]));

    let mut resource = Resource::new("AWS::AutoScaling::LaunchConfiguration")
        .property("IamInstanceProfile", profile.reference())
        .property("ImageId", ami.reference())
        .property("KeyName", key_name.reference())
        .property("InstanceType", spec.instance_type.clone())
        .property("UserData", user_data);
    if let Some(group) = &spec.security_group {
        resource = resource.property("SecurityGroups", vec![group.clone()]);
    }
    Ok(resource)
}

/// Auto scaling group over every usable zone, fronted by the template's
/// `LoadBalancer` and launched from its `LaunchConfiguration`.
pub fn auto_scaling_group(
    scope: &mut Scope<'_>,
    zones: &ZoneBindings,
    capacity: Value,
) -> Result<Resource, BuildError> {
    let launch_configuration = scope.resource("LaunchConfiguration")?;
    let load_balancer = scope.resource("LoadBalancer")?;

    Ok(Resource::new("AWS::AutoScaling::AutoScalingGroup")
        .property("AvailabilityZones", zones.availability_zones())
        .property("LaunchConfigurationName", launch_configuration.reference())
        .property("LoadBalancerNames", vec![load_balancer.reference()])
        .property("MinSize", capacity.clone())
        .property("MaxSize", capacity)
        .property("VPCZoneIdentifier", zones.subnets()))
}

/// `Allow` statement for `action` on `resource`.
pub fn allow(action: impl Into<Value>, resource: impl Into<Value>) -> Value {
    Value::map([
        ("Effect", Value::from("Allow")),
        ("Action", action.into()),
        ("Resource", resource.into()),
    ])
}

/// Statement letting instances manage records in the hosted zone.
pub fn dns_statement() -> Value {
    allow(
        Value::list([
            "route53:GetHostedZone",
            "route53:ListResourceRecordSets",
            "route53:ChangeResourceRecordSets",
        ]),
        HOSTED_ZONE_ARN,
    )
}

/// Role EC2 instances can assume, granted `statements`.
pub fn instance_role(policy_name: &str, statements: Vec<Value>) -> Resource {
    let assume = Value::map([(
        "Statement",
        Value::List(vec![Value::map([
            ("Effect", Value::from("Allow")),
            ("Principal", Value::map([("Service", Value::list(["ec2.amazonaws.com"]))])),
            ("Action", Value::list(["sts:AssumeRole"])),
        ])]),
    )]);
    let policy = Value::map([
        ("PolicyName", Value::from(policy_name)),
        ("PolicyDocument", Value::map([("Statement", Value::List(statements))])),
    ]);

    Resource::new("AWS::IAM::Role")
        .property("AssumeRolePolicyDocument", assume)
        .property("Path", "/")
        .property("Policies", vec![policy])
}

/// Instance profile wrapping `role`.
pub fn instance_profile(role: &Node) -> Resource {
    Resource::new("AWS::IAM::InstanceProfile")
        .property("Path", "/")
        .property("Roles", vec![role.reference()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Condition, Parameter, Template, TemplateDef};

    fn two_zone_def() -> TemplateDef {
        let mut def = TemplateDef::new("zones");
        def.parameter("VpcId", |_| Ok(Parameter::string())).unwrap();
        for letter in ['A', 'B'] {
            def.parameter(&format!("Subnet{letter}"), |_| Ok(Parameter::string().with_default("")))
                .unwrap()
                .parameter(&format!("GatewaySecurityGroup{letter}"), |_| {
                    Ok(Parameter::string().with_default(""))
                })
                .unwrap()
                .condition(&format!("Has{letter}"), move |scope| {
                    let subnet = scope.parameter(&format!("Subnet{letter}"))?;
                    Ok(Condition::is_set(subnet.reference()))
                })
                .unwrap();
        }
        def
    }

    #[test]
    fn test_zone_bindings_skip_undeclared_zones() {
        let mut def = two_zone_def();
        def.resource("Probe", |scope| {
            let zones = ZoneBindings::from_scope(scope)?;
            assert_eq!(zones.zones().iter().map(|z| z.letter).collect::<Vec<_>>(), vec!['A', 'B']);
            assert_eq!(zones.subnets().len(), 2);
            Ok(Resource::new("AWS::CloudFormation::WaitConditionHandle"))
        })
        .unwrap();
        Template::new(&def).build_all().unwrap();
    }

    #[test]
    fn test_security_group_rules_and_self_ingress() {
        let mut def = two_zone_def();
        def.resource("SecurityGroup", |scope| {
            security_group(scope, "SecurityGroup", &SecurityGroupSpec::new("web").allow(80))
        })
        .unwrap();

        let mut template = Template::new(&def);
        template.build_all().unwrap();
        let group = template.get_or_build(&Key::resource("SecurityGroup")).unwrap();
        let Some(Value::List(rules)) = group.as_resource().and_then(|r| r.get("SecurityGroupIngress")) else {
            panic!("missing ingress rules");
        };
        // icmp + one SSH rule per zone + port 80
        assert_eq!(rules.len(), 4);
        assert!(matches!(rules[1], Value::If { .. }));

        let attached: Vec<_> = template
            .nodes()
            .iter()
            .map(|n| n.logical_id().to_string())
            .filter(|id| id.starts_with("SecurityGroupSelf"))
            .collect();
        assert_eq!(
            attached,
            vec!["SecurityGroupSelfTCPIngress", "SecurityGroupSelfUDPIngress", "SecurityGroupSelfICMPIngress"]
        );
    }

    #[test]
    fn test_load_balancer_without_certificate_has_one_listener() {
        let spec = LoadBalancerSpec {
            ssl_certificate_id: None,
            health_url: None,
            ..LoadBalancerSpec::default()
        };
        let elb = load_balancer(&ZoneBindings::default(), &spec);
        let Some(Value::List(listeners)) = elb.get("Listeners") else {
            panic!("missing listeners");
        };
        assert_eq!(listeners.len(), 1);
        assert!(elb.get("HealthCheck").is_none());
        assert!(elb.get("SecurityGroups").is_none());
    }
}
