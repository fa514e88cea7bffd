//! Application templates: an autoscaled service behind a load balancer.
//!
//! Every application shares one shape and differs only in its
//! [`AppSettings`]. Applications that need more than settings start from
//! [`app_template`] and override individual builders, the way
//! `balanced_docs` replaces its load balancer.

use std::sync::Arc;

use super::base::base_template;
use super::components::{
    allow, auto_scaling_group, dns_statement, instance_profile, instance_role,
    launch_configuration, load_balancer, security_group, LaunchConfigurationSpec,
    LoadBalancerSpec, SecurityGroupSpec, ZoneBindings, ZONES,
};
use crate::template::{BuildError, Condition, Parameter, TemplateDef, Value};

/// Catalogue name of the documentation site.
pub const DOCS: &str = "balanced_docs";

/// Catalogue name of the API service.
pub const API: &str = "balanced_api";

/// Logical environments an application can be deployed into.
pub const ENVIRONMENTS: [&str; 3] = ["production", "test", "misc"];

/// Secrets every application can read from the citadel bucket.
const CITADEL_FOLDERS: [&str; 2] = ["newrelic", "deploy_key"];

/// Package repositories every application installs from.
const PACKAGE_BUCKETS: [&str; 2] = ["balanced.debs", "apt.vandelay.io"];

/// Defaults an application template is built from.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Template description
    pub description: String,
    /// Default chef environment
    pub env: String,
    /// Chef recipe run at boot; required
    pub chef_recipe: Option<String>,
    /// Tag naming the instances; required
    pub stack_tag: Option<String>,
    /// Default instance type
    pub instance_type: String,
    /// Default number of instances
    pub capacity: u32,
    /// Port the service listens on
    pub port: u16,
    /// Extra citadel folders the instances may read
    pub citadel_folders: Vec<String>,
    /// Extra buckets (with optional key prefix) the instances may read
    pub s3_buckets: Vec<String>,
    /// Extra IAM statements granted to the instances
    pub iam_statements: Vec<Value>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            description: String::new(),
            env: "production".to_string(),
            chef_recipe: None,
            stack_tag: None,
            instance_type: "m1.small".to_string(),
            capacity: 1,
            port: 80,
            citadel_folders: Vec::new(),
            s3_buckets: Vec::new(),
            iam_statements: Vec::new(),
        }
    }
}

impl AppSettings {
    /// ARNs of every object the instances may read.
    fn readable_objects(&self) -> Vec<Value> {
        let citadel = CITADEL_FOLDERS
            .iter()
            .map(|f| f.to_string())
            .chain(self.citadel_folders.iter().cloned())
            .map(|folder| format!("balanced-citadel/{folder}"));
        citadel
            .chain(PACKAGE_BUCKETS.iter().map(|b| b.to_string()))
            .chain(self.s3_buckets.iter().cloned())
            .map(|bucket| Value::from(format!("arn:aws:s3:::{bucket}/*")))
            .collect()
    }

    fn statements(&self) -> Vec<Value> {
        let mut statements = vec![
            allow("s3:GetObject", Value::List(self.readable_objects())),
            dns_statement(),
        ];
        statements.extend(self.iam_statements.iter().cloned());
        statements
    }
}

fn required(template: &str, setting: &str, value: Option<&str>) -> Result<String, BuildError> {
    value.map(str::to_string).ok_or_else(|| BuildError::MissingConfiguration {
        template: template.to_string(),
        setting: setting.to_string(),
    })
}

/// Application template named `name` built from `settings`.
///
/// Missing `chef_recipe` or `stack_tag` does not fail here; it fails the
/// template when it is built, so a batch render reports it alongside the
/// other templates.
pub fn app_template(name: &str, settings: AppSettings) -> Result<TemplateDef, BuildError> {
    let settings = Arc::new(settings);
    let mut def = base_template(name, &settings.description)?;

    let s = Arc::clone(&settings);
    def.parameter("ChefRecipe", move |scope| {
        let recipe = required(scope.template_name(), "chef_recipe", s.chef_recipe.as_deref())?;
        Ok(Parameter::string().with_default(recipe).describe("Chef recipe name."))
    })?;
    let s = Arc::clone(&settings);
    def.parameter("Tag", move |scope| {
        let tag = required(scope.template_name(), "stack_tag", s.stack_tag.as_deref())?;
        Ok(Parameter::string().with_default(tag).describe("Stack tag."))
    })?;
    def.parameter("Env", |_| {
        Ok(Parameter::string()
            .allowed(ENVIRONMENTS)
            .with_default("production")
            .describe("Logical environment."))
    })?;
    let s = Arc::clone(&settings);
    def.parameter("ChefEnv", move |_| {
        Ok(Parameter::string()
            .with_default(s.env.as_str())
            .describe("Configuration environment."))
    })?;
    let s = Arc::clone(&settings);
    def.parameter("InstanceType", move |_| {
        Ok(Parameter::string()
            .with_default(s.instance_type.as_str())
            .describe("Instance type."))
    })?;
    let s = Arc::clone(&settings);
    def.parameter("Capacity", move |_| {
        Ok(Parameter::number()
            .with_default(s.capacity.to_string())
            .describe("Instance count."))
    })?;
    def.parameter("AmiId", |_| Ok(Parameter::string().describe("Amazon machine image.")))?;

    for letter in ZONES {
        def.parameter(&format!("Subnet{letter}"), move |_| {
            Ok(Parameter::string()
                .with_default("")
                .describe(format!("Subnet ID for AZ {letter}. Optional.")))
        })?;
    }
    for letter in ZONES {
        def.parameter(&format!("GatewaySecurityGroup{letter}"), move |_| {
            Ok(Parameter::string()
                .with_default("")
                .describe(format!(
                    "Security group ID for AZ {letter} Gateway instances. Optional."
                )))
        })?;
    }
    for letter in ZONES {
        def.condition(&format!("Has{letter}"), move |scope| {
            let subnet = scope.parameter(&format!("Subnet{letter}"))?;
            let gateway = scope.parameter(&format!("GatewaySecurityGroup{letter}"))?;
            Ok(Condition::and([
                Condition::is_set(subnet.reference()),
                Condition::is_set(gateway.reference()),
            ]))
        })?;
    }

    let s = Arc::clone(&settings);
    def.resource("SecurityGroup", move |scope| {
        let spec = SecurityGroupSpec::new(format!("Security group for {}", scope.template_name()))
            .allow(s.port);
        security_group(scope, "SecurityGroup", &spec)
    })?;
    let s = Arc::clone(&settings);
    def.resource("LoadBalancer", move |scope| {
        let zones = ZoneBindings::from_scope(scope)?;
        let spec = LoadBalancerSpec {
            port: s.port,
            ..LoadBalancerSpec::default()
        };
        Ok(load_balancer(&zones, &spec))
    })?;
    let s = Arc::clone(&settings);
    def.resource("Role", move |scope| {
        Ok(instance_role(scope.template_name(), s.statements()))
    })?
    .resource("InstanceProfile", |scope| {
        let role = scope.resource("Role")?;
        Ok(instance_profile(&role))
    })?
    .resource("LaunchConfiguration", |scope| {
        let spec = LaunchConfigurationSpec {
            security_group: Some(scope.resource("SecurityGroup")?.reference()),
            chef_recipe: scope.parameter("ChefRecipe")?.reference(),
            chef_env: scope.parameter("ChefEnv")?.reference(),
            name_tag: scope.parameter("Tag")?.reference(),
            instance_type: scope.parameter("InstanceType")?.reference(),
        };
        launch_configuration(scope, &spec)
    })?
    .resource("AutoScalingGroup", |scope| {
        let zones = ZoneBindings::from_scope(scope)?;
        let capacity = scope.parameter("Capacity")?;
        auto_scaling_group(scope, &zones, capacity.reference())
    })?;

    Ok(def)
}

/// The documentation site: a misc-environment app whose load balancer
/// probes `/` instead of `/health`.
pub fn docs() -> Result<TemplateDef, BuildError> {
    let settings = AppSettings {
        description: "Balanced docs".to_string(),
        env: "misc".to_string(),
        chef_recipe: Some("balanced-docs".to_string()),
        stack_tag: Some("docs".to_string()),
        ..AppSettings::default()
    };
    let port = settings.port;
    let mut def = app_template(DOCS, settings)?;
    def.override_resource("LoadBalancer", move |scope| {
        let zones = ZoneBindings::from_scope(scope)?;
        let spec = LoadBalancerSpec {
            port,
            health_url: Some("/".to_string()),
            ..LoadBalancerSpec::default()
        };
        Ok(load_balancer(&zones, &spec))
    })?;
    Ok(def)
}

/// The API service.
pub fn api() -> Result<TemplateDef, BuildError> {
    app_template(
        API,
        AppSettings {
            description: "Balanced API service".to_string(),
            chef_recipe: Some("role-balanced-api".to_string()),
            stack_tag: Some("bapi".to_string()),
            instance_type: "m3.large".to_string(),
            port: 5000,
            citadel_folders: vec!["omnibus".to_string()],
            ..AppSettings::default()
        },
    )
}
