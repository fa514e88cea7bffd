//! Rendering templates into canonical, content-addressed artifacts.
//!
//! A [`Renderer`] builds one template definition into a fresh
//! [`Template`](crate::template::Template) instance, resolves every node
//! into the rendered document and writes it in canonical form. The content
//! hash of those bytes names the artifact's storage key, and nested stack
//! links embed that key, so an edit to any embedded template changes the
//! bytes (and key) of everything that embeds it.
//!
//! [`render_all`] renders a whole catalogue in dependency order, isolating
//! failures per template.
//!
//! # Rendered document
//!
//! Top-level keys are `Description`, `Parameters`, `Mappings`, `Conditions`,
//! `Resources` and `Outputs`. `Resources` is always present; the others only
//! when they have entries.

pub mod artifact;
pub mod batch;
pub mod canonical;
mod document;
pub mod error;
pub mod graph;

use tracing::debug;

pub use artifact::{ArtifactIndex, RenderedArtifact, StorageLayout, storage_key};
pub use batch::{RenderReport, render_all};
pub use error::RenderError;
pub use graph::TemplateGraph;

use crate::template::{Template, TemplateDef};

/// Renders template definitions against the artifacts rendered so far.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    artifacts: &'a ArtifactIndex,
    layout: &'a StorageLayout,
}

impl<'a> Renderer<'a> {
    /// Renderer linking nested stacks against `artifacts`.
    pub fn new(artifacts: &'a ArtifactIndex, layout: &'a StorageLayout) -> Self {
        Self { artifacts, layout }
    }

    /// Build and render `def`.
    pub fn render(&self, def: &TemplateDef) -> Result<RenderedArtifact, RenderError> {
        let mut template = Template::new(def);
        template.build_all()?;
        let nodes = template.nodes_by_category();
        let (document, outputs) = document::assemble(def, &nodes, self.artifacts, self.layout)?;
        let body = canonical::to_canonical_string(&document)?;
        let artifact = RenderedArtifact::new(def.name(), body, outputs);
        let (hits, misses) = template.cache_stats();
        debug!(
            target: "render",
            "rendered {} as {} ({hits} cache hits, {misses} misses)",
            def.name(),
            artifact.storage_key()
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{
        BuildError, Condition, Mapping, NestedStackLink, Output, Parameter, Pseudo, Resource,
        Value,
    };
    use serde_json::{Value as Json, json};

    fn render(def: &TemplateDef) -> Result<RenderedArtifact, RenderError> {
        let index = ArtifactIndex::new();
        let layout = StorageLayout::default();
        Renderer::new(&index, &layout).render(def)
    }

    fn document(artifact: &RenderedArtifact) -> Json {
        serde_json::from_str(artifact.body()).unwrap()
    }

    fn network(cidr_tail: &'static str) -> TemplateDef {
        let mut def = TemplateDef::new("network").with_description("Network");
        def.parameter("Ip", |_| Ok(Parameter::string().with_default("5")))
            .unwrap()
            .resource("Vpc", move |scope| {
                let ip = scope.parameter("Ip")?;
                Ok(Resource::new("AWS::EC2::VPC").property(
                    "CidrBlock",
                    Value::join(["10.".into(), ip.reference(), cidr_tail.into()]),
                ))
            })
            .unwrap();
        def
    }

    #[test]
    fn test_join_renders_intrinsic() {
        let artifact = render(&network(".0.0/16")).unwrap();
        let doc = document(&artifact);
        assert_eq!(
            doc["Resources"]["Vpc"]["Properties"]["CidrBlock"],
            json!({"Fn::Join": ["", ["10.", {"Ref": "Ip"}, ".0.0/16"]]})
        );
        assert_eq!(doc["Parameters"]["Ip"], json!({"Type": "String", "Default": "5"}));
        assert_eq!(doc["Description"], json!("Network"));
        assert!(doc.get("Outputs").is_none());
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let def = network(".0.0/16");
        let first = render(&def).unwrap();
        let second = render(&def).unwrap();
        assert_eq!(first.body(), second.body());
        assert_eq!(first.hash(), second.hash());
    }

    #[test]
    fn test_hash_follows_content() {
        let a = render(&network(".0.0/16")).unwrap();
        let b = render(&network(".0.0/16")).unwrap();
        let c = render(&network(".0.0/24")).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
        assert_ne!(a.storage_key(), c.storage_key());
    }

    #[test]
    fn test_declaration_order_does_not_change_bytes() {
        let mut forward = TemplateDef::new("t");
        forward
            .resource("A", |_| Ok(Resource::new("AWS::SQS::Queue")))
            .unwrap()
            .resource("B", |_| Ok(Resource::new("AWS::SNS::Topic")))
            .unwrap();
        let mut backward = TemplateDef::new("t");
        backward
            .resource("B", |_| Ok(Resource::new("AWS::SNS::Topic")))
            .unwrap()
            .resource("A", |_| Ok(Resource::new("AWS::SQS::Queue")))
            .unwrap();
        assert_eq!(render(&forward).unwrap().body(), render(&backward).unwrap().body());
    }

    fn zoned() -> TemplateDef {
        let mut def = TemplateDef::new("zoned");
        def.parameter("SubnetA", |_| Ok(Parameter::string().with_default("")))
            .unwrap()
            .condition("HasA", |scope| {
                let subnet = scope.parameter("SubnetA")?;
                Ok(Condition::is_set(subnet.reference()))
            })
            .unwrap()
            .resource("Group", |scope| {
                let has_a = scope.condition("HasA")?;
                Ok(Resource::new("AWS::AutoScaling::AutoScalingGroup")
                    .property(
                        "VPCZoneIdentifier",
                        vec![has_a.only(Value::reference("SubnetA")), Value::Omit, "subnet-c".into()],
                    )
                    .property("Placement", Value::Omit)
                    .property("Tag", has_a.select(Value::Omit, Value::Omit)))
            })
            .unwrap();
        def
    }

    #[test]
    fn test_omitted_elements_and_fields_are_absent() {
        let doc = document(&render(&zoned()).unwrap());
        let properties = &doc["Resources"]["Group"]["Properties"];
        assert_eq!(
            properties["VPCZoneIdentifier"],
            json!([{"Fn::If": ["HasA", {"Ref": "SubnetA"}, {"Ref": "AWS::NoValue"}]}, "subnet-c"])
        );
        assert!(properties.get("Placement").is_none());
        assert!(properties.get("Tag").is_none());
        assert_eq!(
            doc["Conditions"]["HasA"],
            json!({"Fn::Not": [{"Fn::Equals": [{"Ref": "SubnetA"}, ""]}]})
        );
    }

    #[test]
    fn test_undeclared_condition_is_rejected() {
        let mut def = TemplateDef::new("t");
        def.resource("Group", |_| {
            Ok(Resource::new("AWS::EC2::SecurityGroup")
                .property("Ingress", Value::when("Missing", "x".into(), Value::Omit)))
        })
        .unwrap();
        let err = render(&def).unwrap_err();
        assert_eq!(
            err,
            RenderError::DanglingReference {
                owner: "Group".to_string(),
                kind: "condition",
                target: "Missing".to_string(),
            }
        );
    }

    #[test]
    fn test_dangling_ref_is_rejected_but_pseudo_is_allowed() {
        let mut def = TemplateDef::new("t");
        def.resource("Zone", |_| {
            Ok(Resource::new("AWS::EC2::Subnet")
                .property("AvailabilityZone", Value::join([Value::pseudo(Pseudo::Region), "a".into()])))
        })
        .unwrap();
        assert!(render(&def).is_ok());

        def.resource("Bad", |_| Ok(Resource::new("AWS::EC2::Subnet").property("VpcId", Value::reference("Vpc"))))
            .unwrap();
        assert!(matches!(render(&def), Err(RenderError::DanglingReference { .. })));
    }

    #[test]
    fn test_single_operand_and_is_invalid() {
        let mut def = TemplateDef::new("t");
        def.condition("Lonely", |_| Ok(Condition::and([Condition::equals("a", "b")])))
            .unwrap();
        assert!(matches!(render(&def), Err(RenderError::InvalidCondition { .. })));
    }

    #[test]
    fn test_mapping_lookup_and_outputs() {
        let mut def = TemplateDef::new("t");
        def.mapping("RegionMap", |_| Ok(Mapping::new().entry("us-west-1", "AmiId", "ami-1")))
            .unwrap()
            .resource("Host", |scope| {
                let map = scope.mapping("RegionMap")?;
                Ok(Resource::new("AWS::EC2::Instance")
                    .property("ImageId", map.lookup(Value::pseudo(Pseudo::Region), "AmiId")))
            })
            .unwrap()
            .output("Host", |scope| {
                let host = scope.resource("Host")?;
                Ok(Output::new(host.reference()).describe("Host id"))
            })
            .unwrap();

        let artifact = render(&def).unwrap();
        assert!(artifact.has_output("Host"));
        let doc = document(&artifact);
        assert_eq!(
            doc["Resources"]["Host"]["Properties"]["ImageId"],
            json!({"Fn::FindInMap": ["RegionMap", {"Ref": "AWS::Region"}, "AmiId"]})
        );
        assert_eq!(doc["Outputs"]["Host"], json!({"Value": {"Ref": "Host"}, "Description": "Host id"}));
        assert_eq!(doc["Mappings"]["RegionMap"]["us-west-1"]["AmiId"], json!("ami-1"));
    }

    fn child(output: &'static str) -> TemplateDef {
        let mut def = TemplateDef::new("child");
        def.parameter("Cidr", |_| Ok(Parameter::string()))
            .unwrap()
            .resource("Subnet", |scope| {
                let cidr = scope.parameter("Cidr")?;
                Ok(Resource::new("AWS::EC2::Subnet").property("CidrBlock", cidr.reference()))
            })
            .unwrap()
            .output(output, |scope| Ok(Output::new(scope.resource("Subnet")?.reference())))
            .unwrap();
        def
    }

    fn parent() -> TemplateDef {
        let mut def = TemplateDef::new("parent");
        def.resource("Attachment", |_| Ok(Resource::new("AWS::EC2::VPCGatewayAttachment")))
            .unwrap()
            .nested_stack("Child", "child", |_| {
                Ok(NestedStackLink::new().bind("Cidr", "10.0.0.0/24").depends_on("Attachment"))
            })
            .unwrap()
            .output("ChildSubnet", |scope| {
                Ok(Output::new(scope.stack("Child")?.output("Subnet")))
            })
            .unwrap();
        def
    }

    #[test]
    fn test_nested_stack_embeds_child_storage_key() {
        let layout = StorageLayout::default();
        let mut index = ArtifactIndex::new();
        let child_artifact = Renderer::new(&index, &layout).render(&child("Subnet")).unwrap();
        let key = child_artifact.storage_key().to_string();
        index.insert(child_artifact).unwrap();

        let artifact = Renderer::new(&index, &layout).render(&parent()).unwrap();
        let doc = document(&artifact);
        let stack = &doc["Resources"]["Child"];
        assert_eq!(stack["Type"], json!("AWS::CloudFormation::Stack"));
        assert_eq!(stack["DependsOn"], json!(["Attachment"]));
        assert_eq!(stack["Properties"]["Parameters"], json!({"Cidr": "10.0.0.0/24"}));
        assert_eq!(
            stack["Properties"]["TemplateURL"],
            json!({"Fn::Join": ["", [
                "https://balanced-cfn-",
                {"Ref": "AWS::Region"},
                format!(".s3.amazonaws.com/{key}"),
            ]]})
        );
    }

    #[test]
    fn test_child_edit_changes_parent_hash() {
        let layout = StorageLayout::default();
        let mut first = ArtifactIndex::new();
        let mut second = ArtifactIndex::new();

        let mut edited = child("Subnet");
        edited
            .override_parameter("Cidr", |_| Ok(Parameter::string().with_default("10.0.0.0/24")))
            .unwrap();
        first.insert(Renderer::new(&first, &layout).render(&child("Subnet")).unwrap()).unwrap();
        second.insert(Renderer::new(&second, &layout).render(&edited).unwrap()).unwrap();

        let a = Renderer::new(&first, &layout).render(&parent()).unwrap();
        let b = Renderer::new(&second, &layout).render(&parent()).unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_unknown_nested_output_is_a_render_error() {
        let layout = StorageLayout::default();
        let mut index = ArtifactIndex::new();
        index.insert(Renderer::new(&index, &layout).render(&child("Other")).unwrap()).unwrap();

        let err = Renderer::new(&index, &layout).render(&parent()).unwrap_err();
        assert_eq!(
            err,
            RenderError::UnknownNestedOutput {
                owner: "ChildSubnet".to_string(),
                stack: "Child".to_string(),
                template: "child".to_string(),
                output: "Subnet".to_string(),
            }
        );
    }

    #[test]
    fn test_nested_stack_without_artifact_fails() {
        let err = render(&parent()).unwrap_err();
        assert!(matches!(err, RenderError::MissingArtifact { .. }));
    }

    #[test]
    fn test_builder_failure_is_wrapped() {
        let mut def = TemplateDef::new("t");
        def.parameter("Tag", |scope| {
            Err(BuildError::MissingConfiguration {
                template: scope.template_name().to_string(),
                setting: "stack_tag".to_string(),
            })
        })
        .unwrap();
        let err = render(&def).unwrap_err();
        assert!(matches!(err, RenderError::Build(BuildError::MissingConfiguration { .. })));
    }

    #[test]
    fn test_specialization_changes_only_the_overridden_subtree() {
        let mut base = TemplateDef::new("base");
        base.parameter("Env", |_| Ok(Parameter::string().with_default("production")))
            .unwrap()
            .resource("Queue", |_| Ok(Resource::new("AWS::SQS::Queue").property("DelaySeconds", 0_i64)))
            .unwrap()
            .resource("Alarm", |scope| {
                let queue = scope.resource("Queue")?;
                Ok(Resource::new("AWS::CloudWatch::Alarm").property("Dimension", queue.reference()))
            })
            .unwrap()
            .resource("Topic", |_| Ok(Resource::new("AWS::SNS::Topic")))
            .unwrap();

        let mut derived = base.derive("base");
        derived
            .extend_resource("Queue", |_, queue| Ok(queue.property("DelaySeconds", 30_i64)))
            .unwrap();

        let a = document(&render(&base).unwrap());
        let b = document(&render(&derived).unwrap());
        assert_ne!(a["Resources"]["Queue"], b["Resources"]["Queue"]);
        assert_eq!(b["Resources"]["Queue"]["Properties"]["DelaySeconds"], json!(30));
        for id in ["Alarm", "Topic"] {
            assert_eq!(a["Resources"][id], b["Resources"][id]);
        }
        assert_eq!(a["Parameters"], b["Parameters"]);
    }
}
