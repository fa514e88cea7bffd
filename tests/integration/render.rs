use brix::catalog::{AppSettings, Catalog, app_template};
use brix::render::{RenderError, StorageLayout};
use brix::template::BuildError;
use serde_json::{Value as Json, json};

fn parse(body: &str) -> Json {
    serde_json::from_str(body).unwrap()
}

#[test]
fn test_catalog_renders_identically_twice() {
    let layout = StorageLayout::default();
    let first = Catalog::builtin(&layout).unwrap().render(&layout);
    let second = Catalog::builtin(&layout).unwrap().render(&layout);

    for artifact in first.artifacts().iter() {
        let again = second.artifacts().get(artifact.name()).unwrap();
        assert_eq!(artifact.body(), again.body(), "{} is not deterministic", artifact.name());
        assert_eq!(artifact.storage_key(), again.storage_key());
    }
}

#[test]
fn test_region_links_zone_stacks_by_storage_key() {
    let layout = StorageLayout::default();
    let report = Catalog::builtin(&layout).unwrap().render(&layout);
    let az_key = report.artifacts().get("balanced_az").unwrap().storage_key().to_string();
    let region = parse(report.artifacts().get("balanced_region").unwrap().body());

    for zone in ["ZoneA", "ZoneB", "ZoneC"] {
        let stack = &region["Resources"][zone];
        assert_eq!(stack["Type"], json!("AWS::CloudFormation::Stack"));
        assert_eq!(
            stack["Properties"]["TemplateURL"]["Fn::Join"][1][2],
            json!(format!(".s3.amazonaws.com/{az_key}"))
        );
        assert_eq!(stack["Properties"]["Parameters"]["VpcId"], json!({"Ref": "Vpc"}));
    }
    assert!(region["Parameters"].get("VpcId").is_none());
    assert_eq!(region["Parameters"]["Ip"]["Default"], json!("5"));
}

#[test]
fn test_bucket_pattern_changes_every_embedding_template() {
    let default = StorageLayout::default();
    let custom = StorageLayout::new("artifacts-{region}-cfn").unwrap();
    let a = Catalog::builtin(&default).unwrap().render(&default);
    let b = Catalog::builtin(&custom).unwrap().render(&custom);

    let unchanged = |name: &str| {
        a.artifacts().get(name).unwrap().hash() == b.artifacts().get(name).unwrap().hash()
    };
    // only templates that mention the bucket change
    assert!(unchanged("balanced_api"));
    assert!(!unchanged("balanced_gateway"));
    assert!(!unchanged("balanced_az"));
    assert!(!unchanged("balanced_region"));
}

#[test]
fn test_app_conditions_guard_each_zone() {
    let layout = StorageLayout::default();
    let report = Catalog::builtin(&layout).unwrap().render(&layout);
    let api = parse(report.artifacts().get("balanced_api").unwrap().body());

    assert_eq!(
        api["Conditions"]["HasB"],
        json!({"Fn::And": [
            {"Fn::Not": [{"Fn::Equals": [{"Ref": "SubnetB"}, ""]}]},
            {"Fn::Not": [{"Fn::Equals": [{"Ref": "GatewaySecurityGroupB"}, ""]}]},
        ]})
    );
    assert_eq!(
        api["Resources"]["AutoScalingGroup"]["Properties"]["VPCZoneIdentifier"][0],
        json!({"Fn::If": ["HasA", {"Ref": "SubnetA"}, {"Ref": "AWS::NoValue"}]})
    );
    for suffix in ["SelfTCPIngress", "SelfUDPIngress", "SelfICMPIngress"] {
        assert!(api["Resources"].get(format!("SecurityGroup{suffix}")).is_some());
    }
}

#[test]
fn test_incomplete_app_fails_alone() {
    let layout = StorageLayout::default();
    let mut catalog = Catalog::builtin(&layout).unwrap();
    catalog
        .insert(
            app_template(
                "balanced_worker",
                AppSettings {
                    chef_recipe: Some("role-worker".to_string()),
                    ..AppSettings::default()
                },
            )
            .unwrap(),
        )
        .unwrap();

    let report = catalog.render(&layout);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "balanced_worker");
    assert_eq!(
        failures[0].1,
        &RenderError::Build(BuildError::MissingConfiguration {
            template: "balanced_worker".to_string(),
            setting: "stack_tag".to_string(),
        })
    );
    assert_eq!(report.artifacts().len(), 5);
}
