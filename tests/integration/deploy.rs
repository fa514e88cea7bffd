use std::collections::BTreeMap;

use brix::catalog::Catalog;
use brix::deploy::provider::NESTED_STACK_RESOURCE;
use brix::deploy::{Operation, Page, ProviderError, Reconciler, StackEvent, sync_artifacts};
use brix::render::StorageLayout;
use brix::test_utils::{MemoryStore, StubProvider, init_test_logging};
use chrono::{TimeZone, Utc};

fn event(stack: &str, id: &str, status: &str, second: u32) -> StackEvent {
    StackEvent {
        stack_name: stack.to_string(),
        logical_id: id.to_string(),
        resource_type: "AWS::CloudFormation::Stack".to_string(),
        status: status.to_string(),
        reason: None,
        timestamp: Utc.with_ymd_and_hms(2014, 3, 1, 9, 30, second).unwrap(),
    }
}

#[tokio::test]
async fn test_sync_then_create_then_update() {
    init_test_logging(None);
    let layout = StorageLayout::default();
    let report = Catalog::builtin(&layout).unwrap().render(&layout);
    let artifact = report.artifacts().get("balanced_region").unwrap();

    let store = MemoryStore::new();
    let regions = vec!["us-west-1".to_string()];
    let written = sync_artifacts(&store, report.artifacts(), &layout, &regions).await.unwrap();
    assert_eq!(written, report.artifacts().len());
    assert!(store.object("balanced-cfn-us-west-1", artifact.storage_key()).is_some());

    let provider = StubProvider::new("us-west-1");
    let reconciler = Reconciler::new(&provider, vec!["CAPABILITY_IAM".to_string()]);
    let url = layout.object_url("us-west-1", artifact.storage_key());
    let ip = BTreeMap::from([("Ip".to_string(), "7".to_string())]);

    let (created, _) = reconciler.deploy("BalancedRegion", &url, &ip).await.unwrap();
    assert_eq!(created.operation, Operation::Create);
    assert!(created.request.disable_rollback);

    let key = BTreeMap::from([("KeyName".to_string(), "ops".to_string())]);
    let (updated, _) = reconciler.deploy("BalancedRegion", &url, &key).await.unwrap();
    assert_eq!(updated.operation, Operation::Update);
    assert_eq!(
        updated.request.parameters,
        BTreeMap::from([
            ("Ip".to_string(), "7".to_string()),
            ("KeyName".to_string(), "ops".to_string()),
        ])
    );
}

#[tokio::test]
async fn test_events_follow_nested_stacks_across_pages() {
    let provider = StubProvider::new("us-west-1");
    provider.add_resource("BalancedRegion", "ZoneA", NESTED_STACK_RESOURCE, Some("arn:zone-a"));
    provider.add_resource("arn:zone-a", "Gateway", NESTED_STACK_RESOURCE, Some("arn:gateway-a"));
    provider.add_event_pages(
        "BalancedRegion",
        vec![
            Page::more(vec![event("BalancedRegion", "BalancedRegion", "CREATE_IN_PROGRESS", 0)], "1"),
            Page::last(vec![event("BalancedRegion", "BalancedRegion", "CREATE_COMPLETE", 9)]),
        ],
    );
    provider.add_event_pages(
        "arn:zone-a",
        vec![Page::last(vec![event("ZoneA", "ZoneA", "CREATE_COMPLETE", 6)])],
    );
    provider.add_event_pages(
        "arn:gateway-a",
        vec![Page::last(vec![event("Gateway", "Gateway", "CREATE_COMPLETE", 3)])],
    );

    let reconciler = Reconciler::new(&provider, Vec::new());
    let log = reconciler.events("BalancedRegion", true).await.unwrap();
    let order: Vec<&str> = log.events.iter().map(|e| e.stack_name.as_str()).collect();
    assert_eq!(order, vec!["BalancedRegion", "Gateway", "ZoneA", "BalancedRegion"]);

    let lines: Vec<String> = log.lines().collect();
    assert_eq!(lines[1], "2014-03-01 09:30:03 [Gateway]\tGateway: CREATE_COMPLETE");
}

#[tokio::test]
async fn test_rejected_update_is_reported_not_retried() {
    let provider = StubProvider::new("us-west-1");
    provider.add_stack("BalancedApi", BTreeMap::new());
    provider.fail(
        "update_stack",
        ProviderError::Rejected {
            code: "ValidationError".to_string(),
            message: "No updates are to be performed.".to_string(),
        },
    );

    let reconciler = Reconciler::new(&provider, Vec::new());
    let err = reconciler.deploy("BalancedApi", "https://x", &BTreeMap::new()).await.unwrap_err();
    assert!(err.is_validation());
    let updates = provider.calls().iter().filter(|c| c.starts_with("update_stack")).count();
    assert_eq!(updates, 1);
}
