//! Event history of a stack and the stacks nested inside it.

use std::collections::{HashSet, VecDeque};

use futures::TryStreamExt;
use tracing::debug;

use super::pagination::paginate;
use super::provider::{ProviderError, StackEvent, StackProvider};

/// Events gathered from one or more stacks, oldest first.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    /// Every stack visited, in visiting order
    pub stacks: Vec<String>,
    /// Events of every visited stack, sorted by timestamp
    pub events: Vec<StackEvent>,
}

impl EventLog {
    /// Whether events come from more than one stack.
    pub fn spans_stacks(&self) -> bool {
        self.stacks.len() > 1
    }

    /// One line per event: time, stack when several were visited, logical
    /// id, status and the status reason when there is one.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        let with_stack = self.spans_stacks();
        self.events.iter().map(move |event| {
            let mut line = event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
            if with_stack {
                line.push_str(&format!(" [{}]\t", event.stack_name));
            } else {
                line.push(' ');
            }
            line.push_str(&format!("{}: {}", event.logical_id, event.status));
            if let Some(reason) = event.reason.as_deref().filter(|r| !r.is_empty()) {
                line.push(' ');
                line.push_str(reason);
            }
            line
        })
    }
}

/// Events of `root` and, with `recurse`, of every stack nested below it.
///
/// Nested stacks are found through their parents' resources and addressed
/// by physical id. Each stack is visited once even if several parents list
/// it. Events are sorted by timestamp; events with equal timestamps keep the
/// order they were fetched in.
pub async fn collect_events<P: StackProvider>(
    provider: &P,
    root: &str,
    recurse: bool,
) -> Result<EventLog, ProviderError> {
    let mut log = EventLog::default();
    let mut pending = VecDeque::from([root.to_string()]);
    let mut visited = HashSet::new();

    while let Some(stack) = pending.pop_front() {
        if !visited.insert(stack.clone()) {
            continue;
        }
        debug!(target: "deploy", "collecting events of {stack}");

        let name = stack.as_str();
        let events: Vec<StackEvent> =
            paginate(move |token| provider.describe_stack_events(name, token)).try_collect().await?;
        log.events.extend(events);

        if recurse {
            for resource in provider.describe_stack_resources(name).await? {
                if !resource.is_nested_stack() {
                    continue;
                }
                if let Some(id) = resource.physical_id.filter(|id| !id.is_empty()) {
                    pending.push_back(id);
                }
            }
        }
        log.stacks.push(stack);
    }

    log.events.sort_by_key(|event| event.timestamp);
    Ok(log)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::deploy::provider::{Page, NESTED_STACK_RESOURCE};
    use crate::test_utils::StubProvider;

    fn event(stack: &str, id: &str, second: u32) -> StackEvent {
        StackEvent {
            stack_name: stack.to_string(),
            logical_id: id.to_string(),
            resource_type: "AWS::EC2::Subnet".to_string(),
            status: "CREATE_COMPLETE".to_string(),
            reason: None,
            timestamp: Utc.with_ymd_and_hms(2014, 3, 1, 12, 0, second).unwrap(),
        }
    }

    fn family() -> StubProvider {
        let provider = StubProvider::new("us-west-1");
        provider.add_resource("Root", "ZoneA", NESTED_STACK_RESOURCE, Some("arn:zone-a"));
        provider.add_resource("Root", "ZoneB", NESTED_STACK_RESOURCE, Some("arn:zone-b"));
        provider.add_resource("Root", "Vpc", "AWS::EC2::VPC", Some("vpc-1"));
        provider.add_event_pages(
            "Root",
            vec![
                Page::more(vec![event("Root", "Vpc", 1), event("Root", "ZoneA", 8)], "p2"),
                Page::last(vec![event("Root", "Root", 9)]),
            ],
        );
        provider.add_event_pages(
            "arn:zone-a",
            vec![Page::last(vec![
                event("ZoneA", "Subnet", 2),
                event("ZoneA", "Route", 5),
                event("ZoneA", "ZoneA", 7),
            ])],
        );
        provider.add_event_pages(
            "arn:zone-b",
            vec![Page::last(vec![
                event("ZoneB", "Subnet", 3),
                event("ZoneB", "Route", 4),
                event("ZoneB", "ZoneB", 6),
            ])],
        );
        provider
    }

    #[tokio::test]
    async fn test_nested_events_are_merged_in_time_order() {
        let provider = family();
        let log = collect_events(&provider, "Root", true).await.unwrap();

        assert_eq!(log.events.len(), 9);
        assert!(log.events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(log.stacks, vec!["Root", "arn:zone-a", "arn:zone-b"]);
        assert!(log.spans_stacks());
    }

    #[tokio::test]
    async fn test_no_recurse_reads_root_only() {
        let provider = family();
        let log = collect_events(&provider, "Root", false).await.unwrap();
        assert_eq!(log.events.len(), 3);
        assert!(!log.spans_stacks());
        assert!(provider.calls().iter().all(|call| !call.starts_with("describe_stack_resources")));
    }

    #[tokio::test]
    async fn test_stack_listed_twice_is_visited_once() {
        let provider = family();
        provider.add_resource("arn:zone-a", "Sibling", NESTED_STACK_RESOURCE, Some("arn:zone-b"));
        let log = collect_events(&provider, "Root", true).await.unwrap();
        assert_eq!(log.events.len(), 9);
        assert_eq!(log.stacks.len(), 3);
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_collection_order_across_stacks() {
        let provider = StubProvider::new("us-west-1");
        provider.add_resource("Root", "Zone", NESTED_STACK_RESOURCE, Some("arn:zone"));
        provider.add_event_pages(
            "Root",
            vec![
                Page::more(vec![event("Root", "Vpc", 1)], "p2"),
                Page::last(vec![event("Root", "Root", 2)]),
            ],
        );
        provider.add_event_pages(
            "arn:zone",
            vec![Page::last(vec![event("Zone", "Subnet", 1), event("Zone", "Zone", 2)])],
        );

        let log = collect_events(&provider, "Root", true).await.unwrap();
        let order: Vec<(&str, &str)> = log
            .events
            .iter()
            .map(|e| (e.stack_name.as_str(), e.logical_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("Root", "Vpc"), ("Zone", "Subnet"), ("Root", "Root"), ("Zone", "Zone")]
        );
    }

    #[test]
    fn test_lines_show_stack_and_reason() {
        let log = EventLog {
            stacks: vec!["Root".to_string(), "Child".to_string()],
            events: vec![
                StackEvent {
                    reason: Some("User Initiated".to_string()),
                    ..event("Root", "Root", 1)
                },
                event("Child", "Queue", 1),
            ],
        };
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines[0], "2014-03-01 12:00:01 [Root]\tRoot: CREATE_COMPLETE User Initiated");
        assert_eq!(lines[1], "2014-03-01 12:00:01 [Child]\tQueue: CREATE_COMPLETE");
    }
}
