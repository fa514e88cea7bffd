//! Template composition engine.
//!
//! Templates are declared as builder tables ([`TemplateDef`]) and built into
//! node graphs by a per-render [`Template`] instance. Builders receive a
//! [`Scope`] through which they ask for other nodes; the scope memoizes every
//! node for the life of the instance and rejects recursion into a node whose
//! builder is still running.
//!
//! # Module Structure
//!
//! - [`value`] - literal and deferred property values
//! - [`condition`] - boolean expressions compiled into the document
//! - [`definition`] - the shapes builders return, one per section
//! - [`node`] - builder keys and built nodes
//! - [`registry`] - declared builder tables and specialization
//! - [`scope`] - builder-side access to the template
//!
//! # Example
//!
//! ```rust
//! use brix::template::{Parameter, Resource, Template, TemplateDef, Value};
//!
//! # fn main() -> Result<(), brix::template::BuildError> {
//! let mut def = TemplateDef::new("network");
//! def.parameter("Ip", |_| Ok(Parameter::string().with_default("5")))?
//!     .resource("Vpc", |scope| {
//!         let ip = scope.parameter("Ip")?;
//!         Ok(Resource::new("AWS::EC2::VPC")
//!             .property("CidrBlock", Value::join(["10.".into(), ip.reference(), ".0.0/16".into()])))
//!     })?;
//!
//! let mut template = Template::new(&def);
//! template.build_all()?;
//! assert_eq!(template.nodes().len(), 2);
//! # Ok(())
//! # }
//! ```

mod cache;
pub mod condition;
pub mod definition;
pub mod error;
pub mod node;
pub mod registry;
pub mod scope;
pub mod value;

use std::collections::BTreeMap;

pub use condition::Condition;
pub use definition::{
    Category, Definition, Mapping, NESTED_STACK_TYPE, Namespace, NestedStackLink, Output,
    Parameter, Resource,
};
pub use error::BuildError;
pub use node::{Key, Node, NodeRef};
pub use registry::{BuildFn, TemplateDef};
pub use scope::Scope;
pub use value::{NO_VALUE, PSEUDO_PREFIX, Pseudo, Value};

use cache::NodeCache;

/// One build of a [`TemplateDef`].
///
/// Nodes are created on first access and live as long as the instance. A
/// fresh instance is made for every render.
pub struct Template<'d> {
    def: &'d TemplateDef,
    cache: NodeCache,
}

impl<'d> Template<'d> {
    /// Empty instance of `def`; nothing is built yet.
    pub fn new(def: &'d TemplateDef) -> Self {
        Self {
            def,
            cache: NodeCache::new(),
        }
    }

    /// Definition this instance builds.
    pub fn definition(&self) -> &'d TemplateDef {
        self.def
    }

    /// Build `key` on first use; later calls return the same node.
    pub fn get_or_build(&mut self, key: &Key) -> Result<NodeRef, BuildError> {
        Scope::new(self.def, &mut self.cache).get(key)
    }

    /// Build every declared key.
    pub fn build_all(&mut self) -> Result<(), BuildError> {
        let def = self.def;
        for key in def.keys() {
            self.get_or_build(key)?;
        }
        Ok(())
    }

    /// Built nodes: declared nodes in declaration order followed by
    /// attached nodes in the order they were attached.
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.def
            .keys()
            .filter_map(|key| self.cache.built(key).cloned())
            .chain(self.cache.attached().cloned())
            .collect()
    }

    /// Built nodes grouped by category, each group in [`Template::nodes`] order.
    pub fn nodes_by_category(&self) -> BTreeMap<Category, Vec<NodeRef>> {
        let mut groups: BTreeMap<Category, Vec<NodeRef>> = BTreeMap::new();
        for node in self.nodes() {
            groups.entry(node.category()).or_default().push(node);
        }
        groups
    }

    /// `(hits, misses)` of the node cache so far.
    pub fn cache_stats(&self) -> (usize, usize) {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn shared_group_def() -> TemplateDef {
        let mut def = TemplateDef::new("shared");
        def.resource("SecurityGroup", |_| Ok(Resource::new("AWS::EC2::SecurityGroup")))
            .unwrap()
            .resource("Instance", |scope| {
                let sg = scope.resource("SecurityGroup")?;
                Ok(Resource::new("AWS::EC2::Instance").property("SecurityGroups", vec![sg.reference()]))
            })
            .unwrap()
            .resource("LoadBalancer", |scope| {
                let sg = scope.resource("SecurityGroup")?;
                Ok(Resource::new("AWS::ElasticLoadBalancing::LoadBalancer")
                    .property("SecurityGroups", vec![sg.reference()]))
            })
            .unwrap();
        def
    }

    #[test]
    fn test_repeated_lookups_share_one_node() {
        let def = shared_group_def();
        let mut template = Template::new(&def);
        let first = template.get_or_build(&Key::resource("SecurityGroup")).unwrap();
        template.build_all().unwrap();
        let second = template.get_or_build(&Key::resource("SecurityGroup")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let groups = template.nodes_by_category();
        let resources = &groups[&Category::Resource];
        let sg_count = resources.iter().filter(|n| n.logical_id() == "SecurityGroup").count();
        assert_eq!(sg_count, 1);
        assert_eq!(resources.len(), 3);

        let (hits, misses) = template.cache_stats();
        assert_eq!(misses, template.nodes().len());
        assert!(hits >= 2);
    }

    #[test]
    fn test_mutual_recursion_is_a_cyclic_reference() {
        let mut def = TemplateDef::new("cycle");
        def.resource("A", |scope| {
            scope.resource("B")?;
            Ok(Resource::new("AWS::SQS::Queue"))
        })
        .unwrap()
        .resource("B", |scope| {
            scope.resource("A")?;
            Ok(Resource::new("AWS::SQS::Queue"))
        })
        .unwrap();

        let mut template = Template::new(&def);
        let err = template.build_all().unwrap_err();
        assert_eq!(
            err,
            BuildError::CyclicReference {
                key: Key::resource("A"),
                chain: "resource:A → resource:B → resource:A".to_string(),
            }
        );
    }

    #[test]
    fn test_failed_builder_can_be_retried_after_abandon() {
        let mut def = TemplateDef::new("missing");
        def.resource("A", |scope| {
            scope.parameter("NotDeclared")?;
            Ok(Resource::new("AWS::SQS::Queue"))
        })
        .unwrap();

        let mut template = Template::new(&def);
        let first = template.get_or_build(&Key::resource("A")).unwrap_err();
        let second = template.get_or_build(&Key::resource("A")).unwrap_err();
        assert!(matches!(first, BuildError::UnknownKey { .. }));
        assert_eq!(first, second);
    }

    #[test]
    fn test_attached_nodes_follow_declared_nodes() {
        let mut def = TemplateDef::new("attached");
        def.resource("Group", |scope| {
            scope.attach("GroupSelfIngress", Resource::new("AWS::EC2::SecurityGroupIngress"))?;
            Ok(Resource::new("AWS::EC2::SecurityGroup"))
        })
        .unwrap()
        .parameter("Env", |_| Ok(Parameter::string()))
        .unwrap();

        let mut template = Template::new(&def);
        template.build_all().unwrap();
        let ids: Vec<_> = template.nodes().iter().map(|n| n.logical_id().to_string()).collect();
        assert_eq!(ids, vec!["Group", "Env", "GroupSelfIngress"]);
    }

    #[test]
    fn test_builder_failing_after_attach_can_be_rebuilt() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let failed_once = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&failed_once);
        let mut def = TemplateDef::new("retry");
        def.resource("Group", move |scope| {
            scope.attach("GroupSelfIngress", Resource::new("AWS::EC2::SecurityGroupIngress"))?;
            if !flag.swap(true, Ordering::SeqCst) {
                return Err(BuildError::MissingConfiguration {
                    template: "retry".to_string(),
                    setting: "port".to_string(),
                });
            }
            Ok(Resource::new("AWS::EC2::SecurityGroup"))
        })
        .unwrap();

        let mut template = Template::new(&def);
        let key = Key::resource("Group");
        assert!(matches!(
            template.get_or_build(&key),
            Err(BuildError::MissingConfiguration { .. })
        ));
        template.get_or_build(&key).unwrap();

        let ids: Vec<_> = template.nodes().iter().map(|n| n.logical_id().to_string()).collect();
        assert_eq!(ids, vec!["Group", "GroupSelfIngress"]);
        assert!(failed_once.load(Ordering::SeqCst));
    }

    #[test]
    fn test_attach_rejects_declared_ids() {
        let mut def = TemplateDef::new("clash");
        def.parameter("Taken", |_| Ok(Parameter::string()))
            .unwrap()
            .resource("Group", |scope| {
                scope.attach("Taken", Resource::new("AWS::EC2::SecurityGroupIngress"))?;
                Ok(Resource::new("AWS::EC2::SecurityGroup"))
            })
            .unwrap();

        let mut template = Template::new(&def);
        assert!(matches!(
            template.build_all(),
            Err(BuildError::DuplicateLogicalId { .. })
        ));
    }
}
