//! Namespace tree over the top-level public types of a module.

use std::collections::BTreeMap;

use crate::{
    metadata::{module::Module, typesystem::TypeDefRc},
    Result,
};

/// One namespace and the namespaces below it.
///
/// Child namespaces are kept ordered by name, types in table order.
#[derive(Debug, Default)]
pub struct Namespace {
    name: String,
    full_name: String,
    types: Vec<TypeDefRc>,
    children: BTreeMap<String, Namespace>,
}

impl Namespace {
    pub(crate) fn build(module: &Module) -> Result<Namespace> {
        let mut root = Namespace::default();
        for definition in module.public_types()? {
            if !definition.is_nested() {
                root.insert(definition.namespace(), definition.clone());
            }
        }
        Ok(root)
    }

    fn insert(&mut self, namespace: &str, definition: TypeDefRc) {
        let mut node = self;
        if !namespace.is_empty() {
            for segment in namespace.split('.') {
                let full_name = if node.full_name.is_empty() {
                    segment.to_string()
                } else {
                    format!("{}.{segment}", node.full_name)
                };
                node = node
                    .children
                    .entry(segment.to_string())
                    .or_insert_with(|| Namespace {
                        name: segment.to_string(),
                        full_name,
                        ..Namespace::default()
                    });
            }
        }
        node.types.push(definition);
    }

    /// Last segment, empty for the global namespace
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted name, empty for the global namespace
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Types declared directly in this namespace
    #[must_use]
    pub fn types(&self) -> &[TypeDefRc] {
        &self.types
    }

    /// Child namespaces, ordered by name
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.children.values()
    }

    /// The namespace `full_name` below this one
    #[must_use]
    pub fn find(&self, full_name: &str) -> Option<&Namespace> {
        if full_name.is_empty() {
            return Some(self);
        }
        full_name
            .split('.')
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    /// Number of types in this namespace and every one below it
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len() + self.children.values().map(Namespace::type_count).sum::<usize>()
    }
}
