//! Reverse lookups over the tables of one module.
//!
//! Many tables point from child to parent (`NestedClass`, `InterfaceImpl`, `CustomAttribute`,
//! `GenericParam`, ...) while the wrapper graph navigates from parent to child. The index is built
//! with a single pass over each of those tables the first time any wrapper needs it.

use std::{
    collections::{HashMap, HashSet},
    ops::Range,
};

use crate::{
    metadata::{
        module::Module,
        tables::{
            CodedIndex, ConstantRaw, CustomAttributeRaw, EventMapRaw, ExportedTypeRaw,
            GenericParamConstraintRaw, GenericParamRaw, InterfaceImplRaw, MethodImplRaw,
            NestedClassRaw, PropertyMapRaw, TableId, TypeDefRaw,
        },
        token::Token,
    },
    Error::RecursionLimit,
    Result,
};

/// Deepest nesting of types or exported types accepted
const MAX_NESTING_DEPTH: usize = 64;

/// Parent to child lookups of one module.
#[derive(Default)]
pub struct ModuleIndex {
    enclosing: HashMap<u32, u32>,
    nested: HashMap<u32, Vec<u32>>,
    interfaces: HashMap<u32, Vec<Token>>,
    constraints: HashMap<u32, Vec<Token>>,
    property_ranges: HashMap<u32, Range<u32>>,
    event_ranges: HashMap<u32, Range<u32>>,
    method_impl_bodies: HashSet<u32>,
    method_owners: Vec<u32>,
    attributes: HashMap<Token, Vec<u32>>,
    constants: HashMap<Token, u32>,
    generic_parameters: HashMap<Token, Vec<u32>>,
    type_names: HashMap<String, u32>,
    forwarders: HashMap<String, CodedIndex>,
}

impl ModuleIndex {
    pub(crate) fn build(module: &Module) -> Result<ModuleIndex> {
        let mut index = ModuleIndex::default();

        for row in &module.table::<NestedClassRaw>() {
            index.enclosing.insert(row.nested_class, row.enclosing_class);
            index
                .nested
                .entry(row.enclosing_class)
                .or_default()
                .push(row.nested_class);
        }
        for nested in index.nested.values_mut() {
            nested.sort_unstable();
        }

        for row in &module.table::<InterfaceImplRaw>() {
            index
                .interfaces
                .entry(row.class)
                .or_default()
                .push(row.interface.token);
        }

        for row in &module.table::<GenericParamConstraintRaw>() {
            index
                .constraints
                .entry(row.owner)
                .or_default()
                .push(row.constraint.token);
        }

        let property_count = module.row_count(TableId::Property);
        let property_map = module.table::<PropertyMapRaw>();
        for row in &property_map {
            let end = property_map
                .get(row.rid + 1)
                .map_or(property_count + 1, |next| next.property_list);
            index
                .property_ranges
                .insert(row.parent, row.property_list..end.max(row.property_list));
        }

        let event_count = module.row_count(TableId::Event);
        let event_map = module.table::<EventMapRaw>();
        for row in &event_map {
            let end = event_map
                .get(row.rid + 1)
                .map_or(event_count + 1, |next| next.event_list);
            index
                .event_ranges
                .insert(row.parent, row.event_list..end.max(row.event_list));
        }

        for row in &module.table::<MethodImplRaw>() {
            if row.method_body.tag == TableId::MethodDef {
                index.method_impl_bodies.insert(row.method_body.row);
            }
        }

        let method_count = module.row_count(TableId::MethodDef);
        index.method_owners = vec![0; method_count as usize];
        let type_defs = module.table::<TypeDefRaw>();
        for row in &type_defs {
            let end = type_defs
                .get(row.rid + 1)
                .map_or(method_count + 1, |next| next.method_list)
                .min(method_count + 1);
            for method in row.method_list..end {
                let slot = (method as usize).checked_sub(1);
                if let Some(owner) = slot.and_then(|slot| index.method_owners.get_mut(slot)) {
                    *owner = row.rid;
                }
            }
        }

        for row in &module.table::<CustomAttributeRaw>() {
            index
                .attributes
                .entry(row.parent.token)
                .or_default()
                .push(row.rid);
        }

        for row in &module.table::<ConstantRaw>() {
            index.constants.entry(row.parent.token).or_insert(row.rid);
        }

        for row in &module.table::<GenericParamRaw>() {
            index
                .generic_parameters
                .entry(row.owner.token)
                .or_default()
                .push(row.rid);
        }

        for row in &type_defs {
            let full_name = index.type_full_name(module, &row)?;
            index.type_names.entry(full_name).or_insert(row.rid);
        }

        let exported_types = module.table::<ExportedTypeRaw>();
        for row in &exported_types {
            let mut segments = vec![module.string_of(row.type_name)?];
            let mut namespace = module.string_of(row.type_namespace)?;
            let mut implementation = row.implementation;

            while implementation.tag == TableId::ExportedType {
                if segments.len() > MAX_NESTING_DEPTH {
                    return Err(RecursionLimit(MAX_NESTING_DEPTH));
                }
                let outer = exported_types.get(implementation.row).ok_or_else(|| {
                    malformed_error!("ExportedType {} has no outer row", row.token)
                })?;
                segments.push(module.string_of(outer.type_name)?);
                namespace = module.string_of(outer.type_namespace)?;
                implementation = outer.implementation;
            }

            segments.reverse();
            let mut full_name = segments.join(".");
            if !namespace.is_empty() {
                full_name = format!("{namespace}.{full_name}");
            }
            index.forwarders.entry(full_name).or_insert(implementation);
        }

        Ok(index)
    }

    fn type_full_name(&self, module: &Module, row: &TypeDefRaw) -> Result<String> {
        let mut segments = vec![module.string_of(row.type_name)?];
        let mut namespace = module.string_of(row.type_namespace)?;
        let mut current = self.enclosing_of(row.rid);

        while let Some(outer_rid) = current {
            if segments.len() > MAX_NESTING_DEPTH {
                return Err(RecursionLimit(MAX_NESTING_DEPTH));
            }
            let outer = module.row::<TypeDefRaw>(outer_rid)?;
            segments.push(module.string_of(outer.type_name)?);
            namespace = module.string_of(outer.type_namespace)?;
            current = self.enclosing_of(outer_rid);
        }

        segments.reverse();
        let joined = segments.join(".");
        Ok(if namespace.is_empty() {
            joined
        } else {
            format!("{namespace}.{joined}")
        })
    }

    /// `TypeDef` row enclosing the nested type `rid`
    #[must_use]
    pub fn enclosing_of(&self, rid: u32) -> Option<u32> {
        self.enclosing.get(&rid).copied()
    }

    /// `TypeDef` rows nested directly in `rid`, in row order
    #[must_use]
    pub fn nested_of(&self, rid: u32) -> &[u32] {
        self.nested.get(&rid).map_or(&[], Vec::as_slice)
    }

    /// Interface tokens implemented by the type `rid`
    pub fn interfaces_of(&self, rid: u32) -> impl Iterator<Item = Token> + '_ {
        self.interfaces.get(&rid).into_iter().flatten().copied()
    }

    /// Constraint tokens of the generic parameter `rid`
    pub fn constraints_of(&self, rid: u32) -> impl Iterator<Item = Token> + '_ {
        self.constraints.get(&rid).into_iter().flatten().copied()
    }

    /// `Property` rows of the type `rid`
    #[must_use]
    pub fn property_range(&self, rid: u32) -> Range<u32> {
        self.property_ranges.get(&rid).cloned().unwrap_or(0..0)
    }

    /// `Event` rows of the type `rid`
    #[must_use]
    pub fn event_range(&self, rid: u32) -> Range<u32> {
        self.event_ranges.get(&rid).cloned().unwrap_or(0..0)
    }

    /// True if the method `rid` is the body of a `MethodImpl` record
    #[must_use]
    pub fn is_method_impl_body(&self, rid: u32) -> bool {
        self.method_impl_bodies.contains(&rid)
    }

    /// `TypeDef` row declaring the method `rid`
    #[must_use]
    pub fn method_owner(&self, rid: u32) -> Option<u32> {
        match self.method_owners.get((rid as usize).checked_sub(1)?) {
            Some(0) | None => None,
            Some(owner) => Some(*owner),
        }
    }

    /// `CustomAttribute` rows applied to `parent`, in row order
    #[must_use]
    pub fn attributes_of(&self, parent: Token) -> &[u32] {
        self.attributes.get(&parent).map_or(&[], Vec::as_slice)
    }

    /// `Constant` row of `parent`
    #[must_use]
    pub fn constant_of(&self, parent: Token) -> Option<u32> {
        self.constants.get(&parent).copied()
    }

    /// `GenericParam` rows owned by `owner`, in row order
    #[must_use]
    pub fn generic_parameters_of(&self, owner: Token) -> &[u32] {
        self.generic_parameters.get(&owner).map_or(&[], Vec::as_slice)
    }

    /// `TypeDef` row of the type named `full_name`, nested types joined with `.`
    #[must_use]
    pub fn type_by_name(&self, full_name: &str) -> Option<u32> {
        self.type_names.get(full_name).copied()
    }

    /// All type names of the module
    pub fn type_names(&self) -> impl Iterator<Item = (&str, u32)> {
        self.type_names.iter().map(|(name, rid)| (name.as_str(), *rid))
    }

    /// Where the `ExportedType` named `full_name` points: an `AssemblyRef` for a forwarder, a
    /// `File` for a type in another module of this assembly
    #[must_use]
    pub fn exported_type(&self, full_name: &str) -> Option<CodedIndex> {
        self.forwarders.get(full_name).copied()
    }
}
