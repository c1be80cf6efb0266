//! Per class, per breakpoint property resolution against the variable table.

use std::collections::BTreeMap;

use crate::config::{Breakpoint, TokenConfig};
use crate::interner::{VariableEntry, VariableTable};
use crate::naming::PropertyKind;
use crate::{Error, Result};

/// One `(class, breakpoint, property) → variable` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    pub class_name: String,
    pub breakpoint: Breakpoint,
    pub property: PropertyKind,
    pub variable_name: String,
}

/// The merged property set of one class at one breakpoint. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRule<'t> {
    pub class_name: String,
    pub breakpoint: Breakpoint,
    pub properties: BTreeMap<PropertyKind, &'t VariableEntry>,
}

impl ResolvedRule<'_> {
    pub fn bindings(&self) -> Vec<ResolvedBinding> {
        self.properties
            .iter()
            .map(|(kind, entry)| ResolvedBinding {
                class_name: self.class_name.clone(),
                breakpoint: self.breakpoint,
                property: *kind,
                variable_name: entry.name().to_string(),
            })
            .collect()
    }
}

pub struct ClassResolver<'a> {
    config: &'a TokenConfig,
    table: &'a VariableTable,
}

impl<'a> ClassResolver<'a> {
    pub fn new(config: &'a TokenConfig, table: &'a VariableTable) -> Self {
        Self { config, table }
    }

    /// Merges invariant properties with the requested breakpoint's overrides.
    ///
    /// Returns `Ok(None)` when nothing applies: there is no rule to emit.
    pub fn resolve(
        &self,
        class_name: &str,
        breakpoint: Breakpoint,
    ) -> Result<Option<ResolvedRule<'a>>> {
        if !self.config.classes.contains_key(class_name) {
            return Err(Error::UnknownClass(class_name.to_string()));
        }
        let table = self.table;
        let Some(tokens) = table.class_tokens(class_name) else {
            return Ok(None);
        };

        let mut properties = BTreeMap::new();
        for (kind, id) in tokens.invariant() {
            properties.insert(kind, table.entry(id));
        }
        for (kind, id) in tokens.at_breakpoint(breakpoint) {
            properties.insert(kind, table.entry(id));
        }

        if properties.is_empty() {
            return Ok(None);
        }
        Ok(Some(ResolvedRule {
            class_name: class_name.to_string(),
            breakpoint,
            properties,
        }))
    }

    /// Every non-empty rule for `breakpoint`, in class order.
    pub fn resolve_breakpoint(&self, breakpoint: Breakpoint) -> Result<Vec<ResolvedRule<'a>>> {
        let mut rules = Vec::new();
        for class_name in self.config.classes.keys() {
            if let Some(rule) = self.resolve(class_name, breakpoint)? {
                rules.push(rule);
            }
        }
        Ok(rules)
    }
}
