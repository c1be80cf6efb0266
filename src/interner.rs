//! Value interning: one CSS variable per distinct raw value per property kind.
//!
//! Typography values are keyed by `(kind, raw value)` only, so identical values
//! declared by different classes or at different breakpoints collapse into a
//! single [`VariableEntry`]. Spacing and color tables are keyed by their
//! declared key instead, one entry per key.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::config::{Breakpoint, RawValue, TokenConfig};
use crate::naming::{CanonicalNamer, PropertyKind, Scope, ValueTransform};
use crate::units::px_to_rem;
use crate::{Error, Result};

/// What to do with class keys outside the fixed set of property kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnknownPropertyPolicy {
    #[default]
    Ignore,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    kind: PropertyKind,
    name: String,
    value: String,
    raw_value: RawValue,
}

impl VariableEntry {
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// CSS custom property name, including the leading `--`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value emitted in the `:root` declaration.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn raw_value(&self) -> &RawValue {
        &self.raw_value
    }

    /// `var(--name)` reference.
    pub fn reference(&self) -> String {
        format!("var({})", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(usize);

/// Interned tokens referenced by one class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassTokens {
    invariant: BTreeMap<PropertyKind, EntryId>,
    tiers: BTreeMap<Breakpoint, BTreeMap<PropertyKind, EntryId>>,
}

impl ClassTokens {
    pub fn invariant(&self) -> impl Iterator<Item = (PropertyKind, EntryId)> + '_ {
        self.invariant.iter().map(|(kind, id)| (*kind, *id))
    }

    pub fn at_breakpoint(
        &self,
        breakpoint: Breakpoint,
    ) -> impl Iterator<Item = (PropertyKind, EntryId)> + '_ {
        self.tiers
            .get(&breakpoint)
            .into_iter()
            .flat_map(|tier| tier.iter().map(|(kind, id)| (*kind, *id)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    entries: Vec<VariableEntry>,
    by_value: BTreeMap<(PropertyKind, RawValue), EntryId>,
    by_key: BTreeMap<(PropertyKind, String), EntryId>,
    classes: BTreeMap<String, ClassTokens>,
}

impl VariableTable {
    /// All entries in creation order.
    pub fn entries(&self) -> &[VariableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: EntryId) -> &VariableEntry {
        &self.entries[id.0]
    }

    pub fn entries_of(&self, kind: PropertyKind) -> impl Iterator<Item = &VariableEntry> {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }

    /// Entries grouped by kind, kinds in emission order.
    pub fn by_kind(&self) -> BTreeMap<PropertyKind, Vec<&VariableEntry>> {
        let mut grouped: BTreeMap<PropertyKind, Vec<&VariableEntry>> = BTreeMap::new();
        for entry in &self.entries {
            grouped.entry(entry.kind).or_default().push(entry);
        }
        grouped
    }

    /// Typography entry for a raw value.
    pub fn lookup(&self, kind: PropertyKind, raw: &str) -> Option<&VariableEntry> {
        self.by_value
            .get(&(kind, RawValue::from(raw)))
            .map(|id| self.entry(*id))
    }

    pub fn spacing(&self, key: &str) -> Option<&VariableEntry> {
        self.flat(PropertyKind::Spacing, key)
    }

    pub fn color(&self, key: &str) -> Option<&VariableEntry> {
        self.flat(PropertyKind::Color, key)
    }

    fn flat(&self, kind: PropertyKind, key: &str) -> Option<&VariableEntry> {
        self.by_key
            .get(&(kind, key.to_string()))
            .map(|id| self.entry(*id))
    }

    pub fn class_tokens(&self, class_name: &str) -> Option<&ClassTokens> {
        self.classes.get(class_name)
    }

    /// `class → property → entry` for breakpoint-invariant properties.
    pub fn class_property(&self, class_name: &str, kind: PropertyKind) -> Option<&VariableEntry> {
        let tokens = self.classes.get(class_name)?;
        tokens.invariant.get(&kind).map(|id| self.entry(*id))
    }

    /// `class → property → breakpoint → entry` for per-breakpoint properties.
    pub fn class_breakpoint_property(
        &self,
        class_name: &str,
        kind: PropertyKind,
        breakpoint: Breakpoint,
    ) -> Option<&VariableEntry> {
        let tokens = self.classes.get(class_name)?;
        tokens
            .tiers
            .get(&breakpoint)?
            .get(&kind)
            .map(|id| self.entry(*id))
    }

    /// Resolved values by variable name, as captured in snapshots.
    pub fn values_by_name(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|entry| (entry.name.clone(), entry.value.clone()))
            .collect()
    }
}

/// Interns every value in `config` using the config's own unknown-property
/// policy.
pub fn intern(config: &TokenConfig) -> Result<VariableTable> {
    intern_with_policy(config, config.build.unknown_properties)
}

pub fn intern_with_policy(
    config: &TokenConfig,
    policy: UnknownPropertyPolicy,
) -> Result<VariableTable> {
    let mut interner = TokenInterner {
        namer: CanonicalNamer::new(&config.prefix, &config.category, &config.font_family_map),
        base_font_size: config.base_font_size,
        table: VariableTable::default(),
    };

    for (class_name, spec) in &config.classes {
        check_unknown_properties(class_name, &spec.unknown_properties(), policy)?;

        let mut tokens = ClassTokens::default();
        for kind in PropertyKind::with_scope(Scope::Invariant) {
            if let Some(raw) = spec.invariant(kind) {
                let id = interner.intern_value(kind, raw);
                tokens.invariant.insert(kind, id);
            }
        }
        for breakpoint in Breakpoint::ALL {
            for kind in PropertyKind::with_scope(Scope::Breakpoint) {
                if let Some(raw) = spec.at_breakpoint(kind, breakpoint) {
                    let id = interner.intern_value(kind, raw);
                    tokens.tiers.entry(breakpoint).or_default().insert(kind, id);
                }
            }
        }
        interner.table.classes.insert(class_name.clone(), tokens);
    }

    for (key, raw) in &config.spacing_map {
        interner.intern_key(PropertyKind::Spacing, key, raw);
    }
    for (key, raw) in &config.colors {
        interner.intern_key(PropertyKind::Color, key, raw);
    }

    tracing::debug!(
        variables = interner.table.len(),
        classes = config.classes.len(),
        "interned token values"
    );
    Ok(interner.table)
}

fn check_unknown_properties(
    class_name: &str,
    unknown: &[String],
    policy: UnknownPropertyPolicy,
) -> Result<()> {
    for property in unknown {
        match policy {
            UnknownPropertyPolicy::Ignore => {
                tracing::debug!(class = class_name, property = %property, "skipping unrecognized property");
            }
            UnknownPropertyPolicy::Warn => {
                tracing::warn!(class = class_name, property = %property, "skipping unrecognized property");
            }
            UnknownPropertyPolicy::Error => {
                return Err(Error::unknown_property(class_name, property.clone()));
            }
        }
    }
    Ok(())
}

struct TokenInterner<'a> {
    namer: CanonicalNamer<'a>,
    base_font_size: f64,
    table: VariableTable,
}

impl TokenInterner<'_> {
    fn intern_value(&mut self, kind: PropertyKind, raw: &RawValue) -> EntryId {
        if let Some(id) = self.table.by_value.get(&(kind, raw.clone())) {
            return *id;
        }
        let name = self.namer.name(kind, raw.as_str());
        let id = self.push(kind, name, raw);
        self.table.by_value.insert((kind, raw.clone()), id);
        id
    }

    fn intern_key(&mut self, kind: PropertyKind, key: &str, raw: &RawValue) -> EntryId {
        let name = self.namer.name(kind, key);
        let id = self.push(kind, name, raw);
        self.table.by_key.insert((kind, key.to_string()), id);
        id
    }

    fn push(&mut self, kind: PropertyKind, name: String, raw: &RawValue) -> EntryId {
        let value = match kind.rule().transform {
            ValueTransform::Verbatim => raw.as_str().to_string(),
            ValueTransform::PxToRem => px_to_rem(raw.as_str(), self.base_font_size),
        };
        let id = EntryId(self.table.entries.len());
        self.table.entries.push(VariableEntry {
            kind,
            name,
            value,
            raw_value: raw.clone(),
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::{UnknownPropertyPolicy, intern, intern_with_policy};
    use crate::Error;
    use crate::config::{Breakpoint, parse_json};
    use crate::naming::PropertyKind;
    use crate::resolver::ClassResolver;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn config(classes: &str) -> crate::config::TokenConfig {
        parse_json(&format!(
            r##"{{
                "prefix": "hg",
                "category": "typo",
                "breakpoints": {{"mobile": "375px", "desktop": "1024px"}},
                "spacingMap": {{"sm": "8px", "md": "8px"}},
                "colors": {{"primary": "#0055ff"}},
                "classes": {}
            }}"##,
            classes
        ))
        .expect("valid config")
    }

    #[test]
    fn shared_font_weight_produces_one_variable() {
        let config = config(r#"{"h1": {"fontWeight": 700}, "h2": {"fontWeight": 700}, "h3": {"fontWeight": "700"}}"#);
        let table = intern(&config).expect("interning succeeds");

        let weights: Vec<_> = table.entries_of(PropertyKind::FontWeight).collect();
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].name(), "--hg-typo-font-weight-700");
        for class in ["h1", "h2", "h3"] {
            let entry = table
                .class_property(class, PropertyKind::FontWeight)
                .expect("bound");
            assert_eq!(entry.name(), weights[0].name());
        }

        let resolver = ClassResolver::new(&config, &table);
        for class in ["h1", "h2", "h3"] {
            for breakpoint in Breakpoint::ALL {
                let bindings = resolver
                    .resolve(class, breakpoint)
                    .expect("known class")
                    .expect("non-empty rule")
                    .bindings();
                assert_eq!(bindings.len(), 1);
                assert_eq!(bindings[0].variable_name, "--hg-typo-font-weight-700");
            }
        }
    }

    #[test]
    fn font_size_collapses_across_breakpoints() {
        let config = config(
            r#"{"a": {"mobile": {"fontSize": "16px"}}, "b": {"desktop": {"fontSize": "16px"}, "mobile": {"fontSize": "14px"}}}"#,
        );
        let table = intern(&config).expect("interning succeeds");

        assert_eq!(table.entries_of(PropertyKind::FontSize).count(), 2);
        let a = table
            .class_breakpoint_property("a", PropertyKind::FontSize, Breakpoint::Mobile)
            .expect("a mobile");
        let b = table
            .class_breakpoint_property("b", PropertyKind::FontSize, Breakpoint::Desktop)
            .expect("b desktop");
        assert_eq!(a, b);
        assert_eq!(a.value(), "1rem");
        assert_eq!(a.raw_value().as_str(), "16px");
        assert!(
            table
                .class_breakpoint_property("a", PropertyKind::FontSize, Breakpoint::Desktop)
                .is_none()
        );
    }

    #[test]
    fn spacing_and_colors_get_one_entry_per_key() {
        let config = config("{}");
        let table = intern(&config).expect("interning succeeds");

        let spacing: Vec<_> = table
            .entries_of(PropertyKind::Spacing)
            .map(|entry| (entry.name().to_string(), entry.value().to_string()))
            .collect();
        assert_eq!(
            spacing,
            vec![
                ("--hg-spacing-md".to_string(), "0.5rem".to_string()),
                ("--hg-spacing-sm".to_string(), "0.5rem".to_string()),
            ]
        );
        assert_eq!(
            table.color("primary").map(|entry| entry.value()),
            Some("#0055ff")
        );
    }

    #[test]
    fn lossy_names_are_disambiguated() {
        let config = config(
            r#"{"a": {"letterSpacing": "16px"}, "b": {"letterSpacing": "16rem"}, "c": {"letterSpacing": "16.0px"}, "d": {"letterSpacing": "\"16px\""}}"#,
        );
        let table = intern(&config).expect("interning succeeds");
        let names: Vec<_> = table
            .entries_of(PropertyKind::LetterSpacing)
            .map(|entry| entry.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "--hg-typo-letter-spacing-16px",
                "--hg-typo-letter-spacing-16rem",
                "--hg-typo-letter-spacing-16-0px",
                "--hg-typo-letter-spacing-16px_75dc09b3",
            ]
        );
    }

    #[test]
    fn names_do_not_depend_on_other_classes() {
        let alone = intern(&config(r#"{"b": {"letterSpacing": "16px"}}"#))
            .expect("interning succeeds");
        let with_sibling = intern(&config(
            r#"{"a": {"letterSpacing": "16rem"}, "b": {"letterSpacing": "16px"}}"#,
        ))
        .expect("interning succeeds");

        let before = alone
            .class_property("b", PropertyKind::LetterSpacing)
            .expect("b bound");
        let after = with_sibling
            .class_property("b", PropertyKind::LetterSpacing)
            .expect("b bound");
        assert_eq!(before.name(), after.name());
        assert_ne!(
            with_sibling
                .class_property("a", PropertyKind::LetterSpacing)
                .expect("a bound")
                .name(),
            after.name()
        );
    }

    #[test]
    fn unknown_properties_follow_policy() {
        let config = config(r#"{"h1": {"fontWeight": 700, "fontStyle": "italic"}}"#);

        let table = intern_with_policy(&config, UnknownPropertyPolicy::Ignore)
            .expect("ignored by default");
        assert_eq!(table.len(), 4);
        assert!(intern_with_policy(&config, UnknownPropertyPolicy::Warn).is_ok());

        let err = intern_with_policy(&config, UnknownPropertyPolicy::Error)
            .expect_err("rejected under error policy");
        assert!(matches!(
            err,
            Error::UnknownProperty { ref class_name, ref property }
                if class_name == "h1" && property == "fontStyle"
        ));
    }

    #[test]
    fn unknown_tier_properties_are_reported_with_breakpoint() {
        let config = config(r#"{"h1": {"mobile": {"fontSize": "20px", "fontStretch": "condensed"}}}"#);
        let err = intern_with_policy(&config, UnknownPropertyPolicy::Error)
            .expect_err("rejected under error policy");
        assert!(err.to_string().contains("mobile.fontStretch"));
    }

    fn value_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "-?[0-9]{1,3}(\\.[0-9]{1,2})?(px|rem|em|%)?",
            "\"?[0-9]{1,2}(\\.0)?px\"?",
            "[a-zA-Z ,'\"-]{1,12}",
        ]
    }

    proptest! {
        #[test]
        fn distinct_raw_values_never_share_a_name(values in prop::collection::btree_set(value_strategy(), 1..12)) {
            let classes: Vec<String> = values
                .iter()
                .enumerate()
                .map(|(idx, value)| {
                    format!(
                        "\"c{}\": {{\"letterSpacing\": {}, \"fontFamily\": {}}}",
                        idx,
                        serde_json::to_string(value).expect("string encodes"),
                        serde_json::to_string(value).expect("string encodes"),
                    )
                })
                .collect();
            let config = config(&format!("{{{}}}", classes.join(",")));
            let table = intern(&config).expect("interning succeeds");

            for kind in [PropertyKind::LetterSpacing, PropertyKind::FontFamily] {
                let entries: Vec<_> = table.entries_of(kind).collect();
                prop_assert_eq!(entries.len(), values.len());
                let names: BTreeSet<_> = entries.iter().map(|entry| entry.name()).collect();
                prop_assert_eq!(names.len(), values.len());
            }
        }
    }
}
