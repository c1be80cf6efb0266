//! Canonical CSS variable names for token values.
//!
//! Property kinds form a closed set. Each kind carries its naming and value
//! rules as data in [`KindRule`], so the interner never branches on property
//! name strings.
//!
//! A name depends only on the kind and the raw value (and, for font families,
//! on `fontFamilyMap`). Normalization is lossy, so every fragment has exactly
//! one canonical spelling that owns the plain name; any other spelling gets a
//! `_` plus eight hex digits of the SHA-256 of its raw text. Plain fragments
//! never contain `_`.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::config::RawValue;
use crate::units::split_numeric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKind {
    FontFamily,
    FontWeight,
    FontSize,
    LineHeight,
    LetterSpacing,
    TextTransform,
    Spacing,
    Color,
}

/// Where a property kind is declared in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Top level of a class, shared by every breakpoint.
    Invariant,
    /// Inside a class's `mobile` / `desktop` object.
    Breakpoint,
    /// A flat key/value table (`spacingMap`, `colors`).
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransform {
    Verbatim,
    PxToRem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    /// `--{prefix}-{category}-{css-property}-{value}`
    ClassScoped,
    /// `--{prefix}-{category}-font-family-{alias}`
    FontAlias,
    /// `--{prefix}-{namespace}-{key}`
    Flat(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindRule {
    pub config_key: &'static str,
    pub css_property: &'static str,
    pub scope: Scope,
    pub transform: ValueTransform,
    pub naming: NamingScheme,
    /// Unit dropped from numeric name fragments; other units are kept.
    pub native_unit: &'static str,
}

const RULES: [KindRule; 8] = [
    KindRule {
        config_key: "fontFamily",
        css_property: "font-family",
        scope: Scope::Invariant,
        transform: ValueTransform::Verbatim,
        naming: NamingScheme::FontAlias,
        native_unit: "",
    },
    KindRule {
        config_key: "fontWeight",
        css_property: "font-weight",
        scope: Scope::Invariant,
        transform: ValueTransform::Verbatim,
        naming: NamingScheme::ClassScoped,
        native_unit: "",
    },
    KindRule {
        config_key: "fontSize",
        css_property: "font-size",
        scope: Scope::Breakpoint,
        transform: ValueTransform::PxToRem,
        naming: NamingScheme::ClassScoped,
        native_unit: "px",
    },
    KindRule {
        config_key: "lineHeight",
        css_property: "line-height",
        scope: Scope::Breakpoint,
        transform: ValueTransform::PxToRem,
        naming: NamingScheme::ClassScoped,
        native_unit: "",
    },
    KindRule {
        config_key: "letterSpacing",
        css_property: "letter-spacing",
        scope: Scope::Invariant,
        transform: ValueTransform::Verbatim,
        naming: NamingScheme::ClassScoped,
        native_unit: "em",
    },
    KindRule {
        config_key: "textTransform",
        css_property: "text-transform",
        scope: Scope::Invariant,
        transform: ValueTransform::Verbatim,
        naming: NamingScheme::ClassScoped,
        native_unit: "",
    },
    KindRule {
        config_key: "spacingMap",
        css_property: "spacing",
        scope: Scope::Flat,
        transform: ValueTransform::PxToRem,
        naming: NamingScheme::Flat("spacing"),
        native_unit: "",
    },
    KindRule {
        config_key: "colors",
        css_property: "color",
        scope: Scope::Flat,
        transform: ValueTransform::Verbatim,
        naming: NamingScheme::Flat("color"),
        native_unit: "",
    },
];

impl PropertyKind {
    pub const ALL: [PropertyKind; 8] = [
        PropertyKind::FontFamily,
        PropertyKind::FontWeight,
        PropertyKind::FontSize,
        PropertyKind::LineHeight,
        PropertyKind::LetterSpacing,
        PropertyKind::TextTransform,
        PropertyKind::Spacing,
        PropertyKind::Color,
    ];

    /// Typography kinds in emission order.
    pub const TYPOGRAPHY: [PropertyKind; 6] = [
        PropertyKind::FontFamily,
        PropertyKind::FontWeight,
        PropertyKind::FontSize,
        PropertyKind::LineHeight,
        PropertyKind::LetterSpacing,
        PropertyKind::TextTransform,
    ];

    pub fn rule(self) -> &'static KindRule {
        &RULES[self as usize]
    }

    pub fn config_key(self) -> &'static str {
        self.rule().config_key
    }

    pub fn css_property(self) -> &'static str {
        self.rule().css_property
    }

    pub fn scope(self) -> Scope {
        self.rule().scope
    }

    /// Kinds declared with the given scope, in emission order.
    pub fn with_scope(scope: Scope) -> impl Iterator<Item = PropertyKind> {
        Self::ALL.into_iter().filter(move |kind| kind.scope() == scope)
    }

    /// Looks up a class-level property by its config key.
    pub fn from_config_key(key: &str) -> Option<PropertyKind> {
        Self::TYPOGRAPHY
            .into_iter()
            .find(|kind| kind.config_key() == key)
    }
}

/// Builds the CSS variable name for a raw value.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalNamer<'a> {
    prefix: &'a str,
    category: &'a str,
    font_family_map: &'a BTreeMap<String, RawValue>,
}

impl<'a> CanonicalNamer<'a> {
    pub fn new(
        prefix: &'a str,
        category: &'a str,
        font_family_map: &'a BTreeMap<String, RawValue>,
    ) -> Self {
        Self {
            prefix,
            category,
            font_family_map,
        }
    }

    /// Name for a class property value (`raw`) or a flat table key.
    pub fn name(&self, kind: PropertyKind, raw: &str) -> String {
        match kind.rule().naming {
            NamingScheme::ClassScoped => format!(
                "--{}-{}-{}-{}",
                self.prefix,
                self.category,
                kind.css_property(),
                value_fragment(kind, raw)
            ),
            NamingScheme::FontAlias => format!(
                "--{}-{}-font-family-{}",
                self.prefix,
                self.category,
                self.font_family_fragment(raw)
            ),
            NamingScheme::Flat(namespace) => {
                format!("--{}-{}-{}", self.prefix, namespace, key_fragment(raw))
            }
        }
    }

    /// Alias for a font-family value: the first `fontFamilyMap` key holding
    /// exactly this value, else the first listed family in kebab-case.
    pub fn font_family_alias(&self, raw: &str) -> String {
        match self.mapped_alias(raw) {
            Some(alias) => slugify(alias),
            None => derived_alias(raw),
        }
    }

    fn mapped_alias(&self, raw: &str) -> Option<&'a str> {
        self.font_family_map
            .iter()
            .find(|(_, value)| value.as_str() == raw)
            .map(|(alias, _)| alias.as_str())
    }

    fn font_family_fragment(&self, raw: &str) -> String {
        if let Some(alias) = self.mapped_alias(raw) {
            let fragment = slugify(alias);
            if alias == key_spelling(&fragment) {
                return fragment;
            }
            return disambiguate(&fragment, &format!("{}={}", alias, raw));
        }
        let alias = derived_alias(raw);
        // Plain aliases of mapped keys are never handed to derived values.
        let reserved = self.font_family_map.keys().any(|key| slugify(key) == alias);
        if raw == alias && !reserved {
            alias
        } else {
            disambiguate(&alias, raw)
        }
    }
}

fn derived_alias(raw: &str) -> String {
    let unquoted = raw.replace(['"', '\''], "");
    let first = unquoted.split(',').next().unwrap_or_default();
    slugify(first)
}

/// Identifier fragment for a class property value.
///
/// Numeric values drop the kind's native unit (a leading `-` becomes `n`,
/// `.` becomes `-`, `%` becomes `pct`); other values are slugified.
pub fn value_fragment(kind: PropertyKind, raw: &str) -> String {
    let (fragment, canonical) = match numeric_fragment(kind, raw) {
        Some(numeric) => numeric,
        None => {
            let fragment = slugify(raw);
            let canonical = raw == fragment && !looks_numeric(&fragment);
            (fragment, canonical)
        }
    };
    if canonical {
        fragment
    } else {
        disambiguate(&fragment, raw)
    }
}

/// Fragment for a flat table key. `brandPrimary` and `gray-100` keep their
/// plain fragment; spellings that slugify the same way are disambiguated.
pub fn key_fragment(key: &str) -> String {
    let fragment = slugify(key);
    if key == key_spelling(&fragment) {
        fragment
    } else {
        disambiguate(&fragment, key)
    }
}

/// Returns the fragment and whether `raw` is its canonical spelling.
fn numeric_fragment(kind: PropertyKind, raw: &str) -> Option<(String, bool)> {
    let (number, unit) = split_numeric(raw)?;
    let native_unit = kind.rule().native_unit;
    let unsigned = number.strip_prefix('+').unwrap_or(number);
    let (negative, digits) = match unsigned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, unsigned),
    };

    let mut fragment = String::with_capacity(raw.len() + 1);
    if negative {
        fragment.push('n');
    }
    if digits.starts_with('.') {
        fragment.push('0');
    }
    fragment.push_str(&digits.replace('.', "-"));
    if unit == "%" {
        fragment.push_str("pct");
    } else if unit != native_unit {
        fragment.push_str(&unit.to_ascii_lowercase());
    }

    let unit_canonical = unit == native_unit
        || unit == "%"
        || (!unit.is_empty() && unit != "pct" && unit.chars().all(|ch| ch.is_ascii_lowercase()));
    let canonical = raw.len() == number.len() + unit.len()
        && !number.starts_with('+')
        && digits.starts_with(|ch: char| ch.is_ascii_digit())
        && !digits.ends_with('.')
        && unit_canonical;
    Some((fragment, canonical))
}

/// True for fragments a numeric value could produce.
fn looks_numeric(fragment: &str) -> bool {
    let rest = fragment.strip_prefix('n').unwrap_or(fragment);
    let digits_end = rest
        .find(|ch: char| !ch.is_ascii_digit() && ch != '-')
        .unwrap_or(rest.len());
    rest.starts_with(|ch: char| ch.is_ascii_digit())
        && rest[digits_end..].chars().all(|ch| ch.is_ascii_lowercase())
}

/// The one key spelling that owns a slug: `-x` becomes `X`, `-1` stays.
fn key_spelling(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut chars = fragment.chars().peekable();
    while let Some(ch) = chars.next() {
        match chars.peek().copied() {
            Some(next) if ch == '-' && next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(ch),
        }
    }
    out
}

fn disambiguate(fragment: &str, source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let mut out = format!("{}_", fragment);
    for byte in &digest[..4] {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Lowercase kebab-case; any run of other characters becomes one `-`.
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_upper_or_sep = true;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && !prev_upper_or_sep && !out.ends_with('-') {
                out.push('-');
            }
            prev_upper_or_sep = ch.is_ascii_uppercase();
            out.push(ch.to_ascii_lowercase());
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_upper_or_sep = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "value".to_string()
    } else {
        trimmed.to_string()
    }
}
