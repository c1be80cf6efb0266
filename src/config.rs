use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::diff::{FirstRunPolicy, RemovedClassPolicy};
use crate::interner::UnknownPropertyPolicy;
use crate::naming::PropertyKind;
use crate::units::parse_length;
use crate::{Error, Result};

/// A config value exactly as written. Numbers keep their decimal text so
/// `700` and `"700"` intern to the same token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RawValue(String);

impl RawValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRepr {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawRepr::deserialize(deserializer)? {
            RawRepr::Text(text) => RawValue(text),
            RawRepr::Integer(number) => RawValue(number.to_string()),
            RawRepr::Float(number) => RawValue(number.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Breakpoint {
    Mobile,
    Desktop,
}

impl Breakpoint {
    /// Ascending; mobile is the default tier.
    pub const ALL: [Breakpoint; 2] = [Breakpoint::Mobile, Breakpoint::Desktop];

    pub fn as_str(self) -> &'static str {
        match self {
            Breakpoint::Mobile => "mobile",
            Breakpoint::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoints {
    pub mobile: RawValue,
    pub desktop: RawValue,
}

impl Breakpoints {
    pub fn get(&self, breakpoint: Breakpoint) -> &RawValue {
        match breakpoint {
            Breakpoint::Mobile => &self.mobile,
            Breakpoint::Desktop => &self.desktop,
        }
    }
}

/// Per-breakpoint typography overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<RawValue>,
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub unknown: BTreeMap<String, serde_json::Value>,
}

impl TierSpec {
    pub fn get(&self, kind: PropertyKind) -> Option<&RawValue> {
        match kind {
            PropertyKind::FontSize => self.font_size.as_ref(),
            PropertyKind::LineHeight => self.line_height.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_transform: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<TierSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<TierSpec>,
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub unknown: BTreeMap<String, serde_json::Value>,
}

impl ClassSpec {
    /// Breakpoint-invariant property value.
    pub fn invariant(&self, kind: PropertyKind) -> Option<&RawValue> {
        match kind {
            PropertyKind::FontFamily => self.font_family.as_ref(),
            PropertyKind::FontWeight => self.font_weight.as_ref(),
            PropertyKind::LetterSpacing => self.letter_spacing.as_ref(),
            PropertyKind::TextTransform => self.text_transform.as_ref(),
            _ => None,
        }
    }

    pub fn tier(&self, breakpoint: Breakpoint) -> Option<&TierSpec> {
        match breakpoint {
            Breakpoint::Mobile => self.mobile.as_ref(),
            Breakpoint::Desktop => self.desktop.as_ref(),
        }
    }

    /// Value declared for `kind` at `breakpoint` only; never falls back.
    pub fn at_breakpoint(&self, kind: PropertyKind, breakpoint: Breakpoint) -> Option<&RawValue> {
        self.tier(breakpoint).and_then(|tier| tier.get(kind))
    }

    /// Unrecognized keys at class level and inside each tier, as dotted paths.
    pub fn unknown_properties(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.unknown.keys().cloned().collect();
        for breakpoint in Breakpoint::ALL {
            if let Some(tier) = self.tier(breakpoint) {
                keys.extend(
                    tier.unknown
                        .keys()
                        .map(|key| format!("{}.{}", breakpoint, key)),
                );
            }
        }
        keys
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    pub snapshot_path: Option<PathBuf>,
    pub on_first_run: FirstRunPolicy,
    pub on_removed_class: RemovedClassPolicy,
    pub unknown_properties: UnknownPropertyPolicy,
    pub minify: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_base_font_size")]
    pub base_font_size: f64,
    pub breakpoints: Breakpoints,
    pub classes: BTreeMap<String, ClassSpec>,
    #[serde(default)]
    pub font_family_map: BTreeMap<String, RawValue>,
    #[serde(default)]
    pub spacing_map: BTreeMap<String, RawValue>,
    #[serde(default)]
    pub colors: BTreeMap<String, RawValue>,
    #[serde(default)]
    pub build: BuildOptions,
}

/// Loads and validates a config; `.json` files are read as JSON, anything
/// else as TOML.
pub fn load(path: &Path) -> Result<TokenConfig> {
    let text = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        parse_json(&text)
    } else {
        parse_toml(&text)
    };
    parsed.map_err(|err| match err {
        Error::Config { message } => {
            Error::config(format!("{}: {}", path.display(), message))
        }
        other => other,
    })
}

pub fn parse_toml(text: &str) -> Result<TokenConfig> {
    let config: TokenConfig =
        toml::from_str(text).map_err(|err| Error::config(err.to_string()))?;
    validate(&config)?;
    Ok(config)
}

pub fn parse_json(text: &str) -> Result<TokenConfig> {
    let config: TokenConfig =
        serde_json::from_str(text).map_err(|err| Error::config(err.to_string()))?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &TokenConfig) -> Result<()> {
    if config.prefix.trim().is_empty() {
        return Err(Error::config("prefix must not be empty"));
    }
    if config.category.trim().is_empty() {
        return Err(Error::config("category must not be empty"));
    }
    if !(config.base_font_size.is_finite() && config.base_font_size > 0.0) {
        return Err(Error::config(format!(
            "baseFontSize must be a positive number, got {}",
            config.base_font_size
        )));
    }

    let mobile = breakpoint_pixels(&config.breakpoints, Breakpoint::Mobile)?;
    let desktop = breakpoint_pixels(&config.breakpoints, Breakpoint::Desktop)?;
    if mobile >= desktop {
        return Err(Error::config(format!(
            "breakpoints must ascend: mobile {} is not below desktop {}",
            config.breakpoints.mobile, config.breakpoints.desktop
        )));
    }

    if let Some(name) = config.classes.keys().find(|name| name.trim().is_empty()) {
        return Err(Error::config(format!("invalid class name '{}'", name)));
    }
    Ok(())
}

fn breakpoint_pixels(breakpoints: &Breakpoints, breakpoint: Breakpoint) -> Result<f64> {
    let raw = breakpoints.get(breakpoint);
    match parse_length(raw.as_str()) {
        Some((value, "px")) if value >= 0.0 => Ok(value),
        _ => Err(Error::config(format!(
            "breakpoints.{} must be a pixel length, got '{}'",
            breakpoint, raw
        ))),
    }
}

fn default_prefix() -> String {
    "tf".to_string()
}

fn default_category() -> String {
    "typo".to_string()
}

fn default_base_font_size() -> f64 {
    16.0
}

#[cfg(test)]
mod tests {
    use super::{Breakpoint, RawValue, load, parse_json, parse_toml};
    use crate::Error;
    use crate::diff::FirstRunPolicy;
    use crate::interner::UnknownPropertyPolicy;
    use crate::naming::PropertyKind;
    use std::fs;

    const SAMPLE: &str = r##"
prefix = "hg"
category = "typo"
baseFontSize = 16

[breakpoints]
mobile = "375px"
desktop = "1024px"

[fontFamilyMap]
body = "Inter, sans-serif"

[spacingMap]
sm = "8px"
lg = "24px"

[colors]
primary = "#0055ff"

[classes.h1]
fontFamily = "Inter, sans-serif"
fontWeight = 700

[classes.h1.mobile]
fontSize = "32px"
lineHeight = 1.2

[classes.h1.desktop]
fontSize = "48px"

[build]
onFirstRun = "markAll"
unknownProperties = "warn"
"##;

    #[test]
    fn loads_toml_config() {
        let config = parse_toml(SAMPLE).expect("config should parse");
        assert_eq!(config.prefix, "hg");
        assert_eq!(config.breakpoints.desktop.as_str(), "1024px");
        let h1 = &config.classes["h1"];
        assert_eq!(h1.font_weight, Some(RawValue::from("700")));
        assert_eq!(
            h1.at_breakpoint(PropertyKind::LineHeight, Breakpoint::Mobile),
            Some(&RawValue::from("1.2"))
        );
        assert_eq!(
            h1.at_breakpoint(PropertyKind::LineHeight, Breakpoint::Desktop),
            None
        );
        assert_eq!(config.build.on_first_run, FirstRunPolicy::MarkAll);
        assert_eq!(config.build.unknown_properties, UnknownPropertyPolicy::Warn);
    }

    #[test]
    fn loads_json_config_by_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tokens.json");
        fs::write(
            &path,
            r#"{
                "breakpoints": {"mobile": "320px", "desktop": "1200px"},
                "classes": {"body": {"fontWeight": "400", "fontStyle": "italic"}}
            }"#,
        )
        .expect("write config");
        let config = load(&path).expect("config should parse");
        assert_eq!(config.prefix, "tf");
        assert_eq!(config.base_font_size, 16.0);
        assert_eq!(config.classes["body"].unknown_properties(), vec!["fontStyle"]);
        assert_eq!(config.build.on_first_run, FirstRunPolicy::MarkNone);
    }

    #[test]
    fn missing_classes_is_a_config_error() {
        let err = parse_toml("[breakpoints]\nmobile = \"320px\"\ndesktop = \"1024px\"\n")
            .expect_err("classes are required");
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("classes"));
    }

    #[test]
    fn missing_breakpoints_is_a_config_error() {
        let err = parse_json(r#"{"classes": {}}"#).expect_err("breakpoints are required");
        assert!(err.to_string().contains("breakpoints"));
    }

    #[test]
    fn rejects_descending_or_non_pixel_breakpoints() {
        let err = parse_json(
            r#"{"breakpoints": {"mobile": "1024px", "desktop": "320px"}, "classes": {}}"#,
        )
        .expect_err("breakpoints must ascend");
        assert!(err.to_string().contains("ascend"));

        let err = parse_json(
            r#"{"breakpoints": {"mobile": "20em", "desktop": "1024px"}, "classes": {}}"#,
        )
        .expect_err("breakpoints must be pixels");
        assert!(err.to_string().contains("breakpoints.mobile"));
    }

    #[test]
    fn rejects_non_positive_base_font_size() {
        let err = parse_json(
            r#"{"baseFontSize": 0, "breakpoints": {"mobile": "320px", "desktop": "1024px"}, "classes": {}}"#,
        )
        .expect_err("base size must be positive");
        assert!(err.to_string().contains("baseFontSize"));
    }

    #[test]
    fn reports_unreadable_config_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = load(&dir.path().join("missing.toml")).expect_err("file is missing");
        assert!(matches!(err, Error::Io { .. }));
    }
}
