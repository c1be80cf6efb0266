use std::fmt;
use std::ops::Deref;

use crate::config::{Breakpoint, TokenConfig};
use crate::interner::VariableTable;
use crate::naming::slugify;
use crate::resolver::{ClassResolver, ResolvedRule};
use crate::Result;

const SPACING_UTILITIES: &[(&str, &[&str])] = &[
    ("m", &["margin"]),
    ("mt", &["margin-top"]),
    ("mr", &["margin-right"]),
    ("mb", &["margin-bottom"]),
    ("ml", &["margin-left"]),
    ("mx", &["margin-left", "margin-right"]),
    ("my", &["margin-top", "margin-bottom"]),
    ("p", &["padding"]),
    ("pt", &["padding-top"]),
    ("pr", &["padding-right"]),
    ("pb", &["padding-bottom"]),
    ("pl", &["padding-left"]),
    ("px", &["padding-left", "padding-right"]),
    ("py", &["padding-top", "padding-bottom"]),
    ("gap", &["gap"]),
];

const COLOR_UTILITIES: &[(&str, &[&str])] = &[
    ("text", &["color"]),
    ("bg", &["background-color"]),
    ("border", &["border-color"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssOutput(String);

impl CssOutput {
    pub fn new(css: String) -> Self {
        Self(css)
    }
}

impl Deref for CssOutput {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for CssOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<CssOutput> for String {
    fn from(value: CssOutput) -> Self {
        value.0
    }
}

/// Renders `:root` variables, typography rules per breakpoint, utilities and
/// layout helpers.
pub fn emit_css(
    config: &TokenConfig,
    table: &VariableTable,
    resolver: &ClassResolver<'_>,
    minify: bool,
) -> Result<CssOutput> {
    let mut blocks = vec![build_header(config)];

    let root_declarations: Vec<(String, String)> = table
        .by_kind()
        .into_values()
        .flatten()
        .map(|entry| (entry.name().to_string(), entry.value().to_string()))
        .collect();
    if !root_declarations.is_empty() {
        blocks.push(format_rule(":root", &root_declarations, minify));
    }

    for rule in resolver.resolve_breakpoint(Breakpoint::Mobile)? {
        blocks.push(typography_rule(&rule, minify));
    }
    blocks.extend(utility_rules(config, table, None, minify));
    blocks.push(format_rule(
        &format!(".{}", escape_selector(&format!("{}-container", config.prefix))),
        &[
            ("width".to_string(), "100%".to_string()),
            ("margin-inline".to_string(), "auto".to_string()),
        ],
        minify,
    ));

    let mut desktop_rules = Vec::new();
    for rule in resolver.resolve_breakpoint(Breakpoint::Desktop)? {
        desktop_rules.push(typography_rule(&rule, minify));
    }
    desktop_rules.extend(utility_rules(
        config,
        table,
        Some(Breakpoint::Desktop),
        minify,
    ));
    desktop_rules.push(format_rule(
        &format!(".{}", escape_selector(&format!("{}-container", config.prefix))),
        &[(
            "max-width".to_string(),
            config.breakpoints.desktop.to_string(),
        )],
        minify,
    ));
    let query = format!("(width >= {})", config.breakpoints.desktop);
    blocks.push(wrap_media(&query, &join_rules(&desktop_rules, minify), minify));

    let css = join_rules(&blocks, minify);
    Ok(CssOutput::new(if minify { css } else { format!("{}\n", css) }))
}

fn build_header(config: &TokenConfig) -> String {
    format!(
        "/*! tokenframe | {}-{} | generated, do not edit */",
        config.prefix, config.category
    )
}

fn typography_rule(rule: &ResolvedRule<'_>, minify: bool) -> String {
    let declarations: Vec<(String, String)> = rule
        .properties
        .iter()
        .map(|(kind, entry)| (kind.css_property().to_string(), entry.reference()))
        .collect();
    format_rule(
        &format!(".{}", escape_selector(&rule.class_name)),
        &declarations,
        minify,
    )
}

/// Spacing and color utilities; `variant` adds the responsive class prefix.
fn utility_rules(
    config: &TokenConfig,
    table: &VariableTable,
    variant: Option<Breakpoint>,
    minify: bool,
) -> Vec<String> {
    let mut rules = Vec::new();
    let sources = [
        (SPACING_UTILITIES, &config.spacing_map, true),
        (COLOR_UTILITIES, &config.colors, false),
    ];
    for (utilities, values, is_spacing) in sources {
        for (utility, properties) in utilities {
            for key in values.keys() {
                let entry = if is_spacing {
                    table.spacing(key)
                } else {
                    table.color(key)
                };
                let Some(entry) = entry else {
                    continue;
                };
                let class_name = match variant {
                    Some(breakpoint) => format!(
                        "{}-{}:{}-{}",
                        config.prefix,
                        breakpoint,
                        utility,
                        slugify(key)
                    ),
                    None => format!("{}-{}-{}", config.prefix, utility, slugify(key)),
                };
                let declarations: Vec<(String, String)> = properties
                    .iter()
                    .map(|property| (property.to_string(), entry.reference()))
                    .collect();
                rules.push(format_rule(
                    &format!(".{}", escape_selector(&class_name)),
                    &declarations,
                    minify,
                ));
            }
        }
    }
    rules
}

fn format_rule(selector: &str, declarations: &[(String, String)], minify: bool) -> String {
    if minify {
        let body = declarations
            .iter()
            .map(|(property, value)| format!("{}:{}", property, value))
            .collect::<Vec<_>>()
            .join(";");
        format!("{}{{{}}}", selector, body)
    } else {
        let body = declarations
            .iter()
            .map(|(property, value)| format!("  {}: {};", property, value))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{} {{\n{}\n}}", selector, body)
    }
}

fn wrap_media(query: &str, rule: &str, minify: bool) -> String {
    if minify {
        format!("@media {}{{{}}}", query, rule)
    } else {
        format!("@media {} {{\n{}\n}}", query, indent_css_block(rule, 2))
    }
}

fn join_rules(rules: &[String], minify: bool) -> String {
    if minify {
        rules.concat()
    } else {
        rules.join("\n\n")
    }
}

fn indent_css_block(css: &str, spaces: usize) -> String {
    let padding = " ".repeat(spaces);
    css.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", padding, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_selector(class: &str) -> String {
    let mut escaped = String::with_capacity(class.len() * 2);

    for (idx, ch) in class.chars().enumerate() {
        match ch {
            '0'..='9' if idx == 0 => escaped.push_str(&format!("\\3{} ", ch)),
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => escaped.push(ch),
            ch if !ch.is_ascii() => escaped.push(ch),
            ch => {
                escaped.push('\\');
                escaped.push(ch);
            }
        }
    }

    escaped
}
