//! Standalone HTML reference page for the generated tokens.

use crate::config::{Breakpoint, TokenConfig};
use crate::diff::{ChangeSet, breakpoint_key, breakpoints_key, class_key, map_key, variable_key};
use crate::interner::{VariableEntry, VariableTable};
use crate::naming::Scope;
use crate::resolver::ClassResolver;
use crate::Result;

const PAGE_STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#1a1a1a}\
table{border-collapse:collapse;margin-bottom:2rem;min-width:40rem}\
th,td{border:1px solid #d0d0d0;padding:.4rem .6rem;text-align:left;vertical-align:top}\
td.changed{background:#fff4c2;font-weight:600}\
.swatch{display:inline-block;width:2.5rem;height:1.5rem;border:1px solid #999;vertical-align:middle}\
code{font-size:.85em}";

/// Renders the documentation page. Cells whose key is in `changes` are
/// marked with `class="changed"`.
pub fn emit_docs(
    config: &TokenConfig,
    table: &VariableTable,
    resolver: &ClassResolver<'_>,
    changes: &ChangeSet,
    stylesheet_href: &str,
) -> Result<String> {
    let mut html = String::new();
    html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>{} design tokens</title>\n",
        escape_html(&config.prefix)
    ));
    html.push_str(&format!(
        "<link rel=\"stylesheet\" href=\"{}\">\n<style>{}</style>\n</head>\n<body>\n",
        escape_html(stylesheet_href),
        PAGE_STYLE
    ));
    html.push_str(&format!(
        "<h1>{} design tokens</h1>\n",
        escape_html(&config.prefix)
    ));

    html.push_str(&change_summary(changes));
    html.push_str(&breakpoint_section(config, changes));
    for breakpoint in Breakpoint::ALL {
        html.push_str(&typography_section(config, resolver, breakpoint, changes)?);
    }
    html.push_str(&font_family_section(config, changes));
    html.push_str(&spacing_section(config, table, changes));
    html.push_str(&color_section(config, table, changes));

    html.push_str("</body>\n</html>\n");
    Ok(html)
}

fn change_summary(changes: &ChangeSet) -> String {
    let mut html = String::from("<section id=\"changes\">\n<h2>Changes</h2>\n");
    if changes.is_empty() {
        html.push_str("<p>No token changes since the previous build.</p>\n");
    } else {
        html.push_str(&format!(
            "<p>{} change{} since the previous build.</p>\n<ul>\n",
            changes.len(),
            if changes.len() == 1 { "" } else { "s" }
        ));
        for key in changes.iter() {
            html.push_str(&format!("<li><code>{}</code></li>\n", escape_html(key)));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</section>\n");
    html
}

fn breakpoint_section(config: &TokenConfig, changes: &ChangeSet) -> String {
    let mut html = String::from(
        "<section id=\"breakpoints\">\n<h2>Breakpoints</h2>\n<table>\n<tr><th>Breakpoint</th><th>Min width</th></tr>\n",
    );
    for breakpoint in Breakpoint::ALL {
        let changed = changes.contains(&breakpoints_key(breakpoint));
        html.push_str(&format!(
            "<tr><td>{}</td>{}</tr>\n",
            breakpoint,
            cell(&escape_html(config.breakpoints.get(breakpoint).as_str()), changed)
        ));
    }
    html.push_str("</table>\n</section>\n");
    html
}

fn typography_section(
    config: &TokenConfig,
    resolver: &ClassResolver<'_>,
    breakpoint: Breakpoint,
    changes: &ChangeSet,
) -> Result<String> {
    let mut html = format!(
        "<section id=\"typography-{}\">\n<h2>Typography: {} (from {})</h2>\n",
        breakpoint,
        breakpoint,
        escape_html(config.breakpoints.get(breakpoint).as_str())
    );
    let rules = resolver.resolve_breakpoint(breakpoint)?;
    if rules.is_empty() {
        html.push_str("<p>No classes declare properties at this breakpoint.</p>\n</section>\n");
        return Ok(html);
    }

    html.push_str("<table>\n<tr><th>Class</th><th>Property</th><th>Variable</th><th>Value</th><th>Raw</th></tr>\n");
    for rule in rules {
        let class_name = escape_html(&rule.class_name);
        for (kind, entry) in &rule.properties {
            let field_key = match kind.scope() {
                Scope::Breakpoint => breakpoint_key(&rule.class_name, breakpoint, *kind),
                _ => class_key(&rule.class_name, *kind),
            };
            html.push_str(&format!(
                "<tr><td><span class=\"{}\">{}</span></td><td>{}</td>{}</tr>\n",
                class_name,
                class_name,
                kind.css_property(),
                entry_cells(entry, changes.contains(&field_key), changes),
            ));
        }
    }
    html.push_str("</table>\n</section>\n");
    Ok(html)
}

fn font_family_section(config: &TokenConfig, changes: &ChangeSet) -> String {
    if config.font_family_map.is_empty() {
        return String::new();
    }
    let mut html = String::from(
        "<section id=\"font-families\">\n<h2>Font families</h2>\n<table>\n<tr><th>Alias</th><th>Value</th></tr>\n",
    );
    for (alias, value) in &config.font_family_map {
        let changed = changes.contains(&map_key("fontFamilyMap", alias));
        html.push_str(&format!(
            "<tr><td>{}</td>{}</tr>\n",
            escape_html(alias),
            cell(
                &format!(
                    "<span style=\"font-family:{}\">{}</span>",
                    escape_html(value.as_str()),
                    escape_html(value.as_str())
                ),
                changed
            )
        ));
    }
    html.push_str("</table>\n</section>\n");
    html
}

fn spacing_section(config: &TokenConfig, table: &VariableTable, changes: &ChangeSet) -> String {
    let mut html = String::from("<section id=\"spacing\">\n<h2>Spacing</h2>\n");
    if config.spacing_map.is_empty() {
        html.push_str("<p>No spacing tokens.</p>\n</section>\n");
        return html;
    }
    html.push_str("<table>\n<tr><th>Key</th><th>Variable</th><th>Value</th><th>Raw</th></tr>\n");
    for key in config.spacing_map.keys() {
        let Some(entry) = table.spacing(key) else {
            continue;
        };
        let changed = changes.contains(&map_key("spacingMap", key));
        html.push_str(&format!(
            "<tr><td>{}</td>{}</tr>\n",
            escape_html(key),
            entry_cells(entry, changed, changes)
        ));
    }
    html.push_str("</table>\n</section>\n");
    html
}

fn color_section(config: &TokenConfig, table: &VariableTable, changes: &ChangeSet) -> String {
    let mut html = String::from("<section id=\"colors\">\n<h2>Colors</h2>\n");
    if config.colors.is_empty() {
        html.push_str("<p>No color tokens.</p>\n</section>\n");
        return html;
    }
    html.push_str("<table>\n<tr><th>Swatch</th><th>Key</th><th>Variable</th><th>Value</th><th>Raw</th></tr>\n");
    for key in config.colors.keys() {
        let Some(entry) = table.color(key) else {
            continue;
        };
        let changed = changes.contains(&map_key("colors", key));
        html.push_str(&format!(
            "<tr>{}<td>{}</td>{}</tr>\n",
            cell(
                &format!(
                    "<span class=\"swatch\" style=\"background:{}\"></span>",
                    escape_html(&entry.reference())
                ),
                changed
            ),
            escape_html(key),
            entry_cells(entry, changed, changes)
        ));
    }
    html.push_str("</table>\n</section>\n");
    html
}

/// Variable, value and raw cells. The variable cell is also flagged when the
/// variable itself is new or changed.
fn entry_cells(entry: &VariableEntry, field_changed: bool, changes: &ChangeSet) -> String {
    let variable_changed = changes.contains(&variable_key(entry.name()));
    format!(
        "{}{}{}",
        cell(
            &format!("<code>{}</code>", escape_html(entry.name())),
            field_changed || variable_changed
        ),
        cell(&escape_html(entry.value()), field_changed || variable_changed),
        cell(&escape_html(entry.raw_value().as_str()), field_changed),
    )
}

fn cell(content: &str, changed: bool) -> String {
    if changed {
        format!("<td class=\"changed\">{}</td>", content)
    } else {
        format!("<td>{}</td>", content)
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
