//! One build: config in, stylesheet + documentation + change-set out.

use crate::config::TokenConfig;
use crate::diff::{ChangeSet, DiffPolicy, commit_snapshot, detect_changes};
use crate::emit::{CssOutput, emit_css, emit_docs};
use crate::interner::intern;
use crate::resolver::ClassResolver;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::Result;

pub const CSS_FILE_NAME: &str = "tokens.css";
pub const DOCS_FILE_NAME: &str = "tokens.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub css: CssOutput,
    pub docs: String,
    pub changes: ChangeSet,
    pub variable_count: usize,
}

/// Interns, resolves and renders `config`, then diffs against `store`.
///
/// Interning, resolution and rendering errors abort the build before the
/// snapshot is stored. Snapshot store failures are downgraded to warnings.
pub fn compile(
    config: &TokenConfig,
    store: &dyn SnapshotStore,
    policy: DiffPolicy,
    minify: bool,
) -> Result<BuildOutput> {
    let table = intern(config)?;
    let resolver = ClassResolver::new(config, &table);
    let css = emit_css(config, &table, &resolver, minify)?;

    let snapshot = Snapshot::capture(config, &table);
    let changes = detect_changes(store, &snapshot, policy);
    let docs = emit_docs(config, &table, &resolver, &changes, CSS_FILE_NAME)?;
    commit_snapshot(store, &snapshot);

    Ok(BuildOutput {
        css,
        docs,
        changes,
        variable_count: table.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::compile;
    use crate::config::parse_json;
    use crate::diff::{DiffPolicy, FirstRunPolicy};
    use crate::snapshot::MemorySnapshotStore;

    const CONFIG: &str = r#"{
        "prefix": "hg",
        "category": "typo",
        "breakpoints": {"mobile": "375px", "desktop": "1024px"},
        "classes": {"h1": {"fontWeight": 700, "mobile": {"fontSize": "32px"}}}
    }"#;

    #[test]
    fn rebuilding_unchanged_config_is_byte_identical_and_reports_nothing() {
        let config = parse_json(CONFIG).expect("valid config");
        let store = MemorySnapshotStore::new();
        let policy = DiffPolicy {
            on_first_run: FirstRunPolicy::MarkAll,
            ..DiffPolicy::default()
        };

        let first = compile(&config, &store, policy, false).expect("builds");
        let second = compile(&config, &store, policy, false).expect("builds");

        assert!(first.changes.contains("h1.fontWeight"));
        assert!(second.changes.is_empty());
        assert_eq!(first.css, second.css);
        assert_eq!(first.variable_count, 2);
        assert!(second.docs.contains("No token changes since the previous build."));
    }

    #[test]
    fn unknown_property_error_aborts_the_build() {
        let config = parse_json(
            r#"{
                "breakpoints": {"mobile": "375px", "desktop": "1024px"},
                "build": {"unknownProperties": "error"},
                "classes": {"h1": {"fontVariant": "small-caps"}}
            }"#,
        )
        .expect("valid config");
        let store = MemorySnapshotStore::new();

        assert!(compile(&config, &store, DiffPolicy::default(), false).is_err());
        assert!(store.current().is_none());
    }
}
