//! Field-level change detection between two snapshots.
//!
//! What a first run reports and whether deleted classes are reported are
//! both controlled by [`DiffPolicy`].

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{Breakpoint, ClassSpec, RawValue};
use crate::naming::{PropertyKind, Scope};
use crate::snapshot::{Snapshot, SnapshotStore};

/// What to report when there is no previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FirstRunPolicy {
    /// Every field is reported as changed.
    MarkAll,
    /// Nothing is reported.
    #[default]
    MarkNone,
}

impl FirstRunPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "markAll" | "mark-all" | "all" => Some(Self::MarkAll),
            "markNone" | "mark-none" | "none" => Some(Self::MarkNone),
            _ => None,
        }
    }
}

/// What to report for classes present before but absent now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovedClassPolicy {
    /// Removed classes produce no entries; their contributions vanish.
    #[default]
    Ignore,
    /// Every property the removed class declared is reported.
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffPolicy {
    pub on_first_run: FirstRunPolicy,
    pub on_removed_class: RemovedClassPolicy,
}

/// Dotted keys of every leaf field that differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    keys: BTreeSet<String>,
}

impl ChangeSet {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    fn insert(&mut self, key: String) {
        self.keys.insert(key);
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

/// `{class}.{property}`
pub fn class_key(class_name: &str, kind: PropertyKind) -> String {
    format!("{}.{}", class_name, kind.config_key())
}

/// `{class}.{breakpoint}.{property}`
pub fn breakpoint_key(class_name: &str, breakpoint: Breakpoint, kind: PropertyKind) -> String {
    format!("{}.{}.{}", class_name, breakpoint, kind.config_key())
}

/// `variable.{name}`
pub fn variable_key(name: &str) -> String {
    format!("variable.{}", name)
}

/// `breakpoints.{breakpoint}`
pub fn breakpoints_key(breakpoint: Breakpoint) -> String {
    format!("breakpoints.{}", breakpoint)
}

/// `fontFamilyMap.{key}`, `spacingMap.{key}`, `colors.{key}`
pub fn map_key(map: &str, key: &str) -> String {
    format!("{}.{}", map, key)
}

pub fn diff(current: &Snapshot, previous: Option<&Snapshot>, policy: DiffPolicy) -> ChangeSet {
    match previous {
        Some(previous) => compare(current, previous, policy),
        None => match policy.on_first_run {
            FirstRunPolicy::MarkNone => ChangeSet::default(),
            FirstRunPolicy::MarkAll => compare(current, &Snapshot::default(), policy),
        },
    }
}

/// Loads the previous snapshot, diffs, and stores `current` unconditionally.
///
/// Store failures never fail the build: an unreadable snapshot is treated as
/// absent and a failed save only logs.
pub fn track_changes(
    store: &dyn SnapshotStore,
    current: &Snapshot,
    policy: DiffPolicy,
) -> ChangeSet {
    let changes = detect_changes(store, current, policy);
    commit_snapshot(store, current);
    changes
}

/// The load-and-diff half of [`track_changes`]; leaves the store untouched.
pub fn detect_changes(
    store: &dyn SnapshotStore,
    current: &Snapshot,
    policy: DiffPolicy,
) -> ChangeSet {
    let previous = match store.load() {
        Ok(previous) => previous,
        Err(err) => {
            tracing::warn!("ignoring previous snapshot: {}", err);
            None
        }
    };
    let changes = diff(current, previous.as_ref(), policy);
    if previous.is_none() {
        tracing::info!(
            policy = ?policy.on_first_run,
            changed = changes.len(),
            "no previous snapshot, using baseline"
        );
    } else {
        tracing::info!(changed = changes.len(), "compared against previous snapshot");
    }
    changes
}

/// Stores `current` as the baseline for the next build. Failures only log.
pub fn commit_snapshot(store: &dyn SnapshotStore, current: &Snapshot) {
    if let Err(err) = store.save(current) {
        tracing::warn!("failed to save snapshot: {}", err);
    }
}

fn compare(current: &Snapshot, previous: &Snapshot, policy: DiffPolicy) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for breakpoint in Breakpoint::ALL {
        if current.breakpoints.get(breakpoint) != previous.breakpoints.get(breakpoint) {
            changes.insert(breakpoints_key(breakpoint));
        }
    }

    compare_map(
        &mut changes,
        "fontFamilyMap",
        &current.font_family_map,
        &previous.font_family_map,
    );
    compare_map(
        &mut changes,
        "spacingMap",
        &current.spacing_map,
        &previous.spacing_map,
    );
    compare_map(&mut changes, "colors", &current.colors, &previous.colors);

    for (class_name, spec) in &current.classes {
        match previous.classes.get(class_name) {
            Some(previous_spec) => compare_class(&mut changes, class_name, spec, previous_spec),
            None => flag_declared(&mut changes, class_name, spec),
        }
    }
    if policy.on_removed_class == RemovedClassPolicy::Flag {
        for (class_name, previous_spec) in &previous.classes {
            if !current.classes.contains_key(class_name) {
                flag_declared(&mut changes, class_name, previous_spec);
            }
        }
    }

    for (name, value) in &current.variables {
        if previous.variables.get(name) != Some(value) {
            changes.insert(variable_key(name));
        }
    }

    changes
}

fn compare_map(
    changes: &mut ChangeSet,
    map: &str,
    current: &BTreeMap<String, RawValue>,
    previous: &BTreeMap<String, RawValue>,
) {
    let keys: BTreeSet<&String> = current.keys().chain(previous.keys()).collect();
    for key in keys {
        if current.get(key) != previous.get(key) {
            changes.insert(map_key(map, key));
        }
    }
}

fn compare_class(changes: &mut ChangeSet, class_name: &str, current: &ClassSpec, previous: &ClassSpec) {
    for kind in PropertyKind::with_scope(Scope::Invariant) {
        if current.invariant(kind) != previous.invariant(kind) {
            changes.insert(class_key(class_name, kind));
        }
    }
    for breakpoint in Breakpoint::ALL {
        for kind in PropertyKind::with_scope(Scope::Breakpoint) {
            if current.at_breakpoint(kind, breakpoint) != previous.at_breakpoint(kind, breakpoint) {
                changes.insert(breakpoint_key(class_name, breakpoint, kind));
            }
        }
    }
}

fn flag_declared(changes: &mut ChangeSet, class_name: &str, spec: &ClassSpec) {
    for kind in PropertyKind::with_scope(Scope::Invariant) {
        if spec.invariant(kind).is_some() {
            changes.insert(class_key(class_name, kind));
        }
    }
    for breakpoint in Breakpoint::ALL {
        for kind in PropertyKind::with_scope(Scope::Breakpoint) {
            if spec.at_breakpoint(kind, breakpoint).is_some() {
                changes.insert(breakpoint_key(class_name, breakpoint, kind));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChangeSet, DiffPolicy, FirstRunPolicy, RemovedClassPolicy, commit_snapshot,
        detect_changes, diff, track_changes,
    };
    use crate::config::{TokenConfig, parse_json};
    use crate::interner::intern;
    use crate::snapshot::{FileSnapshotStore, MemorySnapshotStore, Snapshot, SnapshotStore};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn config(classes: &str, spacing: &str) -> TokenConfig {
        parse_json(&format!(
            r#"{{
                "prefix": "hg",
                "category": "typo",
                "breakpoints": {{"mobile": "375px", "desktop": "1024px"}},
                "spacingMap": {},
                "classes": {}
            }}"#,
            spacing, classes
        ))
        .expect("valid config")
    }

    fn snapshot_of(config: &TokenConfig) -> Snapshot {
        let table = intern(config).expect("interning succeeds");
        Snapshot::capture(config, &table)
    }

    fn keys(changes: &ChangeSet) -> Vec<&str> {
        changes.iter().collect()
    }

    const H1: &str = r#"{"h1": {"fontWeight": 700, "mobile": {"fontSize": "32px"}}}"#;

    #[test]
    fn first_run_mark_none_is_empty_and_creates_snapshot() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileSnapshotStore::new(dir.path().join("data/snapshot.json"));
        let current = snapshot_of(&config(H1, "{}"));

        let changes = track_changes(&store, &current, DiffPolicy::default());

        assert!(changes.is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn first_run_mark_all_flags_everything() {
        let current = snapshot_of(&config(H1, r#"{"lg": "24px"}"#));
        let policy = DiffPolicy {
            on_first_run: FirstRunPolicy::MarkAll,
            ..DiffPolicy::default()
        };

        let changes = diff(&current, None, policy);

        assert_eq!(
            keys(&changes),
            vec![
                "breakpoints.desktop",
                "breakpoints.mobile",
                "h1.fontWeight",
                "h1.mobile.fontSize",
                "spacingMap.lg",
                "variable.--hg-spacing-lg",
                "variable.--hg-typo-font-size-32",
                "variable.--hg-typo-font-weight-700",
            ]
        );
    }

    #[test]
    fn incremental_change_flags_only_changed_fields() {
        let previous = snapshot_of(&config(H1, "{}"));
        let current = snapshot_of(&config(
            r#"{"h1": {"fontWeight": 800, "mobile": {"fontSize": "32px"}}}"#,
            "{}",
        ));

        let changes = diff(&current, Some(&previous), DiffPolicy::default());

        assert_eq!(
            keys(&changes),
            vec!["h1.fontWeight", "variable.--hg-typo-font-weight-800"]
        );
        assert!(!changes.contains("h1.mobile.fontSize"));
    }

    #[test]
    fn added_class_flags_declared_properties() {
        let previous = snapshot_of(&config(H1, "{}"));
        let current = snapshot_of(&config(
            r#"{"h1": {"fontWeight": 700, "mobile": {"fontSize": "32px"}}, "h2": {"fontWeight": 500, "desktop": {"lineHeight": 1.4}}}"#,
            "{}",
        ));

        let changes = diff(&current, Some(&previous), DiffPolicy::default());

        assert!(changes.contains("h2.fontWeight"));
        assert!(changes.contains("h2.desktop.lineHeight"));
        assert!(!changes.contains("h2.mobile.lineHeight"));
        assert!(!changes.contains("h2.fontFamily"));
        assert!(!changes.contains("h1.fontWeight"));
    }

    #[test]
    fn adding_a_class_leaves_existing_variables_unflagged() {
        let previous = snapshot_of(&config(r#"{"b": {"letterSpacing": "16px"}}"#, "{}"));
        let current = snapshot_of(&config(
            r#"{"a": {"letterSpacing": "16rem"}, "b": {"letterSpacing": "16px"}}"#,
            "{}",
        ));

        let changes = diff(&current, Some(&previous), DiffPolicy::default());

        assert_eq!(
            keys(&changes),
            vec!["a.letterSpacing", "variable.--hg-typo-letter-spacing-16rem"]
        );
    }

    #[test]
    fn removed_spacing_key_is_flagged() {
        let previous = snapshot_of(&config(H1, r#"{"sm": "8px", "lg": "24px"}"#));
        let current = snapshot_of(&config(H1, r#"{"sm": "8px"}"#));

        let changes = diff(&current, Some(&previous), DiffPolicy::default());

        assert_eq!(keys(&changes), vec!["spacingMap.lg"]);
    }

    #[test]
    fn removed_class_follows_policy() {
        let previous = snapshot_of(&config(
            r#"{"h1": {"fontWeight": 700}, "old": {"textTransform": "uppercase", "mobile": {"fontSize": "12px"}}}"#,
            "{}",
        ));
        let current = snapshot_of(&config(r#"{"h1": {"fontWeight": 700}}"#, "{}"));

        let ignored = diff(&current, Some(&previous), DiffPolicy::default());
        assert!(ignored.is_empty());

        let flagged = diff(
            &current,
            Some(&previous),
            DiffPolicy {
                on_removed_class: RemovedClassPolicy::Flag,
                ..DiffPolicy::default()
            },
        );
        assert_eq!(
            keys(&flagged),
            vec!["old.mobile.fontSize", "old.textTransform"]
        );
    }

    #[test]
    fn value_equality_is_textual() {
        let previous = snapshot_of(&config(r#"{"p": {"mobile": {"fontSize": "16px"}}}"#, "{}"));
        let current = snapshot_of(&config(r#"{"p": {"mobile": {"fontSize": "1rem"}}}"#, "{}"));

        let changes = diff(&current, Some(&previous), DiffPolicy::default());

        assert!(changes.contains("p.mobile.fontSize"));
    }

    #[test]
    fn breakpoint_change_is_flagged() {
        let previous = snapshot_of(&config(H1, "{}"));
        let mut current = previous.clone();
        current.breakpoints.desktop = "1280px".to_string();

        let changes = diff(&current, Some(&previous), DiffPolicy::default());

        assert_eq!(keys(&changes), vec!["breakpoints.desktop"]);
    }

    #[test]
    fn second_run_without_changes_is_empty() {
        let store = MemorySnapshotStore::new();
        let current = snapshot_of(&config(H1, r#"{"lg": "24px"}"#));
        let policy = DiffPolicy {
            on_first_run: FirstRunPolicy::MarkAll,
            ..DiffPolicy::default()
        };

        let first = track_changes(&store, &current, policy);
        let second = track_changes(&store, &current, policy);

        assert!(!first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_baseline() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("snapshot.json");
        fs::write(&path, "][").expect("write");
        let store = FileSnapshotStore::new(&path);
        let current = snapshot_of(&config(H1, "{}"));

        let changes = track_changes(&store, &current, DiffPolicy::default());

        assert!(changes.is_empty());
        assert_eq!(store.load().expect("rewritten"), Some(current));
    }

    #[test]
    fn save_failure_keeps_change_set() {
        let dir = tempfile::tempdir().expect("temp dir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").expect("write");
        let store = FileSnapshotStore::new(blocker.join("snapshot.json"));
        let current = snapshot_of(&config(H1, "{}"));
        let policy = DiffPolicy {
            on_first_run: FirstRunPolicy::MarkAll,
            ..DiffPolicy::default()
        };

        let changes = track_changes(&store, &current, policy);

        assert!(changes.contains("h1.fontWeight"));
    }

    #[test]
    fn detect_changes_saves_nothing_until_commit() {
        let store = MemorySnapshotStore::new();
        let current = snapshot_of(&config(H1, "{}"));
        let policy = DiffPolicy {
            on_first_run: FirstRunPolicy::MarkAll,
            ..DiffPolicy::default()
        };

        let changes = detect_changes(&store, &current, policy);
        assert!(changes.contains("h1.fontWeight"));
        assert!(store.current().is_none());

        commit_snapshot(&store, &current);
        assert_eq!(store.current(), Some(current));
    }

    #[test]
    fn parses_first_run_policy_names() {
        assert_eq!(FirstRunPolicy::parse("markAll"), Some(FirstRunPolicy::MarkAll));
        assert_eq!(FirstRunPolicy::parse("mark-none"), Some(FirstRunPolicy::MarkNone));
        assert_eq!(FirstRunPolicy::parse("sometimes"), None);
    }
}
