// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write as _;
use tempfile::tempdir;

struct Fixture {
    _dir: tempfile::TempDir,
    store: SnapshotStore,
    layout: ProjectLayout,
    project: ProjectId,
    workspace: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path());
    let project = ProjectId::new("p1");
    let workspace = layout.workspace_dir(&project);
    fs::create_dir_all(&workspace).unwrap();
    Fixture {
        store: SnapshotStore::new(layout.clone()),
        layout,
        project,
        workspace,
        _dir: dir,
    }
}

fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
}

fn seed_workspace(ws: &Path) {
    write_file(ws, "package.json", "{\"name\":\"app\"}");
    write_file(ws, "src/app/page.tsx", "export default function Page() {}");
    write_file(ws, "src/styles.css", "body { margin: 0 }");
    write_file(ws, "node_modules/react/index.js", "module.exports = {}");
    write_file(ws, ".next/cache/build.txt", "cache");
}

#[test]
fn create_then_extract_round_trips_sources() {
    let fx = fixture();
    seed_workspace(&fx.workspace);

    let meta = fx.store.create(&fx.project, 0, &fx.workspace).unwrap();
    assert_eq!(meta.iteration, 0);
    assert!(fx.store.has(&fx.project, 0));

    let extracted = fx.store.extract(&fx.project, 0).unwrap();
    assert_eq!(extracted, fx.layout.runtime_workspace_dir(&fx.project, 0));
    assert!(extracted.join("src/app/page.tsx").exists());
    assert!(extracted.join("package.json").exists());
}

#[test]
fn archives_exclude_dependencies_and_build_caches() {
    let fx = fixture();
    seed_workspace(&fx.workspace);

    fx.store.create(&fx.project, 0, &fx.workspace).unwrap();
    let extracted = fx.store.extract(&fx.project, 0).unwrap();
    assert!(!extracted.join("node_modules").exists());
    assert!(!extracted.join(".next").exists());
}

#[test]
fn extract_is_idempotent() {
    let fx = fixture();
    seed_workspace(&fx.workspace);
    fx.store.create(&fx.project, 0, &fx.workspace).unwrap();

    let first = fx.store.extract(&fx.project, 0).unwrap();
    // Mutate the extracted copy; a second extract must not re-unpack over it.
    write_file(&first, "marker.txt", "kept");
    let second = fx.store.extract(&fx.project, 0).unwrap();
    assert_eq!(first, second);
    assert!(second.join("marker.txt").exists());
}

#[test]
fn create_is_idempotent_per_iteration() {
    let fx = fixture();
    seed_workspace(&fx.workspace);

    let first = fx.store.create(&fx.project, 0, &fx.workspace).unwrap();
    write_file(&fx.workspace, "src/new-file.tsx", "later");
    let second = fx.store.create(&fx.project, 0, &fx.workspace).unwrap();
    assert_eq!(first.created_at, second.created_at);

    // The archive still reflects the first call.
    let extracted = fx.store.extract(&fx.project, 0).unwrap();
    assert!(!extracted.join("src/new-file.tsx").exists());
}

#[test]
fn restore_rolls_back_sources_and_preserves_dependencies() {
    let fx = fixture();
    seed_workspace(&fx.workspace);
    fx.store.create(&fx.project, 0, &fx.workspace).unwrap();

    // A later iteration rewrites and adds files.
    write_file(&fx.workspace, "src/app/page.tsx", "broken");
    write_file(&fx.workspace, "src/extra.tsx", "extra");
    let deps_marker = fx.workspace.join("node_modules/react/index.js");
    let deps_before = fs::read_to_string(&deps_marker).unwrap();

    fx.store.restore(&fx.project, 0, &fx.workspace).unwrap();

    let page = fs::read_to_string(fx.workspace.join("src/app/page.tsx")).unwrap();
    assert_eq!(page, "export default function Page() {}");
    assert!(!fx.workspace.join("src/extra.tsx").exists());
    // Dependency directory bit-identical.
    assert_eq!(fs::read_to_string(&deps_marker).unwrap(), deps_before);
}

#[test]
fn list_sorts_by_iteration_and_skips_corrupt_metadata() {
    let fx = fixture();
    seed_workspace(&fx.workspace);
    fx.store.create(&fx.project, 2, &fx.workspace).unwrap();
    fx.store.create(&fx.project, 0, &fx.workspace).unwrap();
    fx.store.create(&fx.project, 1, &fx.workspace).unwrap();

    // Corrupt sidecar alongside the real ones.
    write_file(
        &fx.layout.snapshots_dir(&fx.project),
        "iter-9.json",
        "{not json",
    );

    let metas = fx.store.list(&fx.project).unwrap();
    let iterations: Vec<u32> = metas.iter().map(|m| m.iteration).collect();
    assert_eq!(iterations, [0, 1, 2]);
}

#[test]
fn list_of_missing_project_is_empty() {
    let fx = fixture();
    assert!(fx.store.list(&ProjectId::new("ghost")).unwrap().is_empty());
}

#[test]
fn extract_without_archive_fails() {
    let fx = fixture();
    assert!(matches!(
        fx.store.extract(&fx.project, 7),
        Err(SnapshotError::MissingArchive { iteration: 7 })
    ));
}

#[test]
fn cleanup_removes_runtime_dir() {
    let fx = fixture();
    seed_workspace(&fx.workspace);
    fx.store.create(&fx.project, 0, &fx.workspace).unwrap();
    let extracted = fx.store.extract(&fx.project, 0).unwrap();
    assert!(extracted.exists());

    fx.store.cleanup(&fx.project, 0).unwrap();
    assert!(!fx.layout.runtime_dir(&fx.project, 0).exists());
    // Cleaning up twice is fine.
    fx.store.cleanup(&fx.project, 0).unwrap();
}
