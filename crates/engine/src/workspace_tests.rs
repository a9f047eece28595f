// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn writes_files_and_reports_sizes() {
    let ws = tempdir().unwrap();
    let files = vec![
        GeneratedFile {
            path: "src/app/page.tsx".to_string(),
            contents: "export default function Page() {}".to_string(),
        },
        GeneratedFile {
            path: "src/styles.css".to_string(),
            contents: "body {}".to_string(),
        },
    ];

    let written = write_generated_files(ws.path(), &files).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].path, "src/app/page.tsx");
    assert_eq!(written[0].bytes, 33);
    assert!(ws.path().join("src/app/page.tsx").exists());
    // No temp files left behind.
    assert!(!ws.path().join("src/app/page.tsx.tmp").exists());
    assert!(!ws.path().join("src/styles.css.tmp").exists());
}

#[test]
fn overwrites_existing_files() {
    let ws = tempdir().unwrap();
    let v1 = vec![GeneratedFile {
        path: "src/a.tsx".to_string(),
        contents: "one".to_string(),
    }];
    let v2 = vec![GeneratedFile {
        path: "src/a.tsx".to_string(),
        contents: "two".to_string(),
    }];
    write_generated_files(ws.path(), &v1).unwrap();
    write_generated_files(ws.path(), &v2).unwrap();
    assert_eq!(
        fs::read_to_string(ws.path().join("src/a.tsx")).unwrap(),
        "two"
    );
}

#[test]
fn reads_back_sources_sorted() {
    let ws = tempdir().unwrap();
    let files = vec![
        GeneratedFile {
            path: "src/z.tsx".to_string(),
            contents: "z".to_string(),
        },
        GeneratedFile {
            path: "src/a/b.tsx".to_string(),
            contents: "ab".to_string(),
        },
    ];
    write_generated_files(ws.path(), &files).unwrap();

    let sources = read_workspace_sources(ws.path());
    let paths: Vec<&str> = sources.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, ["src/a/b.tsx", "src/z.tsx"]);
}

#[test]
fn missing_src_dir_reads_empty() {
    let ws = tempdir().unwrap();
    assert!(read_workspace_sources(ws.path()).is_empty());
}
