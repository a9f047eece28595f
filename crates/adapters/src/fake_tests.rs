// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::codegen::parse_generated_files;

fn breakpoint(id: &str) -> BreakpointDef {
    BreakpointDef {
        breakpoint_id: id.to_string(),
        width: 1440,
        height: 900,
        device_scale_factor: 1.0,
    }
}

#[tokio::test]
async fn codegen_scripted_responses_in_order_then_repeat() {
    let fake = FakeCodegen::new();
    fake.push_file("src/a.tsx", "first");
    fake.push_file("src/a.tsx", "second");

    let cancel = CancellationToken::new();
    let first = fake.generate("p1", &cancel).await.unwrap();
    let second = fake.generate("p2", &cancel).await.unwrap();
    let third = fake.generate("p3", &cancel).await.unwrap();

    assert_eq!(parse_generated_files(&first)[0].contents, "first");
    assert_eq!(parse_generated_files(&second)[0].contents, "second");
    // Script exhausted: last response repeats.
    assert_eq!(parse_generated_files(&third)[0].contents, "second");
    assert_eq!(fake.prompts(), vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn codegen_fail_next_fails_once() {
    let fake = FakeCodegen::new();
    fake.push_file("src/a.tsx", "ok");
    fake.fail_next("model unavailable");

    let cancel = CancellationToken::new();
    assert!(fake.generate("p", &cancel).await.is_err());
    assert!(fake.generate("p", &cancel).await.is_ok());
}

#[tokio::test]
async fn codegen_hang_returns_cancelled_when_tripped() {
    let fake = FakeCodegen::new();
    fake.hang();
    let cancel = CancellationToken::new();

    let task = {
        let fake = fake.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { fake.generate("p", &cancel).await })
    };
    cancel.cancel();
    let result = task.await.unwrap();
    assert!(matches!(result, Err(CodegenError::Cancelled)));
}

#[tokio::test]
async fn scoring_scripts_and_records() {
    let fake = FakeScoring::new();
    fake.push_uniform(0.6);
    fake.push_uniform(0.8);

    let cancel = CancellationToken::new();
    let a = fake
        .score(Path::new("c1.png"), Path::new("b.png"), "", &cancel)
        .await
        .unwrap();
    let b = fake
        .score(Path::new("c2.png"), Path::new("b.png"), "", &cancel)
        .await
        .unwrap();
    assert_eq!(a.overall(), 0.6);
    assert_eq!(b.overall(), 0.8);
    assert_eq!(fake.calls().len(), 2);
    assert_eq!(fake.calls()[1].candidate, PathBuf::from("c2.png"));
}

#[tokio::test]
async fn browser_capture_fails_per_breakpoint() {
    let fake = FakeBrowser::new();
    fake.fail_breakpoint("mobile");

    assert!(fake
        .capture("http://x/", &breakpoint("desktop"))
        .await
        .is_ok());
    assert!(fake
        .capture("http://x/", &breakpoint("mobile"))
        .await
        .is_err());
    assert_eq!(fake.calls().len(), 2);
}

#[tokio::test]
async fn browser_inspect_returns_scripted_metrics() {
    let fake = FakeBrowser::new();
    fake.set_metrics(vec![ElementMetrics {
        selector: ".wide".to_string(),
        tag: "div".to_string(),
        scroll_width: 1600.0,
        client_width: 1440.0,
        overflow_x: "visible".to_string(),
        figma_node_id: None,
    }]);

    let metrics = fake
        .inspect("http://x/", "#app", &breakpoint("desktop"))
        .await
        .unwrap();
    assert_eq!(metrics.len(), 1);
}
