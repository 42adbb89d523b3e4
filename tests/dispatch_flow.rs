mod fixtures;

use cell_notebook::config::NotebookConfig;
use cell_notebook::{Action, BundleStatus, CellType, Notebook, StoreError};
use fixtures::sample_notebooks::{dispatcher, mixed_notebook};
use fixtures::stub_fetcher::StubFetcher;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast::error::TryRecvError;

fn slow_and_fast() -> Arc<StubFetcher> {
    let fetcher = StubFetcher::new();
    fetcher
        .serve("https://unpkg.com/slow", "module.exports = 'slow';")
        .delay("https://unpkg.com/slow", Duration::from_millis(100))
        .serve("https://unpkg.com/fast", "module.exports = 'fast';")
        .delay("https://unpkg.com/fast", Duration::from_millis(10));
    fetcher
}

#[tokio::test]
async fn test_building_is_observable_before_any_await() {
    let dispatcher = dispatcher(slow_and_fast());

    let task = dispatcher.start_bundle("c1", "import slow from 'slow';");
    assert_eq!(dispatcher.status("c1"), BundleStatus::Building);
    assert!(dispatcher.result("c1").is_none());

    task.join().await.unwrap();
    assert_eq!(dispatcher.status("c1"), BundleStatus::Ready);
}

#[tokio::test]
async fn test_each_start_gets_exactly_one_complete() {
    let dispatcher = dispatcher(StubFetcher::new());
    let mut events = dispatcher.subscribe();

    let ok = dispatcher.start_bundle("c1", "const a = 1;");
    let failing = dispatcher.start_bundle("c2", "import x from 'missing';");
    let (ok_id, failing_id) = (ok.build_id(), failing.build_id());
    ok.join().await.unwrap();
    failing.join().await.unwrap();

    let mut starts = Vec::new();
    let mut completes = Vec::new();
    loop {
        match events.try_recv() {
            Ok(record) => match record.action {
                Action::BundleStart { build_id, .. } => starts.push(build_id),
                Action::BundleComplete { build_id, result } => completes.push((build_id, result)),
                other => panic!("unexpected event {other:?}"),
            },
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("event channel error: {e}"),
        }
    }

    assert_eq!(starts, vec![ok_id, failing_id]);
    assert_eq!(completes.len(), 2);
    for (build_id, result) in &completes {
        // code and error are mutually exclusive
        assert!(result.code().is_some() != result.error().is_some());
        if *build_id == failing_id {
            assert!(result.error().unwrap().contains("https://unpkg.com/missing"));
        } else {
            assert_eq!(*build_id, ok_id);
            assert!(result.code().unwrap().contains("const a = 1;"));
        }
    }
}

#[tokio::test]
async fn test_overlapping_runs_last_completion_wins() {
    let dispatcher = dispatcher(slow_and_fast());
    let mut events = dispatcher.subscribe();

    let slow = dispatcher.start_bundle("c1", "import slow from 'slow';");
    let fast = dispatcher.start_bundle("c1", "import fast from 'fast';");
    let (slow_id, fast_id) = (slow.build_id(), fast.build_id());

    let fast_result = fast.join().await.unwrap();
    assert!(fast_result.code().unwrap().contains("https://unpkg.com/fast"));
    assert_eq!(dispatcher.status("c1"), BundleStatus::Ready);
    assert!(dispatcher
        .result("c1")
        .unwrap()
        .code()
        .unwrap()
        .contains("https://unpkg.com/fast"));

    slow.join().await.unwrap();
    let final_result = dispatcher.result("c1").unwrap();
    assert!(final_result.code().unwrap().contains("https://unpkg.com/slow"));

    let order: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|record| match record.action {
            Action::BundleStart { build_id, .. } => Some(("start", build_id)),
            Action::BundleComplete { build_id, .. } => Some(("complete", build_id)),
            _ => None,
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("start", slow_id),
            ("start", fast_id),
            ("complete", fast_id),
            ("complete", slow_id),
        ]
    );
}

#[tokio::test]
async fn test_aborted_run_sends_no_complete() {
    let dispatcher = dispatcher(slow_and_fast());
    let mut events = dispatcher.subscribe();

    let task = dispatcher.start_bundle("c1", "import slow from 'slow';");
    task.abort();
    let err = task.join().await.unwrap_err();
    assert!(err.is_cancelled());

    assert!(matches!(events.try_recv().unwrap().action, Action::BundleStart { .. }));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_notebook_bundles_only_code_cells() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = StubFetcher::new();
    fetcher.serve("https://unpkg.com/tiny", "module.exports = 'tiny';");

    let (collection, ids) = mixed_notebook();
    let notebook = Notebook::with_fetcher(
        collection,
        &NotebookConfig::default(),
        temp_dir.path(),
        fetcher.clone(),
    )
    .unwrap();

    assert!(matches!(
        notebook.bundle_cell(ids[1].as_str()),
        Err(StoreError::NotACodeCell(_))
    ));

    let tasks = notebook.bundle_all();
    assert_eq!(tasks.len(), 2);
    for task in tasks {
        assert!(task.join().await.unwrap().is_success());
    }
    assert!(temp_dir.path().join(".cache").join("file-cache").is_dir());
}

#[tokio::test]
async fn test_edits_do_not_affect_running_bundle() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, ids) = mixed_notebook();
    let fetcher = slow_and_fast();
    let mut notebook = Notebook::with_fetcher(
        collection,
        &NotebookConfig::default(),
        temp_dir.path(),
        fetcher.clone(),
    )
    .unwrap();

    notebook
        .store_mut()
        .update_cell(ids[2].as_str(), "import slow from 'slow';\nconst before = 1;")
        .unwrap();
    let task = notebook.bundle_cell(ids[2].as_str()).unwrap();
    notebook
        .store_mut()
        .update_cell(ids[2].as_str(), "const after = 2;")
        .unwrap();
    notebook.store_mut().insert_cell_after(None, CellType::Text);

    let result = task.join().await.unwrap();
    assert!(result.code().unwrap().contains("const before = 1;"));
    assert!(!result.code().unwrap().contains("const after = 2;"));
}
