use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing_test::traced_test;

use crate::circuit::{CircuitKind, ProofRequest};
use crate::error::ProverError;
use crate::inputs::{render_inputs, PARAMETER_FILE};
use crate::pipeline::ProofPipeline;
use crate::testing::StubToolRunner;
use crate::toolchain::ToolchainVersions;

fn circuits_root() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    for kind in CircuitKind::ALL {
        std::fs::create_dir_all(root.path().join(kind.as_str())).unwrap();
    }
    root
}

fn build_pipeline(root: &Path, runner: Arc<StubToolRunner>) -> ProofPipeline {
    ProofPipeline::new(root, runner, ToolchainVersions::default())
}

fn ping_request() -> ProofRequest {
    ProofRequest::from_json(
        CircuitKind::PingDistance,
        br#"{"x":5,"y":5,"salt":1,"tower_x":0,"tower_y":0,"session_id":1,"turn":1}"#,
    )
    .unwrap()
}

fn move_request() -> ProofRequest {
    ProofRequest::from_json(
        CircuitKind::MoveProof,
        br#"{"x_old":1,"y_old":1,"salt_old":2,"x_new":1,"y_new":2,"salt_new":3,"session_id":1,"turn":2}"#,
    )
    .unwrap()
}

#[tokio::test]
#[traced_test]
async fn test_ping_distance_end_to_end() {
    let root = circuits_root();
    let runner = Arc::new(StubToolRunner::new());
    let pipeline = build_pipeline(root.path(), runner.clone());

    let response = pipeline.prove(&ping_request()).await.unwrap();

    assert_eq!(response.circuit, CircuitKind::PingDistance);
    assert_eq!(response.proof_hex.len(), 64);
    assert_eq!(response.public_inputs_fields.len(), 2);
    assert_eq!(response.public_inputs_fields[0], format!("0x{}", "01".repeat(32)));
    assert_eq!(response.public_inputs_fields[1], format!("0x{}", "02".repeat(32)));

    let written = std::fs::read_to_string(root.path().join("ping_distance").join(PARAMETER_FILE)).unwrap();
    assert_eq!(written, render_inputs(&ping_request()).unwrap());

    let commands: Vec<String> = runner.records().into_iter().map(|r| r.command).collect();
    assert_eq!(commands[0], "nargo --version");
    assert_eq!(commands[1], "bb --version");
    assert_eq!(commands[2], "nargo execute");
    assert!(commands[3].starts_with("bb prove"));
    assert!(commands[3].contains("./target/ping_distance.json"));
    assert!(logs_contain("Proving ping_distance"));
}

#[tokio::test]
async fn test_toolchain_mismatch_leaves_working_dir_untouched() {
    let root = circuits_root();
    let params = root.path().join("ping_distance").join(PARAMETER_FILE);
    std::fs::write(&params, "x = \"previous\"\n").unwrap();
    let runner = Arc::new(StubToolRunner::new().with_bb_version("0.60.0"));
    let pipeline = build_pipeline(root.path(), runner.clone());

    let err = pipeline.prove(&ping_request()).await.unwrap_err();

    assert!(matches!(err, ProverError::ToolchainMismatch { .. }));
    assert_eq!(std::fs::read_to_string(&params).unwrap(), "x = \"previous\"\n");
    assert!(!root.path().join("move_proof").join(PARAMETER_FILE).exists());
    assert_eq!(pipeline.locks().acquisitions(), 0);
    assert_eq!(runner.count_invocations("nargo execute"), 0);
}

#[tokio::test]
async fn test_version_queries_run_once_across_requests() {
    let root = circuits_root();
    let runner = Arc::new(StubToolRunner::new());
    let pipeline = build_pipeline(root.path(), runner.clone());

    pipeline.prove(&ping_request()).await.unwrap();
    pipeline.prove(&move_request()).await.unwrap();
    pipeline.prove(&ping_request()).await.unwrap();

    assert_eq!(runner.count_invocations("nargo --version"), 1);
    assert_eq!(runner.count_invocations("bb --version"), 1);
    assert_eq!(runner.count_invocations("bb prove"), 3);
}

#[tokio::test]
async fn test_same_circuit_requests_never_overlap() {
    let root = circuits_root();
    let runner = Arc::new(StubToolRunner::new().with_delay(Duration::from_millis(25)));
    let pipeline = Arc::new(build_pipeline(root.path(), runner.clone()));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.prove(&ping_request()).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Pair each witness run with the prove that follows it; pipelines must not interleave.
    let records: Vec<_> = runner
        .records()
        .into_iter()
        .filter(|r| r.command.starts_with("nargo execute") || r.command.starts_with("bb prove"))
        .collect();
    assert_eq!(records.len(), 6);
    let mut sorted = records.clone();
    sorted.sort_by_key(|r| r.started);
    for pipeline_run in sorted.chunks(2) {
        assert!(pipeline_run[0].command.starts_with("nargo execute"));
        assert!(pipeline_run[1].command.starts_with("bb prove"));
    }
    for pair in sorted.windows(2) {
        assert!(pair[0].finished <= pair[1].started, "same-circuit commands overlapped");
    }
}

#[tokio::test]
async fn test_different_circuits_run_concurrently() {
    let root = circuits_root();
    let runner = Arc::new(StubToolRunner::new().with_delay(Duration::from_millis(60)));
    let pipeline = Arc::new(build_pipeline(root.path(), runner.clone()));
    pipeline.preflight().await.unwrap();

    let ping = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.prove(&ping_request()).await })
    };
    let mv = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.prove(&move_request()).await })
    };
    ping.await.unwrap().unwrap();
    mv.await.unwrap().unwrap();

    let records = runner.records();
    let in_dir = |name: &str| {
        records
            .iter()
            .filter(|r| r.working_dir.as_deref().is_some_and(|d| d.ends_with(name)))
            .cloned()
            .collect::<Vec<_>>()
    };
    let ping_runs = in_dir("ping_distance");
    let move_runs = in_dir("move_proof");
    let overlapped = ping_runs.iter().any(|a| {
        move_runs
            .iter()
            .any(|b| a.started < b.finished && b.started < a.finished)
    });
    assert!(overlapped, "different circuits were serialized");
}

#[tokio::test]
async fn test_witness_failure_releases_lock() {
    let root = circuits_root();
    let runner = Arc::new(StubToolRunner::new().failing_on("nargo execute"));
    let pipeline = build_pipeline(root.path(), runner.clone());

    let err = pipeline.prove(&ping_request()).await.unwrap_err();
    match err {
        ProverError::ExternalToolFailure {
            command, stderr, ..
        } => {
            assert_eq!(command, "nargo execute");
            assert_eq!(stderr, "stub failure");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(runner.count_invocations("bb prove"), 0);

    let lease = tokio::time::timeout(
        Duration::from_secs(1),
        pipeline.locks().acquire(CircuitKind::PingDistance),
    )
    .await;
    assert!(lease.is_ok());
}

#[tokio::test]
async fn test_stale_artifacts_are_not_reused() {
    let root = circuits_root();
    let target = root.path().join("ping_distance").join("target");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("proof"), [0xee; 32]).unwrap();
    std::fs::write(target.join("public_inputs"), [0xee; 32]).unwrap();
    let runner = Arc::new(StubToolRunner::new().failing_on("bb prove"));
    let pipeline = build_pipeline(root.path(), runner);

    assert!(pipeline.prove(&ping_request()).await.is_err());
    assert!(!target.join("proof").exists());
    assert!(!target.join("public_inputs").exists());
}

#[tokio::test]
async fn test_malformed_public_inputs() {
    let root = circuits_root();
    let runner = Arc::new(StubToolRunner::new().with_artifacts(vec![1, 2, 3], vec![0; 33]));
    let pipeline = build_pipeline(root.path(), runner);

    let err = pipeline.prove(&ping_request()).await.unwrap_err();
    assert!(matches!(err, ProverError::MalformedArtifact(_)));
}

#[tokio::test]
async fn test_missing_circuit_directory() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = build_pipeline(root.path(), Arc::new(StubToolRunner::new()));

    let err = pipeline.prove(&ping_request()).await.unwrap_err();
    let expected = root.path().join("ping_distance");
    assert!(matches!(
        err,
        ProverError::CircuitDirMissing { ref kind, ref path } if kind == "ping_distance" && *path == expected
    ));
    assert_eq!(pipeline.locks().acquisitions(), 1);
}
