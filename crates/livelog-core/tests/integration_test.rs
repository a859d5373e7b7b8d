//! Integration tests for livelog-core.

use std::fs;
use std::path::Path;

use livelog_core::env::{DVCLIVE_PATH, DVCLIVE_RESUME, DVCLIVE_SUMMARY};
use livelog_core::storage;
use livelog_core::{EnvSnapshot, ImageValue, Live, LiveConfig, LiveError, PlotOptions};
use serde_json::json;
use tempfile::TempDir;

fn make_live(path: &Path, resume: bool) -> Live {
    let config = LiveConfig::new()
        .with_path(path)
        .with_resume(resume)
        .with_html(false);
    Live::with_env(config, &EnvSnapshot::default()).expect("Failed to create Live")
}

fn read_summary(live: &Live) -> serde_json::Value {
    let content = fs::read_to_string(live.summary_path()).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_end_to_end_summary_lags_pending_advance() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run1"), false);

    live.log("loss", 1.0).unwrap();
    live.next_step().unwrap();
    live.log("loss", 0.5).unwrap();
    live.next_step().unwrap();

    assert_eq!(live.summary_path(), tmp.path().join("run1.json"));
    assert_eq!(read_summary(&live), json!({"step": 1, "loss": 0.5}));
    assert_eq!(live.get_step(), 2);
}

#[test]
fn test_summary_tracks_latest_value_per_metric() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);

    for step in 0..5u64 {
        live.set_step(step).unwrap();
        live.log("loss", 1.0 / (step + 1) as f64).unwrap();
        live.log("acc", step as i64).unwrap();
    }

    assert_eq!(read_summary(&live), json!({"step": 4, "loss": 0.2, "acc": 4}));
}

#[test]
fn test_summary_written_before_any_step() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);
    assert_eq!(read_summary(&live), json!({}));

    live.log("loss", 2.0).unwrap();
    assert_eq!(read_summary(&live), json!({"loss": 2.0}));
}

#[test]
fn test_nested_metric_names_merge() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);

    live.log("a/b", 1.0).unwrap();
    live.log("a/c", 2.0).unwrap();

    assert_eq!(read_summary(&live), json!({"a": {"b": 1.0, "c": 2.0}}));
    assert!(live.dir().join("scalars/a/b.tsv").exists());
    assert!(live.dir().join("scalars/a/c.tsv").exists());
}

#[test]
fn test_relogging_same_step_overwrites() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);

    live.set_step(3).unwrap();
    live.log("loss", 0.9).unwrap();
    live.log("loss", 0.4).unwrap();

    let rows = storage::read_scalar_rows(&live.dir().join("scalars/loss.tsv")).unwrap();
    let at_three: Vec<_> = rows.iter().filter(|r| r.step == Some(3)).collect();
    assert_eq!(at_three.len(), 1);
    assert_eq!(at_three[0].value.as_f64(), Some(0.4));
}

#[test]
fn test_values_logged_before_first_step_belong_to_step_zero() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);

    live.log("loss", 1.0).unwrap();
    live.log_image("sample.png", ImageValue::pixels(1, 1, 1, vec![7]))
        .unwrap();
    live.next_step().unwrap();

    let rows = storage::read_scalar_rows(&live.dir().join("scalars/loss.tsv")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].step, Some(0));
    assert!(live.dir().join("images/0/sample.png").exists());
}

#[test]
fn test_resume_advances_past_recorded_step() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run");
    fs::create_dir_all(&path).unwrap();
    fs::write(tmp.path().join("run.json"), r#"{"step": 5, "acc": 0.9}"#).unwrap();

    let live = make_live(&path, true);
    assert_eq!(live.get_step(), 6);
}

#[test]
fn test_resume_from_step_zero_is_not_advanced() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run");
    fs::write(tmp.path().join("run.json"), r#"{"step": 0, "acc": 0.1}"#).unwrap();

    let mut live = make_live(&path, true);
    assert_eq!(live.get_step(), 0);

    live.log("acc", 0.2).unwrap();
    live.next_step().unwrap();
    assert!(live.exists());
    assert_eq!(read_summary(&live), json!({"step": 0, "acc": 0.2}));
}

#[test]
fn test_resume_without_summary_starts_at_zero() {
    let tmp = TempDir::new().unwrap();
    let live = make_live(&tmp.path().join("run"), true);
    assert_eq!(live.get_step(), 0);
}

#[test]
fn test_resume_keeps_prior_history() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run");
    {
        let mut live = make_live(&path, false);
        for step in 0..3 {
            live.set_step(step).unwrap();
            live.log("loss", step as f64).unwrap();
        }
    }

    let mut live = make_live(&path, true);
    assert_eq!(live.get_step(), 3);
    live.log("loss", 10.0).unwrap();

    let rows = storage::read_scalar_rows(&path.join("scalars/loss.tsv")).unwrap();
    let steps: Vec<Option<u64>> = rows.iter().map(|r| r.step).collect();
    assert_eq!(steps, vec![Some(0), Some(1), Some(2), Some(3)]);
}

#[test]
fn test_clean_start_purges_prior_artifacts() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run");
    for sub in ["scalars", "images", "plots"] {
        fs::create_dir_all(path.join(sub)).unwrap();
        fs::write(path.join(sub).join("old"), "stale").unwrap();
    }
    fs::create_dir_all(tmp.path().join("run_dvc_plots")).unwrap();
    fs::write(tmp.path().join("run_dvc_plots/index.html"), "stale").unwrap();
    fs::write(tmp.path().join("run.json"), r#"{"step": 9, "old": 1}"#).unwrap();
    fs::write(path.join("params.yaml"), "kept: true").unwrap();

    let live = make_live(&path, false);

    for sub in ["scalars", "images", "plots"] {
        assert!(!path.join(sub).exists(), "{sub} should be purged");
    }
    assert!(!tmp.path().join("run_dvc_plots").exists());
    assert!(path.join("params.yaml").exists(), "unrelated files survive");
    assert_eq!(read_summary(&live), json!({}));
}

#[test]
fn test_non_numeric_scalar_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);

    let err = live.log("loss", "high").unwrap_err();
    match err {
        LiveError::InvalidDataType { name, observed } => {
            assert_eq!(name, "loss");
            assert_eq!(observed, "string");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(live.scalar("loss").is_none());
}

#[test]
fn test_unknown_plot_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);

    let err = live
        .log_plot("scatter", vec![0.0, 1.0], vec![0.2, 0.7], PlotOptions::default())
        .unwrap_err();
    assert!(matches!(err, LiveError::InvalidPlotType(name) if name == "scatter"));

    let err = live
        .log_plot("roc", vec![0.0, 1.0], vec![0.2], PlotOptions::default())
        .unwrap_err();
    assert!(matches!(err, LiveError::InvalidDataType { .. }));
}

#[test]
fn test_bad_image_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);

    let err = live
        .log_image("sample.bmp", ImageValue::pixels(1, 1, 1, vec![0]))
        .unwrap_err();
    assert!(matches!(err, LiveError::InvalidDataType { .. }));
    let err = live
        .log_image("sample.png", ImageValue::pixels(2, 2, 3, vec![0; 5]))
        .unwrap_err();
    assert!(matches!(err, LiveError::InvalidDataType { .. }));
}

#[test]
fn test_images_and_plots_do_not_touch_summary() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);
    live.set_step(1).unwrap();
    live.log("loss", 0.3).unwrap();
    live.set_step(2).unwrap();

    live.log_image("sample.png", ImageValue::pixels(1, 1, 1, vec![0]))
        .unwrap();
    live.log_plot("roc", vec![0.0, 1.0], vec![0.2, 0.7], PlotOptions::default())
        .unwrap();

    assert_eq!(read_summary(&live), json!({"step": 1, "loss": 0.3}));
    assert!(live.dir().join("images/2/sample.png").exists());
    assert!(live.dir().join("plots/roc.json").exists());
}

#[test]
fn test_summary_disabled_writes_no_file() {
    let tmp = TempDir::new().unwrap();
    let config = LiveConfig::new()
        .with_path(tmp.path().join("run"))
        .with_summary(false)
        .with_html(false);
    let mut live = Live::with_env(config, &EnvSnapshot::default()).unwrap();
    live.log("loss", 1.0).unwrap();
    live.next_step().unwrap();
    assert!(!live.summary_path().exists());
}

#[test]
fn test_html_report_rendered_on_advance() {
    let tmp = TempDir::new().unwrap();
    let config = LiveConfig::new().with_path(tmp.path().join("run"));
    let mut live = Live::with_env(config, &EnvSnapshot::default()).unwrap();

    live.log("loss", 0.25).unwrap();
    live.next_step().unwrap();

    let html = fs::read_to_string(live.html_path()).unwrap();
    assert_eq!(live.html_path(), tmp.path().join("run_dvc_plots/index.html"));
    assert!(html.contains("loss"));
}

#[test]
fn test_env_path_overrides_default() {
    let tmp = TempDir::new().unwrap();
    let env_path = tmp.path().join("from_env");
    let env: EnvSnapshot = [
        (DVCLIVE_PATH, env_path.to_string_lossy().into_owned()),
        (DVCLIVE_SUMMARY, "1".to_string()),
    ]
    .into_iter()
    .collect();

    let live = Live::with_env(LiveConfig::new(), &env).unwrap();
    assert_eq!(live.dir(), env_path.as_path());
    assert!(!live.config().html);
    assert!(live.summary_path().exists());
}

#[test]
fn test_env_path_conflict_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let env: EnvSnapshot = [(DVCLIVE_PATH, "elsewhere")].into_iter().collect();
    let err = Live::with_env(LiveConfig::new().with_path(tmp.path().join("run")), &env)
        .unwrap_err();
    assert!(matches!(err, LiveError::ConfigMismatch { .. }));
}

#[test]
fn test_env_resume_without_summary_is_invalid() {
    let env: EnvSnapshot = [(DVCLIVE_PATH, "x"), (DVCLIVE_RESUME, "1")]
        .into_iter()
        .collect();
    let err = Live::with_env(LiveConfig::new(), &env).unwrap_err();
    assert!(matches!(err, LiveError::InvalidOption(_)));
}

#[test]
fn test_summary_keeps_step_first_then_log_order() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);

    live.set_step(0).unwrap();
    live.log("zloss", 1.0).unwrap();
    live.log("acc", 0.5).unwrap();

    let raw = fs::read_to_string(live.summary_path()).unwrap();
    assert_eq!(
        raw,
        "{\n    \"step\": 0,\n    \"zloss\": 1.0,\n    \"acc\": 0.5\n}\n"
    );
}

#[test]
fn test_grayscale_gif_is_written() {
    let tmp = TempDir::new().unwrap();
    let mut live = make_live(&tmp.path().join("run"), false);
    live.set_step(2).unwrap();

    live.log_image("mask.gif", ImageValue::pixels(2, 2, 1, vec![0, 80, 160, 240]))
        .unwrap();
    assert!(live.dir().join("images/2/mask.gif").exists());
}

#[test]
fn test_dot_segments_stay_inside_subfolder() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run");
    let mut live = make_live(&path, false);

    live.log("../escape", 1.0).unwrap();
    assert!(path.join("scalars/escape.tsv").exists());
    assert!(!path.join("escape.tsv").exists());

    let err = live.log("..", 1.0).unwrap_err();
    assert!(matches!(err, LiveError::InvalidDataType { .. }));

    drop(live);
    make_live(&path, false);
    assert!(!path.join("scalars").exists());
}

#[test]
fn test_resume_with_malformed_step_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run");
    fs::write(tmp.path().join("run.json"), r#"{"step": -3}"#).unwrap();

    let config = LiveConfig::new()
        .with_path(&path)
        .with_resume(true)
        .with_html(false);
    let err = Live::with_env(config, &EnvSnapshot::default()).unwrap_err();
    assert!(matches!(err, LiveError::InvalidOption(_)));

    fs::write(tmp.path().join("run.json"), r#"{"step": 4.0}"#).unwrap();
    assert_eq!(make_live(&path, true).get_step(), 5);
}
