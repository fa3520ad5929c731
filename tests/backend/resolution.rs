use std::sync::Arc;

use serde_json::json;

use opcore::backend::BackendSource;
use opcore::config::Settings;
use opcore::engine::StaticConfigLoader;
use opcore::{OpCore, PlanCommand};

use crate::common::{RecordingView, ScriptedEngine, TestAudit, TestEmitter};

fn api(dir: &std::path::Path, loader: StaticConfigLoader) -> (OpCore<TestEmitter, TestAudit>, TestEmitter) {
    let facts = TestEmitter::default();
    let api = OpCore::new(facts.clone(), TestAudit, Settings::for_dir(dir), Arc::new(ScriptedEngine))
        .with_config_loader(Arc::new(loader))
        .with_view(Arc::new(RecordingView::default()));
    (api, facts)
}

#[test]
fn no_backend_block_uses_unrecorded_local() {
    let td = tempfile::tempdir().unwrap();
    let (api, facts) = api(td.path(), StaticConfigLoader::local());
    let r = api.resolve_backend(None).unwrap();
    assert_eq!(r.source, BackendSource::Synthetic);
    assert_eq!(r.record.type_name, "local");
    assert_eq!(r.workspace, "default");
    assert!(!td.path().join(".terraform").exists());
    assert_eq!(facts.find("backend.resolve")[0].1["backend_source"], "synthetic");
}

#[test]
fn declared_backend_needs_init_then_detects_changes() {
    let td = tempfile::tempdir().unwrap();
    let declared = StaticConfigLoader::local().with_backend("local", json!({}));

    let (before_init, _) = api(td.path(), declared.clone());
    let err = before_init.resolve_backend(None).err().unwrap();
    assert!(err.error_message().contains("Initial configuration of the requested backend"));

    let (init, _) = api(td.path(), declared.clone());
    init.init_backend().unwrap();
    assert!(td.path().join(".terraform").join("terraform.tfstate").is_file());

    let (same, _) = api(td.path(), declared);
    assert_eq!(same.resolve_backend(None).unwrap().source, BackendSource::Config);

    let changed = StaticConfigLoader::local().with_backend("local", json!({"path": "other.tfstate"}));
    let (after, facts) = api(td.path(), changed);
    let err = after.resolve_backend(None).err().unwrap();
    assert!(err.error_message().contains("Backend configuration changed"));
    assert_eq!(facts.find("backend.resolve")[0].1["error_id"], "E_BACKEND_CONFIG");

    // The operation itself stops at resolution.
    let out = after.plan(&PlanCommand::default());
    assert_eq!(out.exit_code(false), 1);
    assert!(facts.find("operation.start").is_empty());
}

#[test]
fn unknown_backend_type_is_a_configuration_error() {
    let td = tempfile::tempdir().unwrap();
    let (api, _) = api(td.path(), StaticConfigLoader::local().with_backend("carrier-pigeon", json!({})));
    let err = api.init_backend().err().unwrap();
    assert!(err.error_message().contains("Unsupported backend type"));
    assert!(!td.path().join(".terraform").join("terraform.tfstate").exists());
}

#[test]
fn custom_state_path_from_backend_config() {
    let td = tempfile::tempdir().unwrap();
    let declared = StaticConfigLoader::local().with_backend("local", json!({"path": "custom.tfstate"}));
    let (init, _) = api(td.path(), declared.clone());
    init.init_backend().unwrap();

    let (api, _) = api(td.path(), declared);
    let out = api.apply(&opcore::ApplyCommand {
        auto_approve: true,
        ..opcore::ApplyCommand::default()
    });
    assert!(out.result.is_success());
    assert!(td.path().join("custom.tfstate").is_file());
    assert!(!td.path().join("terraform.tfstate").exists());
}
