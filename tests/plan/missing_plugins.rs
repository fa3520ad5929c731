use std::sync::Arc;

use opcore::config::Settings;
use opcore::engine::StaticConfigLoader;
use opcore::types::addrs::Provider;
use opcore::types::diagnostics::DiagClass;
use opcore::PlanCommand;

use crate::common::{RecordingView, ScriptedEngine, TestAudit, TestEmitter};

#[test]
fn unlocked_required_provider_stops_before_running() {
    let td = tempfile::tempdir().unwrap();
    let loader = StaticConfigLoader::local().requiring(Provider::parse("hashicorp/null").unwrap());
    let view = Arc::new(RecordingView::default());
    let facts = TestEmitter::default();
    let api = opcore::OpCore::new(facts.clone(), TestAudit, Settings::for_dir(td.path()), Arc::new(ScriptedEngine))
        .with_config_loader(Arc::new(loader))
        .with_view(view.clone());
    let out = api.plan(&PlanCommand::default());

    assert_eq!(out.exit_code(false), 1);
    assert_eq!(out.diags.error_class(), Some(DiagClass::Configuration));
    assert!(view.all_text().contains("Required plugins are not installed"));
    assert!(view.all_text().contains("init"));
    assert!(facts.find("operation.start").is_empty());
    assert_eq!(facts.find("operation.result")[0].1["error_id"], "E_BACKEND_CONFIG");
}
