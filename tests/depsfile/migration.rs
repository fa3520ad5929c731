use std::sync::Arc;

use opcore::config::Settings;
use opcore::depsfile::{DependencyLockStore, ProviderOverrides};
use opcore::types::addrs::Provider;

use crate::common::{opcore_for, RecordingView};

const PREDECESSOR_LOCKS: &str = r#"
provider "registry.terraform.io/hashicorp/null" {
  version = "3.2.1"
  hashes = [
    "h1:null=",
  ]
}

provider "registry.terraform.io/hashicorp/aws" {
  version     = "5.31.0"
  constraints = "~> 5.0"
  hashes = [
    "h1:aws=",
  ]
}
"#;

#[test]
fn missing_lock_file_is_empty_and_silent() {
    let td = tempfile::tempdir().unwrap();
    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view, Settings::for_dir(td.path()));
    let (locks, diags) = api.load_dependency_locks();
    assert!(locks.is_empty());
    assert!(diags.is_empty());
    assert_eq!(facts.find("depsfile.load")[0].0, "success");
}

#[test]
fn predecessor_entries_migrate_with_one_sorted_warning() {
    let td = tempfile::tempdir().unwrap();
    std::fs::write(td.path().join(".terraform.lock.hcl"), PREDECESSOR_LOCKS).unwrap();

    let view = Arc::new(RecordingView::default());
    let (api, facts) = opcore_for(view, Settings::for_dir(td.path()));
    let (locks, diags) = api.load_dependency_locks();

    assert!(!diags.has_errors());
    let warnings: Vec<_> = diags.warnings().collect();
    assert_eq!(warnings.len(), 1);
    let detail = &warnings[0].detail;
    let aws = detail.find("hashicorp/aws").unwrap();
    let null = detail.find("hashicorp/null").unwrap();
    assert!(aws < null, "entries listed in address order:\n{detail}");

    let migrated = Provider::parse("registry.opentofu.org/hashicorp/aws").unwrap();
    let lock = locks.provider(&migrated).unwrap();
    assert_eq!(lock.version().to_string(), "5.31.0");
    assert!(lock.hashes().is_empty());
    assert_eq!(facts.find("depsfile.load")[0].0, "warn");
}

#[test]
fn overrides_are_marked_on_load() {
    let td = tempfile::tempdir().unwrap();
    std::fs::write(td.path().join(".terraform.lock.hcl"), PREDECESSOR_LOCKS).unwrap();
    let null = Provider::parse("hashicorp/null").unwrap();
    let mut ov = ProviderOverrides::default();
    ov.unmanaged.insert(null.clone());

    let (locks, _) = DependencyLockStore::new(td.path()).with_overrides(ov).load_annotated();
    assert!(locks.provider_is_overridden(&null));
    assert_eq!(locks.overridden_providers().len(), 1);
}

#[test]
fn migrated_locks_written_back_load_without_warning() {
    let td = tempfile::tempdir().unwrap();
    std::fs::write(td.path().join(".terraform.lock.hcl"), PREDECESSOR_LOCKS).unwrap();
    let view = Arc::new(RecordingView::default());
    let (api, _facts) = opcore_for(view, Settings::for_dir(td.path()));

    let (mut locks, _) = api.load_dependency_locks();
    let old = Provider::parse("registry.terraform.io/hashicorp/aws").unwrap();
    let old_null = Provider::parse("registry.terraform.io/hashicorp/null").unwrap();
    locks.remove_provider(&old);
    locks.remove_provider(&old_null);
    api.write_dependency_locks(&locks).unwrap();

    let (reloaded, diags) = api.load_dependency_locks();
    assert!(diags.is_empty());
    assert!(reloaded.equal(&locks));
    let text = std::fs::read_to_string(td.path().join(".terraform.lock.hcl")).unwrap();
    assert!(text.find("hashicorp/aws").unwrap() < text.find("hashicorp/null").unwrap());
}
