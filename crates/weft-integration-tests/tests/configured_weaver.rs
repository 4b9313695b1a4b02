//! Integration tests for building a weaver from layered configuration.

mod common;

use serde_json::json;
use std::collections::HashMap;

use weft_config::{ConfigLayer, loader};
use weft_core::{ModuleId, Target};
use weft_runtime::Weaver;
use weft_test::{CallLog, test_account_type};

use common::{chain_types, register_recorder};

#[test]
fn test_configured_order_drives_chains() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weft.toml");
    std::fs::write(
        &path,
        r#"
[composition]
order = ["Persistence", "Replication"]
unlisted = "first"

[host]
name = "node7"
"#,
    )
    .unwrap();

    let resolved = loader::load_with_env(Some(&path), None, &HashMap::new()).unwrap();
    assert_eq!(resolved.field_sources.get("host.name"), Some(&ConfigLayer::File));
    let w = Weaver::from_config(&resolved.config);

    let log = CallLog::new();
    for name in ["Replication", "Metrics", "Persistence"] {
        register_recorder(&w, name, &log);
    }
    let pointcuts = ["Replication", "Metrics", "Persistence"]
        .iter()
        .map(|ty| {
            w.pointcut(ty)
                .unwrap()
                .operations("deposit(.*)")
                .hosts("node[0-9]+")
                .build()
                .unwrap()
        })
        .collect();
    w.activate(ModuleId::new(), pointcuts);

    let account = w.construct(&test_account_type(), "<init>()", vec![]).unwrap();
    let target = Target::from(account);
    assert_eq!(
        chain_types(&w, &target, "deposit(i64)"),
        vec!["Metrics", "Persistence", "Replication"]
    );

    log.clear();
    w.invoke_named(&target, "deposit(i64)", vec![json!(9)]).unwrap();
    assert_eq!(log.entries(), vec!["Metrics", "Persistence", "Replication"]);
}

#[test]
fn test_host_selector_excludes_other_hosts() {
    let env: HashMap<String, String> = [("WEFT_HOST".to_owned(), "gateway".to_owned())]
        .into_iter()
        .collect();
    let resolved = loader::load_with_env(None, None, &env).unwrap();
    assert_eq!(resolved.config.host.name, "gateway");

    let w = Weaver::from_config(&resolved.config);
    let log = CallLog::new();
    register_recorder(&w, "Replication", &log);
    w.activate(
        ModuleId::new(),
        vec![w.pointcut("Replication").unwrap().hosts("node.*").build().unwrap()],
    );

    let account = w.construct(&test_account_type(), "<init>()", vec![]).unwrap();
    let target = Target::from(account);
    assert!(!w.store().is_attached_type(&target, "Replication"));
    assert!(chain_types(&w, &target, "deposit(i64)").is_empty());
}
