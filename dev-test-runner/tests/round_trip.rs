use dev_test_runner::catalog::{CatalogDocument, Entry, EntryKind, Hash, Owner};
use dev_test_runner::decode;
use dev_test_runner::storage::*;
use serde_json::json;

#[test]
fn closed_enum_round_trips_and_rejects_unknown_values() {
    let tier: StorageConfigTier = decode(json!("archive/deep")).unwrap();
    assert_eq!(tier, StorageConfigTier::Deep);
    assert_eq!(serde_json::to_value(tier).unwrap(), json!("archive/deep"));
    assert_eq!(tier.to_string(), "archive/deep");
    assert_eq!(StorageConfigTier::default(), StorageConfigTier::Hot);
    assert!(decode::<StorageConfigTier>(json!("warm")).is_err());
}

#[test]
fn open_string_keeps_unlisted_values() {
    let ok: StorageConfigStatus = decode(json!("ok")).unwrap();
    assert_eq!(ok, StorageConfigStatus::Ok);
    assert!(ok.is_known());

    let pending: StorageConfigStatus = decode(json!("pending")).unwrap();
    assert_eq!(pending.as_str(), "pending");
    assert!(!pending.is_known());
    assert_eq!(serde_json::to_value(&pending).unwrap(), json!("pending"));
    assert_eq!(StorageConfigStatus::from("degraded"), StorageConfigStatus::Degraded);
    assert_eq!(String::from(StorageConfigStatus::Ok), "ok");
}

#[test]
fn discriminated_union_writes_the_arm_property() {
    let remote = Backend::from_remote(RemoteCfg {
        url: "s3://bucket".into(),
        region: None,
    });
    assert_eq!(serde_json::to_value(&remote).unwrap(), json!({"remote": {"url": "s3://bucket"}}));
    assert!(matches!(remote.branch(), Ok(Some(BackendBranch::Remote(cfg))) if cfg.url == "s3://bucket"));

    let local: Backend = decode(json!({"local": {"path": "/var/data"}})).unwrap();
    assert_eq!(local.local.as_ref().map(|cfg| cfg.path.as_str()), Some("/var/data"));
    assert!(local.remote.is_none());
}

#[test]
fn discriminated_union_rejects_ambiguous_and_empty_values() {
    let both = json!({"local": {"path": "/a"}, "remote": {"url": "b"}});
    assert!(decode::<Backend>(both).is_err());
    assert!(decode::<Backend>(json!({})).is_err());
    assert!(decode::<Backend>(json!("local")).is_err());

    let mut ambiguous = Backend::from_local(LocalCfg { path: "/a".into() });
    ambiguous.remote = Some(RemoteCfg {
        url: "b".into(),
        region: None,
    });
    assert!(ambiguous.branch().is_err());
    assert!(serde_json::to_value(&ambiguous).is_err());
    assert!(serde_json::to_value(Backend::default()).is_err());
}

#[test]
fn ref_only_union_probes_branches_in_order() {
    let token: Credentials = decode(json!({"token": "t-1"})).unwrap();
    assert!(matches!(token.branch(), Ok(Some(CredentialsBranch::Token(_)))));

    let pair = json!({"public_key": "pk", "private_key": "sk"});
    let credentials: Credentials = decode(pair.clone()).unwrap();
    assert_eq!(
        credentials.key_pair,
        Some(KeyPair {
            public_key: "pk".into(),
            private_key: "sk".into(),
        })
    );
    assert_eq!(serde_json::to_value(&credentials).unwrap(), pair);
    assert!(decode::<Credentials>(json!({"password": "x"})).is_err());
}

#[test]
fn mixed_union_accepts_literals_and_the_object_arm() {
    let auto: Mode = decode(json!("auto")).unwrap();
    assert_eq!(auto, Mode::Auto);
    assert_eq!(serde_json::to_value(Mode::Manual).unwrap(), json!("manual"));

    let settings: Mode = decode(json!({"interval_secs": 30})).unwrap();
    assert_eq!(settings.mode_settings.as_ref().and_then(|value| value.interval_secs), Some(30));
    assert!(matches!(settings.branch(), Ok(Some(ModeBranch::ModeSettings(_)))));
    assert!(decode::<Mode>(json!("sometimes")).is_err());
}

#[test]
fn recursive_fields_are_boxed() {
    let tree: TreeNode = decode(json!({
        "label": "leaf",
        "parent": {"label": "root", "children": [{"label": "sibling"}]}
    }))
    .unwrap();
    let parent = tree.parent.as_deref().unwrap();
    assert_eq!(parent.label, "root");
    assert_eq!(parent.children.as_ref().map(Vec::len), Some(1));
}

#[test]
fn full_document_round_trips() {
    let source = json!({
        "name": "primary",
        "tier": "cold",
        "status": "pending",
        "backend": {"remote": {"url": "s3://bucket", "region": "eu-west-1"}},
        "credentials": {"token": "t-1"},
        "mode": "manual",
        "replicas": 3,
        "labels": {"team": "storage", "env": "prod"},
        "tree": {"label": "root"}
    });
    let config: StorageConfig = decode(source.clone()).unwrap();
    assert_eq!(config.tier, Some(StorageConfigTier::Cold));
    assert_eq!(config.replicas, Some(3));
    assert_eq!(serde_json::to_value(&config).unwrap(), source);

    assert!(decode::<StorageConfig>(json!({"name": "x"})).is_err());
}

#[test]
fn catalog_uses_existing_types_and_extension_data() {
    let source = json!({
        "entries": [
            {"id": "a", "kind": "dir", "type": "folder"},
            {"id": "b", "kind": "file", "size": null}
        ],
        "digest": {"alg": "sha256", "hex": "00ff"},
        "extras": {"note": ["free", "form"]},
        "revision": 7
    });
    let catalog: CatalogDocument = decode(source.clone()).unwrap();
    assert_eq!(catalog.entries[0].kind, Some(EntryKind::Dir));
    assert_eq!(catalog.entries[0].r#type.as_deref(), Some("folder"));
    assert_eq!(
        catalog.digest,
        Some(Hash {
            alg: "sha256".into(),
            hex: "00ff".into(),
        })
    );
    assert_eq!(catalog.extension_data.get("revision"), Some(&7));

    let entry = Entry {
        id: "c".into(),
        ..Entry::default()
    };
    assert_eq!(serde_json::to_value(entry).unwrap(), json!({"id": "c"}));
    assert!(decode::<CatalogDocument>(json!({"entries": [], "revision": "seven"})).is_err());
}

#[test]
fn nullable_object_definition_accepts_null_at_required_site() {
    let unowned: CatalogDocument = decode(json!({"entries": [], "owner": null})).unwrap();
    assert_eq!(unowned.owner, None);
    assert_eq!(serde_json::to_value(&unowned).unwrap(), json!({"entries": [], "owner": null}));

    let owned: CatalogDocument = decode(json!({"entries": [], "owner": {"name": "ops"}})).unwrap();
    assert_eq!(owned.owner, Some(Owner { name: "ops".into() }));
    assert!(decode::<CatalogDocument>(json!({"entries": [], "owner": {}})).is_err());
}
