use docvars::api::VarsApi;
use docvars::commands::export::VarInfo;
use docvars::commands::NewVar;
use docvars::error::VarsError;
use docvars::model::{TypeTag, Value, VarRecord};
use docvars::ordering::Delta;
use docvars::store::document::{HostDocument, ReferenceEngine};
use docvars::store::fs_backend::FsBackend;
use docvars::store::memory::InMemoryDocument;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn setup() -> VarsApi<InMemoryDocument> {
    VarsApi::open(InMemoryDocument::new().with_engine(ReferenceEngine)).unwrap()
}

fn create(api: &mut VarsApi<InMemoryDocument>, name: &str, group: &str) {
    assert!(api
        .create(NewVar::new(name, TypeTag::Float).with_group(group))
        .unwrap());
}

fn group_keys(records: &[VarRecord]) -> BTreeMap<String, i64> {
    records
        .iter()
        .map(|r| (r.group.clone(), r.group_key))
        .collect()
}

fn rows_of(api: &VarsApi<InMemoryDocument>, group: &str) -> Vec<(String, i64)> {
    api.list_group(group)
        .unwrap()
        .into_iter()
        .map(|r| (r.name, r.row_key))
        .collect()
}

#[test]
fn test_group_reorder_scenario() {
    let mut api = setup();
    create(&mut api, "A", "Default");
    create(&mut api, "B", "Default");
    create(&mut api, "C", "Metrics");

    let before = api.list_all().unwrap();
    assert_eq!(group_keys(&before)["Default"], 0);
    assert_eq!(group_keys(&before)["Metrics"], 1);

    assert!(api.reorder_group("Metrics", Delta::First).unwrap());

    let after = api.list_all().unwrap();
    assert_eq!(group_keys(&after)["Metrics"], 0);
    assert_eq!(group_keys(&after)["Default"], 1);
    assert_eq!(after[0].name, "C");

    let rows: BTreeMap<_, _> = after.iter().map(|r| (r.name.clone(), r.row_key)).collect();
    assert_eq!(rows["A"], 0);
    assert_eq!(rows["B"], 1);
    assert_eq!(rows["C"], 0);
}

#[test]
fn test_names_are_unique_ignoring_case() {
    let mut api = setup();
    assert!(api.create(NewVar::new("Width", TypeTag::Length)).unwrap());
    assert!(!api.create(NewVar::new("WIDTH", TypeTag::Integer)).unwrap());
    assert_eq!(api.list_all().unwrap().len(), 1);
    assert_eq!(api.var_type("width").unwrap(), TypeTag::Length);
}

#[test]
fn test_row_keys_stay_dense_after_reorders() {
    let mut api = setup();
    for name in ["A", "B", "C", "D", "E"] {
        create(&mut api, name, "Default");
    }

    for (name, delta) in [
        ("C", Delta::By(-10)),
        ("A", Delta::By(2)),
        ("E", Delta::First),
        ("B", Delta::By(1)),
        ("D", Delta::Last),
    ] {
        api.reorder_variable(name, delta).unwrap();
        let mut keys: Vec<i64> = rows_of(&api, "Default").into_iter().map(|(_, k)| k).collect();
        keys.sort();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
    }
}

#[test]
fn test_sentinels_reach_the_ends() {
    let mut api = setup();
    for name in ["A", "B", "C", "D"] {
        create(&mut api, name, "Default");
    }

    for name in ["A", "B", "C", "D"] {
        api.reorder_variable(name, Delta::First).unwrap();
        assert_eq!(rows_of(&api, "Default")[0].0, name);

        api.reorder_variable(name, Delta::Last).unwrap();
        assert_eq!(rows_of(&api, "Default")[3].0, name);
    }
}

#[test]
fn test_group_reorder_clamps_and_stays_dense() {
    let mut api = setup();
    for (name, group) in [("A", "One"), ("B", "Two"), ("C", "Three"), ("D", "Four")] {
        create(&mut api, name, group);
    }

    api.reorder_group("Two", Delta::By(10)).unwrap();
    let keys = group_keys(&api.list_all().unwrap());
    assert_eq!(keys["Two"], 3);
    let mut values: Vec<i64> = keys.values().copied().collect();
    values.sort();
    assert_eq!(values, vec![0, 1, 2, 3]);

    assert!(matches!(
        api.reorder_group("Missing", Delta::First),
        Err(VarsError::GroupNotFound(_))
    ));
}

#[test]
fn test_list_type_conversions() {
    let mut api = setup();
    api.create(NewVar::new("Counts", TypeTag::IntegerList).with_value(Value::IntegerList(vec![1, 2, 3])))
        .unwrap();
    assert!(api.set_type("Counts", TypeTag::StringList, None, None).unwrap());
    assert_eq!(
        api.value("Counts").unwrap(),
        Value::StringList(vec!["1".into(), "2".into(), "3".into()])
    );

    api.create(NewVar::new("Empty", TypeTag::IntegerList)).unwrap();
    api.set_type("Empty", TypeTag::Integer, None, None).unwrap();
    assert_eq!(api.value("Empty").unwrap(), Value::Integer(0));
}

#[test]
fn test_enumeration_needs_options() {
    let mut api = setup();
    assert!(matches!(
        api.create(NewVar::new("Size", TypeTag::Enumeration)),
        Err(VarsError::InvalidArgument(_))
    ));
    assert!(matches!(
        api.create(NewVar::new("Count", TypeTag::Integer).with_options(["a"])),
        Err(VarsError::InvalidArgument(_))
    ));
    assert!(api.list_all().unwrap().is_empty());
}

#[test]
fn test_unsupported_import_records_are_skipped() {
    let document = InMemoryDocument::new().with_supported_types(&[TypeTag::Integer, TypeTag::String]);
    let mut api = VarsApi::open(document).unwrap();
    let records: Vec<VarInfo> = serde_json::from_str(
        r#"[
            {"type": "App::PropertyLength", "name": "Width", "value": 10.0},
            {"type": "App::PropertyInteger", "name": "Count", "value": 3},
            {"type": "App::PropertyString", "name": "Label", "value": "x"}
        ]"#,
    )
    .unwrap();

    let result = api.import(&records).unwrap();
    assert_eq!(result.affected_vars.len(), 2);
    assert!(!api.exists("Width"));
    assert_eq!(api.value("Count").unwrap(), Value::Integer(3));
}

#[test]
fn test_export_import_roundtrip_through_files() {
    let temp = TempDir::new().unwrap();
    let export_path = temp.path().join("export.json");

    let mut source = VarsApi::open(HostDocument::open(FsBackend::new(temp.path().join("a.json"))).unwrap()).unwrap();
    source
        .create(
            NewVar::new("Width", TypeTag::Length)
                .with_value(Value::String("2 cm".into()))
                .with_description("outer width"),
        )
        .unwrap();
    source
        .create(
            NewVar::new("Mode", TypeTag::Enumeration)
                .with_options(["fast", "slow"])
                .with_value(Value::Enumeration("slow".into()))
                .with_group("settings"),
        )
        .unwrap();
    source
        .create(NewVar::new("Flags", TypeTag::BoolList).with_value(Value::BoolList(vec![true, false])))
        .unwrap();
    source.set_read_only("Flags", true).unwrap();
    source.reorder_variable("Flags", Delta::First).unwrap();
    source.export_to_path(&export_path).unwrap();

    let mut target = VarsApi::open(HostDocument::open(FsBackend::new(temp.path().join("b.json"))).unwrap()).unwrap();
    target.import_from_path(&export_path).unwrap();

    let strip = |records: Vec<VarRecord>| -> Vec<_> {
        records
            .into_iter()
            .map(|r| {
                (
                    r.name,
                    r.var_type,
                    r.value,
                    r.group,
                    r.description,
                    r.options,
                    r.read_only,
                    r.hidden,
                    r.row_key,
                )
            })
            .collect()
    };
    assert_eq!(
        strip(target.list_all().unwrap()),
        strip(source.list_all().unwrap())
    );
    assert_eq!(target.value("Width").unwrap(), Value::Length(20.0));
}

#[test]
fn test_document_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("doc.json");
    {
        let mut api = VarsApi::open(HostDocument::open(FsBackend::new(&path)).unwrap()).unwrap();
        for name in ["A", "B", "C"] {
            api.create(NewVar::new(name, TypeTag::Integer)).unwrap();
        }
        api.reorder_variable("C", Delta::First).unwrap();
        api.set_value("B", Value::Integer(7)).unwrap();
    }

    let api = VarsApi::open(HostDocument::open(FsBackend::new(&path)).unwrap()).unwrap();
    let names: Vec<String> = api.list_all().unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["C", "A", "B"]);
    assert_eq!(api.value("B").unwrap(), Value::Integer(7));
}

#[test]
fn test_expressions_drive_values_and_the_graph() {
    let mut api = setup();
    api.create(NewVar::new("Width", TypeTag::Length).with_value(Value::Length(20.0)))
        .unwrap();
    api.create(NewVar::new("Depth", TypeTag::Length).with_expression("=Width"))
        .unwrap();

    assert_eq!(api.value("Depth").unwrap(), Value::Length(20.0));
    assert_eq!(api.dependencies("Depth").unwrap(), vec!["Width".to_string()]);
    assert_eq!(api.references("Width").unwrap(), vec!["Depth".to_string()]);

    api.set_value("Width", Value::Length(35.0)).unwrap();
    assert_eq!(api.value("Depth").unwrap(), Value::Length(35.0));

    assert!(matches!(
        api.set_value("Depth", Value::Length(1.0)),
        Err(VarsError::ExpressionBound(_))
    ));
    api.set_expression("Depth", None).unwrap();
    api.set_value("Depth", Value::Length(1.0)).unwrap();
    assert!(api.references("Width").unwrap().is_empty());
}

#[test]
fn test_rename_keeps_position_and_detects_collisions() {
    let mut api = setup();
    for name in ["A", "B", "C"] {
        create(&mut api, name, "Default");
    }
    assert!(api.rename("B", "Middle", Some("renamed")).unwrap());
    assert!(!api.rename("Middle", "a", None).unwrap());
    assert_eq!(
        rows_of(&api, "Default"),
        vec![("A".to_string(), 0), ("Middle".to_string(), 1), ("C".to_string(), 2)]
    );
    assert_eq!(api.description("Middle").unwrap(), "renamed");
}

#[test]
fn test_delete_is_idempotent_and_renumbers() {
    let mut api = setup();
    for name in ["A", "B", "C"] {
        create(&mut api, name, "Default");
    }
    assert!(api.delete("A").unwrap());
    assert!(!api.delete("A").unwrap());
    assert_eq!(
        rows_of(&api, "Default"),
        vec![("B".to_string(), 0), ("C".to_string(), 1)]
    );
}

#[test]
fn test_unicode_names_can_be_created_and_resolved() {
    let mut api = setup();
    assert!(api.create(NewVar::new("Größe", TypeTag::Length)).unwrap());
    assert!(api.exists("GRÖßE"));
    assert!(matches!(
        api.create(NewVar::new("2nd", TypeTag::Length)),
        Err(VarsError::InvalidName(_))
    ));

    let records: Vec<VarInfo> = serde_json::from_str(
        r#"[{"type": "App::PropertyInteger", "name": "Zähler", "value": 3}]"#,
    )
    .unwrap();
    api.import(&records).unwrap();
    assert_eq!(api.value("zähler").unwrap(), Value::Integer(3));
}

#[test]
fn test_non_finite_values_never_reach_an_export() {
    let mut api = setup();
    api.create(NewVar::new("Big", TypeTag::Float).with_value(Value::Float(2.5)))
        .unwrap();
    assert!(matches!(
        api.set_value("Big", Value::String("inf".into())),
        Err(VarsError::InvalidValue { .. })
    ));

    let exported = serde_json::to_value(api.export().unwrap()).unwrap();
    assert_eq!(exported["variables"][0]["value"], serde_json::json!(2.5));
}
