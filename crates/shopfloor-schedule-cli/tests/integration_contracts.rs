use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use serde_json::Value;
use shopfloor_schedule_core::{
    parse_calendar_date, CheckSlotRequest, CreateScheduleRequest, ScheduleService,
};
use shopfloor_schedule_store_sqlite::SqliteScheduleStore;

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|err| panic!("failed to canonicalize repo root: {err}"))
}

fn read_json(path: &Path) -> Value {
    let body = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()));
    serde_json::from_str(&body)
        .unwrap_or_else(|err| panic!("failed to parse {}: {err}", path.display()))
}

fn assert_schema(schema_path: &Path, value: &Value) {
    let schema = read_json(schema_path);
    let compiled = JSONSchema::compile(&schema)
        .unwrap_or_else(|err| panic!("failed to compile {}: {err}", schema_path.display()));
    if let Some(errors) = compiled
        .validate(value)
        .err()
        .map(|iter| iter.map(|err| err.to_string()).collect::<Vec<_>>())
    {
        panic!(
            "schema validation failed for {}:\n{}",
            schema_path.display(),
            errors.join("\n")
        );
    }
}

fn assert_rejected(schema_path: &Path, value: &Value) {
    let schema = read_json(schema_path);
    let compiled = JSONSchema::compile(&schema)
        .unwrap_or_else(|err| panic!("failed to compile {}: {err}", schema_path.display()));
    assert!(
        !compiled.is_valid(value),
        "expected {} to reject {value}",
        schema_path.display()
    );
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| panic!("failed to serialize payload: {err}"))
}

fn fixture_store() -> SqliteScheduleStore {
    let store = SqliteScheduleStore::open(Path::new(":memory:"))
        .unwrap_or_else(|err| panic!("failed to open store: {err}"));
    store
        .migrate()
        .unwrap_or_else(|err| panic!("failed to migrate store: {err}"));
    let company = store
        .add_company(None, "Acme")
        .unwrap_or_else(|err| panic!("failed to add company: {err}"));
    store
        .add_machine(Some(7), "VMC-7", "VMC")
        .unwrap_or_else(|err| panic!("failed to add machine: {err}"));
    for id in 1..=2 {
        store
            .add_part(Some(id), company.company_id, "Hub", 1)
            .unwrap_or_else(|err| panic!("failed to add part: {err}"));
        store
            .add_operation(Some(id), id, 1, 8.0, 2.0)
            .unwrap_or_else(|err| panic!("failed to add operation: {err}"));
    }
    store
}

fn request(part_id: i64, quantity: i64) -> CreateScheduleRequest {
    CreateScheduleRequest {
        date: Some("2024-03-05".to_string()),
        shift_number: Some(1),
        slot_number: Some(1),
        part_id: Some(part_id),
        operation_id: Some(part_id),
        machine_id: Some(7),
        quantity_scheduled: Some(quantity),
        sub_batch_id: None,
        status: None,
    }
}

#[test]
fn schedule_contract_pack_validates_live_payloads() {
    let schema_dir = repo_root().join("contracts/schedule/v1/schemas");
    let mut store = fixture_store();
    let mut service = ScheduleService::new(&mut store);

    let first = service
        .create_schedule(&request(1, 100))
        .unwrap_or_else(|err| panic!("failed to create first schedule: {err}"));
    let second = service
        .create_schedule(&request(2, 50))
        .unwrap_or_else(|err| panic!("failed to create second schedule: {err}"));
    let schedule_schema = schema_dir.join("schedule-with-conflicts.schema.json");
    assert_schema(&schedule_schema, &to_value(&first));
    assert_schema(&schedule_schema, &to_value(&second));

    let date = parse_calendar_date("2024-03-05")
        .unwrap_or_else(|err| panic!("failed to parse fixture date: {err}"));
    let by_date = service
        .conflicts_by_date(date)
        .unwrap_or_else(|err| panic!("failed to scan date: {err}"));
    assert_schema(
        &schema_dir.join("date-conflicts.schema.json"),
        &to_value(&by_date),
    );

    let machine_schema = schema_dir.join("machine-conflicts.schema.json");
    for scoped_date in [None, Some(date)] {
        let by_machine = service
            .conflicts_by_machine(7, scoped_date)
            .unwrap_or_else(|err| panic!("failed to scan machine: {err}"));
        assert_schema(&machine_schema, &to_value(&by_machine));
    }

    let check = service
        .check_slot(&CheckSlotRequest {
            machine_id: Some(7),
            date: Some("2024-03-05".to_string()),
            shift_number: Some(1),
            slot_number: Some(1),
            exclude_id: Some(second.schedule.schedule_id),
        })
        .unwrap_or_else(|err| panic!("failed to check slot: {err}"));
    assert_schema(&schema_dir.join("slot-check.schema.json"), &to_value(&check));
}

#[test]
fn schedule_contract_pack_validates_fixtures_and_rejects_drift() {
    let repo = repo_root();
    let schema_path = repo.join("contracts/schedule/v1/schemas/schedule-with-conflicts.schema.json");
    let fixture = read_json(&repo.join("contracts/schedule/v1/fixtures/schedule-with-conflicts.sample.json"));
    assert_schema(&schema_path, &fixture);

    let mut bad_shift = fixture.clone();
    bad_shift["shift_number"] = Value::from(3);
    assert_rejected(&schema_path, &bad_shift);

    let mut bad_status = fixture.clone();
    bad_status["status"] = Value::String("cancelled".to_string());
    assert_rejected(&schema_path, &bad_status);

    let mut missing_warnings = fixture;
    if let Some(object) = missing_warnings.as_object_mut() {
        object.remove("warnings");
    }
    assert_rejected(&schema_path, &missing_warnings);
}
