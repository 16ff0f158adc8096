#![allow(clippy::single_match_else, clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use ulid::Ulid;

fn shopfloor_binary_path() -> PathBuf {
    match std::env::var("CARGO_BIN_EXE_shopfloor") {
        Ok(value) => PathBuf::from(value),
        Err(_) => {
            let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../target/debug/shopfloor");
            if !path.exists() {
                let status = Command::new("cargo")
                    .args(["build", "-p", "shopfloor-schedule-cli", "--bin", "shopfloor"])
                    .status();
                match status {
                    Ok(value) if value.success() => {}
                    Ok(value) => panic!("failed to build shopfloor binary (status={value})"),
                    Err(err) => panic!("failed to invoke cargo build: {err}"),
                }
            }
            path
        }
    }
}

fn shopfloor_output(db_path: &Path, args: &[&str]) -> Output {
    let mut command = Command::new(shopfloor_binary_path());
    command.env_remove("SHOPFLOOR_DB");
    command.arg("--db").arg(db_path);
    for arg in args {
        command.arg(arg);
    }

    match command.output() {
        Ok(output) => output,
        Err(err) => panic!("failed to execute shopfloor command {:?}: {err}", args),
    }
}

fn parse_json(output: &Output) -> Value {
    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(value) => value,
        Err(err) => panic!(
            "failed to parse stdout json: {err}\nstdout={}\nstderr={}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ),
    }
}

fn must_succeed(db_path: &Path, args: &[&str]) -> Output {
    let output = shopfloor_output(db_path, args);
    assert!(
        output.status.success(),
        "command {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn seed_double_booking(db_path: &Path) {
    let _ = must_succeed(db_path, &["company", "add", "--id", "1", "--name", "Acme"]);
    let _ = must_succeed(
        db_path,
        &["machine", "add", "--id", "7", "--name", "VMC-7", "--type", "VMC"],
    );
    for (id, quantity, sub_batch) in [("1", "100", "BATCH_001"), ("2", "50", "")] {
        let _ = must_succeed(
            db_path,
            &["part", "add", "--id", id, "--company-id", "1", "--name", "Hub"],
        );
        let _ = must_succeed(
            db_path,
            &[
                "operation",
                "add",
                "--id",
                id,
                "--part-id",
                id,
                "--sequence-number",
                "1",
            ],
        );
        let _ = must_succeed(
            db_path,
            &[
                "schedule",
                "create",
                "--date",
                "2024-03-05",
                "--shift",
                "1",
                "--slot",
                "1",
                "--machine-id",
                "7",
                "--part-id",
                id,
                "--operation-id",
                id,
                "--quantity",
                quantity,
                "--sub-batch-id",
                sub_batch,
            ],
        );
    }
}

#[test]
fn snapshot_conflicts_by_date_json_v1() {
    let db_path =
        std::env::temp_dir().join(format!("shopfloor-snapshot-by-date-{}.sqlite3", Ulid::new()));
    seed_double_booking(&db_path);

    let output = must_succeed(
        &db_path,
        &["conflicts", "by-date", "--date", "2024-03-05", "--json"],
    );
    let payload = parse_json(&output);
    let snapshot = match serde_json::to_string_pretty(&payload) {
        Ok(value) => value,
        Err(err) => panic!("failed to serialize conflict payload: {err}"),
    };

    let expected = r#"{
  "date": "2024-03-05",
  "conflicts_count": 1,
  "conflicts": [
    {
      "slot_info": {
        "machine_id": 7,
        "date": "2024-03-05",
        "shift_number": 1,
        "slot_number": 1
      },
      "conflicting_schedules": [
        {
          "schedule_id": 1,
          "part_id": 1,
          "operation_id": 1,
          "quantity_scheduled": 100,
          "sub_batch_id": "BATCH_001",
          "status": "planned",
          "machine_id": 7,
          "date": "2024-03-05",
          "shift_number": 1,
          "slot_number": 1
        },
        {
          "schedule_id": 2,
          "part_id": 2,
          "operation_id": 2,
          "quantity_scheduled": 50,
          "sub_batch_id": null,
          "status": "planned",
          "machine_id": 7,
          "date": "2024-03-05",
          "shift_number": 1,
          "slot_number": 1
        }
      ]
    }
  ]
}"#;

    assert_eq!(snapshot, expected);
    let _ = std::fs::remove_file(&db_path);
}

#[test]
fn snapshot_check_slot_text_v1() {
    let db_path =
        std::env::temp_dir().join(format!("shopfloor-snapshot-check-{}.sqlite3", Ulid::new()));
    seed_double_booking(&db_path);

    let output = must_succeed(
        &db_path,
        &[
            "conflicts",
            "check-slot",
            "--machine-id",
            "7",
            "--date",
            "2024-03-05",
            "--shift",
            "1",
            "--slot",
            "1",
        ],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let expected = "machine 7 on 2024-03-05 S1:1 available=no has_conflicts=yes occupants=2
message=Slot machine 7 on 2024-03-05 S1:1 is double-booked by 2 schedules
  schedule_id=1 part_id=1 qty=100 status=planned
  schedule_id=2 part_id=2 qty=50 status=planned
";
    assert_eq!(stdout, expected);
    let _ = std::fs::remove_file(&db_path);
}
