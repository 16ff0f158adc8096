//! Embedded command surface for the production schedule conflict checker.
//!
//! Host programs embed the CLI through:
//! - [`run_cli`] for full parsed CLI execution.
//! - [`run_with_db`] for direct [`Command`] execution against a DB path.
//! - [`run_command`] for execution against an existing [`SqliteScheduleStore`].
//!
//! Write commands always print JSON. Read commands print a text table unless
//! `--json` is given.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use shopfloor_schedule_core::{
    parse_calendar_date, CheckSlotRequest, ConflictGroup, CreateScheduleRequest, EntityKind,
    Machine, ScheduleFilter, ScheduleRecord, ScheduleService, SlotCheck, UpdateScheduleRequest,
};
use shopfloor_schedule_store_sqlite::SqliteScheduleStore;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "shopfloor")]
#[command(about = "Production schedule slot-conflict CLI")]
pub struct Cli {
    #[arg(long, env = "SHOPFLOOR_DB", default_value = "./shopfloor.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Schedule {
        #[command(subcommand)]
        command: Box<ScheduleCommand>,
    },
    Conflicts {
        #[command(subcommand)]
        command: Box<ConflictsCommand>,
    },
    Company {
        #[command(subcommand)]
        command: Box<CompanyCommand>,
    },
    Machine {
        #[command(subcommand)]
        command: Box<MachineCommand>,
    },
    Part {
        #[command(subcommand)]
        command: Box<PartCommand>,
    },
    Operation {
        #[command(subcommand)]
        command: Box<OperationCommand>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    Create(ScheduleCreateArgs),
    Update(ScheduleUpdateArgs),
    Status(ScheduleStatusArgs),
    Delete(ScheduleDeleteArgs),
    Show(ScheduleIdArgs),
    List(ScheduleListArgs),
    ByDate(DateQueryArgs),
    ByMachine(MachineQueryArgs),
    ByPart(PartQueryArgs),
}

/// Every field is optional here so that missing ones are reported together.
#[derive(Debug, Args, Default)]
pub struct ScheduleFieldArgs {
    #[arg(long)]
    date: Option<String>,
    #[arg(long = "shift")]
    shift_number: Option<i64>,
    #[arg(long = "slot")]
    slot_number: Option<i64>,
    #[arg(long)]
    part_id: Option<i64>,
    #[arg(long)]
    operation_id: Option<i64>,
    #[arg(long)]
    machine_id: Option<i64>,
    #[arg(long = "quantity")]
    quantity_scheduled: Option<i64>,
    #[arg(long)]
    sub_batch_id: Option<String>,
    #[arg(long)]
    status: Option<String>,
    /// Full request body as JSON; replaces the individual field flags.
    #[arg(long)]
    payload_json: Option<String>,
}

#[derive(Debug, Args)]
pub struct ScheduleCreateArgs {
    #[command(flatten)]
    fields: ScheduleFieldArgs,
}

#[derive(Debug, Args)]
pub struct ScheduleUpdateArgs {
    #[arg(long)]
    schedule_id: i64,
    #[command(flatten)]
    fields: ScheduleFieldArgs,
}

#[derive(Debug, Args)]
pub struct ScheduleStatusArgs {
    #[arg(long)]
    schedule_id: i64,
    #[arg(long)]
    status: String,
}

#[derive(Debug, Args)]
pub struct ScheduleDeleteArgs {
    #[arg(long)]
    schedule_id: i64,
}

#[derive(Debug, Args)]
pub struct ScheduleIdArgs {
    #[arg(long)]
    schedule_id: i64,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct ScheduleListArgs {
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    machine_id: Option<i64>,
    #[arg(long)]
    part_id: Option<i64>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct DateQueryArgs {
    #[arg(long)]
    date: String,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct MachineQueryArgs {
    #[arg(long)]
    machine_id: i64,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct PartQueryArgs {
    #[arg(long)]
    part_id: i64,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConflictsCommand {
    ByDate(DateQueryArgs),
    ByMachine(MachineQueryArgs),
    CheckSlot(CheckSlotArgs),
}

#[derive(Debug, Args)]
pub struct CheckSlotArgs {
    #[arg(long)]
    machine_id: Option<i64>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long = "shift")]
    shift_number: Option<i64>,
    #[arg(long = "slot")]
    slot_number: Option<i64>,
    #[arg(long)]
    exclude_id: Option<i64>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum CompanyCommand {
    Add(CompanyAddArgs),
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct CompanyAddArgs {
    #[arg(long)]
    id: Option<i64>,
    #[arg(long)]
    name: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum MachineCommand {
    Add(MachineAddArgs),
    List(ListArgs),
    Delete(MachineIdArgs),
}

#[derive(Debug, Args)]
pub struct MachineAddArgs {
    #[arg(long)]
    id: Option<i64>,
    #[arg(long)]
    name: String,
    #[arg(long = "type", default_value = "")]
    machine_type: String,
}

#[derive(Debug, Args)]
pub struct MachineIdArgs {
    #[arg(long)]
    machine_id: i64,
}

#[derive(Debug, Subcommand)]
pub enum PartCommand {
    Add(PartAddArgs),
    List(ListArgs),
    Delete(PartIdArgs),
}

#[derive(Debug, Args)]
pub struct PartAddArgs {
    #[arg(long)]
    id: Option<i64>,
    #[arg(long)]
    company_id: i64,
    #[arg(long)]
    name: String,
    #[arg(long, default_value_t = 0)]
    total_operations: i64,
}

#[derive(Debug, Args)]
pub struct PartIdArgs {
    #[arg(long)]
    part_id: i64,
}

#[derive(Debug, Subcommand)]
pub enum OperationCommand {
    Add(OperationAddArgs),
    List(OperationListArgs),
    LinkMachine(OperationLinkArgs),
    EligibleMachines(OperationEligibleArgs),
    Delete(OperationIdArgs),
}

#[derive(Debug, Args)]
pub struct OperationAddArgs {
    #[arg(long)]
    id: Option<i64>,
    #[arg(long)]
    part_id: i64,
    #[arg(long)]
    sequence_number: i64,
    /// Minutes per piece.
    #[arg(long, default_value_t = 0.0)]
    machining_time: f64,
    /// Minutes per setup.
    #[arg(long, default_value_t = 0.0)]
    loading_time: f64,
}

#[derive(Debug, Args)]
pub struct OperationListArgs {
    #[arg(long)]
    part_id: Option<i64>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct OperationLinkArgs {
    #[arg(long)]
    operation_id: i64,
    #[arg(long)]
    machine_id: i64,
}

#[derive(Debug, Args)]
pub struct OperationEligibleArgs {
    #[arg(long)]
    operation_id: i64,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct OperationIdArgs {
    #[arg(long)]
    operation_id: i64,
}

#[derive(Debug, Serialize)]
struct DeletedPayload {
    deleted: bool,
    entity: EntityKind,
    id: i64,
}

#[derive(Debug, Serialize)]
struct LinkedPayload {
    linked: bool,
    operation_id: i64,
    machine_id: i64,
}

/// Executes the parsed top-level CLI command graph.
///
/// # Errors
/// Returns an error when store open/migrate fails or the command fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    run_with_db(&cli.db, cli.command)
}

/// Executes a parsed command using the provided `SQLite` DB path.
///
/// # Errors
/// Returns an error when store open/migrate fails or the requested command fails.
pub fn run_with_db(db_path: &Path, command: Command) -> Result<()> {
    let mut store = SqliteScheduleStore::open(db_path)?;
    store.migrate()?;
    debug!(event = "store_ready", db = %db_path.display());
    run_command(command, &mut store)
}

/// Executes a parsed command against an existing store handle.
///
/// # Errors
/// Returns an error when validation, reference checks or persistence fail.
pub fn run_command(command: Command, store: &mut SqliteScheduleStore) -> Result<()> {
    match command {
        Command::Schedule { command } => run_schedule(*command, store),
        Command::Conflicts { command } => run_conflicts(*command, store),
        Command::Company { command } => run_company(*command, store),
        Command::Machine { command } => run_machine(*command, store),
        Command::Part { command } => run_part(*command, store),
        Command::Operation { command } => run_operation(*command, store),
    }
}

fn run_schedule(command: ScheduleCommand, store: &mut SqliteScheduleStore) -> Result<()> {
    let mut service = ScheduleService::new(store);
    match command {
        ScheduleCommand::Create(args) => {
            let request = create_request(args.fields)?;
            let created = service.create_schedule(&request)?;
            print_json(&created)
        }
        ScheduleCommand::Update(args) => {
            let request = update_request(args.fields)?;
            let updated = service.update_schedule(args.schedule_id, &request)?;
            print_json(&updated)
        }
        ScheduleCommand::Status(args) => {
            let record = service.update_status(args.schedule_id, &args.status)?;
            print_json(&record)
        }
        ScheduleCommand::Delete(args) => {
            service.delete_schedule(args.schedule_id)?;
            print_json(&DeletedPayload {
                deleted: true,
                entity: EntityKind::Schedule,
                id: args.schedule_id,
            })
        }
        ScheduleCommand::Show(args) => {
            let record = service.get_schedule(args.schedule_id)?;
            if args.json {
                return print_json(&record);
            }
            print_schedules(std::slice::from_ref(&record));
            Ok(())
        }
        ScheduleCommand::List(args) => {
            let filter = ScheduleFilter {
                date: parse_optional_date(args.date.as_deref())?,
                machine_id: args.machine_id,
                part_id: args.part_id,
            };
            let records = service.list_schedules(&filter)?;
            emit_schedules(&records, args.json)
        }
        ScheduleCommand::ByDate(args) => {
            let records = service.schedules_by_date(parse_calendar_date(&args.date)?)?;
            emit_schedules(&records, args.json)
        }
        ScheduleCommand::ByMachine(args) => {
            let date = parse_optional_date(args.date.as_deref())?;
            let records = service.schedules_by_machine(args.machine_id, date)?;
            emit_schedules(&records, args.json)
        }
        ScheduleCommand::ByPart(args) => {
            let records = service.schedules_by_part(args.part_id)?;
            emit_schedules(&records, args.json)
        }
    }
}

fn run_conflicts(command: ConflictsCommand, store: &mut SqliteScheduleStore) -> Result<()> {
    let service = ScheduleService::new(store);
    match command {
        ConflictsCommand::ByDate(args) => {
            let report = service.conflicts_by_date(parse_calendar_date(&args.date)?)?;
            if args.json {
                return print_json(&report);
            }
            println!("date={} conflicts={}", args.date, report.conflicts_count);
            print_conflict_groups(&report.conflicts);
            Ok(())
        }
        ConflictsCommand::ByMachine(args) => {
            let date = parse_optional_date(args.date.as_deref())?;
            let report = service.conflicts_by_machine(args.machine_id, date)?;
            if args.json {
                return print_json(&report);
            }
            println!(
                "machine_id={} date={} conflicts={}",
                report.machine_id,
                args.date.as_deref().unwrap_or("all"),
                report.conflicts_count
            );
            print_conflict_groups(&report.conflicts);
            Ok(())
        }
        ConflictsCommand::CheckSlot(args) => {
            let json = args.json;
            let request = CheckSlotRequest {
                machine_id: args.machine_id,
                date: args.date,
                shift_number: args.shift_number,
                slot_number: args.slot_number,
                exclude_id: args.exclude_id,
            };
            let check = service.check_slot(&request)?;
            if json {
                return print_json(&check);
            }
            print_slot_check(&check);
            Ok(())
        }
    }
}

fn run_company(command: CompanyCommand, store: &SqliteScheduleStore) -> Result<()> {
    match command {
        CompanyCommand::Add(args) => print_json(&store.add_company(args.id, &args.name)?),
        CompanyCommand::List(args) => {
            let companies = store.list_companies()?;
            if args.json {
                return print_json(&companies);
            }
            println!("{:<10} name", "company_id");
            println!("{}", "-".repeat(40));
            for company in &companies {
                println!("{:<10} {}", company.company_id, company.name);
            }
            Ok(())
        }
    }
}

fn run_machine(command: MachineCommand, store: &SqliteScheduleStore) -> Result<()> {
    match command {
        MachineCommand::Add(args) => {
            print_json(&store.add_machine(args.id, &args.name, &args.machine_type)?)
        }
        MachineCommand::List(args) => {
            let machines = store.list_machines()?;
            if args.json {
                return print_json(&machines);
            }
            print_machines(&machines);
            Ok(())
        }
        MachineCommand::Delete(args) => {
            store.delete_machine(args.machine_id)?;
            print_json(&DeletedPayload {
                deleted: true,
                entity: EntityKind::Machine,
                id: args.machine_id,
            })
        }
    }
}

fn run_part(command: PartCommand, store: &SqliteScheduleStore) -> Result<()> {
    match command {
        PartCommand::Add(args) => print_json(&store.add_part(
            args.id,
            args.company_id,
            &args.name,
            args.total_operations,
        )?),
        PartCommand::List(args) => {
            let parts = store.list_parts()?;
            if args.json {
                return print_json(&parts);
            }
            println!(
                "{:<8} {:<10} {:<6} name",
                "part_id", "company_id", "ops"
            );
            println!("{}", "-".repeat(60));
            for part in &parts {
                println!(
                    "{:<8} {:<10} {:<6} {}",
                    part.part_id, part.company_id, part.total_operations, part.name
                );
            }
            Ok(())
        }
        PartCommand::Delete(args) => {
            store.delete_part(args.part_id)?;
            print_json(&DeletedPayload {
                deleted: true,
                entity: EntityKind::Part,
                id: args.part_id,
            })
        }
    }
}

fn run_operation(command: OperationCommand, store: &SqliteScheduleStore) -> Result<()> {
    match command {
        OperationCommand::Add(args) => print_json(&store.add_operation(
            args.id,
            args.part_id,
            args.sequence_number,
            args.machining_time,
            args.loading_time,
        )?),
        OperationCommand::List(args) => {
            let operations = store.list_operations(args.part_id)?;
            if args.json {
                return print_json(&operations);
            }
            println!(
                "{:<12} {:<8} {:<4} {:<10} loading",
                "operation_id", "part_id", "seq", "machining"
            );
            println!("{}", "-".repeat(60));
            for operation in &operations {
                println!(
                    "{:<12} {:<8} {:<4} {:<10.2} {:.2}",
                    operation.operation_id,
                    operation.part_id,
                    operation.sequence_number,
                    operation.machining_time,
                    operation.loading_time
                );
            }
            Ok(())
        }
        OperationCommand::LinkMachine(args) => {
            store.link_operation_machine(args.operation_id, args.machine_id)?;
            print_json(&LinkedPayload {
                linked: true,
                operation_id: args.operation_id,
                machine_id: args.machine_id,
            })
        }
        OperationCommand::EligibleMachines(args) => {
            let machines = store.eligible_machines(args.operation_id)?;
            if args.json {
                return print_json(&machines);
            }
            print_machines(&machines);
            Ok(())
        }
        OperationCommand::Delete(args) => {
            store.delete_operation(args.operation_id)?;
            print_json(&DeletedPayload {
                deleted: true,
                entity: EntityKind::Operation,
                id: args.operation_id,
            })
        }
    }
}

fn create_request(fields: ScheduleFieldArgs) -> Result<CreateScheduleRequest> {
    if let Some(raw) = fields.payload_json.as_deref() {
        return Ok(CreateScheduleRequest::from_json(&parse_payload_json(raw)?)?);
    }

    Ok(CreateScheduleRequest {
        date: fields.date,
        shift_number: fields.shift_number,
        slot_number: fields.slot_number,
        part_id: fields.part_id,
        operation_id: fields.operation_id,
        machine_id: fields.machine_id,
        quantity_scheduled: fields.quantity_scheduled,
        sub_batch_id: fields.sub_batch_id,
        status: fields.status,
    })
}

fn update_request(fields: ScheduleFieldArgs) -> Result<UpdateScheduleRequest> {
    if let Some(raw) = fields.payload_json.as_deref() {
        return Ok(UpdateScheduleRequest::from_json(&parse_payload_json(raw)?)?);
    }

    Ok(UpdateScheduleRequest {
        date: fields.date,
        shift_number: fields.shift_number,
        slot_number: fields.slot_number,
        part_id: fields.part_id,
        operation_id: fields.operation_id,
        machine_id: fields.machine_id,
        quantity_scheduled: fields.quantity_scheduled,
        sub_batch_id: fields.sub_batch_id,
        status: fields.status,
    })
}

fn parse_payload_json(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).with_context(|| format!("payload_json must be valid JSON: {raw}"))
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<time::Date>> {
    Ok(raw.map(parse_calendar_date).transpose()?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit_schedules(records: &[ScheduleRecord], json: bool) -> Result<()> {
    if json {
        return print_json(&records);
    }
    print_schedules(records);
    Ok(())
}

fn print_schedules(records: &[ScheduleRecord]) {
    println!(
        "{:<8} {:<10} {:<5} {:<4} {:<8} {:<7} {:<9} {:<8} {:<12} sub_batch",
        "id", "date", "shift", "slot", "machine", "part", "operation", "qty", "status"
    );
    println!("{}", "-".repeat(96));
    for record in records {
        println!(
            "{:<8} {:<10} {:<5} {:<4} {:<8} {:<7} {:<9} {:<8} {:<12} {}",
            record.schedule_id,
            record.date,
            record.shift_number,
            record.slot_number,
            record.machine_id,
            record.part_id,
            record.operation_id,
            record.quantity_scheduled,
            record.status,
            record.sub_batch_id.as_deref().unwrap_or("-")
        );
    }
}

fn print_conflict_groups(groups: &[ConflictGroup]) {
    for group in groups {
        println!(
            "{} occupants={}",
            group.slot_info,
            group.conflicting_schedules.len()
        );
        for occupant in &group.conflicting_schedules {
            println!(
                "  schedule_id={} part_id={} operation_id={} qty={} status={} sub_batch={}",
                occupant.schedule_id,
                occupant.part_id,
                occupant.operation_id,
                occupant.quantity_scheduled,
                occupant.status,
                occupant.sub_batch_id.as_deref().unwrap_or("-")
            );
        }
    }
}

fn print_slot_check(check: &SlotCheck) {
    println!(
        "{} available={} has_conflicts={} occupants={}",
        check.slot_info,
        if check.available { "yes" } else { "no" },
        if check.has_conflicts { "yes" } else { "no" },
        check.occupant_count
    );
    println!("message={}", check.message);
    for occupant in &check.conflicts {
        println!(
            "  schedule_id={} part_id={} qty={} status={}",
            occupant.schedule_id, occupant.part_id, occupant.quantity_scheduled, occupant.status
        );
    }
}

fn print_machines(machines: &[Machine]) {
    println!("{:<10} {:<16} name", "machine_id", "type");
    println!("{}", "-".repeat(50));
    for machine in machines {
        println!(
            "{:<10} {:<16} {}",
            machine.machine_id, machine.machine_type, machine.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shopfloor_schedule_core::{ScheduleError, ScheduleStatus, ScheduleStore};
    use std::fs;
    use ulid::Ulid;

    fn must<T>(result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err}"),
        }
    }

    fn execute_cli(args: &[&str]) -> Result<()> {
        let cli = Cli::try_parse_from(args.iter().copied())?;
        run_cli(cli)
    }

    fn temp_db(label: &str) -> (PathBuf, String) {
        let db_path = std::env::temp_dir().join(format!("shopfloor-{label}-{}.sqlite3", Ulid::new()));
        let db_path_str = match db_path.to_str() {
            Some(value) => value.to_string(),
            None => panic!("temp db path must be valid UTF-8"),
        };
        (db_path, db_path_str)
    }

    fn seed_reference_data(db: &str) {
        must(execute_cli(&[
            "shopfloor", "--db", db, "company", "add", "--id", "1", "--name", "Acme",
        ]));
        must(execute_cli(&[
            "shopfloor", "--db", db, "machine", "add", "--id", "7", "--name", "VMC-7", "--type",
            "VMC",
        ]));
        for part in ["1", "2"] {
            must(execute_cli(&[
                "shopfloor",
                "--db",
                db,
                "part",
                "add",
                "--id",
                part,
                "--company-id",
                "1",
                "--name",
                "Flange",
                "--total-operations",
                "1",
            ]));
            must(execute_cli(&[
                "shopfloor",
                "--db",
                db,
                "operation",
                "add",
                "--id",
                part,
                "--part-id",
                part,
                "--sequence-number",
                "1",
                "--machining-time",
                "12.5",
            ]));
        }
    }

    fn create_args<'a>(db: &'a str, part: &'a str, quantity: &'a str) -> Vec<&'a str> {
        vec![
            "shopfloor",
            "--db",
            db,
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
            part,
            "--operation-id",
            part,
            "--quantity",
            quantity,
        ]
    }

    #[test]
    fn parse_payload_accepts_valid_json() {
        let value = must(parse_payload_json(r#"{"date":"2024-03-05"}"#));
        assert_eq!(value["date"], json!("2024-03-05"));
    }

    #[test]
    fn parse_payload_rejects_invalid_json() {
        assert!(parse_payload_json("{").is_err());
    }

    #[test]
    fn payload_json_replaces_field_flags() {
        let request = must(create_request(ScheduleFieldArgs {
            machine_id: Some(99),
            payload_json: Some(
                r#"{"date":"2024-03-05","shift_number":2,"slot_number":2,"part_id":1,"operation_id":1,"machine_id":7,"quantity_scheduled":5}"#
                    .to_string(),
            ),
            ..ScheduleFieldArgs::default()
        }));
        assert_eq!(request.machine_id, Some(7));
        assert_eq!(request.shift_number, Some(2));
    }

    #[test]
    fn cli_end_to_end_double_booking_is_stored_and_reported() {
        let (db_path, db) = temp_db("cli-e2e");
        seed_reference_data(&db);

        must(execute_cli(&create_args(&db, "1", "100")));
        must(execute_cli(&create_args(&db, "2", "50")));
        must(execute_cli(&[
            "shopfloor",
            "--db",
            &db,
            "conflicts",
            "by-date",
            "--date",
            "2024-03-05",
        ]));
        must(execute_cli(&[
            "shopfloor",
            "--db",
            &db,
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
            "--json",
        ]));
        must(execute_cli(&[
            "shopfloor", "--db", &db, "schedule", "status", "--schedule-id", "1", "--status",
            "in_progress",
        ]));

        let bad_status = execute_cli(&[
            "shopfloor", "--db", &db, "schedule", "status", "--schedule-id", "1", "--status",
            "archived",
        ]);
        let err = match bad_status {
            Ok(()) => panic!("expected unknown status to be rejected"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("Status must be one of"));

        let store = must(SqliteScheduleStore::open(&db_path));
        must(store.migrate());
        let rows = must(
            store
                .find_by_date(must(parse_calendar_date("2024-03-05").map_err(Into::into)))
                .map_err(Into::into),
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, ScheduleStatus::InProgress);
        assert_eq!(rows[1].quantity_scheduled, 50);

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn validation_and_missing_references_surface_typed_errors() {
        let (db_path, db) = temp_db("cli-errors");
        seed_reference_data(&db);

        let err = match execute_cli(&[
            "shopfloor", "--db", &db, "schedule", "create", "--date", "2024-03-05", "--machine-id",
            "7",
        ]) {
            Ok(()) => panic!("expected missing fields to be rejected"),
            Err(err) => err,
        };
        assert!(err
            .to_string()
            .contains("Missing required fields: shift_number, slot_number"));

        let mut unknown_machine = create_args(&db, "1", "10");
        unknown_machine[12] = "99";
        let err = match execute_cli(&unknown_machine) {
            Ok(()) => panic!("expected unknown machine to be rejected"),
            Err(err) => err,
        };
        assert_eq!(
            err.downcast_ref::<ScheduleError>(),
            Some(&ScheduleError::not_found(EntityKind::Machine, 99))
        );

        let err = match execute_cli(&[
            "shopfloor",
            "--db",
            &db,
            "conflicts",
            "check-slot",
            "--machine-id",
            "7",
            "--date",
            "2024-03-05",
            "--shift",
            "3",
            "--slot",
            "1",
        ]) {
            Ok(()) => panic!("expected shift 3 to be rejected"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("Shift number must be 1 or 2"));

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn schedule_delete_takes_only_the_schedule_id() {
        let (db_path, db) = temp_db("cli-delete");
        seed_reference_data(&db);
        must(execute_cli(&create_args(&db, "1", "100")));

        assert!(Cli::try_parse_from([
            "shopfloor", "--db", db.as_str(), "schedule", "delete", "--schedule-id", "1", "--json",
        ])
        .is_err());

        must(execute_cli(&[
            "shopfloor", "--db", &db, "schedule", "delete", "--schedule-id", "1",
        ]));
        let store = must(SqliteScheduleStore::open(&db_path));
        must(store.migrate());
        assert_eq!(must(store.get_schedule(1).map_err(Into::into)), None);

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn stable_embed_api_host_path_stays_operational() {
        let (db_path, db) = temp_db("embed-host");
        seed_reference_data(&db);

        must(run_with_db(
            &db_path,
            Command::Schedule {
                command: Box::new(ScheduleCommand::Create(ScheduleCreateArgs {
                    fields: ScheduleFieldArgs {
                        date: Some("2024-03-05".to_string()),
                        shift_number: Some(2),
                        slot_number: Some(1),
                        part_id: Some(1),
                        operation_id: Some(1),
                        machine_id: Some(7),
                        quantity_scheduled: Some(30),
                        sub_batch_id: Some("BATCH_A".to_string()),
                        ..ScheduleFieldArgs::default()
                    },
                })),
            },
        ));

        let mut store = must(SqliteScheduleStore::open(&db_path));
        must(store.migrate());
        must(run_command(
            Command::Conflicts {
                command: Box::new(ConflictsCommand::ByMachine(MachineQueryArgs {
                    machine_id: 7,
                    date: Some("2024-03-05".to_string()),
                    json: true,
                })),
            },
            &mut store,
        ));

        let refused = run_command(
            Command::Machine {
                command: Box::new(MachineCommand::Delete(MachineIdArgs { machine_id: 7 })),
            },
            &mut store,
        );
        let err = match refused {
            Ok(()) => panic!("expected machine delete to be refused"),
            Err(err) => err,
        };
        assert!(matches!(
            err.downcast_ref::<ScheduleError>(),
            Some(ScheduleError::Referenced { .. })
        ));

        let _ = fs::remove_file(&db_path);
    }
}
