#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use shopfloor_schedule_core::{
    format_calendar_date, parse_calendar_date, Company, EntityKind, Machine, NewSchedule,
    Operation, Part, ReferenceCatalog, ScheduleError, ScheduleFilter, SchedulePatch,
    ScheduleRecord, ScheduleStatus, ScheduleStore, SlotKey,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const SCHEDULE_MIGRATION_VERSION: i64 = 1;

const SCHEMA_SCHEDULE_V1: &str = r"
CREATE TABLE IF NOT EXISTS companies (
  company_id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL CHECK (length(trim(name)) > 0)
);

CREATE TABLE IF NOT EXISTS machines (
  machine_id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL CHECK (length(trim(name)) > 0),
  type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS parts (
  part_id INTEGER PRIMARY KEY AUTOINCREMENT,
  company_id INTEGER NOT NULL,
  name TEXT NOT NULL CHECK (length(trim(name)) > 0),
  total_operations INTEGER NOT NULL CHECK (total_operations >= 0),
  FOREIGN KEY (company_id) REFERENCES companies(company_id)
);

CREATE TABLE IF NOT EXISTS operations (
  operation_id INTEGER PRIMARY KEY AUTOINCREMENT,
  part_id INTEGER NOT NULL,
  sequence_number INTEGER NOT NULL CHECK (sequence_number >= 1),
  machining_time REAL NOT NULL CHECK (machining_time >= 0.0),
  loading_time REAL NOT NULL CHECK (loading_time >= 0.0),
  FOREIGN KEY (part_id) REFERENCES parts(part_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS operation_machines (
  operation_id INTEGER NOT NULL,
  machine_id INTEGER NOT NULL,
  PRIMARY KEY (operation_id, machine_id),
  FOREIGN KEY (operation_id) REFERENCES operations(operation_id) ON DELETE CASCADE,
  FOREIGN KEY (machine_id) REFERENCES machines(machine_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS production_schedules (
  schedule_id INTEGER PRIMARY KEY AUTOINCREMENT,
  date TEXT NOT NULL,
  shift_number INTEGER NOT NULL CHECK (shift_number IN (1, 2)),
  slot_number INTEGER NOT NULL CHECK (slot_number IN (1, 2)),
  part_id INTEGER NOT NULL,
  operation_id INTEGER NOT NULL,
  machine_id INTEGER NOT NULL,
  quantity_scheduled INTEGER NOT NULL CHECK (quantity_scheduled > 0),
  sub_batch_id TEXT CHECK (sub_batch_id IS NULL OR length(sub_batch_id) <= 50),
  status TEXT NOT NULL DEFAULT 'planned' CHECK (
    status IN ('planned', 'in_progress', 'completed', 'delayed')
  ),
  FOREIGN KEY (part_id) REFERENCES parts(part_id),
  FOREIGN KEY (operation_id) REFERENCES operations(operation_id),
  FOREIGN KEY (machine_id) REFERENCES machines(machine_id)
);

CREATE INDEX IF NOT EXISTS idx_schedule_date_shift_slot
  ON production_schedules(date, shift_number, slot_number);
CREATE INDEX IF NOT EXISTS idx_schedule_part_operation
  ON production_schedules(part_id, operation_id);
CREATE INDEX IF NOT EXISTS idx_schedule_machine_date
  ON production_schedules(machine_id, date);
";

const SCHEDULE_COLUMNS: &str = "schedule_id, date, shift_number, slot_number, part_id, \
     operation_id, machine_id, quantity_scheduled, sub_batch_id, status";

/// Schedule records plus the reference data they point at, in one SQLite file.
///
/// The table carries no uniqueness constraint over the slot key: double
/// bookings are stored and surfaced by the conflict queries.
pub struct SqliteScheduleStore {
    conn: Connection,
}

impl SqliteScheduleStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                );",
            )
            .context("failed to ensure schema_migrations exists")?;

        self.conn
            .execute_batch(SCHEMA_SCHEDULE_V1)
            .context("failed to apply schedule schema")?;

        let now = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("failed to format migration timestamp")?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
                params![SCHEDULE_MIGRATION_VERSION, now],
            )
            .context("failed to register schedule schema migration")?;

        Ok(())
    }

    pub fn schema_version(&self) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .context("failed to read schema_migrations")
    }

    pub fn add_company(&self, company_id: Option<i64>, name: &str) -> Result<Company> {
        let name = required_name("company", name)?;
        self.conn
            .execute(
                "INSERT INTO companies(company_id, name) VALUES (?1, ?2)",
                params![company_id, name],
            )
            .context("failed to insert company")?;

        Ok(Company {
            company_id: self.conn.last_insert_rowid(),
            name,
        })
    }

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let mut stmt = self
            .conn
            .prepare("SELECT company_id, name FROM companies ORDER BY company_id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Company {
                company_id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        collect_rows(rows)
    }

    pub fn add_machine(
        &self,
        machine_id: Option<i64>,
        name: &str,
        machine_type: &str,
    ) -> Result<Machine> {
        let name = required_name("machine", name)?;
        self.conn
            .execute(
                "INSERT INTO machines(machine_id, name, type) VALUES (?1, ?2, ?3)",
                params![machine_id, name, machine_type.trim()],
            )
            .context("failed to insert machine")?;

        Ok(Machine {
            machine_id: self.conn.last_insert_rowid(),
            name,
            machine_type: machine_type.trim().to_string(),
        })
    }

    pub fn get_machine(&self, machine_id: i64) -> Result<Option<Machine>> {
        self.conn
            .query_row(
                "SELECT machine_id, name, type FROM machines WHERE machine_id = ?1",
                params![machine_id],
                parse_machine_row,
            )
            .optional()
            .context("failed to query machine")
    }

    pub fn list_machines(&self) -> Result<Vec<Machine>> {
        let mut stmt = self
            .conn
            .prepare("SELECT machine_id, name, type FROM machines ORDER BY machine_id ASC")?;
        let rows = stmt.query_map([], parse_machine_row)?;

        collect_rows(rows)
    }

    /// Refused while any schedule still points at the machine. Eligibility
    /// links go with it.
    pub fn delete_machine(&self, machine_id: i64) -> Result<()> {
        if self.get_machine(machine_id)?.is_none() {
            return Err(ScheduleError::not_found(EntityKind::Machine, machine_id).into());
        }
        let referencing = self.count_schedules_where("machine_id = ?1", machine_id)?;
        if referencing > 0 {
            return Err(ScheduleError::Referenced {
                entity: EntityKind::Machine,
                id: machine_id,
            }
            .into());
        }

        self.conn
            .execute(
                "DELETE FROM machines WHERE machine_id = ?1",
                params![machine_id],
            )
            .context("failed to delete machine")?;
        Ok(())
    }

    pub fn add_part(
        &self,
        part_id: Option<i64>,
        company_id: i64,
        name: &str,
        total_operations: i64,
    ) -> Result<Part> {
        let name = required_name("part", name)?;
        if total_operations < 0 {
            return Err(ScheduleError::Validation(
                "total_operations must not be negative".to_string(),
            )
            .into());
        }
        if !self.row_exists("companies", "company_id", company_id)? {
            return Err(ScheduleError::not_found(EntityKind::Company, company_id).into());
        }

        self.conn
            .execute(
                "INSERT INTO parts(part_id, company_id, name, total_operations)
                 VALUES (?1, ?2, ?3, ?4)",
                params![part_id, company_id, name, total_operations],
            )
            .context("failed to insert part")?;

        Ok(Part {
            part_id: self.conn.last_insert_rowid(),
            company_id,
            name,
            total_operations,
        })
    }

    pub fn list_parts(&self) -> Result<Vec<Part>> {
        let mut stmt = self.conn.prepare(
            "SELECT part_id, company_id, name, total_operations
             FROM parts
             ORDER BY part_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Part {
                part_id: row.get(0)?,
                company_id: row.get(1)?,
                name: row.get(2)?,
                total_operations: row.get(3)?,
            })
        })?;

        collect_rows(rows)
    }

    /// Refused while schedules reference the part or any of its operations.
    /// The part's operations cascade away with it.
    pub fn delete_part(&self, part_id: i64) -> Result<()> {
        if !self.row_exists("parts", "part_id", part_id)? {
            return Err(ScheduleError::not_found(EntityKind::Part, part_id).into());
        }
        let referencing = self.count_schedules_where(
            "part_id = ?1
             OR operation_id IN (SELECT operation_id FROM operations WHERE part_id = ?1)",
            part_id,
        )?;
        if referencing > 0 {
            return Err(ScheduleError::Referenced {
                entity: EntityKind::Part,
                id: part_id,
            }
            .into());
        }

        self.conn
            .execute("DELETE FROM parts WHERE part_id = ?1", params![part_id])
            .context("failed to delete part")?;
        Ok(())
    }

    pub fn add_operation(
        &self,
        operation_id: Option<i64>,
        part_id: i64,
        sequence_number: i64,
        machining_time: f64,
        loading_time: f64,
    ) -> Result<Operation> {
        if sequence_number < 1 {
            return Err(ScheduleError::Validation(
                "sequence_number must be at least 1".to_string(),
            )
            .into());
        }
        if machining_time < 0.0 || loading_time < 0.0 {
            return Err(ScheduleError::Validation(
                "machining_time and loading_time must not be negative".to_string(),
            )
            .into());
        }
        if !self.row_exists("parts", "part_id", part_id)? {
            return Err(ScheduleError::not_found(EntityKind::Part, part_id).into());
        }

        self.conn
            .execute(
                "INSERT INTO operations(operation_id, part_id, sequence_number, machining_time, loading_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    operation_id,
                    part_id,
                    sequence_number,
                    machining_time,
                    loading_time
                ],
            )
            .context("failed to insert operation")?;

        Ok(Operation {
            operation_id: self.conn.last_insert_rowid(),
            part_id,
            sequence_number,
            machining_time,
            loading_time,
        })
    }

    pub fn list_operations(&self, part_id: Option<i64>) -> Result<Vec<Operation>> {
        let mut stmt = self.conn.prepare(
            "SELECT operation_id, part_id, sequence_number, machining_time, loading_time
             FROM operations
             WHERE (?1 IS NULL OR part_id = ?1)
             ORDER BY part_id ASC, sequence_number ASC, operation_id ASC",
        )?;
        let rows = stmt.query_map(params![part_id], |row| {
            Ok(Operation {
                operation_id: row.get(0)?,
                part_id: row.get(1)?,
                sequence_number: row.get(2)?,
                machining_time: row.get(3)?,
                loading_time: row.get(4)?,
            })
        })?;

        collect_rows(rows)
    }

    pub fn delete_operation(&self, operation_id: i64) -> Result<()> {
        if !self.row_exists("operations", "operation_id", operation_id)? {
            return Err(ScheduleError::not_found(EntityKind::Operation, operation_id).into());
        }
        let referencing = self.count_schedules_where("operation_id = ?1", operation_id)?;
        if referencing > 0 {
            return Err(ScheduleError::Referenced {
                entity: EntityKind::Operation,
                id: operation_id,
            }
            .into());
        }

        self.conn
            .execute(
                "DELETE FROM operations WHERE operation_id = ?1",
                params![operation_id],
            )
            .context("failed to delete operation")?;
        Ok(())
    }

    /// Records that `machine_id` can run `operation_id`. Linking twice is a
    /// no-op.
    pub fn link_operation_machine(&self, operation_id: i64, machine_id: i64) -> Result<()> {
        if !self.row_exists("operations", "operation_id", operation_id)? {
            return Err(ScheduleError::not_found(EntityKind::Operation, operation_id).into());
        }
        if self.get_machine(machine_id)?.is_none() {
            return Err(ScheduleError::not_found(EntityKind::Machine, machine_id).into());
        }

        self.conn
            .execute(
                "INSERT OR IGNORE INTO operation_machines(operation_id, machine_id) VALUES (?1, ?2)",
                params![operation_id, machine_id],
            )
            .context("failed to link operation to machine")?;
        Ok(())
    }

    pub fn eligible_machines(&self, operation_id: i64) -> Result<Vec<Machine>> {
        if !self.row_exists("operations", "operation_id", operation_id)? {
            return Err(ScheduleError::not_found(EntityKind::Operation, operation_id).into());
        }

        let mut stmt = self.conn.prepare(
            "SELECT m.machine_id, m.name, m.type
             FROM machines m
             JOIN operation_machines om ON om.machine_id = m.machine_id
             WHERE om.operation_id = ?1
             ORDER BY m.machine_id ASC",
        )?;
        let rows = stmt.query_map(params![operation_id], parse_machine_row)?;

        collect_rows(rows)
    }

    fn row_exists(&self, table: &str, id_column: &str, id: i64) -> Result<bool> {
        let exists = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM {table} WHERE {id_column} = ?1 LIMIT 1"),
                params![id],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("failed to query {table}"))?
            .is_some();

        Ok(exists)
    }

    fn count_schedules_where(&self, predicate: &str, id: i64) -> Result<i64> {
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM production_schedules WHERE {predicate}"),
                params![id],
                |row| row.get(0),
            )
            .context("failed to count referencing schedules")
    }

    fn load_schedule(&self, schedule_id: i64) -> Result<Option<ScheduleRecord>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM production_schedules WHERE schedule_id = ?1"
                ),
                params![schedule_id],
                parse_schedule_row,
            )
            .optional()
            .context("failed to query production schedule")
    }

    fn insert_schedule_row(&self, schedule: &NewSchedule) -> Result<ScheduleRecord> {
        let date = format_calendar_date(schedule.slot.date)?;
        self.conn
            .execute(
                "INSERT INTO production_schedules(
                    date, shift_number, slot_number, part_id, operation_id,
                    machine_id, quantity_scheduled, sub_batch_id, status
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    date,
                    i64::from(schedule.slot.shift_number),
                    i64::from(schedule.slot.slot_number),
                    schedule.part_id,
                    schedule.operation_id,
                    schedule.slot.machine_id,
                    schedule.quantity_scheduled,
                    schedule.sub_batch_id,
                    schedule.status.as_str(),
                ],
            )
            .context("failed to insert production schedule")?;

        let schedule_id = self.conn.last_insert_rowid();
        Ok(ScheduleRecord {
            schedule_id,
            date: schedule.slot.date,
            shift_number: schedule.slot.shift_number,
            slot_number: schedule.slot.slot_number,
            part_id: schedule.part_id,
            operation_id: schedule.operation_id,
            machine_id: schedule.slot.machine_id,
            quantity_scheduled: schedule.quantity_scheduled,
            sub_batch_id: schedule.sub_batch_id.clone(),
            status: schedule.status,
        })
    }

    fn update_schedule_row(
        &mut self,
        schedule_id: i64,
        patch: &SchedulePatch,
    ) -> Result<Option<ScheduleRecord>> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start schedule update transaction")?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM production_schedules WHERE schedule_id = ?1"
                ),
                params![schedule_id],
                parse_schedule_row,
            )
            .optional()
            .context("failed to load production schedule for update")?;
        let Some(mut record) = existing else {
            return Ok(None);
        };

        patch.apply_to(&mut record);
        tx.execute(
            "UPDATE production_schedules
             SET date = ?2, shift_number = ?3, slot_number = ?4, part_id = ?5,
                 operation_id = ?6, machine_id = ?7, quantity_scheduled = ?8,
                 sub_batch_id = ?9, status = ?10
             WHERE schedule_id = ?1",
            params![
                schedule_id,
                format_calendar_date(record.date)?,
                i64::from(record.shift_number),
                i64::from(record.slot_number),
                record.part_id,
                record.operation_id,
                record.machine_id,
                record.quantity_scheduled,
                record.sub_batch_id,
                record.status.as_str(),
            ],
        )
        .context("failed to update production schedule")?;
        tx.commit()
            .context("failed to commit schedule update transaction")?;

        Ok(Some(record))
    }

    fn query_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduleRecord>> {
        let date = filter.date.map(format_calendar_date).transpose()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS}
             FROM production_schedules
             WHERE (?1 IS NULL OR date = ?1)
               AND (?2 IS NULL OR machine_id = ?2)
               AND (?3 IS NULL OR part_id = ?3)
             ORDER BY date ASC, shift_number ASC, slot_number ASC, machine_id ASC, schedule_id ASC"
        ))?;
        let rows = stmt.query_map(
            params![date, filter.machine_id, filter.part_id],
            parse_schedule_row,
        )?;

        collect_rows(rows)
    }

    fn query_slot(&self, slot: &SlotKey, exclude_id: Option<i64>) -> Result<Vec<ScheduleRecord>> {
        let date = format_calendar_date(slot.date)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS}
             FROM production_schedules
             WHERE machine_id = ?1
               AND date = ?2
               AND shift_number = ?3
               AND slot_number = ?4
               AND (?5 IS NULL OR schedule_id <> ?5)
             ORDER BY schedule_id ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                slot.machine_id,
                date,
                i64::from(slot.shift_number),
                i64::from(slot.slot_number),
                exclude_id
            ],
            parse_schedule_row,
        )?;

        collect_rows(rows)
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ScheduleStore for SqliteScheduleStore {
    fn insert_schedule(&mut self, schedule: &NewSchedule) -> Result<ScheduleRecord, ScheduleError> {
        self.insert_schedule_row(schedule).map_err(storage_error)
    }

    fn get_schedule(&self, schedule_id: i64) -> Result<Option<ScheduleRecord>, ScheduleError> {
        self.load_schedule(schedule_id).map_err(storage_error)
    }

    fn update_schedule(
        &mut self,
        schedule_id: i64,
        patch: &SchedulePatch,
    ) -> Result<ScheduleRecord, ScheduleError> {
        self.update_schedule_row(schedule_id, patch)
            .map_err(storage_error)?
            .ok_or_else(|| ScheduleError::not_found(EntityKind::Schedule, schedule_id))
    }

    fn delete_schedule(&mut self, schedule_id: i64) -> Result<(), ScheduleError> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM production_schedules WHERE schedule_id = ?1",
                params![schedule_id],
            )
            .map_err(storage_error)?;
        if deleted == 0 {
            return Err(ScheduleError::not_found(EntityKind::Schedule, schedule_id));
        }
        Ok(())
    }

    fn find_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduleRecord>, ScheduleError> {
        self.query_schedules(filter).map_err(storage_error)
    }

    fn find_by_slot_key(
        &self,
        slot: &SlotKey,
        exclude_id: Option<i64>,
    ) -> Result<Vec<ScheduleRecord>, ScheduleError> {
        self.query_slot(slot, exclude_id).map_err(storage_error)
    }
}

impl ReferenceCatalog for SqliteScheduleStore {
    fn machine_exists(&self, machine_id: i64) -> Result<bool, ScheduleError> {
        self.row_exists("machines", "machine_id", machine_id)
            .map_err(storage_error)
    }

    fn part_exists(&self, part_id: i64) -> Result<bool, ScheduleError> {
        self.row_exists("parts", "part_id", part_id)
            .map_err(storage_error)
    }

    fn operation_exists(&self, operation_id: i64) -> Result<bool, ScheduleError> {
        self.row_exists("operations", "operation_id", operation_id)
            .map_err(storage_error)
    }
}

fn parse_schedule_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRecord> {
    let date_raw: String = row.get(1)?;
    let shift_i64: i64 = row.get(2)?;
    let slot_i64: i64 = row.get(3)?;
    let status_raw: String = row.get(9)?;

    let date = parse_calendar_date(&date_raw).map_err(|err| invalid_column(1, &err.to_string()))?;
    let shift_number = u8::try_from(shift_i64)
        .map_err(|_| invalid_column(2, &format!("invalid shift_number: {shift_i64}")))?;
    let slot_number = u8::try_from(slot_i64)
        .map_err(|_| invalid_column(3, &format!("invalid slot_number: {slot_i64}")))?;
    let status = ScheduleStatus::parse(&status_raw)
        .ok_or_else(|| invalid_column(9, &format!("invalid status: {status_raw}")))?;

    Ok(ScheduleRecord {
        schedule_id: row.get(0)?,
        date,
        shift_number,
        slot_number,
        part_id: row.get(4)?,
        operation_id: row.get(5)?,
        machine_id: row.get(6)?,
        quantity_scheduled: row.get(7)?,
        sub_batch_id: row.get(8)?,
        status,
    })
}

fn parse_machine_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Machine> {
    Ok(Machine {
        machine_id: row.get(0)?,
        name: row.get(1)?,
        machine_type: row.get(2)?,
    })
}

fn invalid_column(index: usize, message: &str) -> rusqlite::Error {
    let value_type = if index == 1 || index == 9 {
        rusqlite::types::Type::Text
    } else {
        rusqlite::types::Type::Integer
    };
    rusqlite::Error::FromSqlConversionFailure(
        index,
        value_type,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.to_string(),
        )),
    )
}

fn required_name(entity: &str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!(ScheduleError::Validation(format!(
            "{entity} name must not be empty"
        ))));
    }
    Ok(trimmed.to_string())
}

fn storage_error(err: impl Into<anyhow::Error>) -> ScheduleError {
    let err = err.into();
    match err.downcast::<ScheduleError>() {
        Ok(schedule_error) => schedule_error,
        Err(other) => ScheduleError::Storage(format!("{other:#}")),
    }
}

fn collect_rows<T>(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}
