use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;
use tracing::{debug, info, warn};

/// Calendar dates travel as `YYYY-MM-DD` everywhere (CLI flags, JSON, SQLite).
const CALENDAR_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Upper bound inherited from the workshop database column width.
pub const SUB_BATCH_ID_MAX_LEN: usize = 50;

pub const SHIFTS_PER_DAY: u8 = 2;
pub const SLOTS_PER_SHIFT: u8 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    Machine,
    Part,
    Operation,
    Schedule,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Machine => "machine",
            Self::Part => "part",
            Self::Operation => "operation",
            Self::Schedule => "schedule",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ScheduleError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },
    #[error("{entity} {id} is still referenced by production schedules")]
    Referenced { entity: EntityKind, id: i64 },
    #[error("storage error: {0}")]
    Storage(String),
}

impl ScheduleError {
    #[must_use]
    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Delayed,
}

impl ScheduleStatus {
    pub const ALL: [Self; 4] = [
        Self::Planned,
        Self::InProgress,
        Self::Completed,
        Self::Delayed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Delayed => "delayed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "planned" => Some(Self::Planned),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "delayed" => Some(Self::Delayed),
            _ => None,
        }
    }

    /// Parses a raw status label, accepting only the fixed set.
    ///
    /// Any member may follow any other; there is no transition guard.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Validation`] for labels outside the set.
    pub fn from_input(value: &str) -> Result<Self, ScheduleError> {
        Self::parse(value.trim()).ok_or_else(|| {
            let allowed = Self::ALL
                .iter()
                .map(|status| status.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            ScheduleError::Validation(format!(
                "Status must be one of: {allowed} (got '{value}')"
            ))
        })
    }
}

impl Display for ScheduleStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
///
/// # Errors
/// Returns [`ScheduleError::Validation`] when the input is malformed or names
/// a day that does not exist.
pub fn parse_calendar_date(value: &str) -> Result<Date, ScheduleError> {
    Date::parse(value.trim(), CALENDAR_DATE_FORMAT).map_err(|err| {
        ScheduleError::Validation(format!(
            "Invalid date format '{value}'. Use YYYY-MM-DD ({err})"
        ))
    })
}

/// Formats a calendar date as `YYYY-MM-DD`.
///
/// # Errors
/// Returns [`ScheduleError::Validation`] when formatting fails.
pub fn format_calendar_date(value: Date) -> Result<String, ScheduleError> {
    value.format(CALENDAR_DATE_FORMAT).map_err(|err| {
        ScheduleError::Validation(format!("failed to format calendar date: {err}"))
    })
}

/// Serde adapter for [`Date`] fields carried as `YYYY-MM-DD` strings.
pub mod calendar_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    #[allow(clippy::missing_errors_doc, clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = super::format_calendar_date(*value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_calendar_date(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        #[allow(clippy::missing_errors_doc)]
        pub fn serialize<S: Serializer>(
            value: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        #[allow(clippy::missing_errors_doc)]
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.as_deref()
                .map(crate::parse_calendar_date)
                .transpose()
                .map_err(serde::de::Error::custom)
        }
    }
}

/// Validates a shift number against the two-shift day.
///
/// # Errors
/// Returns [`ScheduleError::Validation`] unless the value is 1 or 2.
pub fn validate_shift_number(value: i64) -> Result<u8, ScheduleError> {
    match u8::try_from(value) {
        Ok(shift) if (1..=SHIFTS_PER_DAY).contains(&shift) => Ok(shift),
        _ => Err(ScheduleError::Validation(
            "Shift number must be 1 or 2".to_string(),
        )),
    }
}

/// Validates a slot number against the two-slot shift.
///
/// # Errors
/// Returns [`ScheduleError::Validation`] unless the value is 1 or 2.
pub fn validate_slot_number(value: i64) -> Result<u8, ScheduleError> {
    match u8::try_from(value) {
        Ok(slot) if (1..=SLOTS_PER_SHIFT).contains(&slot) => Ok(slot),
        _ => Err(ScheduleError::Validation(
            "Slot number must be 1 or 2".to_string(),
        )),
    }
}

fn validate_quantity(value: i64) -> Result<i64, ScheduleError> {
    if value <= 0 {
        return Err(ScheduleError::Validation(
            "quantity_scheduled must be positive".to_string(),
        ));
    }
    Ok(value)
}

/// Empty or whitespace-only labels normalize to `None`.
fn normalize_sub_batch_id(value: &str) -> Result<Option<String>, ScheduleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > SUB_BATCH_ID_MAX_LEN {
        return Err(ScheduleError::Validation(format!(
            "sub_batch_id must be at most {SUB_BATCH_ID_MAX_LEN} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// One addressable production slot: machine x day x shift x slot.
///
/// A key names a bucket, not a reservation. Any number of schedule records
/// may share it; two or more is a conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SlotKey {
    pub machine_id: i64,
    #[serde(with = "calendar_date")]
    pub date: Date,
    pub shift_number: u8,
    pub slot_number: u8,
}

impl SlotKey {
    /// Builds a slot key after checking the shift and slot domains.
    ///
    /// Machine existence is a reference-data concern and is checked by the
    /// caller against a [`ReferenceCatalog`].
    ///
    /// # Errors
    /// Returns [`ScheduleError::Validation`] when shift or slot is not 1 or 2.
    pub fn new(
        machine_id: i64,
        date: Date,
        shift_number: i64,
        slot_number: i64,
    ) -> Result<Self, ScheduleError> {
        Ok(Self {
            machine_id,
            date,
            shift_number: validate_shift_number(shift_number)?,
            slot_number: validate_slot_number(slot_number)?,
        })
    }
}

impl Display for SlotKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "machine {} on {} S{}:{}",
            self.machine_id, self.date, self.shift_number, self.slot_number
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Company {
    pub company_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Machine {
    pub machine_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub machine_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Part {
    pub part_id: i64,
    pub company_id: i64,
    pub name: String,
    pub total_operations: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub operation_id: i64,
    pub part_id: i64,
    pub sequence_number: i64,
    /// Minutes.
    pub machining_time: f64,
    /// Minutes.
    pub loading_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleRecord {
    pub schedule_id: i64,
    #[serde(with = "calendar_date")]
    pub date: Date,
    pub shift_number: u8,
    pub slot_number: u8,
    pub part_id: i64,
    pub operation_id: i64,
    pub machine_id: i64,
    pub quantity_scheduled: i64,
    pub sub_batch_id: Option<String>,
    pub status: ScheduleStatus,
}

impl ScheduleRecord {
    #[must_use]
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            machine_id: self.machine_id,
            date: self.date,
            shift_number: self.shift_number,
            slot_number: self.slot_number,
        }
    }

    #[must_use]
    pub fn occupant(&self) -> SlotOccupant {
        SlotOccupant {
            schedule_id: self.schedule_id,
            part_id: self.part_id,
            operation_id: self.operation_id,
            quantity_scheduled: self.quantity_scheduled,
            sub_batch_id: self.sub_batch_id.clone(),
            status: self.status,
            slot: self.slot_key(),
        }
    }
}

/// A validated schedule ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub slot: SlotKey,
    pub part_id: i64,
    pub operation_id: i64,
    pub quantity_scheduled: i64,
    pub sub_batch_id: Option<String>,
    pub status: ScheduleStatus,
}

/// A validated partial update. `None` leaves the field unchanged.
///
/// `sub_batch_id: Some(None)` clears the label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulePatch {
    pub date: Option<Date>,
    pub shift_number: Option<u8>,
    pub slot_number: Option<u8>,
    pub part_id: Option<i64>,
    pub operation_id: Option<i64>,
    pub machine_id: Option<i64>,
    pub quantity_scheduled: Option<i64>,
    pub sub_batch_id: Option<Option<String>>,
    pub status: Option<ScheduleStatus>,
}

impl SchedulePatch {
    #[must_use]
    pub fn status_only(status: ScheduleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, record: &mut ScheduleRecord) {
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(shift_number) = self.shift_number {
            record.shift_number = shift_number;
        }
        if let Some(slot_number) = self.slot_number {
            record.slot_number = slot_number;
        }
        if let Some(part_id) = self.part_id {
            record.part_id = part_id;
        }
        if let Some(operation_id) = self.operation_id {
            record.operation_id = operation_id;
        }
        if let Some(machine_id) = self.machine_id {
            record.machine_id = machine_id;
        }
        if let Some(quantity) = self.quantity_scheduled {
            record.quantity_scheduled = quantity;
        }
        if let Some(sub_batch_id) = &self.sub_batch_id {
            record.sub_batch_id.clone_from(sub_batch_id);
        }
        if let Some(status) = self.status {
            record.status = status;
        }
    }
}

/// Raw create payload. Every field is optional so that missing fields are
/// reported together instead of failing on the first one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CreateScheduleRequest {
    pub date: Option<String>,
    pub shift_number: Option<i64>,
    pub slot_number: Option<i64>,
    pub part_id: Option<i64>,
    pub operation_id: Option<i64>,
    pub machine_id: Option<i64>,
    pub quantity_scheduled: Option<i64>,
    pub sub_batch_id: Option<String>,
    pub status: Option<String>,
}

impl CreateScheduleRequest {
    /// Checks required fields, value domains and status membership.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Validation`] describing the first failing
    /// rule; missing fields are listed together.
    pub fn validate(&self) -> Result<NewSchedule, ScheduleError> {
        let (
            Some(date),
            Some(shift_number),
            Some(slot_number),
            Some(part_id),
            Some(operation_id),
            Some(machine_id),
            Some(quantity_scheduled),
        ) = (
            self.date.as_deref(),
            self.shift_number,
            self.slot_number,
            self.part_id,
            self.operation_id,
            self.machine_id,
            self.quantity_scheduled,
        )
        else {
            return Err(missing_fields_error(&[
                ("date", self.date.is_none()),
                ("shift_number", self.shift_number.is_none()),
                ("slot_number", self.slot_number.is_none()),
                ("part_id", self.part_id.is_none()),
                ("operation_id", self.operation_id.is_none()),
                ("machine_id", self.machine_id.is_none()),
                ("quantity_scheduled", self.quantity_scheduled.is_none()),
            ]));
        };

        let date = parse_calendar_date(date)?;
        let slot = SlotKey::new(machine_id, date, shift_number, slot_number)?;
        let status = match self.status.as_deref() {
            Some(raw) => ScheduleStatus::from_input(raw)?,
            None => ScheduleStatus::default(),
        };
        let sub_batch_id = match self.sub_batch_id.as_deref() {
            Some(raw) => normalize_sub_batch_id(raw)?,
            None => None,
        };

        Ok(NewSchedule {
            slot,
            part_id,
            operation_id,
            quantity_scheduled: validate_quantity(quantity_scheduled)?,
            sub_batch_id,
            status,
        })
    }

    /// Decodes a create payload from JSON.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Validation`] when the JSON does not have the
    /// expected shape.
    pub fn from_json(value: &Value) -> Result<Self, ScheduleError> {
        serde_json::from_value(value.clone()).map_err(|err| {
            ScheduleError::Validation(format!("invalid schedule payload: {err}"))
        })
    }
}

/// Raw update payload; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpdateScheduleRequest {
    pub date: Option<String>,
    pub shift_number: Option<i64>,
    pub slot_number: Option<i64>,
    pub part_id: Option<i64>,
    pub operation_id: Option<i64>,
    pub machine_id: Option<i64>,
    pub quantity_scheduled: Option<i64>,
    /// An empty label clears the sub-batch.
    pub sub_batch_id: Option<String>,
    pub status: Option<String>,
}

impl UpdateScheduleRequest {
    /// Validates every provided field exactly as on create.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Validation`] for the first invalid field.
    pub fn validate(&self) -> Result<SchedulePatch, ScheduleError> {
        Ok(SchedulePatch {
            date: self.date.as_deref().map(parse_calendar_date).transpose()?,
            shift_number: self.shift_number.map(validate_shift_number).transpose()?,
            slot_number: self.slot_number.map(validate_slot_number).transpose()?,
            part_id: self.part_id,
            operation_id: self.operation_id,
            machine_id: self.machine_id,
            quantity_scheduled: self.quantity_scheduled.map(validate_quantity).transpose()?,
            sub_batch_id: self
                .sub_batch_id
                .as_deref()
                .map(normalize_sub_batch_id)
                .transpose()?,
            status: self
                .status
                .as_deref()
                .map(ScheduleStatus::from_input)
                .transpose()?,
        })
    }

    /// Decodes an update payload from JSON.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Validation`] when the JSON does not have the
    /// expected shape.
    pub fn from_json(value: &Value) -> Result<Self, ScheduleError> {
        serde_json::from_value(value.clone()).map_err(|err| {
            ScheduleError::Validation(format!("invalid schedule update payload: {err}"))
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CheckSlotRequest {
    pub machine_id: Option<i64>,
    pub date: Option<String>,
    pub shift_number: Option<i64>,
    pub slot_number: Option<i64>,
    pub exclude_id: Option<i64>,
}

impl CheckSlotRequest {
    /// # Errors
    /// Returns [`ScheduleError::Validation`] for missing fields, malformed
    /// dates, or shift/slot outside 1..=2.
    pub fn validate(&self) -> Result<SlotKey, ScheduleError> {
        let (Some(machine_id), Some(date), Some(shift_number), Some(slot_number)) = (
            self.machine_id,
            self.date.as_deref(),
            self.shift_number,
            self.slot_number,
        ) else {
            return Err(missing_fields_error(&[
                ("machine_id", self.machine_id.is_none()),
                ("date", self.date.is_none()),
                ("shift_number", self.shift_number.is_none()),
                ("slot_number", self.slot_number.is_none()),
            ]));
        };

        SlotKey::new(
            machine_id,
            parse_calendar_date(date)?,
            shift_number,
            slot_number,
        )
    }
}

fn missing_fields_error(fields: &[(&str, bool)]) -> ScheduleError {
    let missing = fields
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>();
    ScheduleError::Validation(format!("Missing required fields: {}", missing.join(", ")))
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleFilter {
    #[serde(default, with = "calendar_date::option")]
    pub date: Option<Date>,
    pub machine_id: Option<i64>,
    pub part_id: Option<i64>,
}

impl ScheduleFilter {
    #[must_use]
    pub fn matches(&self, record: &ScheduleRecord) -> bool {
        self.date.map_or(true, |date| record.date == date)
            && self
                .machine_id
                .map_or(true, |machine_id| record.machine_id == machine_id)
            && self.part_id.map_or(true, |part_id| record.part_id == part_id)
    }
}

/// Durable collection of schedule records.
///
/// Nothing here prevents two records from sharing a slot key; conflicts are
/// detected on read, never rejected on write.
pub trait ScheduleStore {
    /// Persists a new record under a freshly assigned id.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Storage`] when the backend write fails.
    fn insert_schedule(&mut self, schedule: &NewSchedule) -> Result<ScheduleRecord, ScheduleError>;

    /// # Errors
    /// Returns [`ScheduleError::Storage`] when the backend read fails.
    fn get_schedule(&self, schedule_id: i64) -> Result<Option<ScheduleRecord>, ScheduleError>;

    /// Applies only the provided fields of `patch`.
    ///
    /// # Errors
    /// Returns [`ScheduleError::NotFound`] when the id does not exist.
    fn update_schedule(
        &mut self,
        schedule_id: i64,
        patch: &SchedulePatch,
    ) -> Result<ScheduleRecord, ScheduleError>;

    /// # Errors
    /// Returns [`ScheduleError::NotFound`] when the id does not exist.
    fn delete_schedule(&mut self, schedule_id: i64) -> Result<(), ScheduleError>;

    /// Returns records matching every provided filter field.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Storage`] when the backend read fails.
    fn find_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduleRecord>, ScheduleError>;

    /// Returns every record at `slot`, minus `exclude_id` when given.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Storage`] when the backend read fails.
    fn find_by_slot_key(
        &self,
        slot: &SlotKey,
        exclude_id: Option<i64>,
    ) -> Result<Vec<ScheduleRecord>, ScheduleError>;

    /// # Errors
    /// Returns [`ScheduleError::Storage`] when the backend read fails.
    fn find_by_machine(
        &self,
        machine_id: i64,
        date: Option<Date>,
    ) -> Result<Vec<ScheduleRecord>, ScheduleError> {
        self.find_schedules(&ScheduleFilter {
            date,
            machine_id: Some(machine_id),
            part_id: None,
        })
    }

    /// # Errors
    /// Returns [`ScheduleError::Storage`] when the backend read fails.
    fn find_by_date(&self, date: Date) -> Result<Vec<ScheduleRecord>, ScheduleError> {
        self.find_schedules(&ScheduleFilter {
            date: Some(date),
            machine_id: None,
            part_id: None,
        })
    }
}

/// Existence checks against reference data owned outside the scheduler.
pub trait ReferenceCatalog {
    #[allow(clippy::missing_errors_doc)]
    fn machine_exists(&self, machine_id: i64) -> Result<bool, ScheduleError>;

    #[allow(clippy::missing_errors_doc)]
    fn part_exists(&self, part_id: i64) -> Result<bool, ScheduleError>;

    #[allow(clippy::missing_errors_doc)]
    fn operation_exists(&self, operation_id: i64) -> Result<bool, ScheduleError>;
}

/// Summary of one record occupying a slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotOccupant {
    pub schedule_id: i64,
    pub part_id: i64,
    pub operation_id: i64,
    pub quantity_scheduled: i64,
    pub sub_batch_id: Option<String>,
    pub status: ScheduleStatus,
    #[serde(flatten)]
    pub slot: SlotKey,
}

/// A slot key together with its two or more current occupants.
/// Derived on demand, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictGroup {
    pub slot_info: SlotKey,
    pub conflicting_schedules: Vec<SlotOccupant>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConflictScope {
    Date(Date),
    Machine {
        machine_id: i64,
        date: Option<Date>,
    },
}

/// Point check: the occupants of `slot` when there are at least two of them.
///
/// A lone occupant never conflicts with itself, so zero or one record yields
/// an empty list.
///
/// # Errors
/// Propagates store read failures.
pub fn conflicts_at<S>(
    store: &S,
    slot: &SlotKey,
    exclude_id: Option<i64>,
) -> Result<Vec<ScheduleRecord>, ScheduleError>
where
    S: ScheduleStore + ?Sized,
{
    let occupants = store.find_by_slot_key(slot, exclude_id)?;
    if occupants.len() < 2 {
        return Ok(Vec::new());
    }
    Ok(occupants)
}

/// Scoped scan: every slot key in `scope` held by two or more records.
///
/// # Errors
/// Propagates store read failures.
pub fn conflicts_in_scope<S>(store: &S, scope: ConflictScope) -> Result<Vec<ConflictGroup>, ScheduleError>
where
    S: ScheduleStore + ?Sized,
{
    let records = match scope {
        ConflictScope::Date(date) => store.find_by_date(date)?,
        ConflictScope::Machine { machine_id, date } => store.find_by_machine(machine_id, date)?,
    };

    let groups = group_conflicts(&records);
    debug!(
        event = "conflict_scan",
        scope = ?scope,
        scanned = records.len(),
        groups = groups.len()
    );
    Ok(groups)
}

/// Buckets records by slot key in one pass and keeps buckets with two or
/// more occupants. Groups come out ordered by slot key, occupants by id.
///
/// Grouping on the full key is equivalent to grouping on the free components
/// of a scope, since the fixed component is identical for every record.
#[must_use]
pub fn group_conflicts(records: &[ScheduleRecord]) -> Vec<ConflictGroup> {
    let mut buckets: BTreeMap<SlotKey, Vec<&ScheduleRecord>> = BTreeMap::new();
    for record in records {
        buckets.entry(record.slot_key()).or_default().push(record);
    }

    buckets
        .into_iter()
        .filter(|(_, occupants)| occupants.len() >= 2)
        .map(|(slot_info, mut occupants)| {
            occupants.sort_by_key(|record| record.schedule_id);
            ConflictGroup {
                slot_info,
                conflicting_schedules: occupants
                    .into_iter()
                    .map(ScheduleRecord::occupant)
                    .collect(),
            }
        })
        .collect()
}

/// Warning payload attached to a successful write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictReport {
    pub conflicts_detected: bool,
    pub message: String,
    pub conflicts: Vec<SlotOccupant>,
}

impl ConflictReport {
    #[must_use]
    pub fn for_slot(slot: &SlotKey, others: Vec<SlotOccupant>) -> Self {
        if others.is_empty() {
            return Self {
                conflicts_detected: false,
                message: "No scheduling conflicts detected".to_string(),
                conflicts: others,
            };
        }

        Self {
            conflicts_detected: true,
            message: format!(
                "Double-booking on {slot}: {} other schedule(s) occupy this slot",
                others.len()
            ),
            conflicts: others,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleWithConflicts {
    #[serde(flatten)]
    pub schedule: ScheduleRecord,
    pub warnings: ConflictReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateConflictReport {
    #[serde(with = "calendar_date")]
    pub date: Date,
    pub conflicts_count: usize,
    pub conflicts: Vec<ConflictGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineConflictReport {
    pub machine_id: i64,
    #[serde(
        default,
        with = "calendar_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<Date>,
    pub conflicts_count: usize,
    pub conflicts: Vec<ConflictGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotCheck {
    pub slot_info: SlotKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_id: Option<i64>,
    pub has_conflicts: bool,
    pub conflicts_count: usize,
    pub occupant_count: usize,
    pub available: bool,
    pub conflicts: Vec<SlotOccupant>,
    pub message: String,
}

/// Create/update orchestration over an injected store.
///
/// Writes are never blocked by conflicts; the conflict report rides along
/// with the successful result.
pub struct ScheduleService<'s, S> {
    store: &'s mut S,
}

impl<'s, S> ScheduleService<'s, S>
where
    S: ScheduleStore + ReferenceCatalog,
{
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &*self.store
    }

    /// Checks references, validates, inserts unconditionally, then reports
    /// the other occupants of the new record's slot.
    ///
    /// # Errors
    /// Returns [`ScheduleError::NotFound`] for an unknown part, operation or
    /// machine (checked first) and [`ScheduleError::Validation`] for
    /// malformed input.
    pub fn create_schedule(
        &mut self,
        request: &CreateScheduleRequest,
    ) -> Result<ScheduleWithConflicts, ScheduleError> {
        self.ensure_references(request.part_id, request.operation_id, request.machine_id)?;
        let schedule = request.validate()?;

        let record = self.store.insert_schedule(&schedule)?;
        let warnings = self.write_report(&record)?;

        info!(
            event = "schedule_created",
            schedule_id = record.schedule_id,
            slot = %record.slot_key(),
            conflicts = warnings.conflicts.len()
        );
        Ok(ScheduleWithConflicts {
            schedule: record,
            warnings,
        })
    }

    /// Applies a partial update and reports the other occupants of the
    /// record's (possibly new) slot.
    ///
    /// # Errors
    /// Returns [`ScheduleError::NotFound`] for an unknown schedule or newly
    /// referenced entity and [`ScheduleError::Validation`] for bad fields.
    pub fn update_schedule(
        &mut self,
        schedule_id: i64,
        request: &UpdateScheduleRequest,
    ) -> Result<ScheduleWithConflicts, ScheduleError> {
        let existing = self.get_schedule(schedule_id)?;
        let patch = request.validate()?;
        self.ensure_references(patch.part_id, patch.operation_id, patch.machine_id)?;

        let record = self.store.update_schedule(schedule_id, &patch)?;
        let warnings = self.write_report(&record)?;

        info!(
            event = "schedule_updated",
            schedule_id,
            from = %existing.slot_key(),
            to = %record.slot_key(),
            conflicts = warnings.conflicts.len()
        );
        Ok(ScheduleWithConflicts {
            schedule: record,
            warnings,
        })
    }

    /// Writes a new status label. Status never moves a record between slot
    /// keys, so no conflict re-evaluation happens here.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Validation`] for labels outside the fixed set
    /// and [`ScheduleError::NotFound`] for an unknown schedule.
    pub fn update_status(
        &mut self,
        schedule_id: i64,
        status: &str,
    ) -> Result<ScheduleRecord, ScheduleError> {
        let status = ScheduleStatus::from_input(status)?;
        let record = self
            .store
            .update_schedule(schedule_id, &SchedulePatch::status_only(status))?;

        info!(event = "schedule_status", schedule_id, status = %status);
        Ok(record)
    }

    /// # Errors
    /// Returns [`ScheduleError::NotFound`] for an unknown schedule.
    pub fn delete_schedule(&mut self, schedule_id: i64) -> Result<(), ScheduleError> {
        self.store.delete_schedule(schedule_id)?;
        info!(event = "schedule_deleted", schedule_id);
        Ok(())
    }

    /// # Errors
    /// Returns [`ScheduleError::NotFound`] for an unknown schedule.
    pub fn get_schedule(&self, schedule_id: i64) -> Result<ScheduleRecord, ScheduleError> {
        self.store
            .get_schedule(schedule_id)?
            .ok_or_else(|| ScheduleError::not_found(EntityKind::Schedule, schedule_id))
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn list_schedules(
        &self,
        filter: &ScheduleFilter,
    ) -> Result<Vec<ScheduleRecord>, ScheduleError> {
        self.store.find_schedules(filter)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn schedules_by_date(&self, date: Date) -> Result<Vec<ScheduleRecord>, ScheduleError> {
        self.store.find_by_date(date)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn schedules_by_machine(
        &self,
        machine_id: i64,
        date: Option<Date>,
    ) -> Result<Vec<ScheduleRecord>, ScheduleError> {
        self.store.find_by_machine(machine_id, date)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn schedules_by_part(&self, part_id: i64) -> Result<Vec<ScheduleRecord>, ScheduleError> {
        self.store.find_schedules(&ScheduleFilter {
            part_id: Some(part_id),
            ..ScheduleFilter::default()
        })
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn conflicts_by_date(&self, date: Date) -> Result<DateConflictReport, ScheduleError> {
        let conflicts = conflicts_in_scope(&*self.store, ConflictScope::Date(date))?;
        Ok(DateConflictReport {
            date,
            conflicts_count: conflicts.len(),
            conflicts,
        })
    }

    /// # Errors
    /// Returns [`ScheduleError::NotFound`] when the machine does not exist.
    pub fn conflicts_by_machine(
        &self,
        machine_id: i64,
        date: Option<Date>,
    ) -> Result<MachineConflictReport, ScheduleError> {
        if !self.store.machine_exists(machine_id)? {
            return Err(ScheduleError::not_found(EntityKind::Machine, machine_id));
        }

        let conflicts =
            conflicts_in_scope(&*self.store, ConflictScope::Machine { machine_id, date })?;
        Ok(MachineConflictReport {
            machine_id,
            date,
            conflicts_count: conflicts.len(),
            conflicts,
        })
    }

    /// Read-only point check of one slot.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Validation`] for a malformed request and
    /// [`ScheduleError::NotFound`] when the machine does not exist.
    pub fn check_slot(&self, request: &CheckSlotRequest) -> Result<SlotCheck, ScheduleError> {
        let slot = request.validate()?;
        if !self.store.machine_exists(slot.machine_id)? {
            return Err(ScheduleError::not_found(EntityKind::Machine, slot.machine_id));
        }

        let occupant_count = self
            .store
            .find_by_slot_key(&slot, request.exclude_id)?
            .len();
        let conflicts = conflicts_at(&*self.store, &slot, request.exclude_id)?
            .iter()
            .map(ScheduleRecord::occupant)
            .collect::<Vec<_>>();

        let message = match (conflicts.len(), occupant_count) {
            (0, 0) => format!("Slot {slot} is available"),
            (0, _) => format!("Slot {slot} is occupied by a single schedule"),
            (count, _) => format!("Slot {slot} is double-booked by {count} schedules"),
        };

        Ok(SlotCheck {
            slot_info: slot,
            exclude_id: request.exclude_id,
            has_conflicts: !conflicts.is_empty(),
            conflicts_count: conflicts.len(),
            occupant_count,
            available: occupant_count == 0,
            conflicts,
            message,
        })
    }

    fn ensure_references(
        &self,
        part_id: Option<i64>,
        operation_id: Option<i64>,
        machine_id: Option<i64>,
    ) -> Result<(), ScheduleError> {
        if let Some(part_id) = part_id {
            if !self.store.part_exists(part_id)? {
                return Err(ScheduleError::not_found(EntityKind::Part, part_id));
            }
        }
        if let Some(operation_id) = operation_id {
            if !self.store.operation_exists(operation_id)? {
                return Err(ScheduleError::not_found(EntityKind::Operation, operation_id));
            }
        }
        if let Some(machine_id) = machine_id {
            if !self.store.machine_exists(machine_id)? {
                return Err(ScheduleError::not_found(EntityKind::Machine, machine_id));
            }
        }
        Ok(())
    }

    /// Re-queries the slot after the write so the record counts as an
    /// occupant, then reports everyone else.
    fn write_report(&self, record: &ScheduleRecord) -> Result<ConflictReport, ScheduleError> {
        let slot = record.slot_key();
        let others = conflicts_at(&*self.store, &slot, None)?
            .iter()
            .filter(|occupant| occupant.schedule_id != record.schedule_id)
            .map(ScheduleRecord::occupant)
            .collect::<Vec<_>>();

        if !others.is_empty() {
            warn!(
                event = "slot_conflict",
                schedule_id = record.schedule_id,
                machine_id = slot.machine_id,
                slot = %slot,
                occupants = others.len() + 1
            );
        }
        Ok(ConflictReport::for_slot(&slot, others))
    }
}
