//! Synthetic GMP audit trail generator
//!
//! Produces seeded, reproducible audit logs carrying operator names, user IDs
//! and client IPs, for exercising the masking pipeline without real data.

use chrono::{DateTime, TimeDelta, Utc};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trailguard_core::{Cell, Table};

const EQUIPMENT: &[&str] = &[
    "HPLC-01",
    "HPLC-02",
    "GC-05",
    "Balance-03",
    "Bioreactor-100L",
    "Mixer-200L",
    "TabletPress-A",
    "Autoclave-01",
];

const ACTIONS: &[&str] = &[
    "Login",
    "Logout",
    "Start Sequence",
    "Stop Sequence",
    "Abort",
    "Data Save",
    "Parameter Change",
    "Audit Trail Review",
    "Delete File",
];

const DEPARTMENTS: &[&str] = &["QC Lab", "Production", "Warehouse", "IT Security", "QA Assurance"];

const MESSAGES: &[&str] = &[
    "Connection Timeout",
    "Value Out of Spec",
    "Integrity Violation",
    "Disk Full",
    "User Locked",
    "Authorized Access",
];

const SEVERITIES: &[&str] = &["INFO", "WARN", "ERROR"];

const GIVEN_NAMES: &[&str] = &[
    "Alice", "Brandon", "Carol", "David", "Emily", "George", "Hannah", "Jason", "Karen", "Laura",
    "Michael", "Nancy", "Patrick", "Rachel", "Samuel", "Teresa",
];

const SURNAMES: &[&str] = &[
    "Smith", "Johnson", "Garcia", "Miller", "Davis", "Lopez", "Wilson", "Anderson", "Thomas",
    "Moore", "Martin", "Clark",
];

const COLUMNS: &[&str] = &[
    "Timestamp",
    "User_ID",
    "Full_Name",
    "IP_Address",
    "Equipment_ID",
    "Action_Type",
    "Department",
    "Detail",
];

/// 2025-01-01T00:00:00Z
const BASE_TIMESTAMP: i64 = 1_735_689_600;
const YEAR_SECS: i64 = 365 * 24 * 60 * 60;

/// Shape of the generated log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogKind {
    /// JSON table (array of row objects)
    #[default]
    Table,
    /// Plain text, one event per line
    Text,
}

/// One generated audit event
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub full_name: String,
    pub ip_address: String,
    pub equipment: &'static str,
    pub action: &'static str,
    pub department: &'static str,
    pub severity: &'static str,
    pub detail: String,
}

impl AuditEntry {
    fn timestamp_string(&self) -> String {
        self.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    /// Free-text log line
    pub fn to_line(&self) -> String {
        format!(
            "[{}] [Sev: {}] User:{} ({}) performed {} on {}. Details: {}",
            self.timestamp_string(),
            self.severity,
            self.user_id,
            self.ip_address,
            self.action,
            self.equipment,
            self.detail
        )
    }

    fn into_row(self) -> Vec<Cell> {
        vec![
            Cell::from(self.timestamp_string()),
            Cell::from(self.user_id),
            Cell::from(self.full_name),
            Cell::from(self.ip_address),
            Cell::from(self.equipment),
            Cell::from(self.action),
            Cell::from(self.department),
            Cell::from(self.detail),
        ]
    }
}

/// Seeded audit log generator
pub struct AuditLogGenerator {
    rng: StdRng,
}

impl AuditLogGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, items: &'static [&'static str]) -> &'static str {
        items[self.rng.random_range(0..items.len())]
    }

    pub fn next_entry(&mut self) -> AuditEntry {
        let offset = self.rng.random_range(0..YEAR_SECS);
        let timestamp = DateTime::UNIX_EPOCH + TimeDelta::seconds(BASE_TIMESTAMP + offset);

        let given = self.pick(GIVEN_NAMES);
        let surname = self.pick(SURNAMES);
        let user_id = if self.rng.random_bool(0.5) {
            format!("{}{}", given.to_lowercase(), self.rng.random_range(1..100))
        } else {
            format!(
                "{}{}",
                given.chars().next().unwrap_or('u').to_ascii_lowercase(),
                surname.to_lowercase()
            )
        };

        let ip_address = format!(
            "{}.{}.{}.{}",
            self.rng.random_range(10..=223),
            self.rng.random_range(0..=255),
            self.rng.random_range(0..=255),
            self.rng.random_range(1..=254)
        );

        let detail_action = self.pick(ACTIONS);
        let detail_equipment = self.pick(EQUIPMENT);
        let status = if self.rng.random_bool(0.8) { "Success" } else { "Fail" };
        let message = self.pick(MESSAGES);

        AuditEntry {
            timestamp,
            user_id,
            full_name: format!("{} {}", given, surname),
            ip_address,
            equipment: self.pick(EQUIPMENT),
            action: self.pick(ACTIONS),
            department: self.pick(DEPARTMENTS),
            severity: self.pick(SEVERITIES),
            detail: format!(
                "{} executed on {}. Status: {}. Msg: {}.",
                detail_action, detail_equipment, status, message
            ),
        }
    }

    /// `rows` events as a table with the standard audit columns
    pub fn table(&mut self, rows: usize) -> trailguard_core::Result<Table> {
        let headers = COLUMNS.iter().map(|c| c.to_string()).collect();
        let rows = (0..rows).map(|_| self.next_entry().into_row()).collect();
        Table::from_rows(headers, rows)
    }

    /// `rows` events as newline-terminated log lines
    pub fn text(&mut self, rows: usize) -> String {
        let mut out = String::new();
        for _ in 0..rows {
            out.push_str(&self.next_entry().to_line());
            out.push('\n');
        }
        out
    }
}
