//! FILENAME: tests/common/mod.rs
//! Fixtures shared by the pivot-engine integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use pivot_engine::{CellValue, ColumnType, GraphEntry, GraphNodeRef, MemoryTable, SourceRow};

/// Minute `m` past midnight, 2024-01-01 UTC.
pub fn minute(m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, m / 60, m % 60, 0).unwrap()
}

// ============================================================================
// EVENT LOG FIXTURE
// ============================================================================

/// A small event log: one row per event, two dimensions and a timestamp.
pub struct EventFixture;

impl EventFixture {
    pub fn headers() -> Vec<(&'static str, ColumnType)> {
        vec![
            ("Host", ColumnType::Text),
            ("Service", ColumnType::Text),
            ("Severity", ColumnType::Number),
            ("Timestamp", ColumnType::DateTime),
        ]
    }

    /// `(host, service, severity, timestamp)`; an empty timestamp marks a
    /// row that must be skipped.
    pub fn data() -> Vec<(&'static str, Option<&'static str>, f64, &'static str)> {
        vec![
            ("web-1", Some("nginx"), 1.0, "2024-01-01T00:00:00Z"),
            ("web-1", Some("nginx"), 2.0, "2024-01-01T00:07:30Z"),
            ("web-1", Some("cron"), 1.0, "2024-01-01T00:15:00Z"),
            ("web-2", Some("nginx"), 3.0, "2024-01-01T00:20:00Z"),
            ("web-2", None, 1.0, "2024-01-01 00:25:00"),
            ("db-1", Some("postgres"), 2.0, "2024-01-01T02:30:00+02:00"),
            ("db-1", Some("postgres"), 1.0, "2024-01-01T00:59:00Z"),
            ("db-1", Some("postgres"), 1.0, ""),
        ]
    }

    pub fn table() -> MemoryTable {
        let mut table = MemoryTable::with_columns(Self::headers());
        for (host, service, severity, timestamp) in Self::data() {
            let timestamp = if timestamp.is_empty() {
                CellValue::Empty
            } else {
                CellValue::from(timestamp)
            };
            table.push_row(vec![
                host.into(),
                service.into(),
                severity.into(),
                timestamp,
            ]);
        }
        table
    }

    /// Rows with a usable timestamp.
    pub fn timed_rows() -> usize {
        Self::data().iter().filter(|row| !row.3.is_empty()).count()
    }
}

// ============================================================================
// PROCESS TREE FIXTURE
// ============================================================================

/// A process table whose rows list children before their parents.
pub struct ProcessFixture;

impl ProcessFixture {
    pub fn headers() -> Vec<(&'static str, ColumnType)> {
        vec![
            ("Pid", ColumnType::Text),
            ("ParentPid", ColumnType::Text),
            ("Command", ColumnType::Text),
            ("Started", ColumnType::DateTime),
        ]
    }

    /// `(pid, parent pid, command, minute)`.
    pub fn data() -> Vec<(&'static str, Option<&'static str>, &'static str, u32)> {
        vec![
            ("103", Some("101"), "worker", 12),
            ("102", Some("101"), "worker", 11),
            ("104", Some("103"), "sh", 20),
            ("101", Some("1"), "nginx", 10),
            ("1", None, "init", 0),
            ("103", Some("101"), "worker", 40),
        ]
    }

    pub fn table() -> MemoryTable {
        let mut table = MemoryTable::with_columns(Self::headers());
        for (pid, parent, command, at) in Self::data() {
            table.push_row(vec![pid.into(), parent.into(), command.into(), minute(at).into()]);
        }
        table
    }

    /// Maps a process row to its node declaration.
    pub fn entry(row: SourceRow<'_, MemoryTable>) -> Option<GraphEntry> {
        let pid = row.text("Pid")?;
        let command = row.text("Command")?;
        let node = GraphNodeRef::new(pid.clone(), "process", format!("{} ({})", command, pid));
        let entry = GraphEntry::new(node).with_property("pid", pid);
        Some(match row.text("ParentPid") {
            Some(parent) => {
                entry.with_parent(GraphNodeRef::new(parent.clone(), "process", parent))
            }
            None => entry,
        })
    }
}
