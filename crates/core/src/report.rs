//! Active/expired partitioning and the plain-text session report.

use serde::Serialize;

use crate::session::Session;
use crate::types::Timestamp;

/// Timestamp layout used in report rows.
pub const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACTIVE_HEADER: &str = "=== ACTIVE  ===";
const EXPIRED_HEADER: &str = "=== EXPIRED ===";

/// Width of the padded IP column.
const IP_WIDTH: usize = 16;

/// Width of each timestamp column (matches [`REPORT_TIMESTAMP_FORMAT`]).
const TIMESTAMP_WIDTH: usize = 19;

/// Sessions split by expiry relative to a query time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionPartition {
    pub active: Vec<Session>,
    pub expired: Vec<Session>,
}

/// Stable partition of `sessions` at `now`.
///
/// `expires_at < now` goes to `expired`, everything else to `active`.
/// Input order is preserved within each bucket.
pub fn partition(sessions: Vec<Session>, now: Timestamp) -> SessionPartition {
    let (expired, active): (Vec<Session>, Vec<Session>) =
        sessions.into_iter().partition(|s| s.is_expired_at(now));
    SessionPartition { active, expired }
}

/// Render the two-section text report served by `GET /session/list`.
pub fn render_report(partition: &SessionPartition) -> String {
    let header = column_header();
    let mut lines = Vec::with_capacity(partition.active.len() + partition.expired.len() + 4);

    lines.push(ACTIVE_HEADER.to_string());
    lines.push(header.clone());
    lines.extend(partition.active.iter().map(render_row));

    lines.push(EXPIRED_HEADER.to_string());
    lines.push(header);
    lines.extend(partition.expired.iter().map(render_row));

    lines.join("\n")
}

fn column_header() -> String {
    format!(
        "[ CODE ] <{:^w$}> | {:tw$} | {:tw$} | {:tw$} |",
        "IP",
        "CREATED",
        "UPDATED",
        "EXPIRES",
        w = IP_WIDTH,
        tw = TIMESTAMP_WIDTH,
    )
}

fn render_row(session: &Session) -> String {
    format!(
        "[{}] <{:w$}> | {} | {} | {} |",
        session.code,
        session.ip,
        session.created_at.format(REPORT_TIMESTAMP_FORMAT),
        session.updated_at.format(REPORT_TIMESTAMP_FORMAT),
        session.expires_at.format(REPORT_TIMESTAMP_FORMAT),
        w = IP_WIDTH,
    )
}
