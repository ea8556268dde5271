use comfy_table::Table;
use serde::Serialize;
use veboost_core::BlockHeight;
use veboost_escrow::EmissionSchedule;

use crate::prelude::*;

#[derive(Debug, Clone, Serialize)]
pub struct AccountRow {
    pub name: String,
    pub address: Address,
    pub escrow_balance: Units,
    pub reward_balance: Units,
    pub locks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockRow {
    pub id: LockId,
    pub owner: String,
    pub amount: Units,
    pub end: Timestamp,
    pub weight: Units,
    pub voted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GaugeRow {
    pub pool: String,
    pub gauge: Address,
    pub active: bool,
    pub base_weight: Amount,
    pub votes: Units,
    pub reward_rate: Units,
    pub deposited: Units,
    pub distributed: Units,
    pub forfeited: Units,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionRow {
    pub account: String,
    pub pool: String,
    pub deposited: Units,
    pub claimed: Units,
    pub pending: Units,
    pub pending_max: Units,
    pub multiplier: String,
}

/// Point-in-time view of a simulated protocol
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub label: Option<String>,
    pub timestamp: Timestamp,
    pub block: BlockHeight,
    pub locked_supply: Units,
    pub voting_supply: Units,
    pub total_votes: Units,
    pub accounts: Vec<AccountRow>,
    pub locks: Vec<LockRow>,
    pub gauges: Vec<GaugeRow>,
    pub positions: Vec<PositionRow>,
}

trait TableRow {
    fn header() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableRow for AccountRow {
    fn header() -> Vec<&'static str> {
        vec!["account", "address", "escrow token", "reward token", "locks"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            format!("{}", self.address),
            format!("{}", self.escrow_balance),
            format!("{}", self.reward_balance),
            format!("{}", self.locks),
        ]
    }
}

impl TableRow for LockRow {
    fn header() -> Vec<&'static str> {
        vec!["lock", "owner", "amount", "end", "weight", "voted"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            format!("{}", self.id),
            self.owner.clone(),
            format!("{}", self.amount),
            format!("{}", self.end),
            format!("{}", self.weight),
            format!("{}", self.voted),
        ]
    }
}

impl TableRow for GaugeRow {
    fn header() -> Vec<&'static str> {
        vec![
            "pool",
            "gauge",
            "active",
            "base weight",
            "votes",
            "reward/s",
            "deposited",
            "distributed",
            "forfeited",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.pool.clone(),
            format!("{}", self.gauge),
            format!("{}", self.active),
            format!("{}", self.base_weight),
            format!("{}", self.votes),
            format!("{}", self.reward_rate),
            format!("{}", self.deposited),
            format!("{}", self.distributed),
            format!("{}", self.forfeited),
        ]
    }
}

impl TableRow for PositionRow {
    fn header() -> Vec<&'static str> {
        vec![
            "account",
            "pool",
            "deposited",
            "claimed",
            "pending",
            "pending max",
            "multiplier",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.account.clone(),
            self.pool.clone(),
            format!("{}", self.deposited),
            format!("{}", self.claimed),
            format!("{}", self.pending),
            format!("{}", self.pending_max),
            self.multiplier.clone(),
        ]
    }
}

fn build_table<R: TableRow>(rows: &[R]) -> Table {
    let mut table = Table::new();
    table.set_header(R::header());

    for row in rows {
        table.add_row(row.row());
    }

    table
}

impl Report {
    /// Titled tables, one per section, skipping empty ones
    pub fn tables(&self) -> Vec<(&'static str, Table)> {
        let mut out = vec![("accounts", build_table(&self.accounts))];

        if !self.locks.is_empty() {
            out.push(("locks", build_table(&self.locks)));
        }

        if !self.gauges.is_empty() {
            out.push(("gauges", build_table(&self.gauges)));
        }

        if !self.positions.is_empty() {
            out.push(("positions", build_table(&self.positions)));
        }

        out
    }

    pub fn title(&self) -> String {
        match &self.label {
            Some(label) => format!("{label} @ {} (block {})", self.timestamp, self.block),
            None => format!("@ {} (block {})", self.timestamp, self.block),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRow {
    pub timestamp: Timestamp,
    pub rate: Units,
    pub emitted: Units,
}

impl TableRow for ScheduleRow {
    fn header() -> Vec<&'static str> {
        vec!["timestamp", "reward/s", "emitted"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            format!("{}", self.timestamp),
            format!("{}", self.rate),
            format!("{}", self.emitted),
        ]
    }
}

/// Samples the schedule every `step` seconds over `[from, to]`. Emitted
/// amounts are cumulative since the schedule start.
pub fn schedule_rows(
    schedule: &EmissionSchedule,
    from: Timestamp,
    to: Timestamp,
    step: u64,
) -> Result<Vec<ScheduleRow>, Error> {
    if step == 0 {
        return Err(Error::config("schedule step must be positive"));
    }

    let mut out = vec![];
    let mut t = from;

    while t <= to {
        out.push(ScheduleRow {
            timestamp: t,
            rate: Units(schedule.rate_at(t)),
            emitted: Units(schedule.emitted(schedule.start(), t)?),
        });

        t = match t.checked_add(step) {
            Some(x) => x,
            None => break,
        };
    }

    Ok(out)
}

pub fn schedule_table(rows: &[ScheduleRow]) -> Table {
    build_table(rows)
}
