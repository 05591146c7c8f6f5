//! Throttled, capacity-bounded posture history.
//!
//! The store holds a `t,angle` header followed by one `unix_secs,angle` line
//! per record, oldest first. When the record count reaches capacity the
//! older half is dropped in a single rewrite before the next append, so
//! storage stays bounded without shifting the file on every record.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use log::{info, warn};

use crate::config::Config;
use crate::store::HistoryStore;

pub const HEADER: &str = "t,angle";

const LINE_CAPACITY: usize = 48;

fn is_record_line(line: &str) -> bool {
    !line.trim().is_empty() && !line.starts_with("t,")
}

/// Number of data lines in a store's contents.
pub fn count_records(contents: &str) -> usize {
    contents.lines().filter(|l| is_record_line(l)).count()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryRecord {
    pub unix_secs: f64,
    pub angle_deg: f32,
}

impl HistoryRecord {
    /// `unix_secs,angle` with whole seconds and one decimal, newline included.
    pub fn to_line(&self) -> Option<heapless::String<LINE_CAPACITY>> {
        let mut line = heapless::String::new();
        writeln!(line, "{:.0},{:.1}", self.unix_secs, self.angle_deg).ok()?;
        Some(line)
    }

    pub fn parse(line: &str) -> Option<Self> {
        let (t, angle) = line.trim().split_once(',')?;
        Some(Self {
            unix_secs: t.trim().parse().ok()?,
            angle_deg: angle.trim().parse().ok()?,
        })
    }
}

/// Result of [`HistoryLog::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// No writable medium; nothing is ever written.
    Disabled,
    /// Too soon after the previous write; the record was dropped.
    Throttled,
    Written,
    /// The store refused the write. Logging stays enabled and the next
    /// interval tries again.
    Failed,
}

pub struct HistoryLog<S> {
    store: Option<S>,
    count: usize,
    capacity: usize,
    interval_ms: u64,
    last_write_ms: Option<u64>,
}

impl<S: HistoryStore> HistoryLog<S> {
    /// Attach to `store` and recover the record count from what is already
    /// there. `None`, or a store that cannot be read or initialised, leaves
    /// logging disabled for the session.
    pub fn open(store: Option<S>, config: &Config) -> Self {
        let mut log = Self {
            store: None,
            count: 0,
            capacity: config.max_history,
            interval_ms: config.history_interval_ms,
            last_write_ms: None,
        };

        let Some(mut store) = store else {
            info!("History logging disabled");
            return log;
        };

        log.count = match store.read_all() {
            Ok(Some(contents)) if !contents.trim().is_empty() => count_records(&contents),
            Ok(_) => {
                let mut header = String::from(HEADER);
                header.push('\n');
                if let Err(e) = store.replace(&header) {
                    warn!("Cannot initialise history log: {}", e);
                    return log;
                }
                0
            }
            Err(e) => {
                warn!("Cannot read history log: {}", e);
                return log;
            }
        };

        info!("History: {} existing samples", log.count);
        log.store = Some(store);
        log
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Records currently in the store.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    /// Append a record unless one was written less than the history interval
    /// ago. Intermediate records are dropped, not queued.
    pub fn append(&mut self, now_ms: u64, record: HistoryRecord) -> Appended {
        if self.store.is_none() {
            return Appended::Disabled;
        }
        if let Some(last) = self.last_write_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return Appended::Throttled;
            }
        }
        self.last_write_ms = Some(now_ms);

        if self.count >= self.capacity {
            if let Err(e) = self.compact() {
                warn!("History compaction failed: {}", e);
                return Appended::Failed;
            }
        }

        let Some(line) = record.to_line() else {
            warn!("History record does not fit a line: {:?}", record);
            return Appended::Failed;
        };
        let Some(store) = self.store.as_mut() else {
            return Appended::Disabled;
        };
        match store.append(&line) {
            Ok(()) => {
                self.count += 1;
                Appended::Written
            }
            Err(e) => {
                warn!("History write error: {}", e);
                Appended::Failed
            }
        }
    }

    /// Keep only the newer half of the records (by position, which is
    /// chronological) and rewrite the store with them under its header.
    /// Returns the number of records kept.
    pub fn compact(&mut self) -> Result<usize, S::Error> {
        let Some(store) = self.store.as_mut() else {
            return Ok(0);
        };

        let contents = store.read_all()?.unwrap_or_default();
        let header = contents
            .lines()
            .next()
            .filter(|l| l.starts_with("t,"))
            .unwrap_or(HEADER);
        let records: Vec<&str> = contents.lines().filter(|l| is_record_line(l)).collect();
        let keep = &records[records.len() / 2..];

        let mut rewritten = String::with_capacity(contents.len() / 2 + header.len() + 1);
        rewritten.push_str(header);
        rewritten.push('\n');
        for line in keep {
            rewritten.push_str(line);
            rewritten.push('\n');
        }
        store.replace(&rewritten)?;

        self.count = keep.len();
        info!("History truncated to {} rows", self.count);
        Ok(self.count)
    }
}
