use std::any::TypeId;
use std::collections::HashMap;

use crate::query::QueryId;
use crate::system::System;
use crate::system::config::Config;

/// One registered system and its per-registration state.
pub(crate) struct SystemEntry {
    pub type_id: TypeId,
    pub name: &'static str,
    pub system: Box<dyn System>,
    pub priority: i32,
    /// Registration sequence; the stable tie-break within a priority.
    pub sequence: u64,
    pub paused: bool,
    /// The system's declared queries, resolved to handles by name.
    pub queries: HashMap<String, QueryId>,
    pub config: Config,
}

/// A summary of one registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemMeta {
    pub name: &'static str,
    pub priority: i32,
    pub paused: bool,
}

/// The ordered system list of one world.
///
/// Entries are kept sorted by ascending priority, ties broken by
/// registration order. The sort is recomputed on every insert, so ticking is
/// a plain in-order walk.
#[derive(Default)]
pub(crate) struct Scheduler {
    entries: Vec<SystemEntry>,
    next_sequence: u64,
}

impl Scheduler {
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.entries.iter().any(|entry| entry.type_id == type_id)
    }

    pub fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    pub fn insert(&mut self, entry: SystemEntry) {
        self.entries.push(entry);
        self.entries.sort_by_key(|entry| (entry.priority, entry.sequence));
    }

    pub fn remove(&mut self, type_id: TypeId) -> Option<SystemEntry> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.type_id == type_id)?;
        Some(self.entries.remove(position))
    }

    pub fn entry(&self, type_id: TypeId) -> Option<&SystemEntry> {
        self.entries.iter().find(|entry| entry.type_id == type_id)
    }

    pub fn entry_mut(&mut self, type_id: TypeId) -> Option<&mut SystemEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.type_id == type_id)
    }

    /// Move the entries out for a tick; restore afterwards.
    pub fn take(&mut self) -> Vec<SystemEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn restore(&mut self, entries: Vec<SystemEntry>) {
        self.entries = entries;
    }

    /// Summaries in execution order.
    pub fn metas(&self) -> Vec<SystemMeta> {
        self.entries
            .iter()
            .map(|entry| SystemMeta {
                name: entry.name,
                priority: entry.priority,
                paused: entry.paused,
            })
            .collect()
    }
}
