//! # engine::thoughts
//!
//! Bounded narration log. Oldest entry is evicted first once the cap is hit.
//! Nothing in the engine reads it back; it exists only for the dashboard.

use std::collections::VecDeque;

use crate::models::{ThoughtEntry, ThoughtView};

pub const DEFAULT_THOUGHT_CAP: usize = 50;

#[derive(Debug, Clone)]
pub struct ThoughtLog {
    entries: VecDeque<ThoughtEntry>,
    cap:     usize,
}

impl ThoughtLog {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { entries: VecDeque::with_capacity(cap), cap }
    }

    /// Appends and returns how many entries were evicted (0 or 1).
    pub fn push(&mut self, entry: ThoughtEntry) -> usize {
        let mut evicted = 0;
        while self.entries.len() >= self.cap {
            self.entries.pop_front();
            evicted += 1;
        }
        self.entries.push_back(entry);
        evicted
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ThoughtEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ThoughtEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn views(&self) -> Vec<ThoughtView> {
        self.entries.iter().map(ThoughtView::from).collect()
    }
}

impl Default for ThoughtLog {
    fn default() -> Self {
        Self::new(DEFAULT_THOUGHT_CAP)
    }
}
