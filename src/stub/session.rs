//! Per-connection session state: everything the dispatcher remembers
//! between packets.

use std::collections::HashMap;

use crate::target::BreakpointKind;

/// Mirrors the `qSupported`/`QStartNoAckMode` feature-negotiation state plus
/// the various per-session caches spec'd out alongside the dispatcher.
pub struct SessionState {
    pub ack_enabled: bool,
    pub stub_features: Vec<(&'static str, FeatureValue)>,
    pub gdb_features: HashMap<String, FeatureValue>,

    /// Thread selected by the most recent `Hc`.
    pub thread_for_cont_op: u32,
    /// Thread selected by the most recent `Hg`.
    pub thread_for_reg_op: u32,
    /// Thread id reported in the most recent stop-reply.
    pub last_reported_stop_thread: u32,

    pub thread_info_cache: ThreadInfoCache,
    pub breakpoint_table: HashMap<(BreakpointKind, u64), crate::target::BreakpointCookie>,
    pub memory_regions: Vec<MemoryRegion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureValue {
    Supported,
    Unsupported,
    NotSupported,
    Value(u64),
}

#[derive(Debug, Clone, Default)]
pub struct ThreadInfoCache {
    pub valid: bool,
    pub threads: Vec<(u32, String)>,
    /// Position of the next unreported entry for `qsThreadInfo` pagination.
    pub next: usize,
}

impl ThreadInfoCache {
    pub fn invalidate(&mut self) {
        self.valid = false;
        self.threads.clear();
        self.next = 0;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion {
    pub kind: &'static str,
    pub start: u64,
    pub length: u64,
    pub erase_block_size: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            ack_enabled: true,
            stub_features: Vec::new(),
            gdb_features: HashMap::new(),
            thread_for_cont_op: 0,
            thread_for_reg_op: 0,
            last_reported_stop_thread: 0,
            thread_info_cache: ThreadInfoCache::default(),
            breakpoint_table: HashMap::new(),
            memory_regions: Vec::new(),
        }
    }

    /// Called before any resume (`c`, `s`, non-`Probe` `vCont` action):
    /// clears the thread selections and thread-info cache.
    pub fn invalidate_on_resume(&mut self) {
        self.thread_for_cont_op = 0;
        self.thread_for_reg_op = 0;
        self.thread_info_cache.invalidate();
    }

    /// The thread that register/memory operations implicitly target when no
    /// explicit `H` selection is in effect.
    pub fn effective_reg_thread(&self) -> u32 {
        if self.thread_for_reg_op != 0 {
            self.thread_for_reg_op
        } else {
            self.last_reported_stop_thread
        }
    }

    pub fn effective_cont_thread(&self) -> u32 {
        if self.thread_for_cont_op != 0 {
            self.thread_for_cont_op
        } else {
            self.last_reported_stop_thread
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
