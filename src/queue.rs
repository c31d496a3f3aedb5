use std::collections::{HashMap, VecDeque};

use crate::loader::LoadTicket;
use crate::resolve::Locator;

/// FIFO load queue with a fixed concurrency ceiling. At most
/// `max_concurrent` tickets are started-but-unsettled at any instant; excess
/// requests wait in arrival order, so every request eventually starts once
/// capacity frees up.
#[derive(Debug)]
pub struct LoadQueue {
    waiting: VecDeque<(LoadTicket, Locator)>,
    in_flight: HashMap<LoadTicket, u64>, // ticket -> started_at_ms
    next_ticket: u64,
    max_concurrent: usize,
    load_timeout_ms: u64,
}

impl LoadQueue {
    pub fn new(max_concurrent: usize, load_timeout_ms: u64) -> Self {
        Self {
            waiting: VecDeque::new(),
            in_flight: HashMap::new(),
            next_ticket: 0,
            max_concurrent: max_concurrent.max(1),
            load_timeout_ms,
        }
    }

    pub fn enqueue(&mut self, locator: Locator) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        self.waiting.push_back((ticket, locator));
        ticket
    }

    /// Pop waiting heads while capacity remains, marking them in flight.
    /// The caller hands the returned requests to the loader.
    pub fn start_ready(&mut self, now_ms: u64) -> Vec<(LoadTicket, Locator)> {
        let mut started = Vec::new();
        while self.in_flight.len() < self.max_concurrent {
            let Some((ticket, locator)) = self.waiting.pop_front() else {
                break;
            };
            self.in_flight.insert(ticket, now_ms);
            started.push((ticket, locator));
        }
        started
    }

    /// Free the capacity held by a ticket. Returns false for tickets that
    /// are not in flight (already settled, timed out, or cleared), letting
    /// the caller drop late completions.
    pub fn settle(&mut self, ticket: LoadTicket) -> bool {
        self.in_flight.remove(&ticket).is_some()
    }

    /// Abandon in-flight tickets older than the load timeout, freeing their
    /// capacity. A completion arriving later for one of these is dropped by
    /// `settle` returning false.
    pub fn timed_out(&mut self, now_ms: u64) -> Vec<LoadTicket> {
        let expired: Vec<LoadTicket> = self
            .in_flight
            .iter()
            .filter(|&(_, &started)| now_ms.saturating_sub(started) >= self.load_timeout_ms)
            .map(|(&ticket, _)| ticket)
            .collect();
        for ticket in &expired {
            self.in_flight.remove(ticket);
        }
        expired
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_idle(&self) -> bool {
        self.waiting.is_empty() && self.in_flight.is_empty()
    }

    pub fn clear(&mut self) {
        self.waiting.clear();
        self.in_flight.clear();
    }
}
