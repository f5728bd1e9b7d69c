//! The scenario event queue: a strictly-ordered event set keyed by
//! `(time, type, cell hash)`, following the ordering the teacher crate gives
//! temperature newtypes in `core_types::units` (total ordering over `f64` via
//! `total_cmp`, since raw floats aren't `Ord`).

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::grid::Location;

/// The four event kinds the scenario loop schedules, in the ordinal order
/// spec §3 requires for tie-breaking (`Invalid < Save < EndSimulation <
/// NewFire < FireSpread`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventType {
    Invalid = 0,
    Save = 1,
    EndSimulation = 2,
    NewFire = 3,
    FireSpread = 4,
}

/// A single scheduled occurrence in a scenario's timeline.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// Simulation time in fractional days-of-year.
    pub time: f64,
    pub event_type: EventType,
    pub cell: Location,
}

impl Event {
    #[must_use]
    pub fn new(time: f64, event_type: EventType, cell: Location) -> Self {
        Event { time, event_type, cell }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| (self.event_type as u8).cmp(&(other.event_type as u8)))
            .then_with(|| self.cell.hash().cmp(&other.cell.hash()))
    }
}

/// Strictly-ordered event set. A `BTreeSet` gives us pop-minimum in
/// `O(log n)` and keeps ties ordered deterministically by `(time, type,
/// cell_hash)`, satisfying spec §8's event-determinism invariant.
#[derive(Debug, Default)]
pub struct Scheduler {
    events: BTreeSet<Event>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Scheduler { events: BTreeSet::new() }
    }

    pub fn schedule(&mut self, event: Event) {
        self.events.insert(event);
    }

    pub fn pop_earliest(&mut self) -> Option<Event> {
        let first = *self.events.iter().next()?;
        self.events.remove(&first);
        Some(first)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: i32, col: i32) -> Location {
        Location::new(row, col)
    }

    #[test]
    fn orders_by_time_first() {
        let a = Event::new(1.0, EventType::FireSpread, cell(0, 0));
        let b = Event::new(2.0, EventType::Save, cell(0, 0));
        assert!(a < b);
    }

    #[test]
    fn ties_on_time_order_by_type_ordinal() {
        let save = Event::new(1.0, EventType::Save, cell(0, 0));
        let end = Event::new(1.0, EventType::EndSimulation, cell(0, 0));
        let newfire = Event::new(1.0, EventType::NewFire, cell(0, 0));
        let spread = Event::new(1.0, EventType::FireSpread, cell(0, 0));
        assert!(save < end);
        assert!(end < newfire);
        assert!(newfire < spread);
    }

    #[test]
    fn ties_on_time_and_type_order_by_cell_hash() {
        let a = Event::new(1.0, EventType::FireSpread, cell(0, 0));
        let b = Event::new(1.0, EventType::FireSpread, cell(0, 1));
        assert!(a < b);
    }

    #[test]
    fn scheduler_pops_in_strict_order() {
        let mut sched = Scheduler::new();
        sched.schedule(Event::new(3.0, EventType::FireSpread, cell(0, 0)));
        sched.schedule(Event::new(1.0, EventType::Save, cell(0, 0)));
        sched.schedule(Event::new(2.0, EventType::NewFire, cell(0, 0)));
        let times: Vec<f64> = std::iter::from_fn(|| sched.pop_earliest()).map(|e| e.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn deterministic_under_shuffled_insertion() {
        let mut a = Scheduler::new();
        let mut b = Scheduler::new();
        let events = [
            Event::new(1.0, EventType::FireSpread, cell(0, 1)),
            Event::new(1.0, EventType::FireSpread, cell(0, 0)),
            Event::new(0.5, EventType::Save, cell(2, 2)),
        ];
        for e in events {
            a.schedule(e);
        }
        for e in events.iter().rev() {
            b.schedule(*e);
        }
        let seq_a: Vec<_> = std::iter::from_fn(|| a.pop_earliest()).map(|e| e.cell.hash()).collect();
        let seq_b: Vec<_> = std::iter::from_fn(|| b.pop_earliest()).map(|e| e.cell.hash()).collect();
        assert_eq!(seq_a, seq_b);
    }
}
