//! A priority queue that stores arbitrary data sorted by time and execution phase
//!
//! Defines a `Queue<T>` that is intended to store a queue of items of type
//! T - sorted by `f64` time and `ExecutionPhase` - called 'plans'.
//! This queue has methods for adding plans, clearing the queue, and retrieving
//! the earliest plan in the queue. Adding and retrieving a plan are
//! *O*(log(*n*)).
//!
//! This queue is used by `Context` to store the day-by-day work of a model
//! run where some callback closure `FnOnce(&mut Context)` will be executed at
//! a given day.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::trace;

/// The order in which plans scheduled for the same time are executed.
///
/// The step engine runs in `Normal`, daily aggregation in `Last` so that it
/// sees the fully updated population, and end-of-run shutdown in `First`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ExecutionPhase {
    First,
    #[default]
    Normal,
    Last,
}

/// A priority queue that stores arbitrary data sorted by time
///
/// Items of type `T` are stored in order by `f64` time and called `Plan<T>`.
/// When plans are created they are sequentially numbered. If two plans are
/// scheduled for the same time then the plan with the earlier phase is
/// placed earlier. If two plans have the same time and phase then the plan
/// that was added first is placed earlier.
///
/// Each heap entry carries its payload, so popping an entry yields the plan.
pub struct Queue<T> {
    queue: BinaryHeap<Entry<T>>,
    plan_counter: u64,
}

impl<T> Queue<T> {
    /// Create a new empty `Queue<T>`
    #[must_use]
    pub fn new() -> Queue<T> {
        Queue {
            queue: BinaryHeap::new(),
            plan_counter: 0,
        }
    }

    /// Add a plan to the queue at the specified time and phase
    pub fn add_plan(&mut self, time: f64, data: T, phase: ExecutionPhase) {
        trace!("adding plan at {time} in phase {phase:?}");
        let sequence = self.plan_counter;
        self.queue.push(Entry {
            time,
            sequence,
            phase,
            data,
        });
        self.plan_counter += 1;
    }

    /// Drop every remaining plan
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of plans waiting
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Retrieve the earliest plan in the queue
    ///
    /// Returns the next plan if it exists or else `None` if the queue is empty
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        self.queue.pop().map(|entry| Plan {
            time: entry.time,
            phase: entry.phase,
            data: entry.data,
        })
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A plan payload with the time, sequence number and phase that order it
struct Entry<T> {
    time: f64,
    sequence: u64,
    phase: ExecutionPhase,
    data: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entries are ordered in increasing order by time, phase, and then
/// sequence number. `BinaryHeap` is a max-heap, hence the reversals.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Plan times are validated by `Context::add_plan`, so NaN never gets here.
        let time_ordering = self.time.total_cmp(&other.time).reverse();
        time_ordering
            .then_with(|| self.phase.cmp(&other.phase).reverse())
            .then_with(|| self.sequence.cmp(&other.sequence).reverse())
    }
}

/// A plan that holds data of type `T` intended to be used at the specified time
pub struct Plan<T> {
    pub time: f64,
    pub phase: ExecutionPhase,
    pub data: T,
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::{ExecutionPhase, Queue};

    #[test]
    fn empty_queue() {
        let mut plan_queue = Queue::<()>::new();
        assert!(plan_queue.is_empty());
        assert!(plan_queue.get_next_plan().is_none());
    }

    #[test]
    fn plans_come_out_in_day_order() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1.0, 1, ExecutionPhase::Normal);
        plan_queue.add_plan(3.0, 3, ExecutionPhase::Normal);
        plan_queue.add_plan(2.0, 2, ExecutionPhase::Normal);

        for expected in 1..=3 {
            let next_plan = plan_queue.get_next_plan().unwrap();
            assert_eq!(next_plan.time, f64::from(expected));
            assert_eq!(next_plan.data, expected);
        }
        assert!(plan_queue.get_next_plan().is_none());
    }

    #[test]
    fn same_day_same_phase_keeps_insertion_order() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1.0, "bite", ExecutionPhase::Normal);
        plan_queue.add_plan(1.0, "recover", ExecutionPhase::Normal);

        assert_eq!(plan_queue.get_next_plan().unwrap().data, "bite");
        assert_eq!(plan_queue.get_next_plan().unwrap().data, "recover");
    }

    #[test]
    fn same_day_orders_by_phase() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(4.0, "record", ExecutionPhase::Last);
        plan_queue.add_plan(4.0, "step", ExecutionPhase::Normal);
        plan_queue.add_plan(4.0, "shutdown", ExecutionPhase::First);

        let order: Vec<_> = std::iter::from_fn(|| plan_queue.get_next_plan())
            .map(|plan| plan.data)
            .collect();
        assert_eq!(order, vec!["shutdown", "step", "record"]);
    }

    #[test]
    fn earlier_day_wins_over_phase() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(2.0, 2, ExecutionPhase::First);
        plan_queue.add_plan(1.0, 1, ExecutionPhase::Last);

        let next_plan = plan_queue.get_next_plan().unwrap();
        assert_eq!(next_plan.data, 1);
        assert_eq!(next_plan.phase, ExecutionPhase::Last);
    }

    #[test]
    fn popping_hands_back_the_payload() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1.0, vec![1, 2], ExecutionPhase::Normal);
        plan_queue.add_plan(1.0, vec![3], ExecutionPhase::Normal);
        assert_eq!(plan_queue.len(), 2);

        assert_eq!(plan_queue.get_next_plan().unwrap().data, vec![1, 2]);
        assert_eq!(plan_queue.len(), 1);
        assert_eq!(plan_queue.get_next_plan().unwrap().data, vec![3]);
        assert!(plan_queue.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1.0, 1, ExecutionPhase::Normal);
        plan_queue.add_plan(2.0, 2, ExecutionPhase::Last);
        plan_queue.clear();
        assert!(plan_queue.is_empty());
        assert!(plan_queue.get_next_plan().is_none());
    }
}
