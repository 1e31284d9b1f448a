use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::model::DownloadTask;

pub const DEFAULT_CAPACITY: usize = 3;

/// FIFO admission gate with a fixed number of download slots.
///
/// In-flight entries are keyed by URL. The same URL may be queued more than once, so
/// each key carries a count and every admission occupies its own slot.
pub struct QueueGate {
    pending: VecDeque<Arc<DownloadTask>>,
    in_flight: HashMap<String, usize>,
    active: usize,
    capacity: usize,
}

impl QueueGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: HashMap::new(),
            active: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn enqueue(&mut self, task: Arc<DownloadTask>) {
        self.pending.push_back(task);
    }

    /// Pops the oldest pending task if a slot is free.
    pub fn admit_next(&mut self) -> Option<Arc<DownloadTask>> {
        if self.active >= self.capacity {
            return None;
        }
        let task = self.pending.pop_front()?;
        *self.in_flight.entry(task.url.clone()).or_insert(0) += 1;
        self.active += 1;
        Some(task)
    }

    /// Frees one slot held by `url`. Unknown URLs are ignored.
    pub fn release(&mut self, url: &str) {
        let Some(count) = self.in_flight.get_mut(url) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.in_flight.remove(url);
        }
        self.active -= 1;
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active_len(&self) -> usize {
        self.active
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DownloadOptions;

    fn task(url: &str) -> Arc<DownloadTask> {
        Arc::new(DownloadTask {
            url: url.to_string(),
            save_dir: "/tmp".into(),
            options: DownloadOptions::default(),
        })
    }

    #[test]
    fn five_tasks_with_capacity_three() {
        let mut gate = QueueGate::new(3);
        for i in 0..5 {
            gate.enqueue(task(&format!("https://example.com/{i}")));
        }
        let mut started = Vec::new();
        while let Some(t) = gate.admit_next() {
            started.push(t.url.clone());
        }
        assert_eq!(started.len(), 3);
        assert_eq!(gate.pending_len(), 2);
        assert_eq!(gate.active_len(), 3);
        assert!(gate.admit_next().is_none());

        gate.release("https://example.com/1");
        let next = gate.admit_next().unwrap();
        assert_eq!(next.url, "https://example.com/3");
        assert_eq!(gate.pending_len(), 1);
        assert_eq!(gate.active_len(), 3);
    }

    #[test]
    fn admission_is_fifo() {
        let mut gate = QueueGate::new(1);
        gate.enqueue(task("a"));
        gate.enqueue(task("b"));
        gate.enqueue(task("c"));
        let mut order = Vec::new();
        while let Some(t) = gate.admit_next() {
            order.push(t.url.clone());
            gate.release(&t.url);
        }
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn admit_and_release_move_exactly_one_entry() {
        let mut gate = QueueGate::new(2);
        gate.enqueue(task("a"));
        gate.enqueue(task("b"));
        gate.admit_next();
        assert_eq!((gate.pending_len(), gate.active_len()), (1, 1));
        assert!(gate.in_flight.contains_key("a"));
        gate.release("a");
        assert_eq!((gate.pending_len(), gate.active_len()), (1, 0));
        assert!(!gate.in_flight.contains_key("a"));
    }

    #[test]
    fn release_of_unknown_url_is_a_no_op() {
        let mut gate = QueueGate::new(2);
        gate.enqueue(task("a"));
        gate.admit_next();
        gate.release("zzz");
        gate.release("a");
        gate.release("a");
        assert_eq!(gate.active_len(), 0);
    }

    #[test]
    fn same_url_twice_takes_two_slots() {
        let mut gate = QueueGate::new(2);
        gate.enqueue(task("a"));
        gate.enqueue(task("a"));
        gate.enqueue(task("b"));
        assert!(gate.admit_next().is_some());
        assert!(gate.admit_next().is_some());
        assert!(gate.admit_next().is_none());
        gate.release("a");
        assert!(gate.in_flight.contains_key("a"));
        assert_eq!(gate.admit_next().unwrap().url, "b");
    }

    #[test]
    fn active_never_exceeds_capacity() {
        let mut gate = QueueGate::new(3);
        for round in 0..20 {
            gate.enqueue(task(&format!("u{round}")));
            gate.enqueue(task(&format!("v{round}")));
            while gate.admit_next().is_some() {}
            assert!(gate.active_len() <= gate.capacity());
            if round % 2 == 0 {
                gate.release(&format!("u{}", round / 2));
            }
        }
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(QueueGate::new(0).capacity(), 1);
    }
}
