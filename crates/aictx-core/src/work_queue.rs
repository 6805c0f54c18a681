//! FIFO input queue feeding the dispatch loop

use std::collections::VecDeque;

/// Owned work items handed out in enqueue order.
///
/// The dispatch loop is the only consumer, so no synchronisation is needed;
/// items are moved out rather than borrowed so each one is consumed once.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: VecDeque<T>,
    total: usize,
}

impl<T> WorkQueue<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let items: VecDeque<T> = items.into_iter().collect();
        log::debug!("{} items in work queue", items.len());
        Self {
            total: items.len(),
            items,
        }
    }

    /// Items enqueued at construction
    pub fn total(&self) -> usize {
        self.total
    }
}

impl<T> Iterator for WorkQueue<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.items.len(), Some(self.items.len()))
    }
}
