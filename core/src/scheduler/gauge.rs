use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Count of live workers. Slots are released when their guard drops.
#[derive(Debug, Default)]
pub struct WorkerGauge {
    alive: AtomicUsize,
    peak: AtomicUsize,
}

impl WorkerGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn alive(&self) -> usize {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn reserve(self: &Arc<Self>) -> WorkerSlot {
        let now = self.alive.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        WorkerSlot {
            gauge: Arc::clone(self),
        }
    }

    /// Reserves a slot only while fewer than `max` workers are alive.
    pub fn try_reserve(self: &Arc<Self>, max: usize) -> Option<WorkerSlot> {
        self.alive
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|prev| {
                self.peak.fetch_max(prev + 1, Ordering::SeqCst);
                WorkerSlot {
                    gauge: Arc::clone(self),
                }
            })
    }
}

#[derive(Debug)]
pub struct WorkerSlot {
    gauge: Arc<WorkerGauge>,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.gauge.alive.fetch_sub(1, Ordering::SeqCst);
    }
}
