use crate::circular_queue::CircularQueue;

/// Frame rate over the last `window` frame timestamps.
#[derive(Debug, Clone)]
pub struct RollingAvg {
    history: CircularQueue<f64>,
}

impl RollingAvg {
    pub fn new(window: usize) -> Self {
        Self {
            history: CircularQueue::with_capacity(window.max(2)),
        }
    }

    #[inline]
    pub fn push(&mut self, ts: f64) {
        self.history.push(ts);
    }

    /// Frames per second, `None` until two frames with distinct timestamps
    /// were seen.
    pub fn rate(&self) -> Option<f64> {
        let newest = *self.history.newest()?;
        let oldest = *self.history.oldest()?;
        let span = newest - oldest;

        if self.history.len() < 2 || !(span > 0.0) {
            return None;
        }

        Some((self.history.len() - 1) as f64 / span)
    }
}
