// Bounded history for consumers
//
// Registries keep only the latest record. Views that draw sparklines keep
// their own fixed-size window.

use std::collections::VecDeque;

use crate::catalog::ContainerStatsEvent;

/// Default window: 60 samples
pub const DEFAULT_WINDOW: usize = 60;

#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest sample when full
    pub fn push(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl<T> Default for RollingWindow<T> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// CPU and memory series for one container
#[derive(Debug, Clone, Default)]
pub struct StatsSeries {
    window: RollingWindow<ContainerStatsEvent>,
}

impl StatsSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: RollingWindow::new(capacity),
        }
    }

    pub fn record(&mut self, sample: ContainerStatsEvent) {
        // A different container means the binding moved; start over
        if let Some(last) = self.window.latest() {
            if last.container_id != sample.container_id {
                self.window.clear();
            }
        }
        self.window.push(sample);
    }

    pub fn cpu(&self) -> Vec<f64> {
        self.window.iter().map(|s| s.cpu_percent).collect()
    }

    pub fn memory(&self) -> Vec<f64> {
        self.window.iter().map(|s| s.memory_percent).collect()
    }

    pub fn latest(&self) -> Option<&ContainerStatsEvent> {
        self.window.latest()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render percentages (0..=100) as a unicode sparkline
pub fn sparkline(points: &[f64]) -> String {
    points
        .iter()
        .map(|p| {
            let clamped = p.clamp(0.0, 100.0);
            let idx = ((clamped / 100.0) * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[idx.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}
