//! Fixed-capacity sample history for one tracked entity.
//!
//! Each tracked process or container keeps the last `W` memory samples in a
//! circular buffer. Pushing into a full buffer overwrites the oldest sample,
//! so memory use per entity is constant.

/// One memory observation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sample {
    pub timestamp: f64,    // Unix seconds
    pub memory_bytes: u64, // Resident set size
}

impl Sample {
    pub fn new(timestamp: f64, memory_bytes: u64) -> Self {
        Self {
            timestamp,
            memory_bytes,
        }
    }
}

/// A circular buffer of samples with fixed capacity.
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    samples: Vec<Sample>,
    capacity: usize,
    write_index: usize,
    count: usize,
}

impl HistoryBuffer {
    /// Creates an empty buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: vec![Sample::default(); capacity],
            capacity,
            write_index: 0,
            count: 0,
        }
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: Sample) {
        self.samples[self.write_index] = sample;
        self.write_index = (self.write_index + 1) % self.capacity;

        if self.count < self.capacity {
            self.count += 1;
        }
    }

    /// Iterates samples in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        let (tail, head) = if self.count < self.capacity {
            (&self.samples[0..self.count], &self.samples[0..0])
        } else {
            (
                &self.samples[self.write_index..],
                &self.samples[0..self.write_index],
            )
        };
        tail.iter().chain(head.iter())
    }

    /// Returns all samples in chronological order.
    pub fn to_vec(&self) -> Vec<Sample> {
        self.iter().copied().collect()
    }

    pub fn first(&self) -> Option<Sample> {
        self.iter().next().copied()
    }

    pub fn last(&self) -> Option<Sample> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.write_index + self.capacity - 1) % self.capacity;
        Some(self.samples[idx])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True once the buffer holds `capacity` samples.
    pub fn is_full(&self) -> bool {
        self.count == self.capacity
    }
}
