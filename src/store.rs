use std::sync::Arc;

use parking_lot::RwLock;

use crate::Sample;

/// Append-only, thread-safe list of samples.
///
/// Cloning the store hands out another handle to the same samples. The only
/// way to add a sample is [`SampleStore::append`], which assigns the sequence
/// index and inserts under a single write lock, so `samples[i].sequence_index == i`
/// holds no matter how many threads append.
#[derive(Clone, Debug, Default)]
pub struct SampleStore {
    samples: Arc<RwLock<Vec<Sample>>>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `price` as the next sample and returns it.
    pub fn append(&self, price: f64) -> Sample {
        let mut samples = self.samples.write();
        let sample = Sample {
            sequence_index: samples.len(),
            price,
        };
        samples.push(sample);
        sample
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// Copy of every sample recorded so far, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.read().clone()
    }
}
