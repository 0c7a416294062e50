//! Buffer of retained cases waiting for a case base commit.

use data_loader::Rating;

/// Accumulates retained cases until `capacity` of them are pending.
///
/// The owner moves the batch out with `take` once `push` reports the
/// buffer is full and commits it. There is never more than one pending
/// batch.
#[derive(Debug, Clone)]
pub struct RetainBuffer {
    pending: Vec<Rating>,
    capacity: usize,
}

impl RetainBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pending: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a case; returns true when the buffer is now full
    pub fn push(&mut self, case: Rating) -> bool {
        self.pending.push(case);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.capacity
    }

    /// Remove and return every pending case, leaving the buffer empty
    pub fn take(&mut self) -> Vec<Rating> {
        std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(user_id: u32) -> Rating {
        Rating {
            user_id,
            movie_id: 1,
            rating: 4.0,
            timestamp: 0,
        }
    }

    #[test]
    fn test_fills_at_capacity() {
        let mut buffer = RetainBuffer::new(3);

        assert!(!buffer.push(case(1)));
        assert!(!buffer.push(case(2)));
        assert!(buffer.push(case(3)));

        let batch = buffer.take();
        assert_eq!(
            batch.iter().map(|r| r.user_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
    }

    #[test]
    fn test_zero_capacity_means_one() {
        let mut buffer = RetainBuffer::new(0);
        assert!(buffer.push(case(1)));
        assert_eq!(buffer.len(), 1);
    }
}
