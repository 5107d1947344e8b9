//! Call-scoped LIFO store of encoder outputs for the U-Net skip connections.

use crate::error::{DemucsError, Result};
use burn::tensor::{backend::Backend, Tensor};

/// Bounded skip stack; one entry per encoder level.
#[derive(Debug)]
pub struct SkipStack<B: Backend> {
    skips: Vec<Tensor<B, 3>>,
    capacity: usize,
    pushed: usize,
    popped: usize,
}

impl<B: Backend> SkipStack<B> {
    pub fn new(capacity: usize) -> Self {
        Self {
            skips: Vec::with_capacity(capacity),
            capacity,
            pushed: 0,
            popped: 0,
        }
    }

    pub fn push(&mut self, skip: Tensor<B, 3>) -> Result<()> {
        if self.skips.len() == self.capacity {
            return Err(self.imbalance());
        }
        self.skips.push(skip);
        self.pushed += 1;
        Ok(())
    }

    /// Most recently pushed skip.
    pub fn pop(&mut self) -> Result<Tensor<B, 3>> {
        let skip = self.skips.pop().ok_or_else(|| self.imbalance())?;
        self.popped += 1;
        Ok(skip)
    }

    pub fn len(&self) -> usize {
        self.skips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skips.is_empty()
    }

    /// Consume the stack, returning `(pushed, popped)` when every skip was used.
    pub fn finish(self) -> Result<(usize, usize)> {
        if !self.skips.is_empty() {
            return Err(self.imbalance());
        }
        Ok((self.pushed, self.popped))
    }

    fn imbalance(&self) -> DemucsError {
        DemucsError::SkipImbalance {
            pushed: self.pushed,
            popped: self.popped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray<f32>;

    #[test]
    fn pops_in_reverse_order() {
        let device = NdArrayDevice::default();
        let mut stack = SkipStack::<TestBackend>::new(2);
        stack.push(Tensor::zeros([1, 1, 4], &device)).unwrap();
        stack.push(Tensor::zeros([1, 2, 2], &device)).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop().unwrap().dims(), [1, 2, 2]);
        assert_eq!(stack.pop().unwrap().dims(), [1, 1, 4]);
        assert!(stack.is_empty());
        assert_eq!(stack.finish().unwrap(), (2, 2));
    }

    #[test]
    fn reports_imbalance() {
        let device = NdArrayDevice::default();
        let mut stack = SkipStack::<TestBackend>::new(1);
        stack.push(Tensor::zeros([1, 1, 4], &device)).unwrap();
        assert!(matches!(
            stack.push(Tensor::zeros([1, 1, 4], &device)),
            Err(DemucsError::SkipImbalance { pushed: 1, popped: 0 })
        ));
        assert!(matches!(
            stack.finish(),
            Err(DemucsError::SkipImbalance { pushed: 1, popped: 0 })
        ));

        let mut empty = SkipStack::<TestBackend>::new(1);
        assert!(empty.pop().is_err());
    }
}
