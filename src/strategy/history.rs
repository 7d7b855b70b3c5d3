//! Bounded per-symbol price and volume history

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct PriceHistory {
    window: VecDeque<(f64, f64)>,
    capacity: usize,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        PriceHistory {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Appends a sample, dropping the oldest once full.
    pub fn push(&mut self, price: f64, volume: f64) {
        self.window.push_back((price, volume));
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn prices(&self) -> Vec<f64> {
        self.window.iter().map(|(price, _)| *price).collect()
    }

    /// Oldest first.
    pub fn volumes(&self) -> Vec<f64> {
        self.window.iter().map(|(_, volume)| *volume).collect()
    }

    pub fn last_price(&self) -> Option<f64> {
        self.window.back().map(|(price, _)| *price)
    }
}

/// Mean of the `window` values ending `offset` samples before the last one.
pub fn trailing_mean(values: &[f64], window: usize, offset: usize) -> Option<f64> {
    if window == 0 || values.len() < window + offset {
        return None;
    }
    let end = values.len() - offset;
    let slice = &values[end - window..end];
    Some(slice.iter().sum::<f64>() / window as f64)
}
