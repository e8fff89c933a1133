// std
use std::sync::atomic::{AtomicU32, Ordering};
// vcm
use crate::core::vcm::Float;

/// Float with a race-free `add`, stored as raw bits so a compare-exchange
/// loop can implement the read-modify-write.
#[derive(Debug, Default)]
pub struct AtomicFloat {
    bits: AtomicU32,
}

impl AtomicFloat {
    pub fn new(v: Float) -> Self {
        AtomicFloat {
            bits: AtomicU32::new(v.to_bits()),
        }
    }
    pub fn load(&self) -> Float {
        Float::from_bits(self.bits.load(Ordering::Relaxed))
    }
    pub fn store(&self, v: Float) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }
    pub fn add(&self, v: Float) {
        let mut old_bits = self.bits.load(Ordering::Relaxed);
        loop {
            let new_bits = (Float::from_bits(old_bits) + v).to_bits();
            match self.bits.compare_exchange_weak(
                old_bits,
                new_bits,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => old_bits = current,
            }
        }
    }
}

impl From<&AtomicFloat> for Float {
    fn from(a: &AtomicFloat) -> Float {
        a.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_adds_accumulate() {
        let f = AtomicFloat::new(0.0);
        crossbeam::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|_| {
                    for _ in 0..1000 {
                        f.add(0.25);
                    }
                });
            }
        })
        .unwrap();
        assert_eq!(f.load(), 1000.0);
    }
}
