//! Debounced bus-status filter.
//!
//! Error counters can bounce a controller between states on every sample;
//! the filter only moves once the same level has been observed on
//! `threshold` consecutive samples.
use crate::core::BusStatus;
use crate::infra::driver::HwStatus;

#[derive(Debug, Clone, Copy)]
pub struct BusStatusFilter {
    current: BusStatus,
    candidate: BusStatus,
    streak: u8,
    threshold: u8,
}

impl BusStatusFilter {
    pub fn new(threshold: u8) -> Self {
        Self {
            current: BusStatus::Ok,
            candidate: BusStatus::Ok,
            streak: 0,
            threshold: threshold.max(1),
        }
    }

    /// Maps a raw hardware state to the three-level status.
    /// `Invalid` carries no information.
    pub fn level(raw: HwStatus) -> Option<BusStatus> {
        match raw {
            HwStatus::Ok => Some(BusStatus::Ok),
            HwStatus::Warning | HwStatus::Error => Some(BusStatus::Warning),
            HwStatus::BusOff => Some(BusStatus::BusOff),
            HwStatus::Invalid => None,
        }
    }

    /// Worst of the two directions.
    pub fn worst(tx: HwStatus, rx: HwStatus) -> HwStatus {
        match (tx, rx) {
            (HwStatus::Invalid, other) | (other, HwStatus::Invalid) => other,
            (a, b) if u8::from(a) >= u8::from(b) => a,
            (_, b) => b,
        }
    }

    /// Feeds one sample and returns the filtered status.
    pub fn sample(&mut self, raw: HwStatus) -> BusStatus {
        let Some(level) = Self::level(raw) else {
            return self.current;
        };
        if level == self.current {
            self.candidate = level;
            self.streak = 0;
            return self.current;
        }
        if level == self.candidate {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.candidate = level;
            self.streak = 1;
        }
        if self.streak >= self.threshold {
            self.current = level;
            self.streak = 0;
        }
        self.current
    }

    pub fn current(&self) -> BusStatus {
        self.current
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.threshold);
    }
}
