//! Weekly availability budgets and the mutable capacity buckets derived
//! from them at solver start.

use serde::{Deserialize, Serialize};

use crate::models::user::UserId;
use crate::models::visit::PartOfDay;

/// Weekly budget per researcher. `(user_id, week)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWeek {
    pub user_id: UserId,
    pub week: u32,
    pub morning_days: u32,
    pub daytime_days: u32,
    pub nighttime_days: u32,
    pub flex_days: u32,
}

impl AvailabilityWeek {
    pub fn total_days(&self) -> u32 {
        self.morning_days + self.daytime_days + self.nighttime_days + self.flex_days
    }
}

/// Per-researcher capacity counters consumed during a weekly planning run.
///
/// Availability rows are copied into these buckets at solver start;
/// mutations stay local to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityBuckets {
    pub morning: u32,
    pub daytime: u32,
    pub evening: u32,
    pub flex: u32,
}

impl CapacityBuckets {
    pub fn from_availability(aw: &AvailabilityWeek) -> Self {
        Self {
            morning: aw.morning_days,
            daytime: aw.daytime_days,
            evening: aw.nighttime_days,
            flex: aw.flex_days,
        }
    }

    pub fn total(&self) -> u32 {
        self.morning + self.daytime + self.evening + self.flex
    }

    pub fn dedicated(&self, part: PartOfDay) -> u32 {
        match part {
            PartOfDay::Ochtend => self.morning,
            PartOfDay::Dag => self.daytime,
            PartOfDay::Avond => self.evening,
        }
    }

    /// One slot available for the part, dedicated or flex.
    pub fn has_slot(&self, part: PartOfDay) -> bool {
        self.dedicated(part) > 0 || self.flex > 0
    }

    /// Consume one slot for the part, preferring dedicated capacity and
    /// falling back to flex. Returns false (and leaves the buckets
    /// untouched) when neither is available.
    pub fn consume(&mut self, part: PartOfDay) -> bool {
        let dedicated = match part {
            PartOfDay::Ochtend => &mut self.morning,
            PartOfDay::Dag => &mut self.daytime,
            PartOfDay::Avond => &mut self.evening,
        };
        if *dedicated > 0 {
            *dedicated -= 1;
            return true;
        }
        if self.flex > 0 {
            self.flex -= 1;
            return true;
        }
        false
    }
}
