//! Score decay multipliers
//!
//! Both multipliers live in (0, 1] and never reach zero, so a strong interest
//! match can still lift old content.
//!
//! - Time decay: `floor + (1 - floor) * 0.5^(age_h / half_life_h)`
//! - Engagement decay: `max(floor, 1 / (1 + ln(1 + base) * age_days * rate))`,
//!   which discounts old-but-once-popular drops harder the more engagement
//!   they banked.

use chrono::{DateTime, Utc};

use crate::config::RankingPolicy;

#[derive(Debug, Clone, Copy)]
pub struct DecayCalculator {
    half_life_hours: f64,
    time_floor: f64,
    engagement_rate_per_day: f64,
    engagement_floor: f64,
}

impl DecayCalculator {
    pub fn new(policy: &RankingPolicy) -> Self {
        Self {
            half_life_hours: policy.time_decay_half_life_hours,
            time_floor: policy.time_decay_floor,
            engagement_rate_per_day: policy.engagement_decay_rate_per_day,
            engagement_floor: policy.engagement_decay_floor,
        }
    }

    pub fn time_decay(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_hours = age_hours(created_at, now);
        let fresh = 0.5_f64.powf(age_hours / self.half_life_hours);
        self.time_floor + (1.0 - self.time_floor) * fresh
    }

    pub fn engagement_decay(
        &self,
        base_engagement: f64,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f64 {
        let age_days = age_hours(created_at, now) / 24.0;
        let banked = (1.0 + base_engagement.max(0.0)).ln();
        let decay = 1.0 / (1.0 + banked * age_days * self.engagement_rate_per_day);
        decay.max(self.engagement_floor).min(1.0)
    }
}

// Future timestamps (clock skew between writers) count as brand new.
fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - created_at).num_milliseconds().max(0);
    millis as f64 / 3_600_000.0
}
