use chrono::{DateTime, Utc};
use std::fmt;

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Result of evaluating an access window at a point in time
///
/// Pure value: evaluating is free of I/O and can be repeated every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlement {
    /// `None` when there is no valid grant (missing duration or anchor)
    remaining_seconds: Option<i64>,
}

impl Entitlement {
    /// Evaluate `duration_secs` counted from `anchor` at `now`
    ///
    /// A missing (or zero) duration or a missing anchor means no grant,
    /// never unlimited access. An anchor in the future yields negative
    /// elapsed time and is not clamped.
    pub fn evaluate(
        duration_secs: Option<i64>,
        anchor: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let remaining_seconds = match (duration_secs, anchor) {
            (Some(duration), Some(anchor)) if duration != 0 => {
                let elapsed = (now - anchor).num_seconds();
                Some(duration - elapsed)
            }
            _ => None,
        };

        Self { remaining_seconds }
    }

    pub fn is_expired(&self) -> bool {
        match self.remaining_seconds {
            Some(remaining) => remaining <= 0,
            None => true,
        }
    }

    /// Remaining seconds, floored at zero
    pub fn remaining_seconds(&self) -> i64 {
        self.remaining_seconds.unwrap_or(0).max(0)
    }

    /// Remaining days, rounded up, never negative
    pub fn remaining_days(&self) -> i64 {
        let remaining = self.remaining_seconds();
        if remaining == 0 {
            0
        } else {
            (remaining + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
        }
    }

    /// Human-readable remaining time
    pub fn describe(&self) -> String {
        if self.is_expired() {
            return "Expirado".to_string();
        }

        let remaining = self.remaining_seconds();
        let days = remaining / SECONDS_PER_DAY;
        let hours = (remaining % SECONDS_PER_DAY) / 3600;
        let minutes = (remaining % 3600) / 60;

        if days > 0 {
            format!("{} {} de acesso", days, if days == 1 { "dia" } else { "dias" })
        } else {
            format!("{}h {}min de acesso", hours, minutes)
        }
    }
}

impl fmt::Display for Entitlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
