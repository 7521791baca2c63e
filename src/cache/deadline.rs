//! Deadline Module
//!
//! Expiration policies for cache entries: a fixed point in time or a
//! duration relative to "now".
//!
//! Every query resolves against the wall clock at the moment it is made.
//! A relative deadline resolved twice yields two different instants, and
//! entry validity follows any adjustment of the system clock.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, TimeDelta, Utc};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3600;

// == Deadline ==
/// When a cache entry stops being valid.
///
/// Equality, hashing and ordering all go through [`Deadline::seconds_until`]
/// evaluated at call time. Two deadlines with different stored values compare
/// equal while they are momentarily the same distance from now, and the
/// answer may change as the clock advances.
#[derive(Debug, Clone, Copy)]
pub enum Deadline {
    /// A fixed point in time
    At(DateTime<Utc>),
    /// Seconds from the moment of resolution
    InSeconds(i64),
    /// Minutes from the moment of resolution
    InMinutes(i64),
    /// Hours from the moment of resolution
    InHours(i64),
}

impl Deadline {
    pub fn at(date: DateTime<Utc>) -> Self {
        Deadline::At(date)
    }

    pub fn in_seconds(seconds: i64) -> Self {
        Deadline::InSeconds(seconds)
    }

    pub fn in_minutes(minutes: i64) -> Self {
        Deadline::InMinutes(minutes)
    }

    pub fn in_hours(hours: i64) -> Self {
        Deadline::InHours(hours)
    }

    // == Resolve ==
    /// Resolves the deadline to an absolute instant relative to now.
    pub fn resolve(&self) -> DateTime<Utc> {
        match *self {
            Deadline::At(date) => date,
            Deadline::InSeconds(seconds) => from_now(seconds),
            Deadline::InMinutes(minutes) => from_now(minutes.saturating_mul(SECONDS_PER_MINUTE)),
            Deadline::InHours(hours) => from_now(hours.saturating_mul(SECONDS_PER_HOUR)),
        }
    }

    // == Distance From Now ==
    /// Whole seconds from now until the resolved instant, rounded to nearest.
    /// Negative once the instant has passed.
    pub fn seconds_until(&self) -> i64 {
        let delta = self.resolve().signed_duration_since(Utc::now());
        match delta.num_microseconds() {
            Some(micros) => (micros as f64 / 1_000_000.0).round() as i64,
            None => delta.num_seconds(),
        }
    }

    pub fn minutes_until(&self) -> i64 {
        self.seconds_until() / SECONDS_PER_MINUTE
    }

    pub fn hours_until(&self) -> i64 {
        self.seconds_until() / SECONDS_PER_HOUR
    }

    // == Combine ==
    /// Extends this deadline by `other`, keeping this deadline's variant.
    ///
    /// Relative variants add `other`'s distance from now in their own unit.
    /// `At` ignores `other` and shifts its date forward by its own
    /// `seconds_until`.
    pub fn and(&self, other: &Deadline) -> Deadline {
        match *self {
            Deadline::At(date) => Deadline::At(shift(date, self.seconds_until())),
            Deadline::InSeconds(seconds) => {
                Deadline::InSeconds(seconds.saturating_add(other.seconds_until()))
            }
            Deadline::InMinutes(minutes) => {
                Deadline::InMinutes(minutes.saturating_add(other.minutes_until()))
            }
            Deadline::InHours(hours) => Deadline::InHours(hours.saturating_add(other.hours_until())),
        }
    }

    // == Bump ==
    /// Renews this deadline by `other`.
    ///
    /// `other` is first realized as `At(other.resolve())`, and that instant's
    /// distance from now is added on top of this deadline's own amount. A
    /// relative deadline bumped by itself therefore ends up at twice its span.
    pub fn bump(&self, other: &Deadline) -> Deadline {
        let anchor = Deadline::At(other.resolve());
        match *self {
            Deadline::At(date) => Deadline::At(shift(date, self.seconds_until())),
            Deadline::InSeconds(seconds) => {
                Deadline::InSeconds(seconds.saturating_add(anchor.seconds_until()))
            }
            Deadline::InMinutes(minutes) => {
                Deadline::InMinutes(minutes.saturating_add(anchor.minutes_until()))
            }
            Deadline::InHours(hours) => {
                Deadline::InHours(hours.saturating_add(anchor.hours_until()))
            }
        }
    }
}

// == Time Helpers ==
fn shift(date: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    let delta = TimeDelta::try_seconds(seconds).unwrap_or(if seconds < 0 {
        TimeDelta::MIN
    } else {
        TimeDelta::MAX
    });
    date.checked_add_signed(delta).unwrap_or(if seconds < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

fn from_now(seconds: i64) -> DateTime<Utc> {
    shift(Utc::now(), seconds)
}

// == Time-Relative Comparison ==
impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.seconds_until() == other.seconds_until()
    }
}

impl Eq for Deadline {}

impl Hash for Deadline {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.seconds_until().hash(state);
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds_until().cmp(&other.seconds_until())
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Deadline::At(date) => write!(f, "Expires on {}", date),
            Deadline::InSeconds(n) => write!(f, "Expires in {} seconds on {}", n, self.resolve()),
            Deadline::InMinutes(n) => write!(f, "Expires in {} minutes on {}", n, self.resolve()),
            Deadline::InHours(n) => write!(f, "Expires in {} hours on {}", n, self.resolve()),
        }
    }
}
