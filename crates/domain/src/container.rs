use chrono::{DateTime, Duration, Utc};
use formyard_core::{AppError, AppResult, ContainerId, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Maximum number of entries a caller may own in a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryLimit {
    /// No limit.
    #[default]
    Unlimited,
    /// At most the given number of entries.
    AtMost(u32),
}

impl EntryLimit {
    /// Resolves the stored value, where any negative number means unlimited.
    #[must_use]
    pub fn from_storage(value: i32) -> Self {
        u32::try_from(value).map_or(Self::Unlimited, Self::AtMost)
    }

    /// Returns the stored value.
    #[must_use]
    pub fn to_storage(self) -> i32 {
        match self {
            Self::Unlimited => -1,
            Self::AtMost(limit) => i32::try_from(limit).unwrap_or(i32::MAX),
        }
    }
}

/// Repeating submission window used to count entries toward the quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInterval {
    starts_at: DateTime<Utc>,
    length_seconds: i64,
    count: u32,
}

impl EntryInterval {
    /// Creates a validated interval.
    pub fn new(starts_at: DateTime<Utc>, length_seconds: i64, count: u32) -> AppResult<Self> {
        if length_seconds <= 0 {
            return Err(AppError::Validation(
                "entry interval length must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            starts_at,
            length_seconds,
            count,
        })
    }

    /// Returns the first interval start.
    #[must_use]
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    /// Returns the interval length in seconds.
    #[must_use]
    pub fn length_seconds(&self) -> i64 {
        self.length_seconds
    }

    /// Returns the number of repetitions.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the start of the interval `now` falls in.
    ///
    /// Only repeating intervals restrict quota counting. Before the first
    /// interval starts, or after the last one ends, the last known boundary
    /// is used.
    #[must_use]
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.count <= 1 {
            return None;
        }

        if now <= self.starts_at {
            return Some(self.starts_at);
        }

        let elapsed = (now - self.starts_at).num_seconds();
        let index = (elapsed / self.length_seconds).min(i64::from(self.count) - 1);
        Some(self.starts_at + Duration::seconds(index * self.length_seconds))
    }
}

/// Settings of a form container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSettings {
    id: ContainerId,
    name: NonEmptyString,
    approval_required: bool,
    max_entries: EntryLimit,
    interval: Option<EntryInterval>,
}

impl ContainerSettings {
    /// Creates validated container settings.
    pub fn new(
        id: ContainerId,
        name: impl Into<String>,
        approval_required: bool,
        max_entries: EntryLimit,
        interval: Option<EntryInterval>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            approval_required,
            max_entries,
            interval,
        })
    }

    /// Returns the container identifier.
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns whether entries require approval before others see them.
    #[must_use]
    pub fn approval_required(&self) -> bool {
        self.approval_required
    }

    /// Returns the per-caller entry limit.
    #[must_use]
    pub fn max_entries(&self) -> EntryLimit {
        self.max_entries
    }

    /// Returns the quota counting interval.
    #[must_use]
    pub fn interval(&self) -> Option<&EntryInterval> {
        self.interval.as_ref()
    }

    /// Returns the earliest creation time that counts toward the quota.
    #[must_use]
    pub fn quota_window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.interval.and_then(|interval| interval.window_start(now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{EntryInterval, EntryLimit};

    #[test]
    fn negative_limit_means_unlimited() {
        assert_eq!(EntryLimit::from_storage(-1), EntryLimit::Unlimited);
        assert_eq!(EntryLimit::from_storage(3), EntryLimit::AtMost(3));
        assert_eq!(EntryLimit::Unlimited.to_storage(), -1);
    }

    #[test]
    fn window_start_tracks_current_interval() {
        let starts_at = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(|| unreachable!());
        let interval = EntryInterval::new(starts_at, 86_400, 7).unwrap_or_else(|_| unreachable!());

        let now = starts_at + Duration::hours(50);
        assert_eq!(
            interval.window_start(now),
            Some(starts_at + Duration::days(2))
        );

        let after_last = starts_at + Duration::days(30);
        assert_eq!(
            interval.window_start(after_last),
            Some(starts_at + Duration::days(6))
        );
    }

    #[test]
    fn single_interval_does_not_restrict_counting() {
        let interval =
            EntryInterval::new(Utc::now(), 60, 1).unwrap_or_else(|_| unreachable!());
        assert_eq!(interval.window_start(Utc::now()), None);
    }
}
