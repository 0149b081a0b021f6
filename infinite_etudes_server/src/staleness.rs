// Freshness classification of cached artifacts.

use std::time::{Duration, SystemTime};

use crate::store::ArtifactMetadata;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Missing,
}

#[derive(Clone, Copy, Debug)]
pub struct StalenessPolicy {
    max_age: Duration,
}

impl StalenessPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    /// An artifact exactly `max_age` old is already stale. A modification
    /// time later than `now` (clock skew) counts as age zero.
    pub fn classify(&self, meta: Option<&ArtifactMetadata>, now: SystemTime) -> Freshness {
        let Some(meta) = meta else {
            return Freshness::Missing;
        };
        let age = now.duration_since(meta.modified).unwrap_or(Duration::ZERO);
        if age >= self.max_age {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_aged(now: SystemTime, age: Duration) -> ArtifactMetadata {
        ArtifactMetadata {
            modified: now - age,
            len: 100,
        }
    }

    #[test]
    fn absent_is_missing() {
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        assert_eq!(policy.classify(None, SystemTime::now()), Freshness::Missing);
    }

    #[test]
    fn younger_than_max_age_is_fresh() {
        let now = SystemTime::now();
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        let meta = meta_aged(now, Duration::from_secs(59));
        assert_eq!(policy.classify(Some(&meta), now), Freshness::Fresh);
    }

    #[test]
    fn exactly_max_age_is_stale() {
        let now = SystemTime::now();
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        let meta = meta_aged(now, Duration::from_secs(60));
        assert_eq!(policy.classify(Some(&meta), now), Freshness::Stale);
    }

    #[test]
    fn older_is_stale() {
        let now = SystemTime::now();
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        let meta = meta_aged(now, Duration::from_secs(3600));
        assert_eq!(policy.classify(Some(&meta), now), Freshness::Stale);
    }

    #[test]
    fn future_mtime_is_fresh() {
        let now = SystemTime::now();
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        let meta = ArtifactMetadata {
            modified: now + Duration::from_secs(30),
            len: 100,
        };
        assert_eq!(policy.classify(Some(&meta), now), Freshness::Fresh);
    }

    #[test]
    fn zero_max_age_makes_everything_stale() {
        let now = SystemTime::now();
        let policy = StalenessPolicy::new(Duration::ZERO);
        let meta = meta_aged(now, Duration::ZERO);
        assert_eq!(policy.classify(Some(&meta), now), Freshness::Stale);
    }
}
