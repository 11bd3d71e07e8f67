//! Display bucket derived from a supported rating for reference-card styling.

use rating_engine::ratings::Rating;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SeverityBucket {
    None,
    Low,
    Moderate,
    High,
    Total,
}

impl SeverityBucket {
    /// Ranges use their upper bound. Named ratings have no numeric severity.
    pub(crate) fn from_rating(rating: &Rating) -> Self {
        match rating.upper_percent() {
            None | Some(0) => Self::None,
            Some(1..=30) => Self::Low,
            Some(31..=60) => Self::Moderate,
            Some(61..=99) => Self::High,
            Some(_) => Self::Total,
        }
    }

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Total => "total",
        }
    }
}

impl fmt::Display for SeverityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rating_engine::ratings::NamedRating;

    #[test]
    fn buckets_follow_the_rating_percent() {
        assert_eq!(SeverityBucket::from_rating(&Rating::Unrated), SeverityBucket::None);
        assert_eq!(SeverityBucket::from_rating(&Rating::Exact(0)), SeverityBucket::None);
        assert_eq!(SeverityBucket::from_rating(&Rating::Exact(10)), SeverityBucket::Low);
        assert_eq!(SeverityBucket::from_rating(&Rating::Exact(60)), SeverityBucket::Moderate);
        assert_eq!(SeverityBucket::from_rating(&Rating::Exact(80)), SeverityBucket::High);
        assert_eq!(SeverityBucket::from_rating(&Rating::Exact(100)), SeverityBucket::Total);
    }

    #[test]
    fn ranges_use_their_upper_bound() {
        let range = Rating::Range { low: 10, high: 40 };

        assert_eq!(SeverityBucket::from_rating(&range), SeverityBucket::Moderate);
    }

    #[test]
    fn named_ratings_have_no_severity() {
        let varies = Rating::Named(NamedRating::Varies);

        assert_eq!(SeverityBucket::from_rating(&varies).to_string(), "none");
    }
}
