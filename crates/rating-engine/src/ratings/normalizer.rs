use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Rating as it arrives from callers or registry documents, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRating {
    Integer(i64),
    Text(String),
}

impl From<i64> for RawRating {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for RawRating {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Named sentinels used by schedules whose percentage is not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedRating {
    Varies,
    Flat,
    RequiresEvaluation,
}

impl NamedRating {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Varies => "varies",
            Self::Flat => "flat",
            Self::RequiresEvaluation => "requires-evaluation",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().replace([' ', '_'], "-").as_str() {
            "varies" => Some(Self::Varies),
            "flat" => Some(Self::Flat),
            "requires-evaluation" => Some(Self::RequiresEvaluation),
            _ => None,
        }
    }
}

/// Canonical, comparable rating value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "Option<RawRating>")]
pub enum Rating {
    Unrated,
    Exact(u8),
    Range { low: u8, high: u8 },
    Named(NamedRating),
}

impl Rating {
    /// Highest percentage the rating can stand for; drives severity ordering.
    pub fn upper_percent(&self) -> Option<u8> {
        match self {
            Rating::Exact(percent) => Some(*percent),
            Rating::Range { high, .. } => Some(*high),
            Rating::Unrated | Rating::Named(_) => None,
        }
    }

    pub fn is_unrated(&self) -> bool {
        matches!(self, Rating::Unrated)
    }

    /// Human label such as `60%`, `10-30%`, or `varies`.
    pub fn label(&self) -> String {
        match self {
            Rating::Unrated => "unrated".to_string(),
            Rating::Exact(percent) => format!("{percent}%"),
            Rating::Range { low, high } => format!("{low}-{high}%"),
            Rating::Named(named) => named.label().to_string(),
        }
    }

    /// Raw form that normalizes back to this exact value.
    pub fn to_raw(&self) -> Option<RawRating> {
        match self {
            Rating::Unrated => None,
            Rating::Exact(percent) => Some(RawRating::Integer(i64::from(*percent))),
            Rating::Range { low, high } => Some(RawRating::Text(format!("{low}-{high}"))),
            Rating::Named(named) => Some(RawRating::Text(named.label().to_string())),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_raw() {
            None => write!(f, "null"),
            Some(RawRating::Integer(value)) => write!(f, "{value}"),
            Some(RawRating::Text(value)) => write!(f, "{value}"),
        }
    }
}

impl Serialize for Rating {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_raw().serialize(serializer)
    }
}

impl TryFrom<Option<RawRating>> for Rating {
    type Error = ParseError;

    fn try_from(value: Option<RawRating>) -> Result<Self, Self::Error> {
        normalize_rating(value.as_ref())
    }
}

/// Malformed rating input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("rating '{0}' is not a number, percentage, range, or known sentinel")]
    Malformed(String),
    #[error("rating '{0}' falls outside 0-100")]
    OutOfRange(String),
    #[error("rating range {low}-{high} has its bounds reversed")]
    InvertedRange { low: u8, high: u8 },
}

/// Coerce any accepted rating representation into its canonical form.
///
/// Absent input and blank strings are `Unrated`. Accepted strings are `N`, `N%`,
/// `N-M` (inclusive, either side may carry `%`) and the named sentinels.
pub fn normalize_rating(raw: Option<&RawRating>) -> Result<Rating, ParseError> {
    match raw {
        None => Ok(Rating::Unrated),
        Some(RawRating::Integer(value)) => percent_from_i64(*value).map(Rating::Exact),
        Some(RawRating::Text(text)) => normalize_text(text),
    }
}

/// True when `candidate` covers the scalar tier percentage.
pub fn rating_satisfies_tier(candidate: &Rating, tier_percent: u8) -> bool {
    match candidate {
        Rating::Exact(percent) => *percent == tier_percent,
        Rating::Range { low, high } => (*low..=*high).contains(&tier_percent),
        Rating::Unrated | Rating::Named(_) => false,
    }
}

fn normalize_text(text: &str) -> Result<Rating, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Rating::Unrated);
    }

    if let Some(named) = NamedRating::parse(trimmed) {
        return Ok(Rating::Named(named));
    }

    match trimmed.split_once('-') {
        Some((low, high)) => {
            let low = parse_percent(low, trimmed)?;
            let high = parse_percent(high, trimmed)?;
            match low.cmp(&high) {
                std::cmp::Ordering::Less => Ok(Rating::Range { low, high }),
                std::cmp::Ordering::Equal => Ok(Rating::Exact(low)),
                std::cmp::Ordering::Greater => Err(ParseError::InvertedRange { low, high }),
            }
        }
        None => parse_percent(trimmed, trimmed).map(Rating::Exact),
    }
}

fn parse_percent(part: &str, original: &str) -> Result<u8, ParseError> {
    let digits = part.trim();
    let digits = digits.strip_suffix('%').unwrap_or(digits).trim_end();

    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ParseError::Malformed(original.to_string()));
    }

    let trimmed = digits.trim_start_matches('0');
    if trimmed.len() > 3 {
        return Err(ParseError::OutOfRange(original.to_string()));
    }

    let value = trimmed.parse::<u16>().unwrap_or(0);
    u8::try_from(value)
        .ok()
        .filter(|percent| *percent <= 100)
        .ok_or_else(|| ParseError::OutOfRange(original.to_string()))
}

fn percent_from_i64(value: i64) -> Result<u8, ParseError> {
    u8::try_from(value)
        .ok()
        .filter(|percent| *percent <= 100)
        .ok_or_else(|| ParseError::OutOfRange(value.to_string()))
}
