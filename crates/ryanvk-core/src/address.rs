//! Structured target addresses and the patterns that match them.
//!
//! An [`Address`] is an ordered chain of `(key, value)` segments such as
//! `land(qq).group(123).member(456)`. An [`AddressPattern`] is written in the
//! same dotted form; a segment without parentheses, or with `(*)`, matches any
//! value.

use std::fmt;

use crate::error::{OverloadError, OverloadResult};

/// The segment name that patterns may leave out.
const LAND: &str = "land";

/// An ordered chain of `(key, value)` segments identifying a chat target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address {
    segments: Vec<(String, String)>,
}

impl Address {
    /// Creates an empty address.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this address with `key` set to `value`.
    ///
    /// An existing key keeps its position and only changes value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.segments.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.segments.push((key, value)),
        }
        self
    }

    /// Value of the segment named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The last segment, usually the most specific one.
    pub fn last(&self) -> Option<(&str, &str)> {
        self.segments.last().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates over the segments in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.segments.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment keys joined by `.`, e.g. `land.group.member`.
    pub fn path(&self) -> String {
        self.segments
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Parses `pattern` and checks whether this address matches it.
    pub fn follows(&self, pattern: &str) -> OverloadResult<bool> {
        Ok(AddressPattern::parse(pattern)?.matches(self))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{k}({v})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PatternSegment {
    name: String,
    /// `None` matches any value.
    value: Option<String>,
}

/// A dotted address pattern such as `land(qq).group(*).member`.
///
/// Matching requires the address path to equal the pattern path exactly. The
/// `land` segment of the address is ignored unless the pattern names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressPattern {
    segments: Vec<PatternSegment>,
}

impl AddressPattern {
    /// Parses a dotted pattern.
    ///
    /// Parentheses may nest; only the outermost pair delimits the value.
    pub fn parse(pattern: &str) -> OverloadResult<Self> {
        let invalid = |reason| OverloadError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason,
        };

        let mut segments: Vec<PatternSegment> = Vec::new();
        let mut depth = 0usize;
        // a value bracket was closed in the current segment
        let mut closed = false;
        let mut name = String::new();
        let mut value = String::new();

        let mut push = |name: &mut String, value: &mut String| {
            if name.is_empty() {
                return Err(invalid("empty segment name"));
            }
            if segments.iter().any(|s| s.name == *name) {
                return Err(invalid("repeated segment"));
            }
            let taken = std::mem::take(value);
            segments.push(PatternSegment {
                name: std::mem::take(name),
                value: (!taken.is_empty() && taken != "*").then_some(taken),
            });
            Ok(())
        };

        for ch in pattern.chars() {
            match ch {
                '.' if depth == 0 => {
                    push(&mut name, &mut value)?;
                    closed = false;
                }
                _ if depth == 0 && closed => return Err(invalid("text after closing bracket")),
                '(' => {
                    if depth > 0 {
                        value.push(ch);
                    }
                    depth += 1;
                }
                ')' => {
                    if depth == 0 {
                        return Err(invalid("unmatched closing bracket"));
                    }
                    depth -= 1;
                    if depth > 0 {
                        value.push(ch);
                    } else {
                        closed = true;
                    }
                }
                _ if depth > 0 => value.push(ch),
                _ => name.push(ch),
            }
        }
        if depth > 0 {
            return Err(invalid("unclosed bracket"));
        }
        push(&mut name, &mut value)?;

        Ok(Self { segments })
    }

    /// Whether `address` follows this pattern.
    pub fn matches(&self, address: &Address) -> bool {
        let mentions_land = self.segments.iter().any(|s| s.name == LAND);
        let mut keys = address
            .iter()
            .filter(|(k, _)| mentions_land || *k != LAND)
            .map(|(k, _)| k);

        for segment in &self.segments {
            if keys.next() != Some(segment.name.as_str()) {
                return false;
            }
        }
        if keys.next().is_some() {
            return false;
        }

        self.segments.iter().all(|s| match &s.value {
            None => true,
            Some(expected) => address.get(&s.name) == Some(expected.as_str()),
        })
    }

    /// Number of segments pinned to a literal value.
    ///
    /// Overload buckets are searched from the most specific pattern down.
    pub fn specificity(&self) -> usize {
        self.segments.iter().filter(|s| s.value.is_some()).count()
    }
}

impl fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match &s.value {
                Some(v) => write!(f, "{}({v})", s.name)?,
                None => write!(f, "{}(*)", s.name)?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for AddressPattern {
    type Err = OverloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> Address {
        Address::new()
            .with("land", "qq")
            .with("group", "123")
            .with("member", "456")
    }

    #[test]
    fn land_is_optional_unless_named() {
        let addr = member();
        assert!(addr.follows("group.member").unwrap());
        assert!(addr.follows("group(123).member(*)").unwrap());
        assert!(addr.follows("land(qq).group.member").unwrap());
        assert!(!addr.follows("land(telegram).group.member").unwrap());
    }

    #[test]
    fn path_must_match_exactly() {
        let addr = member();
        assert!(!addr.follows("group").unwrap());
        assert!(!addr.follows("group.member.extra").unwrap());
        assert!(!addr.follows("friend.member").unwrap());
        assert!(!addr.follows("group(999).member").unwrap());
    }

    #[test]
    fn nested_brackets_stay_in_value() {
        let addr = Address::new().with("file", "a(1).txt");
        assert!(addr.follows("file(a(1).txt)").unwrap());
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for bad in [
            "",
            "group(1",
            "group)1(",
            "group..member",
            ".group",
            "a.a",
            "group(1)member",
            "group(1)(2).member",
        ] {
            assert!(
                matches!(
                    AddressPattern::parse(bad),
                    Err(OverloadError::InvalidPattern { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn trailing_text_after_value_is_named_in_the_error() {
        assert_eq!(
            AddressPattern::parse("group(1)member"),
            Err(OverloadError::InvalidPattern {
                pattern: "group(1)member".to_owned(),
                reason: "text after closing bracket",
            })
        );
        // the next segment may follow the bracket directly
        assert!(AddressPattern::parse("group(1).member(2)").is_ok());
    }

    #[test]
    fn specificity_counts_literals() {
        let p = AddressPattern::parse("land(qq).group(*).member(1)").unwrap();
        assert_eq!(p.specificity(), 2);
        assert_eq!(p.to_string(), "land(qq).group(*).member(1)");
    }

    #[test]
    fn with_keeps_position() {
        let addr = member().with("group", "789");
        assert_eq!(addr.path(), "land.group.member");
        assert_eq!(addr.get("group"), Some("789"));
        assert_eq!(addr.to_string(), "land(qq).group(789).member(456)");
        assert_eq!(addr.last(), Some(("member", "456")));
    }
}
