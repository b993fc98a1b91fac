use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::{Key, Literal, ParamScope, Probe, Selection, TwinSet, TypeKey};
use crate::address::AddressPattern;
use crate::error::{OverloadError, OverloadResult};

/// Maps a parameter name and call value to the tag it is registered under.
///
/// `None` means the value carries no known tag and matches nothing.
pub type Predicate = Arc<dyn Fn(&str, &dyn Any) -> Option<Literal> + Send + Sync>;

/// How one dimension of a capability indexes its implementations.
#[derive(Clone)]
pub enum Strategy {
    /// Keyed by a hashable literal, matched by equality.
    Exact,
    /// Keyed by the runtime type of the argument.
    Type,
    /// Keyed by a literal tag computed from the argument by a predicate.
    PredicateTag(Predicate),
    /// Keyed by an address pattern, matched with [`AddressPattern::matches`].
    PatternAddress,
    /// Wraps another strategy and also accepts an absent argument.
    Optional(Box<Strategy>),
    /// A single slot that every call resolves to.
    Singleton,
}

impl Strategy {
    /// A [`Strategy::PredicateTag`] from a closure.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str, &dyn Any) -> Option<Literal> + Send + Sync + 'static,
    {
        Self::PredicateTag(Arc::new(predicate))
    }

    pub fn optional(inner: Strategy) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Type => "type",
            Self::PredicateTag(_) => "predicate",
            Self::PatternAddress => "pattern",
            Self::Optional(_) => "optional",
            Self::Singleton => "singleton",
        }
    }

    /// Turns a registration selector into the key stored in the scope.
    pub fn digest(&self, param: &'static str, selection: &Selection) -> OverloadResult<Key> {
        let mismatch = || OverloadError::SelectorMismatch {
            strategy: self.name(),
            selection: selection.kind(),
            param,
        };

        match (self, selection) {
            (Self::Singleton, _) => Ok(Key::Singleton),
            (Self::Optional(_), Selection::Absent) => Ok(Key::Absent),
            (Self::Optional(inner), _) => inner.digest(param, selection),
            (Self::Exact | Self::PredicateTag(_), Selection::Literal(l)) => {
                Ok(Key::Literal(l.clone()))
            }
            (Self::Type, Selection::Type(t)) => Ok(Key::Type(*t)),
            (Self::PatternAddress, Selection::Pattern(p)) => {
                Ok(Key::Pattern(AddressPattern::parse(p)?))
            }
            // plain strings double as patterns
            (Self::PatternAddress, Selection::Literal(Literal::Str(p))) => {
                Ok(Key::Pattern(AddressPattern::parse(p)?))
            }
            _ => Err(mismatch()),
        }
    }

    /// The bucket a twin registered under `key` belongs in.
    pub fn collect<'s>(&self, scope: &'s mut ParamScope, key: Key) -> &'s mut TwinSet {
        let key = match self {
            Self::Singleton => Key::Singleton,
            _ => key,
        };
        scope.entry(key).or_default()
    }

    /// The twins of `scope` that accept `probe`.
    ///
    /// A probe kind the strategy cannot interpret matches nothing.
    pub fn harvest<'s>(
        &self,
        param: &str,
        scope: &'s ParamScope,
        probe: &Probe<'_>,
    ) -> Cow<'s, TwinSet> {
        let found = match (self, probe) {
            (Self::Singleton, _) => scope.get(&Key::Singleton),
            (Self::Optional(_), Probe::Absent) => scope.get(&Key::Absent),
            (Self::Optional(inner), _) => return inner.harvest(param, scope, probe),
            (Self::Exact, Probe::Literal(l)) => scope.get(&Key::Literal(l.clone())),
            (Self::Type, Probe::Value(v)) => {
                scope.get(&Key::Type(TypeKey::from_id((**v).type_id())))
            }
            (Self::PredicateTag(predicate), _) => probe
                .as_any()
                .and_then(|value| predicate(param, value))
                .and_then(|tag| scope.get(&Key::Literal(tag))),
            (Self::PatternAddress, Probe::Address(address)) => {
                return Cow::Owned(harvest_patterns(scope, address));
            }
            _ => {
                warn!(
                    strategy = self.name(),
                    probe = probe.kind(),
                    param,
                    "Probe kind not understood by strategy"
                );
                None
            }
        };
        found.map_or_else(|| Cow::Owned(TwinSet::new()), Cow::Borrowed)
    }
}

/// Union of all matching pattern buckets, most literal segments first.
fn harvest_patterns(scope: &ParamScope, address: &crate::address::Address) -> TwinSet {
    let mut matched: Vec<(usize, &TwinSet)> = scope
        .iter()
        .filter_map(|(key, twins)| match key {
            Key::Pattern(pattern) if pattern.matches(address) => {
                Some((pattern.specificity(), twins))
            }
            _ => None,
        })
        .collect();
    // stable: equal specificity keeps insertion order
    matched.sort_by(|a, b| b.0.cmp(&a.0));
    matched
        .into_iter()
        .flat_map(|(_, twins)| twins.iter().cloned())
        .collect()
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optional(inner) => f.debug_tuple("Optional").field(inner).finish(),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    #[test]
    fn digest_rejects_mismatched_selector() {
        let err = Strategy::Type
            .digest("message", &Selection::literal("text"))
            .unwrap_err();
        assert_eq!(
            err,
            OverloadError::SelectorMismatch {
                strategy: "type",
                selection: "literal",
                param: "message",
            }
        );
    }

    #[test]
    fn optional_digests_absent_and_inner() {
        let strategy = Strategy::optional(Strategy::Exact);
        assert_eq!(strategy.digest("p", &Selection::Absent), Ok(Key::Absent));
        assert_eq!(
            strategy.digest("p", &Selection::literal(3)),
            Ok(Key::Literal(Literal::Int(3)))
        );
        assert!(Strategy::Exact.digest("p", &Selection::Absent).is_err());
    }

    #[test]
    fn pattern_digest_parses() {
        let key = Strategy::PatternAddress
            .digest("target", &Selection::pattern("group(1).member"))
            .unwrap();
        let Key::Pattern(pattern) = key else {
            panic!("expected a pattern key");
        };
        assert!(pattern.matches(&Address::new().with("group", "1").with("member", "2")));

        assert_eq!(
            Strategy::PatternAddress.digest("target", &Selection::from("group(1).member")),
            Ok(Key::Pattern(pattern))
        );

        assert!(
            Strategy::PatternAddress
                .digest("target", &Selection::pattern("group(1"))
                .is_err()
        );
    }

    #[test]
    fn empty_scope_harvests_nothing() {
        let scope = ParamScope::new();
        let addr = Address::new().with("group", "1");
        assert!(Strategy::Exact.harvest("p", &scope, &Probe::literal(1)).is_empty());
        assert!(Strategy::Type.harvest("p", &scope, &Probe::value(&1u8)).is_empty());
        assert!(
            Strategy::PatternAddress
                .harvest("p", &scope, &Probe::address(&addr))
                .is_empty()
        );
        // wrong probe kind
        assert!(Strategy::Exact.harvest("p", &scope, &Probe::address(&addr)).is_empty());
    }
}
