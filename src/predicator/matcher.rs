use super::{Modifier, Predicator, ValueCondition};

/// Matching strategy chosen once per probe and reused for every stored arc.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MatchKind {
    /// Probe is a full wildcard.
    Any,
    /// Relationship must match.
    Relationship,
    /// Modifier must match.
    Modifier,
    /// Relationship and modifier must match.
    Key,
    /// Full comparison including the value condition.
    Generic,
}

impl MatchKind {
    /// Picks the cheapest strategy that is exact for `probe`.
    pub fn select(probe: &Predicator) -> Self {
        let rel = !probe.rel.is_wildcard();
        let modifier = !probe.modifier.is_wildcard();
        let value = probe.has_value_condition();
        match (rel, modifier) {
            (false, false) => MatchKind::Any,
            (true, true) if value => MatchKind::Generic,
            (true, true) => MatchKind::Key,
            (true, false) => MatchKind::Relationship,
            (false, true) if value => MatchKind::Generic,
            (false, true) => MatchKind::Modifier,
        }
    }

    /// Tests `target` against `probe` with this strategy.
    pub fn matches(self, probe: &Predicator, target: &Predicator) -> bool {
        match self {
            MatchKind::Any => true,
            MatchKind::Relationship => probe.rel == target.rel,
            MatchKind::Modifier => probe.modifier == target.modifier,
            MatchKind::Key => probe.key() == target.key(),
            MatchKind::Generic => probe.matches(target),
        }
    }
}

impl Predicator {
    /// Generic probe match: wildcard fields match anything, the value
    /// condition applies only when the probe names a modifier.
    pub fn matches(&self, target: &Predicator) -> bool {
        if self.is_full_wildcard() {
            return true;
        }
        if !self.rel.is_wildcard() && self.rel != target.rel {
            return false;
        }
        if !self.modifier.is_wildcard() {
            if self.modifier != target.modifier {
                return false;
            }
            if self.has_value_condition() {
                return value_matches(self, target);
            }
        }
        true
    }
}

fn value_matches(probe: &Predicator, target: &Predicator) -> bool {
    let ordering = if target.modifier.is_float() {
        target.value.as_float().partial_cmp(&probe.value.as_float())
    } else if target.modifier == Modifier::Integer {
        Some(target.value.as_int().cmp(&probe.value.as_int()))
    } else {
        Some(target.value.as_uint().cmp(&probe.value.as_uint()))
    };
    let hit = match (probe.condition, ordering) {
        (ValueCondition::Any, _) => true,
        (_, None) => false,
        (ValueCondition::Lte, Some(ord)) => ord.is_le(),
        (ValueCondition::Gte, Some(ord)) => ord.is_ge(),
        (ValueCondition::Eq, Some(ord)) => ord.is_eq(),
    };
    hit != probe.negate
}
