//! Threshold rule evaluation.
//!
//! Pure logic, no database access. The caller loads the active rules for a
//! `(device, pin)` pair, evaluates each one with [`compare`], feeds the result
//! into [`detect_edge`] together with the rule's persisted `last_triggered`
//! flag, and acts on the returned [`EdgeTransition`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Relational operator of a threshold rule.
///
/// Stored in `threshold_rules.comparator` as its ASCII symbol
/// (see [`Comparator::as_str`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl Comparator {
    /// All comparators, in storage order.
    pub const ALL: [Comparator; 6] = [
        Comparator::Equal,
        Comparator::NotEqual,
        Comparator::GreaterThan,
        Comparator::LessThan,
        Comparator::GreaterOrEqual,
        Comparator::LessOrEqual,
    ];

    /// The symbol persisted in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Equal => "=",
            Comparator::NotEqual => "!=",
            Comparator::GreaterThan => ">",
            Comparator::LessThan => "<",
            Comparator::GreaterOrEqual => ">=",
            Comparator::LessOrEqual => "<=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparator {
    type Err = CoreError;

    /// Parse a stored comparator symbol.
    ///
    /// Accepts the Unicode forms `≠`, `≥` and `≤` as aliases of their ASCII
    /// counterparts, and `==` as an alias of `=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Comparator::Equal),
            "!=" | "≠" => Ok(Comparator::NotEqual),
            ">" => Ok(Comparator::GreaterThan),
            "<" => Ok(Comparator::LessThan),
            ">=" | "≥" => Ok(Comparator::GreaterOrEqual),
            "<=" | "≤" => Ok(Comparator::LessOrEqual),
            other => Err(CoreError::Validation(format!(
                "unknown comparator '{other}'"
            ))),
        }
    }
}

/// Evaluate `value <comparator> threshold` with IEEE double semantics.
///
/// `equality_tolerance` only affects `=` and `!=`: with a tolerance of `0.0`
/// (the default) equality is exact, otherwise two values are equal when
/// `|value - threshold| <= equality_tolerance`. Ordering comparators are
/// never widened. Any comparison involving NaN is `false`, except `!=`.
pub fn compare(value: f64, threshold: f64, comparator: Comparator, equality_tolerance: f64) -> bool {
    match comparator {
        Comparator::Equal => is_equal(value, threshold, equality_tolerance),
        Comparator::NotEqual => !is_equal(value, threshold, equality_tolerance),
        Comparator::GreaterThan => value > threshold,
        Comparator::LessThan => value < threshold,
        Comparator::GreaterOrEqual => value >= threshold,
        Comparator::LessOrEqual => value <= threshold,
    }
}

fn is_equal(value: f64, threshold: f64, tolerance: f64) -> bool {
    if tolerance > 0.0 {
        (value - threshold).abs() <= tolerance
    } else {
        value == threshold
    }
}

/// Outcome of comparing a rule's persisted edge state with a fresh evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeTransition {
    /// Not satisfied → satisfied. The only transition that notifies.
    Rising,
    /// Satisfied → not satisfied. Re-arms the rule.
    Falling,
    /// No change, whether the condition holds or not.
    Steady,
}

impl EdgeTransition {
    /// Whether the rule's persisted `last_triggered` flag must be updated.
    pub fn changes_state(self) -> bool {
        !matches!(self, EdgeTransition::Steady)
    }
}

/// Classify the transition from `previously_triggered` to `currently_triggered`.
pub fn detect_edge(previously_triggered: bool, currently_triggered: bool) -> EdgeTransition {
    match (previously_triggered, currently_triggered) {
        (false, true) => EdgeTransition::Rising,
        (true, false) => EdgeTransition::Falling,
        _ => EdgeTransition::Steady,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn exact(value: f64, threshold: f64, comparator: &str) -> bool {
        compare(value, threshold, comparator.parse().unwrap(), 0.0)
    }

    #[test]
    fn equality_is_exact_by_default() {
        assert!(exact(50.0, 50.0, "="));
        assert!(!exact(50.000_001, 50.0, "="));
        assert!(!exact(50.0, 50.0, "!="));
        assert!(exact(0.1 + 0.2, 0.3, "!="));
    }

    #[test]
    fn ordering_comparators_match_math() {
        assert!(exact(50.1, 50.0, ">"));
        assert!(!exact(50.0, 50.0, ">"));
        assert!(exact(49.9, 50.0, "<"));
        assert!(!exact(50.0, 50.0, "<"));
        assert!(!exact(49.9, 50.0, ">="));
        assert!(exact(50.0, 50.0, ">="));
        assert!(exact(50.0, 50.0, "<="));
        assert!(!exact(50.1, 50.0, "<="));
    }

    #[test]
    fn negative_values_compare_correctly() {
        assert!(exact(-10.5, -10.0, "<"));
        assert!(exact(-9.5, -10.0, ">="));
    }

    #[test]
    fn tolerance_widens_only_equality() {
        assert!(compare(0.1 + 0.2, 0.3, Comparator::Equal, 1e-9));
        assert!(!compare(0.1 + 0.2, 0.3, Comparator::NotEqual, 1e-9));
        assert!(!compare(50.0 - 1e-12, 50.0, Comparator::GreaterOrEqual, 1e-9));
    }

    #[test]
    fn nan_never_satisfies_ordering() {
        for comparator in [
            Comparator::GreaterThan,
            Comparator::LessThan,
            Comparator::GreaterOrEqual,
            Comparator::LessOrEqual,
            Comparator::Equal,
        ] {
            assert!(!compare(f64::NAN, 1.0, comparator, 0.0), "{comparator}");
        }
        assert!(compare(f64::NAN, 1.0, Comparator::NotEqual, 0.0));
    }

    #[test]
    fn parses_ascii_and_unicode_symbols() {
        for comparator in Comparator::ALL {
            assert_eq!(comparator.as_str().parse::<Comparator>().unwrap(), comparator);
        }
        assert_eq!("≠".parse::<Comparator>().unwrap(), Comparator::NotEqual);
        assert_eq!("≥".parse::<Comparator>().unwrap(), Comparator::GreaterOrEqual);
        assert_eq!("≤".parse::<Comparator>().unwrap(), Comparator::LessOrEqual);
        assert_eq!(" == ".parse::<Comparator>().unwrap(), Comparator::Equal);
    }

    #[test]
    fn rejects_unknown_symbol() {
        assert_matches!("=>".parse::<Comparator>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn serde_uses_symbols() {
        let json = serde_json::to_string(&Comparator::GreaterOrEqual).unwrap();
        assert_eq!(json, "\">=\"");
        let parsed: Comparator = serde_json::from_str("\"!=\"").unwrap();
        assert_eq!(parsed, Comparator::NotEqual);
    }

    #[test]
    fn detects_all_edges() {
        assert_eq!(detect_edge(false, true), EdgeTransition::Rising);
        assert_eq!(detect_edge(true, false), EdgeTransition::Falling);
        assert_eq!(detect_edge(true, true), EdgeTransition::Steady);
        assert_eq!(detect_edge(false, false), EdgeTransition::Steady);
    }

    #[test]
    fn only_steady_leaves_state_alone() {
        assert!(EdgeTransition::Rising.changes_state());
        assert!(EdgeTransition::Falling.changes_state());
        assert!(!EdgeTransition::Steady.changes_state());
    }

    #[test]
    fn sustained_breach_rises_once() {
        let mut last_triggered = false;
        let mut rising = 0;
        for value in [51.0, 52.0, 53.0] {
            let edge = detect_edge(last_triggered, exact(value, 50.0, ">"));
            if edge == EdgeTransition::Rising {
                rising += 1;
            }
            if edge.changes_state() {
                last_triggered = !last_triggered;
            }
        }
        assert_eq!(rising, 1);
        assert!(last_triggered);
    }
}
