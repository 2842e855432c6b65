//! Policy satisfaction against disclosed attributes.

use crate::disclosed::{AttributeStatus, DisclosedAttribute};
use crate::types::{AttributeConstraint, Conjunction, Disjunction, Policy};

/// Whether a single disclosed attribute fulfils a constraint.
pub fn matches(disclosed: &DisclosedAttribute, constraint: &AttributeConstraint) -> bool {
    if disclosed.id != *constraint.attribute() {
        return false;
    }
    match constraint {
        AttributeConstraint::Disclosed(_) => true,
        AttributeConstraint::Exact { value, .. } => {
            disclosed.rawvalue.as_deref() == Some(value.as_str())
        }
        AttributeConstraint::Presence { not_null, .. } => {
            (disclosed.status != AttributeStatus::Null) == *not_null
        }
    }
}

/// Every constraint is matched by at least one disclosed attribute.
///
/// Several constraints may be matched by the same attribute; order is irrelevant.
pub fn conjunction_satisfied(conjunction: &Conjunction, discloseds: &[DisclosedAttribute]) -> bool {
    conjunction
        .constraints()
        .iter()
        .all(|constraint| discloseds.iter().any(|d| matches(d, constraint)))
}

/// At least one of the alternative conjunctions is satisfied.
pub fn disjunction_satisfied(disjunction: &Disjunction, discloseds: &[DisclosedAttribute]) -> bool {
    disjunction
        .conjunctions()
        .iter()
        .any(|conjunction| conjunction_satisfied(conjunction, discloseds))
}

impl Conjunction {
    pub fn is_satisfied_by(&self, discloseds: &[DisclosedAttribute]) -> bool {
        conjunction_satisfied(self, discloseds)
    }
}

impl Disjunction {
    pub fn is_satisfied_by(&self, discloseds: &[DisclosedAttribute]) -> bool {
        disjunction_satisfied(self, discloseds)
    }
}

impl Policy {
    /// Positional check: exactly one disclosed group per disjunction, and
    /// group `i` satisfies disjunction `i`.
    pub fn is_satisfied_by(&self, disclosed: &[Vec<DisclosedAttribute>]) -> bool {
        disclosed.len() == self.len()
            && self
                .disjunctions()
                .iter()
                .zip(disclosed)
                .all(|(disjunction, group)| disjunction.is_satisfied_by(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use diyivi_core::Timestamp;

    fn attr(id: &str) -> Attribute {
        Attribute::parse(id).unwrap()
    }

    fn present(id: &str, value: &str) -> DisclosedAttribute {
        DisclosedAttribute::present(attr(id), value, Timestamp::from_seconds(1_700_000_000))
    }

    fn null(id: &str) -> DisclosedAttribute {
        DisclosedAttribute::null(attr(id), Timestamp::from_seconds(1_700_000_000))
    }

    const CITY: &str = "irma-demo.gemeente.address.city";
    const STREET: &str = "irma-demo.gemeente.address.street";
    const EMAIL: &str = "pbdf.pbdf.email.email";
    const PHONE: &str = "pbdf.sidn-pbdf.mobilenumber.mobilenumber";

    #[test]
    fn test_matches_bare() {
        let constraint = AttributeConstraint::Disclosed(attr(CITY));
        assert!(matches(&present(CITY, "Nijmegen"), &constraint));
        assert!(matches(&null(CITY), &constraint));
        assert!(!matches(&present(STREET, "Nijmegen"), &constraint));
    }

    #[test]
    fn test_matches_exact() {
        let constraint = AttributeConstraint::Exact {
            attribute: attr(CITY),
            value: "Nijmegen".into(),
        };
        assert!(matches(&present(CITY, "Nijmegen"), &constraint));
        assert!(!matches(&present(CITY, "Arnhem"), &constraint));
        assert!(!matches(&null(CITY), &constraint));
        assert!(!matches(&present(STREET, "Nijmegen"), &constraint));
    }

    #[test]
    fn test_matches_presence() {
        let not_null = AttributeConstraint::Presence {
            attribute: attr(CITY),
            not_null: true,
        };
        let must_be_null = AttributeConstraint::Presence {
            attribute: attr(CITY),
            not_null: false,
        };
        assert!(matches(&present(CITY, "Nijmegen"), &not_null));
        assert!(!matches(&null(CITY), &not_null));
        assert!(matches(&null(CITY), &must_be_null));
        assert!(!matches(&present(CITY, "Nijmegen"), &must_be_null));
    }

    #[test]
    fn test_matches_extra_status_counts_as_present() {
        let mut extra = present(CITY, "Nijmegen");
        extra.status = AttributeStatus::Extra;
        let constraint = AttributeConstraint::Presence {
            attribute: attr(CITY),
            not_null: true,
        };
        assert!(matches(&extra, &constraint));
    }

    #[test]
    fn test_conjunction_overlap_and_order() {
        let conjunction = Conjunction::new(vec![
            AttributeConstraint::Disclosed(attr(CITY)),
            AttributeConstraint::Exact {
                attribute: attr(CITY),
                value: "Nijmegen".into(),
            },
            AttributeConstraint::Disclosed(attr(STREET)),
        ]);
        let discloseds = vec![present(STREET, "Toernooiveld"), present(CITY, "Nijmegen")];
        assert!(conjunction.is_satisfied_by(&discloseds));
        assert!(!conjunction.is_satisfied_by(&discloseds[..1]));
    }

    #[test]
    fn test_empty_conjunction_is_satisfied() {
        assert!(Conjunction::default().is_satisfied_by(&[]));
    }

    #[test]
    fn test_disjunction_any() {
        let disjunction = Disjunction::new(vec![
            Conjunction::of_attributes([attr(EMAIL)]),
            Conjunction::of_attributes([attr(PHONE)]),
        ]);
        assert!(disjunction.is_satisfied_by(&[present(PHONE, "0612345678")]));
        assert!(disjunction.is_satisfied_by(&[present(EMAIL, "a@example.com")]));
        assert!(!disjunction.is_satisfied_by(&[present(CITY, "Nijmegen")]));
        assert!(!Disjunction::default().is_satisfied_by(&[present(CITY, "Nijmegen")]));
    }

    #[test]
    fn test_policy_is_positional() {
        let policy = Policy::concat([&Policy::single(attr(PHONE)), &Policy::single(attr(EMAIL))]);
        let in_order = vec![
            vec![present(PHONE, "0612345678")],
            vec![present(EMAIL, "a@example.com")],
        ];
        let swapped = vec![
            vec![present(EMAIL, "a@example.com")],
            vec![present(PHONE, "0612345678")],
        ];
        assert!(policy.is_satisfied_by(&in_order));
        assert!(!policy.is_satisfied_by(&swapped));
    }

    #[test]
    fn test_policy_arity_is_strict() {
        let policy = Policy::single(attr(EMAIL));
        let too_many = vec![
            vec![present(EMAIL, "a@example.com")],
            vec![present(EMAIL, "a@example.com")],
        ];
        assert!(!policy.is_satisfied_by(&too_many));
        assert!(!policy.is_satisfied_by(&[]));
        assert!(Policy::default().is_satisfied_by(&[]));
    }
}
