use diyivi_core::TranslatedString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::attribute::Attribute;
use crate::error::{PolicyError, PolicyResult};

// ---------------------------------------------------------------------------
// AttributeConstraint: bare attribute, exact value, or presence/absence
// ---------------------------------------------------------------------------

/// One requirement on a single disclosed attribute.
///
/// On the wire this is either a bare attribute id string or an object
/// `{"type": id, "value": string|null, "notNull": bool}` where exactly one of
/// `value` and `notNull` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireConstraint", into = "WireConstraint")]
pub enum AttributeConstraint {
    /// Any disclosed value is accepted.
    Disclosed(Attribute),
    /// The raw value must equal `value`.
    Exact { attribute: Attribute, value: String },
    /// `not_null = true` requires a value; `false` requires the attribute to be NULL.
    Presence { attribute: Attribute, not_null: bool },
}

impl AttributeConstraint {
    pub fn attribute(&self) -> &Attribute {
        match self {
            AttributeConstraint::Disclosed(attribute)
            | AttributeConstraint::Exact { attribute, .. }
            | AttributeConstraint::Presence { attribute, .. } => attribute,
        }
    }

    /// Build a typed constraint from the optional-field form, enforcing that
    /// exactly one of `value` and `not_null` is present.
    pub fn typed(
        attribute: Attribute,
        value: Option<String>,
        not_null: Option<bool>,
    ) -> PolicyResult<Self> {
        match (value, not_null) {
            (Some(value), None) => Ok(AttributeConstraint::Exact { attribute, value }),
            (None, Some(not_null)) => Ok(AttributeConstraint::Presence {
                attribute,
                not_null,
            }),
            (Some(_), Some(_)) => Err(PolicyError::InvalidConstraint(format!(
                "{}: value and notNull cannot both be set",
                attribute
            ))),
            (None, None) => Err(PolicyError::InvalidConstraint(format!(
                "{}: value or notNull must be set",
                attribute
            ))),
        }
    }
}

impl From<Attribute> for AttributeConstraint {
    fn from(attribute: Attribute) -> Self {
        AttributeConstraint::Disclosed(attribute)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireConstraint {
    Bare(Attribute),
    Typed {
        #[serde(rename = "type")]
        attribute: Attribute,
        #[serde(default)]
        value: Option<String>,
        #[serde(rename = "notNull", default, skip_serializing_if = "Option::is_none")]
        not_null: Option<bool>,
    },
}

impl TryFrom<WireConstraint> for AttributeConstraint {
    type Error = PolicyError;

    fn try_from(wire: WireConstraint) -> Result<Self, Self::Error> {
        match wire {
            WireConstraint::Bare(attribute) => Ok(AttributeConstraint::Disclosed(attribute)),
            WireConstraint::Typed {
                attribute,
                value,
                not_null,
            } => AttributeConstraint::typed(attribute, value, not_null),
        }
    }
}

impl From<AttributeConstraint> for WireConstraint {
    fn from(constraint: AttributeConstraint) -> Self {
        match constraint {
            AttributeConstraint::Disclosed(attribute) => WireConstraint::Bare(attribute),
            AttributeConstraint::Exact { attribute, value } => WireConstraint::Typed {
                attribute,
                value: Some(value),
                not_null: None,
            },
            AttributeConstraint::Presence {
                attribute,
                not_null,
            } => WireConstraint::Typed {
                attribute,
                value: None,
                not_null: Some(not_null),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Conjunction / Disjunction / Policy: the ConDisCon structure
// ---------------------------------------------------------------------------

/// Constraints that must all hold, possibly on overlapping disclosures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conjunction(pub Vec<AttributeConstraint>);

impl Conjunction {
    pub fn new(constraints: Vec<AttributeConstraint>) -> Self {
        Self(constraints)
    }

    pub fn of_attributes(attributes: impl IntoIterator<Item = Attribute>) -> Self {
        Self(attributes.into_iter().map(AttributeConstraint::from).collect())
    }

    pub fn constraints(&self) -> &[AttributeConstraint] {
        &self.0
    }
}

/// Alternative conjunctions; one of them has to be satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Disjunction(pub Vec<Conjunction>);

impl Disjunction {
    pub fn new(conjunctions: Vec<Conjunction>) -> Self {
        Self(conjunctions)
    }

    pub fn conjunctions(&self) -> &[Conjunction] {
        &self.0
    }
}

/// Ordered disjunctions. Index `i` of a disclosure is always matched against
/// disjunction `i`, so order is part of the meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Policy(pub Vec<Disjunction>);

impl Policy {
    pub fn new(disjunctions: Vec<Disjunction>) -> Self {
        Self(disjunctions)
    }

    /// `[[[attribute]]]`: disclose exactly this one attribute.
    pub fn single(attribute: Attribute) -> Self {
        Self(vec![Disjunction(vec![Conjunction::of_attributes([
            attribute,
        ])])])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn disjunctions(&self) -> &[Disjunction] {
        &self.0
    }

    /// Positional concatenation: `parts[0]`'s disjunctions first, then `parts[1]`'s, ...
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a Policy>) -> Policy {
        Policy(
            parts
                .into_iter()
                .flat_map(|p| p.0.iter().cloned())
                .collect(),
        )
    }

    /// Every attribute mentioned anywhere in the policy, in first-seen order.
    pub fn attributes(&self) -> Vec<Attribute> {
        let mut seen = Vec::new();
        for constraint in self
            .0
            .iter()
            .flat_map(|d| d.0.iter())
            .flat_map(|c| c.0.iter())
        {
            let attribute = constraint.attribute();
            if !seen.contains(attribute) {
                seen.push(attribute.clone());
            }
        }
        seen
    }
}

// ---------------------------------------------------------------------------
// DisjunctionLabels: display labels keyed by disjunction index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisjunctionLabels(pub BTreeMap<usize, TranslatedString>);

impl DisjunctionLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, index: usize, label: TranslatedString) -> Self {
        self.0.insert(index, label);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TranslatedString> {
        self.0.get(&index)
    }

    /// Every label must point at an existing disjunction of `policy`.
    pub fn validate_for(&self, policy: &Policy) -> PolicyResult<()> {
        match self.0.keys().find(|&&index| index >= policy.len()) {
            Some(index) => Err(PolicyError::InvalidLabel(format!(
                "label index {} does not correspond to one of {} disjunctions",
                index,
                policy.len()
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(id: &str) -> Attribute {
        Attribute::parse(id).unwrap()
    }

    #[test]
    fn test_constraint_bare_roundtrip_shape() {
        let c: AttributeConstraint = serde_json::from_str("\"pbdf.pbdf.email.email\"").unwrap();
        assert_eq!(c, AttributeConstraint::Disclosed(attr("pbdf.pbdf.email.email")));
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            serde_json::json!("pbdf.pbdf.email.email")
        );
    }

    #[test]
    fn test_constraint_exact_from_wire() {
        let c: AttributeConstraint = serde_json::from_str(
            r#"{"type": "irma-demo.gemeente.address.city", "value": "Nijmegen"}"#,
        )
        .unwrap();
        assert_eq!(
            c,
            AttributeConstraint::Exact {
                attribute: attr("irma-demo.gemeente.address.city"),
                value: "Nijmegen".into()
            }
        );
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            serde_json::json!({"type": "irma-demo.gemeente.address.city", "value": "Nijmegen"})
        );
    }

    #[test]
    fn test_constraint_presence_from_wire() {
        let c: AttributeConstraint = serde_json::from_str(
            r#"{"type": "irma-demo.gemeente.address.city", "value": null, "notNull": true}"#,
        )
        .unwrap();
        assert_eq!(
            c,
            AttributeConstraint::Presence {
                attribute: attr("irma-demo.gemeente.address.city"),
                not_null: true
            }
        );
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            serde_json::json!({"type": "irma-demo.gemeente.address.city", "value": null, "notNull": true})
        );
    }

    #[test]
    fn test_constraint_rejects_both_set() {
        let result = serde_json::from_str::<AttributeConstraint>(
            r#"{"type": "irma-demo.gemeente.address.city", "value": "Nijmegen", "notNull": true}"#,
        );
        assert!(result.is_err());
        assert!(matches!(
            AttributeConstraint::typed(
                attr("irma-demo.gemeente.address.city"),
                Some("x".into()),
                Some(false)
            ),
            Err(PolicyError::InvalidConstraint(_))
        ));
    }

    #[test]
    fn test_constraint_rejects_neither_set() {
        let result = serde_json::from_str::<AttributeConstraint>(
            r#"{"type": "irma-demo.gemeente.address.city"}"#,
        );
        assert!(result.is_err());
        let result = serde_json::from_str::<AttributeConstraint>(
            r#"{"type": "irma-demo.gemeente.address.city", "value": null}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_constraint_rejects_malformed_attribute() {
        assert!(serde_json::from_str::<AttributeConstraint>("\"not.an.attribute\"").is_err());
        assert!(serde_json::from_str::<AttributeConstraint>(
            r#"{"type": "bad", "value": "x"}"#
        )
        .is_err());
    }

    #[test]
    fn test_policy_wire_format() {
        let json = serde_json::json!([
            [["pbdf.sidn-pbdf.mobilenumber.mobilenumber"]],
            [["pbdf.pbdf.email.email"], ["irma-demo.sidn-pbdf.email.email"]]
        ]);
        let policy: Policy = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.disjunctions()[1].conjunctions().len(), 2);
        assert_eq!(serde_json::to_value(&policy).unwrap(), json);
    }

    #[test]
    fn test_policy_concat_keeps_order() {
        let public = Policy::single(attr("pbdf.sidn-pbdf.mobilenumber.mobilenumber"));
        let private = Policy::single(attr("pbdf.pbdf.email.email"));
        let combined = Policy::concat([&public, &private]);
        assert_eq!(combined.len(), 2);
        assert_eq!(
            combined.attributes(),
            vec![
                attr("pbdf.sidn-pbdf.mobilenumber.mobilenumber"),
                attr("pbdf.pbdf.email.email")
            ]
        );
    }

    #[test]
    fn test_labels_validate_for_policy() {
        let policy = Policy::single(attr("pbdf.pbdf.email.email"));
        let label = TranslatedString::new().with("en", "Known by the recipient");

        let ok = DisjunctionLabels::new().with(0, label.clone());
        assert!(ok.validate_for(&policy).is_ok());

        let bad = DisjunctionLabels::new().with(1, label);
        assert!(matches!(
            bad.validate_for(&policy),
            Err(PolicyError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_labels_wire_format_uses_string_keys() {
        let labels = DisjunctionLabels::new().with(
            0,
            TranslatedString::new()
                .with("en", "Known by the recipient")
                .with("nl", "Bekend bij de ontvanger"),
        );
        let json = serde_json::to_value(&labels).unwrap();
        assert_eq!(json["0"]["nl"], "Bekend bij de ontvanger");
        let back: DisjunctionLabels = serde_json::from_value(json).unwrap();
        assert_eq!(back, labels);
    }
}
