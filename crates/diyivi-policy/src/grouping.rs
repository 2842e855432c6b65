use std::collections::BTreeSet;

use crate::attribute::{Attribute, Credential};
use crate::types::{Conjunction, Disjunction, Policy};

/// Build a policy asking for `attributes`, one disjunction per credential.
///
/// Attributes of the same credential share a single conjunction, so they are
/// disclosed from one credential instance; different credentials never share
/// a conjunction. Disjunctions follow the first-seen order of credentials.
/// Order within a conjunction is not meaningful.
pub fn build_policy<'a>(attributes: impl IntoIterator<Item = &'a Attribute>) -> Policy {
    let mut groups: Vec<(Credential, BTreeSet<Attribute>)> = Vec::new();
    for attribute in attributes {
        let credential = attribute.credential();
        match groups.iter_mut().find(|(c, _)| *c == credential) {
            Some((_, members)) => {
                members.insert(attribute.clone());
            }
            None => groups.push((credential, BTreeSet::from([attribute.clone()]))),
        }
    }

    Policy::new(
        groups
            .into_iter()
            .map(|(_, members)| Disjunction::new(vec![Conjunction::of_attributes(members)]))
            .collect(),
    )
}
