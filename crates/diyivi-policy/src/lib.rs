//! DIYivi Policy Model
//!
//! Attribute-disclosure policies in the ConDisCon shape used by Yivi/IRMA
//! session requests: a `Policy` is an ordered list of `Disjunction`s, each a
//! set of alternative `Conjunction`s, each a set of `AttributeConstraint`s.
//!
//! Key features:
//! - `Attribute` ids validated once at the boundary (`scheme.issuer.credential.attribute`)
//! - Constraints as a tagged variant: bare, exact value, or presence/absence
//! - Positional policy evaluation against disclosed attributes
//! - Credential grouping (`build_policy`) so attributes of one credential are
//!   always disclosed from a single credential instance
//! - Disjunction labels validated against the policy they annotate

pub mod attribute;
pub mod disclosed;
pub mod error;
pub mod evaluate;
pub mod grouping;
pub mod types;

pub use attribute::{Attribute, Credential};
pub use disclosed::{AttributeStatus, DisclosedAttribute, DisclosedValues};
pub use error::{PolicyError, PolicyResult};
pub use evaluate::{conjunction_satisfied, disjunction_satisfied, matches};
pub use grouping::build_policy;
pub use types::{AttributeConstraint, Conjunction, Disjunction, DisjunctionLabels, Policy};
