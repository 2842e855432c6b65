//! DIYivi Attestation Tokens
//!
//! Both directions of the JWT traffic with a Yivi/IRMA attestation server:
//!
//! - Inbound: session result tokens signed by the server. `ResultVerifier`
//!   checks signature and expiry (with a small clock-skew leeway) and parses
//!   the payload into a `DisclosureResult` or `SignatureResult`.
//! - Outbound: session request tokens (`sprequest` / `absrequest`) signed
//!   with the shared secret the server knows us by.
//!
//! Policy satisfaction of a verified result is positional: disclosed group
//! `i` must satisfy disjunction `i` of the policy that was requested.

pub mod error;
pub mod request;
pub mod result;
pub mod verify;

pub use error::{AttestError, AttestResult};
pub use request::{
    DisclosureRequest, ExtendedRequest, RequestSigner, SigningRequest, DISCLOSURE_CONTEXT,
    SIGNATURE_CONTEXT,
};
pub use result::{
    DisclosureResult, ProofStatus, ResultSubject, SessionStatus, SessionType, SignatureResult,
    SignedMessage,
};
pub use verify::{JwtResultVerifier, ResultVerifier, DEFAULT_LEEWAY_SECS};
