//! DIYivi Exchange Protocol
//!
//! Two short-lived protocols between parties that have no accounts, brokered
//! by an attestation server:
//!
//! - **Exchange**: an initiator discloses attributes (some public, known to
//!   the intended recipient in advance), then a recipient answers with the
//!   attributes the initiator asked for. Access is granted solely by the
//!   capability secrets handed out on create and respond.
//! - **Signature request**: an initiator proves an email address and asks
//!   someone to sign a message; the signature is mailed back and the request
//!   is deleted.
//!
//! Every transition verifies first and persists last, so a rejected call
//! leaves no trace. Persistence goes through `diyivi_core::TtlStore`; expired
//! entries are indistinguishable from ones that never existed.

pub mod error;
pub mod exchange;
pub mod settings;
pub mod signature;
pub mod store;
pub mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use exchange::ExchangeEngine;
pub use settings::{ProtocolSettings, TtlSettings, DEFAULT_EMAIL_ATTRIBUTE};
pub use signature::SignatureEngine;
pub use store::{ExchangeStore, SignatureStore};
pub use types::{
    CreateExchange, CreateSignatureRequest, CreatedExchange, CreatedSignatureRequest, Exchange,
    ExchangeInfo, ExchangeReply, ExchangeResponse, ExchangeResult, ExchangeType,
    SignatureRequest, SignatureRequestInfo, MAX_MESSAGE_CHARS,
};
