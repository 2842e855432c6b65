//! Typed persistence of exchanges, replies and signature requests.
//!
//! Records are stored as JSON under `exchange:{id}`, `exchange_replies:{id}`
//! and `signature_request:{id}`. Ids that are not well formed are never
//! looked up and read as absent.

use std::sync::Arc;

use diyivi_core::{ExchangeId, SignatureRequestId, StoreKey, TtlStore};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ProtocolResult;
use crate::types::{Exchange, ExchangeReply, SignatureRequest};

fn exchange_key(id: &ExchangeId) -> StoreKey {
    StoreKey::new(format!("exchange:{}", id))
}

fn replies_key(id: &ExchangeId) -> StoreKey {
    StoreKey::new(format!("exchange_replies:{}", id))
}

fn signature_request_key(id: &SignatureRequestId) -> StoreKey {
    StoreKey::new(format!("signature_request:{}", id))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// ---------------------------------------------------------------------------
// ExchangeStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ExchangeStore {
    backend: Arc<dyn TtlStore>,
}

impl ExchangeStore {
    pub fn new(backend: Arc<dyn TtlStore>) -> Self {
        Self { backend }
    }

    /// Insert or overwrite, expiring at `exchange.expire_at`.
    pub fn save(&self, exchange: &Exchange) -> ProtocolResult<()> {
        let bytes = serde_json::to_vec(exchange)?;
        self.backend
            .put(&exchange_key(&exchange.id), &bytes, exchange.expire_at)?;
        Ok(())
    }

    pub fn get(&self, id: &ExchangeId) -> ProtocolResult<Option<Exchange>> {
        if !id.is_well_formed() {
            debug!(exchange_id = %id, "malformed exchange id");
            return Ok(None);
        }
        self.backend
            .get(&exchange_key(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Append a reply; the reply list expires with the exchange.
    pub fn push_reply(&self, exchange: &Exchange, reply: &ExchangeReply) -> ProtocolResult<usize> {
        let bytes = serde_json::to_vec(reply)?;
        Ok(self
            .backend
            .push(&replies_key(&exchange.id), &bytes, exchange.expire_at)?)
    }

    /// Store `reply` only if the exchange has no replies yet.
    pub fn push_first_reply(
        &self,
        exchange: &Exchange,
        reply: &ExchangeReply,
    ) -> ProtocolResult<bool> {
        let bytes = serde_json::to_vec(reply)?;
        Ok(self
            .backend
            .push_if_empty(&replies_key(&exchange.id), &bytes, exchange.expire_at)?)
    }

    /// Replies in the order they were received.
    pub fn get_replies(&self, id: &ExchangeId) -> ProtocolResult<Vec<ExchangeReply>> {
        if !id.is_well_formed() {
            return Ok(Vec::new());
        }
        self.backend
            .list(&replies_key(id))?
            .iter()
            .map(|bytes| decode(bytes))
            .collect()
    }

    /// Remove the exchange and its replies. Returns whether anything was live.
    pub fn delete(&self, id: &ExchangeId) -> ProtocolResult<bool> {
        let exchange = self.backend.delete(&exchange_key(id))?;
        let replies = self.backend.delete(&replies_key(id))?;
        Ok(exchange || replies)
    }
}

// ---------------------------------------------------------------------------
// SignatureStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SignatureStore {
    backend: Arc<dyn TtlStore>,
}

impl SignatureStore {
    pub fn new(backend: Arc<dyn TtlStore>) -> Self {
        Self { backend }
    }

    pub fn save(&self, request: &SignatureRequest) -> ProtocolResult<()> {
        let bytes = serde_json::to_vec(request)?;
        self.backend
            .put(&signature_request_key(&request.id), &bytes, request.expire_at)?;
        Ok(())
    }

    pub fn get(&self, id: &SignatureRequestId) -> ProtocolResult<Option<SignatureRequest>> {
        if !id.is_well_formed() {
            debug!(request_id = %id, "malformed signature request id");
            return Ok(None);
        }
        self.backend
            .get(&signature_request_key(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn delete(&self, id: &SignatureRequestId) -> ProtocolResult<bool> {
        Ok(self.backend.delete(&signature_request_key(id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExchangeType;
    use diyivi_core::{CapabilitySecret, ReplyId, Timestamp};
    use diyivi_policy::{Attribute, Policy};
    use diyivi_store::InMemoryTtlStore;

    fn backend() -> Arc<dyn TtlStore> {
        Arc::new(InMemoryTtlStore::new())
    }

    fn exchange(expire_at: Timestamp) -> Exchange {
        Exchange {
            id: ExchangeId::generate(),
            initiator_secret: CapabilitySecret::generate(),
            exchange_type: ExchangeType::OneToOne,
            policy: Policy::single(Attribute::parse("pbdf.sidn-pbdf.email.email").unwrap()),
            public_initiator_policy: Policy::default(),
            send_email: false,
            initiator_email: None,
            initiator_values: None,
            public_initiator_values: None,
            expire_at,
        }
    }

    fn reply(exchange: &Exchange) -> ExchangeReply {
        ExchangeReply {
            id: ReplyId::generate(),
            exchange_id: exchange.id.clone(),
            recipient_secret: CapabilitySecret::generate(),
            attribute_values: vec![],
        }
    }

    #[test]
    fn test_save_and_get_exchange() {
        let store = ExchangeStore::new(backend());
        let ex = exchange(Timestamp::from_seconds(Timestamp::now().seconds_since_epoch + 600));
        store.save(&ex).unwrap();
        assert_eq!(store.get(&ex.id).unwrap(), Some(ex.clone()));
        assert!(store.get(&ExchangeId::generate()).unwrap().is_none());
    }

    #[test]
    fn test_malformed_id_is_absent() {
        let store = ExchangeStore::new(backend());
        assert!(store.get(&ExchangeId::new("../../etc")).unwrap().is_none());
        assert!(store.get_replies(&ExchangeId::new("XYZ")).unwrap().is_empty());
        let signatures = SignatureStore::new(backend());
        assert!(signatures
            .get(&SignatureRequestId::new("not-hex"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_expired_exchange_is_absent() {
        let store = ExchangeStore::new(backend());
        let ex = exchange(Timestamp::from_seconds(1));
        store.save(&ex).unwrap();
        assert!(store.get(&ex.id).unwrap().is_none());
    }

    #[test]
    fn test_replies_keep_order_and_first_reply_wins_once() {
        let store = ExchangeStore::new(backend());
        let ex = exchange(Timestamp::in_seconds(600));

        let first = reply(&ex);
        assert!(store.push_first_reply(&ex, &first).unwrap());
        assert!(!store.push_first_reply(&ex, &reply(&ex)).unwrap());

        let second = reply(&ex);
        assert_eq!(store.push_reply(&ex, &second).unwrap(), 2);

        let replies = store.get_replies(&ex.id).unwrap();
        assert_eq!(replies, vec![first, second]);
    }

    #[test]
    fn test_delete_exchange_and_replies() {
        let store = ExchangeStore::new(backend());
        let ex = exchange(Timestamp::in_seconds(600));
        store.save(&ex).unwrap();
        store.push_reply(&ex, &reply(&ex)).unwrap();
        assert!(store.delete(&ex.id).unwrap());
        assert!(store.get(&ex.id).unwrap().is_none());
        assert!(store.get_replies(&ex.id).unwrap().is_empty());
        assert!(!store.delete(&ex.id).unwrap());
    }

    #[test]
    fn test_signature_store_roundtrip() {
        let store = SignatureStore::new(backend());
        let request = SignatureRequest {
            id: SignatureRequestId::generate(),
            message: "I agree".into(),
            attributes: vec![Attribute::parse("pbdf.gemeente.personalData.fullname").unwrap()],
            initiator_email: None,
            expire_at: Timestamp::from_seconds(Timestamp::now().seconds_since_epoch + 600),
        };
        store.save(&request).unwrap();
        assert_eq!(store.get(&request.id).unwrap(), Some(request.clone()));
        assert!(store.delete(&request.id).unwrap());
        assert!(store.get(&request.id).unwrap().is_none());
    }
}
