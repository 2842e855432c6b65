//! Exchange engine.
//!
//! Lifecycle: `create` → `start` (initiator discloses) → `get_info` /
//! `respond` (recipient discloses) → `get_result`. Each transition checks
//! everything it needs first and writes to the store last.

use std::sync::Arc;

use diyivi_attest::{
    AttestError, DisclosureRequest, DisclosureResult, ExtendedRequest, RequestSigner,
    ResultVerifier,
};
use diyivi_core::{CapabilitySecret, ExchangeId, ReplyId, Timestamp, TranslatedString};
use diyivi_notify::{check_recipient, compose_exchange_reply_email, Notifier};
use diyivi_policy::{Attribute, DisclosedAttribute, DisclosedValues, DisjunctionLabels};
use tracing::{info, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::settings::ProtocolSettings;
use crate::store::ExchangeStore;
use crate::types::{
    CreateExchange, CreatedExchange, Exchange, ExchangeInfo, ExchangeReply, ExchangeResponse,
    ExchangeResult, ExchangeType,
};

fn known_by_recipient() -> TranslatedString {
    TranslatedString::new()
        .with("en", "Known by the recipient")
        .with("nl", "Bekend bij de ontvanger")
}

/// Log a rejected session result and convert it.
pub(crate) fn rejected(operation: &'static str, e: AttestError) -> ProtocolError {
    warn!(operation, error = %e, "session result rejected");
    e.into()
}

/// Raw value of `attribute` in the disclosed group, if present.
pub(crate) fn raw_value_of<'a>(
    group: &'a [DisclosedAttribute],
    attribute: &Attribute,
) -> Option<&'a str> {
    group
        .iter()
        .find(|d| &d.id == attribute)
        .and_then(|d| d.rawvalue.as_deref())
}

pub struct ExchangeEngine {
    store: ExchangeStore,
    verifier: Arc<dyn ResultVerifier>,
    signer: Arc<RequestSigner>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<ProtocolSettings>,
}

impl ExchangeEngine {
    pub fn new(
        store: ExchangeStore,
        verifier: Arc<dyn ResultVerifier>,
        signer: Arc<RequestSigner>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<ProtocolSettings>,
    ) -> Self {
        Self {
            store,
            verifier,
            signer,
            notifier,
            settings,
        }
    }

    pub fn store(&self) -> &ExchangeStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Initiator
    // -----------------------------------------------------------------------

    /// Create an exchange and the disclosure session request that starts it.
    pub fn create(&self, request: CreateExchange) -> ProtocolResult<CreatedExchange> {
        request.validate()?;

        let exchange = Exchange {
            id: ExchangeId::generate(),
            initiator_secret: CapabilitySecret::generate(),
            exchange_type: request.exchange_type,
            policy: request.policy,
            public_initiator_policy: request.public_initiator_policy,
            send_email: request.send_email,
            initiator_email: None,
            initiator_values: None,
            public_initiator_values: None,
            expire_at: Timestamp::in_seconds(self.settings.ttl.before_start),
        };

        let disclose = exchange.initiator_policy(&self.settings.email_attribute);
        let labels = (0..exchange.public_initiator_policy.len())
            .fold(DisjunctionLabels::new(), |labels, i| {
                labels.with(i, known_by_recipient())
            });
        let mut session = DisclosureRequest::new(disclose.clone())
            .with_client_return_url(self.settings.exchange_url(&exchange.id), true);
        if !labels.is_empty() {
            session = session.with_labels(labels)?;
        }
        let request_jwt = self.signer.sign_disclosure(ExtendedRequest::new(session))?;

        self.store.save(&exchange)?;
        info!(
            exchange_id = %exchange.id,
            send_email = exchange.send_email,
            disjunctions = disclose.len(),
            "Exchange created"
        );

        Ok(CreatedExchange {
            id: exchange.id.clone(),
            initiator_secret: exchange.initiator_secret.clone(),
            disclose,
            request_jwt,
        })
    }

    /// Record the initiator's disclosure and open the exchange to recipients.
    pub fn start(&self, id: &ExchangeId, secret: &str, token: &str) -> ProtocolResult<()> {
        let mut exchange = self.load(id)?;
        if !exchange.initiator_secret.matches(secret) {
            warn!(exchange_id = %id, "start with incorrect initiator secret");
            return Err(ProtocolError::Unauthorized);
        }
        if exchange.started() {
            return Err(ProtocolError::AlreadyStarted);
        }

        let result = self
            .verifier
            .verify_disclosure(token)
            .map_err(|e| rejected("exchange.start", e))?;
        let policy = exchange.initiator_policy(&self.settings.email_attribute);
        if !result.satisfies_policy(&policy) {
            warn!(exchange_id = %id, "initiator disclosure does not satisfy policy");
            return Err(ProtocolError::PolicyNotSatisfied);
        }

        let (public_values, initiator_values, email) = self.split_initiator(&exchange, result)?;
        exchange.public_initiator_values = Some(public_values);
        exchange.initiator_values = Some(initiator_values);
        exchange.initiator_email = email;
        exchange.expire_at = Timestamp::in_seconds(self.settings.ttl.exchange);

        self.store.save(&exchange)?;
        info!(exchange_id = %id, "Exchange started");
        Ok(())
    }

    /// Split a satisfying disclosure into public values, initiator values
    /// and the email address, by position.
    fn split_initiator(
        &self,
        exchange: &Exchange,
        result: DisclosureResult,
    ) -> ProtocolResult<(DisclosedValues, DisclosedValues, Option<String>)> {
        let mut groups = result.disclosed;
        let email = if exchange.send_email {
            let group = groups.pop().unwrap_or_default();
            let address = raw_value_of(&group, &self.settings.email_attribute).ok_or_else(|| {
                ProtocolError::InvalidResult("email attribute has no value".into())
            })?;
            check_recipient(address).map_err(|_| {
                warn!(exchange_id = %exchange.id, "disclosed email is not an address");
                ProtocolError::InvalidResult("disclosed email is not an address".into())
            })?;
            Some(address.to_string())
        } else {
            None
        };
        let initiator_values = groups.split_off(exchange.public_initiator_policy.len());
        Ok((groups, initiator_values, email))
    }

    // -----------------------------------------------------------------------
    // Recipient
    // -----------------------------------------------------------------------

    pub fn get_info(&self, id: &ExchangeId) -> ProtocolResult<ExchangeInfo> {
        let exchange = self.load_open(id)?;

        let session = DisclosureRequest::new(exchange.policy.clone())
            .with_client_return_url(self.settings.exchange_url(&exchange.id), true);
        let request_jwt = self.signer.sign_disclosure(ExtendedRequest::new(session))?;

        Ok(ExchangeInfo {
            policy: exchange.policy,
            public_initiator_values: exchange.public_initiator_values.unwrap_or_default(),
            request_jwt,
        })
    }

    /// Record a recipient's disclosure of `policy`.
    pub fn respond(&self, id: &ExchangeId, token: &str) -> ProtocolResult<ExchangeResponse> {
        let exchange = self.load_open(id)?;

        let result = self
            .verifier
            .verify_disclosure(token)
            .map_err(|e| rejected("exchange.respond", e))?;
        if !result.satisfies_policy(&exchange.policy) {
            warn!(exchange_id = %id, "recipient disclosure does not satisfy policy");
            return Err(ProtocolError::PolicyNotSatisfied);
        }

        let reply = ExchangeReply {
            id: ReplyId::generate(),
            exchange_id: exchange.id.clone(),
            recipient_secret: CapabilitySecret::generate(),
            attribute_values: result.disclosed,
        };
        match exchange.exchange_type {
            ExchangeType::OneToOne => {
                if !self.store.push_first_reply(&exchange, &reply)? {
                    info!(exchange_id = %id, "reply lost the race for a one-to-one exchange");
                    return Err(ProtocolError::NotFound);
                }
            }
        }
        info!(exchange_id = %id, reply_id = %reply.id, "Exchange reply stored");

        if exchange.send_email {
            self.notify_initiator(&exchange, &reply);
        }

        Ok(ExchangeResponse {
            recipient_secret: reply.recipient_secret,
            reply_values: reply.attribute_values,
            initiator_values: exchange.initiator_values.unwrap_or_default(),
            public_initiator_values: exchange.public_initiator_values.unwrap_or_default(),
        })
    }

    fn notify_initiator(&self, exchange: &Exchange, reply: &ExchangeReply) {
        let Some(to) = exchange.initiator_email.as_deref() else {
            return;
        };
        let sent = compose_exchange_reply_email(&self.settings.email, to, &reply.attribute_values)
            .and_then(|message| self.notifier.notify(&message));
        if let Err(e) = sent {
            warn!(exchange_id = %exchange.id, error = %e, "failed to notify initiator");
        }
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Results visible to the holder of `secret`.
    ///
    /// The initiator sees every reply; a recipient sees only their own. Any
    /// other secret is `NotFound`.
    pub fn get_result(&self, id: &ExchangeId, secret: &str) -> ProtocolResult<ExchangeResult> {
        let exchange = self.load_started(id)?;
        let replies = self.store.get_replies(id)?;

        let visible: Vec<ExchangeReply> = if exchange.initiator_secret.matches(secret) {
            replies
        } else {
            let own = replies
                .into_iter()
                .find(|reply| reply.recipient_secret.matches(secret))
                .ok_or(ProtocolError::NotFound)?;
            match exchange.exchange_type {
                ExchangeType::OneToOne => vec![own],
            }
        };

        Ok(ExchangeResult {
            initiator_values: exchange.initiator_values.unwrap_or_default(),
            public_initiator_values: exchange.public_initiator_values.unwrap_or_default(),
            replies: visible.into_iter().map(|r| r.attribute_values).collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Lookup guards
    // -----------------------------------------------------------------------

    fn load(&self, id: &ExchangeId) -> ProtocolResult<Exchange> {
        self.store.get(id)?.ok_or(ProtocolError::NotFound)
    }

    fn load_started(&self, id: &ExchangeId) -> ProtocolResult<Exchange> {
        let exchange = self.load(id)?;
        if !exchange.started() {
            return Err(ProtocolError::NotFound);
        }
        Ok(exchange)
    }

    /// Started and still accepting replies.
    fn load_open(&self, id: &ExchangeId) -> ProtocolResult<Exchange> {
        let exchange = self.load_started(id)?;
        match exchange.exchange_type {
            ExchangeType::OneToOne => {
                if !self.store.get_replies(id)?.is_empty() {
                    return Err(ProtocolError::NotFound);
                }
            }
        }
        Ok(exchange)
    }
}
