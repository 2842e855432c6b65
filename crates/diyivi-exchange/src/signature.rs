//! Signature-request engine.
//!
//! `create` → `start` (initiator proves an email address) → `get_info` →
//! `submit_signature`, after which the request is gone.

use std::sync::Arc;

use diyivi_attest::{
    DisclosureRequest, ExtendedRequest, RequestSigner, ResultVerifier, SignedMessage,
    SigningRequest,
};
use diyivi_core::{SignatureRequestId, Timestamp};
use diyivi_notify::{check_recipient, compose_signature_result_email, Notifier};
use diyivi_policy::Policy;
use tracing::{info, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::exchange::{raw_value_of, rejected};
use crate::settings::ProtocolSettings;
use crate::store::SignatureStore;
use crate::types::{
    CreateSignatureRequest, CreatedSignatureRequest, SignatureRequest, SignatureRequestInfo,
};

pub struct SignatureEngine {
    store: SignatureStore,
    verifier: Arc<dyn ResultVerifier>,
    signer: Arc<RequestSigner>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<ProtocolSettings>,
}

impl SignatureEngine {
    pub fn new(
        store: SignatureStore,
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

    pub fn store(&self) -> &SignatureStore {
        &self.store
    }

    fn email_policy(&self) -> Policy {
        Policy::single(self.settings.email_attribute.clone())
    }

    /// Store a new request and return the email disclosure that starts it.
    pub fn create(&self, request: CreateSignatureRequest) -> ProtocolResult<CreatedSignatureRequest> {
        request.validate()?;

        let signature_request = SignatureRequest {
            id: SignatureRequestId::generate(),
            message: request.message,
            attributes: request.attributes,
            initiator_email: None,
            expire_at: Timestamp::in_seconds(self.settings.ttl.before_start),
        };
        let request_jwt = self
            .signer
            .sign_disclosure(ExtendedRequest::new(DisclosureRequest::new(self.email_policy())))?;

        self.store.save(&signature_request)?;
        info!(
            request_id = %signature_request.id,
            attributes = signature_request.attributes.len(),
            "Signature request created"
        );

        Ok(CreatedSignatureRequest {
            id: signature_request.id,
            request_jwt,
        })
    }

    pub fn start(&self, id: &SignatureRequestId, token: &str) -> ProtocolResult<()> {
        let mut request = self.load(id)?;
        if request.started() {
            return Err(ProtocolError::AlreadyStarted);
        }

        let result = self
            .verifier
            .verify_disclosure(token)
            .map_err(|e| rejected("signature.start", e))?;
        if !result.satisfies_policy(&self.email_policy()) {
            warn!(request_id = %id, "email disclosure does not satisfy policy");
            return Err(ProtocolError::PolicyNotSatisfied);
        }
        let email = result
            .disclosed
            .first()
            .and_then(|group| raw_value_of(group, &self.settings.email_attribute))
            .ok_or_else(|| ProtocolError::InvalidResult("email attribute has no value".into()))?;
        check_recipient(email).map_err(|_| {
            warn!(request_id = %id, "disclosed email is not an address");
            ProtocolError::InvalidResult("disclosed email is not an address".into())
        })?;

        request.initiator_email = Some(email.to_string());
        request.expire_at = Timestamp::in_seconds(self.settings.ttl.signature_request);

        self.store.save(&request)?;
        info!(request_id = %id, "Signature request started");
        Ok(())
    }

    pub fn get_info(&self, id: &SignatureRequestId) -> ProtocolResult<SignatureRequestInfo> {
        let request = self.load(id)?;
        let Some(initiator_email) = request.initiator_email.clone() else {
            return Err(ProtocolError::NotFound);
        };

        let policy = request.policy();
        let session = SigningRequest::new(request.message.clone(), policy.clone());
        let request_jwt = self.signer.sign_signing(ExtendedRequest::new(session))?;

        Ok(SignatureRequestInfo {
            message: request.message,
            attributes: request.attributes,
            policy,
            initiator_email,
            request_jwt,
        })
    }

    /// Consume the request and mail the signature to the initiator.
    ///
    /// The request is deleted before the mail goes out, so of several
    /// concurrent submissions exactly one succeeds and the rest see
    /// `NotFound`.
    pub fn submit_signature(&self, id: &SignatureRequestId, token: &str) -> ProtocolResult<()> {
        let request = self.load(id)?;
        let Some(initiator_email) = request.initiator_email.as_deref() else {
            return Err(ProtocolError::NotFound);
        };

        let result = self
            .verifier
            .verify_signature(token)
            .map_err(|e| rejected("signature.submit", e))?;
        if !result.signs(&request.message, &request.policy()) {
            warn!(request_id = %id, "signature does not match the request");
            return Err(ProtocolError::PolicyNotSatisfied);
        }

        // Only the submission that removes the request may notify.
        if !self.store.delete(id)? {
            info!(request_id = %id, "signature request already consumed");
            return Err(ProtocolError::NotFound);
        }
        info!(request_id = %id, "Signature submitted");
        self.notify_initiator(id, initiator_email, &result.signature);
        Ok(())
    }

    fn notify_initiator(&self, id: &SignatureRequestId, to: &str, signature: &SignedMessage) {
        let sent = compose_signature_result_email(&self.settings.email, to, signature)
            .and_then(|message| self.notifier.notify(&message));
        if let Err(e) = sent {
            warn!(request_id = %id, error = %e, "failed to notify initiator");
        }
    }

    fn load(&self, id: &SignatureRequestId) -> ProtocolResult<SignatureRequest> {
        self.store.get(id)?.ok_or(ProtocolError::NotFound)
    }
}
