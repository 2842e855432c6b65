//! Composition of the two notification emails.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use diyivi_policy::{Attribute, DisclosedValues};
use serde::Serialize;

use crate::error::{NotifyError, NotifyResult};
use crate::types::{check_recipient, EmailMessage, EmailSettings};

const SUBJECT: &str = "Antwoord via DIYivi";
const LANGUAGE: &str = "nl";

/// Labels for the attributes the web client offers, keyed by id without
/// the scheme so demo and production schemes share them.
const ATTRIBUTE_LABELS: &[(&str, &str)] = &[
    ("gemeente.personalData.fullname", "Naam"),
    ("gemeente.personalData.dateofbirth", "Geboortedatum"),
    ("sidn-pbdf.mobilenumber.mobilenumber", "Mobiel telefoonnummer"),
    ("sidn-pbdf.email.email", "E-mailadres"),
];

/// Human-readable label for `attribute`, or its bare name when unknown.
pub fn attribute_label(attribute: &Attribute) -> &str {
    let id = attribute.as_str();
    let without_scheme = id.split_once('.').map_or(id, |(_, rest)| rest);
    ATTRIBUTE_LABELS
        .iter()
        .find(|(suffix, _)| *suffix == without_scheme)
        .map_or_else(|| attribute.name(), |(_, label)| *label)
}

/// Email to an exchange initiator listing the values a recipient disclosed.
pub fn compose_exchange_reply_email(
    settings: &EmailSettings,
    to: &str,
    reply_values: &DisclosedValues,
) -> NotifyResult<EmailMessage> {
    check_recipient(to)?;

    let lines: Vec<String> = reply_values
        .iter()
        .flatten()
        .map(|attribute| {
            let value = attribute
                .value
                .best(LANGUAGE)
                .or(attribute.rawvalue.as_deref())
                .unwrap_or("-");
            format!("- {}: {}", attribute_label(&attribute.id), value)
        })
        .collect();

    let body = format!(
        "Beste gebruiker van DIYivi,

Gefeliciteerd! Iemand heeft gereageerd op je verzoek om gegevens uit te wisselen.
Dit zijn de gegevens die je hebt ontvangen:

{}

Al deze gegevens worden vanzelf binnen 48 uur van DIYivi verwijderd.
Dit is een automatisch gegenereerd bericht. U kunt hier niet op reageren.
",
        lines.join("\n")
    );

    Ok(EmailMessage {
        from: settings.sender(),
        to: to.to_string(),
        subject: SUBJECT.to_string(),
        body,
    })
}

/// `{client_origin}/signature/verify/#<base64 of the signature JSON>`.
pub fn signature_verify_link<S: Serialize>(
    settings: &EmailSettings,
    signature: &S,
) -> NotifyResult<String> {
    let json = serde_json::to_vec(signature).map_err(|_| NotifyError::InternalError)?;
    Ok(format!(
        "{}/signature/verify/#{}",
        settings.client_origin.trim_end_matches('/'),
        STANDARD.encode(json)
    ))
}

/// Email to a signature requester carrying a link to the signed message.
pub fn compose_signature_result_email<S: Serialize>(
    settings: &EmailSettings,
    to: &str,
    signature: &S,
) -> NotifyResult<EmailMessage> {
    check_recipient(to)?;
    let link = signature_verify_link(settings, signature)?;
    let origin = settings.client_origin.trim_end_matches('/');

    let body = format!(
        "Beste gebruiker van DIYivi,

Gefeliciteerd! Iemand heeft gereageerd op je verzoek om een afspraak te ondertekenen.
Hier is het ondertekende bericht. Open de lange link hieronder of kopieer hem en vul hem
in op {origin}/signature/verify/ om de handtekening te bekijken.

{link}

Dit is een automatisch gegenereerd bericht. U kunt hier niet op reageren.
"
    );

    Ok(EmailMessage {
        from: settings.sender(),
        to: to.to_string(),
        subject: SUBJECT.to_string(),
        body,
    })
}
