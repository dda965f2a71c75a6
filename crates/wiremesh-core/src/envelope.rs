//! The envelope message unit and its wire codec.
//!
//! Envelopes are the routed message unit of the fabric: a type tag, opaque
//! payload bytes, the sending client, the addressed recipients, and an
//! optional timestamp. The wire encoding is MessagePack with short field
//! names and zero-valued fields elided, so the same schema reads identically
//! on every node.
//!
//! Two encodings exist:
//!
//! - [`Envelope::to_bytes`]: the full envelope, used between minions.
//! - [`Envelope::to_outbound`]: the pruned delivery form handed to client
//!   sockets: recipients are stripped, and a timestamp is stamped iff the
//!   envelope kind requires one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::ClientId;

/// The envelope type tag.
///
/// Encoded as a bare integer on the wire; `Chat` is the zero value and is
/// elided when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EnvelopeKind {
    /// A chat message.
    #[default]
    Chat,
}

impl EnvelopeKind {
    /// Whether delivery of this kind stamps a timestamp on the outbound form.
    #[must_use]
    pub const fn requires_timestamp(self) -> bool {
        match self {
            Self::Chat => true,
        }
    }

    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl From<EnvelopeKind> for u8 {
    fn from(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::Chat => 0,
        }
    }
}

impl TryFrom<u8> for EnvelopeKind {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Chat),
            other => Err(format!("unknown envelope kind: {other}")),
        }
    }
}

/// A routed message: type tag, opaque payload, sender, recipients, and an
/// optional timestamp.
///
/// The sender field is always overwritten with the authenticated client id
/// when an envelope enters the fabric; a client-supplied sender is ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope type tag.
    #[serde(rename = "t", default, skip_serializing_if = "EnvelopeKind::is_default")]
    kind: EnvelopeKind,

    /// Opaque payload bytes.
    #[serde(rename = "d", default, skip_serializing_if = "Vec::is_empty")]
    data: Vec<u8>,

    /// The sending client.
    #[serde(rename = "s", default, skip_serializing_if = "ClientId::is_empty")]
    sender: ClientId,

    /// The addressed recipients. Stripped from the outbound form.
    #[serde(rename = "r", default, skip_serializing_if = "Vec::is_empty")]
    recipients: Vec<ClientId>,

    /// Delivery timestamp, present iff the kind requires one.
    #[serde(rename = "ts", default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Create an envelope with no sender and no timestamp.
    #[must_use]
    pub fn new(kind: EnvelopeKind, data: Vec<u8>, recipients: Vec<ClientId>) -> Self {
        Self {
            kind,
            data,
            recipients,
            ..Self::default()
        }
    }

    /// Decode an envelope from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Decode`] if the bytes are not a valid
    /// envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Encode the full envelope to wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Encode`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Encode the pruned outbound form for delivery to a client socket.
    ///
    /// Recipients are stripped; `now` is stamped as the timestamp iff the
    /// envelope kind requires one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Encode`] if encoding fails.
    pub fn to_outbound(&self, now: DateTime<Utc>) -> Result<Vec<u8>> {
        let out = Self {
            kind: self.kind,
            data: self.data.clone(),
            sender: self.sender.clone(),
            recipients: Vec::new(),
            timestamp: self.kind.requires_timestamp().then_some(now),
        };
        out.to_bytes()
    }

    /// The envelope type tag.
    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    /// The payload bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The sending client.
    #[must_use]
    pub const fn sender(&self) -> &ClientId {
        &self.sender
    }

    /// Overwrite the sender with the authenticated client id.
    pub fn set_sender(&mut self, sender: ClientId) {
        self.sender = sender;
    }

    /// The addressed recipients.
    #[must_use]
    pub fn recipients(&self) -> &[ClientId] {
        &self.recipients
    }

    /// Rewrite the recipient list, e.g. during per-minion fan-out.
    pub fn set_recipients(&mut self, recipients: Vec<ClientId>) {
        self.recipients = recipients;
    }

    /// The delivery timestamp, if stamped.
    #[must_use]
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(data: &[u8], recipients: &[&str]) -> Envelope {
        Envelope::new(
            EnvelopeKind::Chat,
            data.to_vec(),
            recipients.iter().map(|r| ClientId::from(*r)).collect(),
        )
    }

    #[test]
    fn roundtrip() {
        let mut envelope = chat(b"hi", &["2", "3"]);
        envelope.set_sender(ClientId::from("1"));

        let bytes = envelope.to_bytes().unwrap();
        let decoded = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn roundtrip_empty_envelope() {
        let envelope = Envelope::default();
        let bytes = envelope.to_bytes().unwrap();
        let decoded = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn zero_fields_are_elided() {
        // An all-default envelope encodes as an empty map.
        let empty = Envelope::default().to_bytes().unwrap();
        let full = {
            let mut e = chat(b"payload", &["2"]);
            e.set_sender(ClientId::from("1"));
            e.to_bytes().unwrap()
        };
        assert!(empty.len() < full.len());
    }

    #[test]
    fn outbound_strips_recipients() {
        let mut envelope = chat(b"hi", &["2"]);
        envelope.set_sender(ClientId::from("1"));

        let now = Utc::now();
        let bytes = envelope.to_outbound(now).unwrap();
        let delivered = Envelope::from_bytes(&bytes).unwrap();

        assert!(delivered.recipients().is_empty());
        assert_eq!(delivered.sender(), &ClientId::from("1"));
        assert_eq!(delivered.data(), b"hi");
    }

    #[test]
    fn outbound_stamps_timestamp_for_chat() {
        let envelope = chat(b"hi", &["2"]);
        let now = Utc::now();

        let bytes = envelope.to_outbound(now).unwrap();
        let delivered = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(delivered.timestamp(), Some(now));
    }

    #[test]
    fn inbound_sender_is_overwritten() {
        // A client claiming to be someone else is corrected at the edge.
        let mut envelope = chat(b"hi", &["2"]);
        envelope.set_sender(ClientId::from("forged"));
        envelope.set_sender(ClientId::from("authenticated"));
        assert_eq!(envelope.sender(), &ClientId::from("authenticated"));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Envelope::from_bytes(&[0xc1, 0xff, 0x00]).is_err());
    }

    #[test]
    fn recipient_rewrite() {
        let mut envelope = chat(b"hi", &["2", "3", "4"]);
        envelope.set_recipients(vec![ClientId::from("3")]);
        assert_eq!(envelope.recipients(), &[ClientId::from("3")]);
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!(EnvelopeKind::try_from(7u8).is_err());
    }
}
