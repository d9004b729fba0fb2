/// MIME decoding for messages fetched by the mail session.
///
/// Turns raw RFC 822 bytes into listing metadata or a full message detail.
/// Headers are RFC 2047-decoded by `mail-parser`.
use crate::domain::entities::{
    AttachmentInfo, MailFlag, MessageDetail, MessageMetadata, RawMessage,
};
use crate::domain::errors::{DomainError, DomainResult};
use mail_parser::{Address, HeaderValue, Message, MessageParser, MimeHeaders, PartType};

pub struct EmailParserService;

impl EmailParserService {
    pub fn new() -> Self {
        Self
    }

    /// Parse a header-only (or full) fetch into listing metadata.
    pub fn parse_metadata(&self, raw: &RawMessage) -> DomainResult<MessageMetadata> {
        let message = parse(raw)?;

        let has_attachments = message
            .root_part()
            .content_type()
            .map(|ct| {
                ct.ctype().eq_ignore_ascii_case("multipart")
                    && ct
                        .subtype()
                        .map_or(false, |sub| sub.eq_ignore_ascii_case("mixed"))
            })
            .unwrap_or(false);

        Ok(MessageMetadata {
            id: raw.uid,
            from_address: format_address_list(message.from()).unwrap_or_default(),
            to: format_address_list(message.to()).unwrap_or_default(),
            subject: message.subject().unwrap_or_default().to_string(),
            date: message.date().map(|d| d.to_rfc3339()),
            size: raw.size,
            is_read: raw.has_flag(&MailFlag::Seen),
            is_flagged: raw.has_flag(&MailFlag::Flagged),
            has_attachments,
        })
    }

    /// Decode a complete message: bodies, attachment descriptors and threading headers.
    pub fn parse_detail(&self, raw: &RawMessage) -> DomainResult<MessageDetail> {
        let message = parse(raw)?;

        let mut body_plain: Option<String> = None;
        let mut body_html: Option<String> = None;
        let mut attachments = Vec::new();

        for part in message.parts.iter() {
            let is_attachment = part
                .content_disposition()
                .map_or(false, |cd| cd.ctype().eq_ignore_ascii_case("attachment"));

            if is_attachment {
                let content_type = part
                    .content_type()
                    .map(|ct| match ct.subtype() {
                        Some(sub) => format!("{}/{}", ct.ctype(), sub),
                        None => ct.ctype().to_string(),
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                attachments.push(AttachmentInfo {
                    filename: part.attachment_name().unwrap_or("attachment").to_string(),
                    content_type,
                    size: part.len(),
                });
                continue;
            }

            match &part.body {
                PartType::Text(text) if body_plain.is_none() => {
                    body_plain = Some(text.to_string());
                }
                PartType::Html(html) if body_html.is_none() => {
                    body_html = Some(html.to_string());
                }
                _ => {}
            }
        }

        Ok(MessageDetail {
            id: raw.uid,
            from_address: format_address_list(message.from()).unwrap_or_default(),
            to: format_address_list(message.to()).unwrap_or_default(),
            cc: format_address_list(message.cc()),
            bcc: format_address_list(message.bcc()),
            subject: message.subject().unwrap_or_default().to_string(),
            date: message.date().map(|d| d.to_rfc3339()),
            body_plain: body_plain.unwrap_or_default(),
            body_html: body_html.unwrap_or_default(),
            attachments,
            is_read: raw.has_flag(&MailFlag::Seen),
            is_flagged: raw.has_flag(&MailFlag::Flagged),
            message_id: message.message_id().unwrap_or_default().to_string(),
            in_reply_to: header_text(message.in_reply_to()),
            references: header_text(message.references()),
        })
    }
}

impl Default for EmailParserService {
    fn default() -> Self {
        Self::new()
    }
}

fn parse(raw: &RawMessage) -> DomainResult<Message<'_>> {
    MessageParser::default()
        .parse(raw.content.as_slice())
        .ok_or_else(|| DomainError::Internal(format!("Failed to parse message {}", raw.uid)))
}

fn header_text(value: &HeaderValue) -> Option<String> {
    match value {
        HeaderValue::Text(t) => Some(t.to_string()),
        HeaderValue::TextList(list) if !list.is_empty() => Some(
            list.iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

/// Comma-separated `Name <local@domain>` (or bare address) entries.
fn format_address_list(addr: Option<&Address>) -> Option<String> {
    let parts: Vec<String> = addr?
        .iter()
        .map(|a| {
            let email = a.address.as_deref().unwrap_or("");
            match a.name.as_deref() {
                Some(name) if !name.is_empty() => format!("{} <{}>", name, email),
                _ => email.to_string(),
            }
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
