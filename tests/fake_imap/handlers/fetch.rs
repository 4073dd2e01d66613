//! FETCH command handler (sequence numbers, not UIDs).
//!
//! Serves the three items the reader asks for: `UID`, `ENVELOPE` and
//! `BODY.PEEK[]`. The envelope is built from the stored message's
//! headers; the body goes out as a counted literal:
//!
//! ```text
//! * 1 FETCH (UID 42 ENVELOPE ("Mon, 1 Jan 2024 ..." "Hi" ...) BODY[] {1234}
//! <exactly 1234 bytes of raw RFC 2822 message>
//! )
//! ```
//!
//! `BODY.PEEK[]` leaves the `\Seen` flag alone, so this handler never
//! touches the mailbox.

use super::expand_sequence;
use crate::fake_imap::io::{write_bytes, write_line};
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use imap_codec::imap_types::sequence::SequenceSet;
use mailparse::{MailAddr, MailHeader, MailHeaderMap};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Which data items a FETCH asked for, read off the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub uid: bool,
    pub envelope: bool,
    pub body: bool,
}

impl FetchRequest {
    pub fn from_line(line: &str) -> Self {
        let upper = line.to_ascii_uppercase();
        let items = upper.split_once('(').map_or("", |(_, rest)| rest);
        Self {
            uid: items.contains("UID"),
            envelope: items.contains("ENVELOPE"),
            body: items.contains("BODY.PEEK[]") || items.contains("BODY[]"),
        }
    }
}

/// Handle the FETCH command for the selected folder.
pub async fn handle_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    request: FetchRequest,
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder) = selected_folder.and_then(|name| mailbox.get_folder(name)) else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let exists = u32::try_from(folder.emails.len()).unwrap_or(u32::MAX);
    for seq in expand_sequence(sequence_set, exists) {
        let Some(email) = folder.emails.get(seq as usize - 1) else {
            continue;
        };
        if write_message(stream, seq, email, request).await.is_err() {
            return;
        }
    }

    let resp = format!("{tag} OK FETCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

async fn write_message<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    seq: u32,
    email: &TestEmail,
    request: FetchRequest,
) -> std::io::Result<()> {
    let mut items = Vec::new();
    if request.uid {
        items.push(format!("UID {}", email.uid));
    }
    if request.envelope {
        items.push(format!("ENVELOPE {}", envelope(&email.raw)));
    }

    let mut head = format!("* {seq} FETCH ({}", items.join(" "));
    if !request.body {
        head.push_str(")\r\n");
        return write_line(stream, &head).await;
    }

    if !items.is_empty() {
        head.push(' ');
    }
    head.push_str(&format!("BODY[] {{{}}}\r\n", email.raw.len()));
    write_line(stream, &head).await?;
    write_bytes(stream, &email.raw).await?;
    write_line(stream, ")\r\n").await
}

/// RFC 3501 ENVELOPE structure for a raw message.
pub fn envelope(raw: &[u8]) -> String {
    let headers = mailparse::parse_headers(raw).map(|(h, _)| h).unwrap_or_default();
    let raw_value = |name: &str| {
        headers
            .get_first_header(name)
            .map(|h| quoted(&String::from_utf8_lossy(h.get_value_raw())))
            .unwrap_or_else(|| "NIL".to_string())
    };
    let list = |name: &str| address_list(headers.get_first_header(name));

    let from = list("From");
    let sender = headers
        .get_first_header("Sender")
        .map_or_else(|| from.clone(), |h| address_list(Some(h)));
    let reply_to = headers
        .get_first_header("Reply-To")
        .map_or_else(|| from.clone(), |h| address_list(Some(h)));

    format!(
        "({} {} {from} {sender} {reply_to} {} {} {} {} {})",
        raw_value("Date"),
        raw_value("Subject"),
        list("To"),
        list("Cc"),
        list("Bcc"),
        raw_value("In-Reply-To"),
        raw_value("Message-ID"),
    )
}

fn address_list(header: Option<&MailHeader<'_>>) -> String {
    let Some(parsed) = header.and_then(|h| mailparse::addrparse_header(h).ok()) else {
        return "NIL".to_string();
    };

    let mut out = Vec::new();
    for addr in parsed.iter() {
        match addr {
            MailAddr::Single(info) => {
                out.push(address(info.display_name.as_deref(), &info.addr));
            }
            MailAddr::Group(group) => {
                for info in &group.addrs {
                    out.push(address(info.display_name.as_deref(), &info.addr));
                }
            }
        }
    }
    if out.is_empty() {
        "NIL".to_string()
    } else {
        format!("({})", out.join(""))
    }
}

fn address(name: Option<&str>, addr: &str) -> String {
    let (mailbox, host) = addr.split_once('@').unwrap_or((addr, ""));
    let host = if host.is_empty() {
        "NIL".to_string()
    } else {
        quoted(host)
    };
    format!(
        "({} NIL {} {host})",
        name.map_or_else(|| "NIL".to_string(), quoted),
        quoted(mailbox)
    )
}

fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\r' | '\n' => {}
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use imap_codec::imap_types::sequence::{SeqOrUid, Sequence};
    use std::num::NonZeroU32;
    use tokio::io::{AsyncReadExt, BufReader};

    const MAIL: &[u8] = b"Date: Mon, 01 Jan 2024 10:00:00 +0000\r\n\
From: Alice <alice@example.com>\r\n\
To: bob@example.com, carol@example.com\r\n\
Subject: Your code\r\n\
Message-ID: <1@example.com>\r\n\
\r\n\
123456";

    fn range(lo: u32, hi: u32) -> SequenceSet {
        let value = |v| SeqOrUid::Value(NonZeroU32::new(v).unwrap());
        SequenceSet(vec![Sequence::Range(value(lo), value(hi))].try_into().unwrap())
    }

    async fn run(set: &SequenceSet, request: FetchRequest, mailbox: &Mailbox) -> String {
        let (client, server) = tokio::io::duplex(16384);
        let mut stream = BufReader::new(server);

        handle_fetch("F1", set, request, mailbox, Some("INBOX"), &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        BufReader::new(client).read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn request_is_read_from_item_list() {
        let request = FetchRequest::from_line("A3 FETCH 1:2 (UID ENVELOPE BODY.PEEK[])");
        assert_eq!(
            request,
            FetchRequest {
                uid: true,
                envelope: true,
                body: true,
            }
        );

        let request = FetchRequest::from_line("A3 FETCH 4 (ENVELOPE)");
        assert!(request.envelope && !request.uid && !request.body);
    }

    #[test]
    fn envelope_lists_addresses_and_nil_for_missing_headers() {
        let env = envelope(MAIL);

        assert!(env.starts_with("(\"Mon, 01 Jan 2024 10:00:00 +0000\" \"Your code\""));
        assert!(env.contains("((\"Alice\" NIL \"alice\" \"example.com\"))"));
        assert!(env.contains(
            "((NIL NIL \"bob\" \"example.com\")(NIL NIL \"carol\" \"example.com\"))"
        ));
        assert!(env.ends_with("NIL NIL NIL \"<1@example.com>\")"));
    }

    #[tokio::test]
    async fn body_is_sent_as_literal() {
        let mailbox = MailboxBuilder::new().folder("INBOX").email(7, false, MAIL).build();
        let request = FetchRequest {
            uid: true,
            envelope: false,
            body: true,
        };

        let output = run(&range(1, 1), request, &mailbox).await;

        let head = format!("* 1 FETCH (UID 7 BODY[] {{{}}}\r\n", MAIL.len());
        assert!(output.starts_with(&head));
        assert!(output.contains("123456)\r\n"));
        assert!(output.ends_with("F1 OK FETCH completed\r\n"));
    }

    #[tokio::test]
    async fn range_past_the_end_is_clipped() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(1, false, MAIL)
            .email(2, false, MAIL)
            .build();
        let request = FetchRequest {
            envelope: true,
            ..FetchRequest::default()
        };

        let output = run(&range(1, 5), request, &mailbox).await;

        assert!(output.contains("* 1 FETCH (ENVELOPE"));
        assert!(output.contains("* 2 FETCH (ENVELOPE"));
        assert!(!output.contains("* 3 FETCH"));
    }

    #[tokio::test]
    async fn fetch_does_not_mark_seen() {
        let mailbox = MailboxBuilder::new().folder("INBOX").email(1, false, MAIL).build();
        let request = FetchRequest::from_line("F1 FETCH 1 (BODY.PEEK[])");

        let output = run(&range(1, 1), request, &mailbox).await;

        assert!(!output.contains("\\Seen"));
        assert!(!mailbox.folders[0].emails[0].seen);
    }
}
