//! Fake POP3 server for integration testing
//!
//! Serves the first folder of a [`Mailbox`] over implicit TLS (port
//! 995 style), with the commands the reader uses:
//!
//! ```text
//!   S: +OK POP3 ready
//!   C: USER bob            S: +OK
//!   C: PASS secret         S: +OK logged in
//!   C: STAT                S: +OK 2 480
//!   C: RETR 1              S: +OK 240 octets / <message> / .
//!   C: TOP 2 0             S: +OK / <headers> / .
//!   C: QUIT                S: +OK bye
//! ```
//!
//! Message lines starting with `.` are dot-stuffed.

use crate::fake_imap::io::{read_line, write_bytes, write_line};
use crate::fake_imap::{Mailbox, tls_acceptor};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;

pub struct FakePop3Server {
    port: u16,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakePop3Server {
    pub async fn start(mailbox: Mailbox) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let acceptor = tls_acceptor();
        let mailbox = Arc::new(mailbox);

        let handle = tokio::spawn(async move {
            while let Ok((stream, _addr)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let mailbox = mailbox.clone();
                tokio::spawn(async move {
                    let Ok(tls_stream) = acceptor.accept(stream).await else {
                        return;
                    };
                    handle_pop3_session(tls_stream, &mailbox).await;
                });
            }
        });

        Self {
            port,
            _handle: handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// Encode a message for a multi-line reply: CRLF line endings, leading
/// dots doubled, terminated by `.`.
fn dot_stuff(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 8);
    let text = String::from_utf8_lossy(raw);
    for line in text.split("\r\n") {
        if line.starts_with('.') {
            out.push(b'.');
        }
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b".\r\n");
    out
}

/// The header block of a message, blank line included.
fn headers_of(raw: &[u8]) -> &[u8] {
    raw.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map_or(raw, |pos| &raw[..pos + 2])
}

async fn handle_pop3_session<S: AsyncRead + AsyncWrite + Unpin>(stream: S, mailbox: &Mailbox) {
    let mut stream = BufReader::new(stream);
    let emails = mailbox
        .folders
        .first()
        .map(|f| f.emails.as_slice())
        .unwrap_or_default();
    let mut user: Option<String> = None;

    if write_line(&mut stream, "+OK POP3 fake server ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    while let Some(line) = read_line(&mut stream).await {
        let line = line.trim_end();
        let (command, args) = line.split_once(' ').unwrap_or((line, ""));
        let message = |n: &str| {
            n.parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| emails.get(i))
        };

        let reply: Vec<u8> = match command.to_ascii_uppercase().as_str() {
            "USER" => {
                user = Some(args.to_string());
                b"+OK\r\n".to_vec()
            }
            "PASS" => {
                if mailbox.accepts(user.as_deref().unwrap_or_default(), args) {
                    b"+OK logged in\r\n".to_vec()
                } else {
                    b"-ERR [AUTH] invalid credentials\r\n".to_vec()
                }
            }
            "STAT" => {
                let size: usize = emails.iter().map(|e| e.raw.len()).sum();
                format!("+OK {} {size}\r\n", emails.len()).into_bytes()
            }
            "RETR" => match message(args) {
                Some(email) => {
                    let mut reply = format!("+OK {} octets\r\n", email.raw.len()).into_bytes();
                    reply.extend(dot_stuff(&email.raw));
                    reply
                }
                None => b"-ERR no such message\r\n".to_vec(),
            },
            "TOP" => match message(args.split(' ').next().unwrap_or_default()) {
                Some(email) => {
                    let mut reply = b"+OK\r\n".to_vec();
                    reply.extend(dot_stuff(headers_of(&email.raw)));
                    reply
                }
                None => b"-ERR no such message\r\n".to_vec(),
            },
            "QUIT" => {
                let _ = write_line(&mut stream, "+OK bye\r\n").await;
                break;
            }
            _ => b"-ERR unknown command\r\n".to_vec(),
        };

        if write_bytes(&mut stream, &reply).await.is_err() {
            break;
        }
    }
}
