//! LIST and SELECT command handlers.
//!
//! LIST answers with every folder of the mailbox. Folders named like a
//! spam box carry the RFC 6154 `\Junk` attribute:
//!
//! ```text
//! * LIST (\HasNoChildren) "/" "INBOX"
//! * LIST (\HasNoChildren \Junk) "/" "[Gmail]/Spam"
//! A0002 OK LIST completed
//! ```
//!
//! SELECT reports the message count and opens the folder read-write,
//! or `[READ-ONLY]` when the mailbox refuses flag changes.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

fn is_spam_folder(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with("spam") || lower.ends_with("junk")
}

/// Handle the LIST command. Returns `false` when the connection
/// should be closed.
pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> bool {
    for folder in &mailbox.folders {
        let attributes = if is_spam_folder(&folder.name) {
            "\\HasNoChildren \\Junk"
        } else {
            "\\HasNoChildren"
        };
        let line = format!("* LIST ({attributes}) \"/\" \"{}\"\r\n", folder.name);
        if write_line(stream, &line).await.is_err() {
            return false;
        }
        if mailbox.drop_during_list {
            let _ = write_line(stream, "* LIST (\\HasNoChildren) \"/\" \"Trunc").await;
            return false;
        }
    }
    let resp = format!("{tag} OK LIST completed\r\n");
    write_line(stream, &resp).await.is_ok()
}

/// Handle the SELECT command. Returns the selected folder name, or
/// `None` when the folder does not exist.
pub async fn handle_select<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder_name: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> Option<String> {
    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} NO [NONEXISTENT] Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return None;
    };

    let unseen = folder.emails.iter().position(|e| !e.seen);
    let mut lines = vec![
        "* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)\r\n".to_string(),
        format!("* {} EXISTS\r\n", folder.emails.len()),
        "* 0 RECENT\r\n".to_string(),
        "* OK [UIDVALIDITY 1]\r\n".to_string(),
    ];
    if let Some(pos) = unseen {
        lines.push(format!("* OK [UNSEEN {}]\r\n", pos + 1));
    }
    let access = if mailbox.read_only {
        "READ-ONLY"
    } else {
        "READ-WRITE"
    };
    lines.push(format!("{tag} OK [{access}] SELECT completed\r\n"));

    for line in &lines {
        if write_line(stream, line).await.is_err() {
            return None;
        }
    }
    Some(folder_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use tokio::io::{AsyncReadExt, BufReader, DuplexStream};

    const RAW: &[u8] = b"From: a@b.com\r\nSubject: Test\r\n\r\nBody";

    async fn read_all(client: DuplexStream) -> String {
        let mut buf = Vec::new();
        BufReader::new(client).read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    async fn list(mailbox: &Mailbox) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);
        assert!(handle_list("L1", mailbox, &mut stream).await);
        drop(stream);
        read_all(client).await
    }

    async fn select(name: &str, mailbox: &Mailbox) -> (String, Option<String>) {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);
        let selected = handle_select("S1", name, mailbox, &mut stream).await;
        drop(stream);
        (read_all(client).await, selected)
    }

    #[tokio::test]
    async fn list_can_hang_up_mid_response() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .folder("Sent")
            .drop_during_list()
            .build();
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);
        assert!(!handle_list("L1", &mailbox, &mut stream).await);
        drop(stream);

        let output = read_all(client).await;
        assert!(output.contains("\"INBOX\"\r\n"));
        assert!(!output.contains("Sent"));
        assert!(!output.contains("L1 OK"));
    }

    #[tokio::test]
    async fn lists_folders_in_order() {
        let mailbox = MailboxBuilder::new().folder("INBOX").folder("Sent").build();
        let output = list(&mailbox).await;

        let inbox = output.find("\"INBOX\"").unwrap();
        let sent = output.find("\"Sent\"").unwrap();
        assert!(inbox < sent);
        assert!(output.ends_with("L1 OK LIST completed\r\n"));
    }

    #[tokio::test]
    async fn spam_folder_is_marked_junk() {
        let mailbox = MailboxBuilder::new().folder("[Gmail]/Spam").build();
        let output = list(&mailbox).await;
        assert!(output.contains("(\\HasNoChildren \\Junk) \"/\" \"[Gmail]/Spam\""));
    }

    #[tokio::test]
    async fn empty_mailbox_lists_nothing() {
        let output = list(&MailboxBuilder::new().build()).await;
        assert_eq!(output, "L1 OK LIST completed\r\n");
    }

    #[tokio::test]
    async fn select_reports_count_and_first_unseen() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(1, true, RAW)
            .email(2, false, RAW)
            .build();

        let (output, selected) = select("INBOX", &mailbox).await;

        assert_eq!(selected.as_deref(), Some("INBOX"));
        assert!(output.contains("* 2 EXISTS\r\n"));
        assert!(output.contains("* OK [UNSEEN 2]"));
        assert!(output.ends_with("S1 OK [READ-WRITE] SELECT completed\r\n"));
    }

    #[tokio::test]
    async fn read_only_mailbox_selects_read_only() {
        let mailbox = MailboxBuilder::new().read_only().folder("INBOX").build();
        let (output, _) = select("INBOX", &mailbox).await;
        assert!(output.contains("[READ-ONLY]"));
    }

    #[tokio::test]
    async fn missing_folder_is_refused() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();
        let (output, selected) = select("Archive", &mailbox).await;

        assert!(selected.is_none());
        assert!(output.starts_with("S1 NO"));
    }
}
