#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for reading a mailbox over IMAP or POP3

use clap::{Parser, Subcommand};
use mail_reader::{Folder, Mail, MailReader, ReaderConfig, ReaderType};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mail-reader")]
#[command(about = "Read IMAP/POP3 mailboxes, directly or through a proxy")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every message of a folder
    Dump {
        /// Folder to read (`inbox`, `spam` or a mailbox name)
        #[arg(long, default_value = "inbox")]
        folder: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Wait for the newest unseen message to a recipient and mark it seen
    Wait {
        /// Recipient address to wait for
        #[arg(long)]
        receiver: String,

        /// Folder to watch
        #[arg(long, default_value = "inbox")]
        folder: String,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List available folders
    Folders,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ReaderConfig::from_env()?;
    let reader_type = match std::env::var("MAIL_READER_TYPE") {
        Ok(raw) if !raw.trim().is_empty() => raw.parse::<ReaderType>()?,
        _ => config.server.reader_type(),
    };
    let reader = MailReader::new(reader_type, config)?;

    match &args.command {
        Command::Dump { folder, pretty } => {
            cmd_dump(&reader, &args, folder, *pretty).await?;
        }
        Command::Wait {
            receiver,
            folder,
            timeout,
        } => {
            cmd_wait(&reader, &args, folder, receiver, *timeout).await?;
        }
        Command::Folders => {
            cmd_folders(&reader, &args).await?;
        }
    }

    Ok(())
}

async fn cmd_dump(
    reader: &MailReader,
    args: &Args,
    folder: &str,
    pretty: bool,
) -> anyhow::Result<()> {
    let mails = reader.box_get_all(&Folder::from(folder)).await?;

    if pretty {
        println!("{}", serde_json::to_string_pretty(&mails)?);
    } else if args.json {
        println!("{}", serde_json::to_string(&mails)?);
    } else {
        print_mail_table(&mails);
    }

    Ok(())
}

async fn cmd_wait(
    reader: &MailReader,
    args: &Args,
    folder: &str,
    receiver: &str,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    if let Some(secs) = timeout {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("Timed out after {}s", secs);
            on_timeout.cancel();
        });
    }

    let Some(mail) = reader
        .latest_message_of(&Folder::from(folder), receiver, &cancel)
        .await?
    else {
        anyhow::bail!("No message for {receiver} arrived");
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&mail)?);
    } else {
        print_mail_detail(&mail);
    }

    Ok(())
}

async fn cmd_folders(reader: &MailReader, args: &Args) -> anyhow::Result<()> {
    let folders = reader.list_folders().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&folders)?);
    } else {
        for folder in &folders {
            println!("{folder}");
        }
    }

    Ok(())
}

fn print_mail_table(mails: &[Mail]) {
    if mails.is_empty() {
        println!("No emails found.");
        return;
    }

    let header = format!("{:<8} {:<30} {}", "UID", "To", "Subject");
    println!("{header}");
    println!("{}", "-".repeat(80));

    for mail in mails {
        let to = serde_json::to_string(&mail.envelope.to).unwrap_or_default();
        println!(
            "{:<8} {:<30} {}",
            mail.envelope.uid,
            truncate(&to, 28),
            truncate(&mail.envelope.subject, 40),
        );
    }

    println!("\n{} email(s)", mails.len());
}

fn print_mail_detail(mail: &Mail) {
    println!("UID:     {}", mail.envelope.uid);
    println!("Box:     {}", mail.mailbox);
    println!("Subject: {}", mail.envelope.subject);
    println!("Msg-ID:  {}", mail.envelope.message_id);

    for part in &mail.parts {
        println!("\n--- {} ---\n", part.content_type);
        println!("{}", part.content);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
