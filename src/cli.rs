use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use crate::client::ChatClient;
use crate::reply::ERROR_PREFIX;
use crate::transcript::{format_file_size, ChatMessage, FileInfo, Sender};

#[derive(Parser, Debug)]
#[command(name = "mobin-chat", version, about = "MOBIN chat proxy and terminal client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the web UI and proxy endpoints (default)
    Serve,
    /// Send one message and stream the reply
    Ask {
        message: String,
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
    },
    /// Upload a Word document for review
    Upload {
        path: PathBuf,
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
    },
    /// Select the assistant role
    Role {
        role: String,
        #[arg(long, value_delimiter = ',', required = true)]
        roles: Vec<String>,
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
    },
    /// Clear the backend's chat history
    Reset {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
    },
}

pub async fn run_client(command: Command) -> Result<()> {
    match command {
        Command::Serve => bail!("serve starts the server and is not a client command"),
        Command::Ask { message, server } => {
            let client = ChatClient::new(server)?;
            println!("{}", ChatMessage::new(Sender::User, message.as_str()).render());

            let bot = ChatMessage::new(Sender::Bot, "");
            print!("{}", bot.render());
            let result = client
                .send_message(&message, |text| {
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                })
                .await;
            println!();
            report(result.map(|_| ()))
        }
        Command::Upload { path, server } => {
            let client = ChatClient::new(server)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let size = tokio::fs::metadata(&path)
                .await
                .with_context(|| format!("could not read {}", path.display()))?
                .len();
            let sent = ChatMessage::new(Sender::User, format!("📄 {name}")).with_file(FileInfo {
                name: name.clone(),
                content_type: String::new(),
                size,
            });
            println!("{}", sent.render());
            log::debug!("Uploading {} ({})", path.display(), format_file_size(size));

            match client.upload(&path).await {
                Ok(text) => {
                    println!("{}", ChatMessage::new(Sender::Bot, text).render());
                    Ok(())
                }
                Err(e) => report(Err(e)),
            }
        }
        Command::Role {
            role,
            roles,
            server,
        } => {
            let client = ChatClient::new(server)?;
            let selected = client.set_role(&role, &roles).await?;
            println!("role set: {selected}");
            Ok(())
        }
        Command::Reset { server } => {
            ChatClient::new(server)?.reset().await?;
            println!("chat history cleared");
            Ok(())
        }
    }
}

fn report(result: Result<()>) -> Result<()> {
    if let Err(e) = &result {
        eprintln!("{}", ChatMessage::new(Sender::Bot, format!("{ERROR_PREFIX}{e}")).render());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["mobin-chat"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn role_splits_comma_separated_roles() {
        let cli = Cli::try_parse_from(["mobin-chat", "role", "lawyer", "--roles", "lawyer,tutor"])
            .unwrap();
        match cli.command {
            Some(Command::Role { role, roles, server }) => {
                assert_eq!(role, "lawyer");
                assert_eq!(roles, vec!["lawyer".to_string(), "tutor".to_string()]);
                assert_eq!(server, "http://127.0.0.1:8080");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn role_requires_roles_list() {
        assert!(Cli::try_parse_from(["mobin-chat", "role", "lawyer"]).is_err());
    }

    #[tokio::test]
    async fn upload_of_missing_file_fails_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.docx");

        let err = run_client(Command::Upload {
            path: path.clone(),
            server: "http://127.0.0.1:9".to_string(),
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), format!("could not read {}", path.display()));
    }
}
