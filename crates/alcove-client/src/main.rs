//! Interactive Alcove client.
//!
//! Startup is the only blocking, interactive phase: the keyring home is
//! opened (provisioning a fresh identity on first run) before the command
//! loop starts. Every later action talks to the server with sealed content
//! only.

mod api;
mod format;

use std::io::Write;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use alcove_crypto::keyring::passphrase_is_valid;
use alcove_crypto::{CredentialPrompt, Keyring, KeyringError, Plaintext};

use crate::api::HttpService;
use crate::format::{fmt_conversation, resolve_for_display};

type InputLines = Lines<BufReader<Stdin>>;

struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn passphrase(&self) -> Result<String, KeyringError> {
        loop {
            let pass = rpassword::prompt_password("Enter your key passphrase: ")
                .map_err(|e| KeyringError::Prompt(e.to_string()))?;
            if passphrase_is_valid(&pass) {
                return Ok(pass);
            }
            println!("Passphrase must be between 8 and 64 characters.");
        }
    }

    fn identity(&self) -> Result<(String, String), KeyringError> {
        let name = read_required("Enter your key name: ")?;
        let email = read_required("Enter your key email: ")?;
        Ok((name, email))
    }
}

/// Blocking stdin read used only during keyring setup.
fn read_required(prompt: &str) -> Result<String, KeyringError> {
    loop {
        print!("{}", prompt);
        std::io::stdout().flush().map_err(|e| KeyringError::Prompt(e.to_string()))?;

        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| KeyringError::Prompt(e.to_string()))?;

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
}

fn open_keyring(home: &std::path::Path) -> anyhow::Result<Keyring> {
    loop {
        match Keyring::open(home, &TerminalPrompt) {
            Ok(keyring) => return Ok(keyring),
            Err(e @ (KeyringError::BadPassphrase | KeyringError::PassphrasePolicy)) => {
                println!("{}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url =
        std::env::var("ALCOVE_SERVER").unwrap_or_else(|_| "http://localhost:8000".into());
    let home = PathBuf::from(std::env::var("ALCOVE_HOME").unwrap_or_else(|_| ".alcove".into()));
    std::fs::create_dir_all(&home)?;

    let mut keyring = open_keyring(&home)?;
    let mut service = HttpService::new(base_url);

    println!("Welcome to Alcove, {} <{}>.", keyring.name(), keyring.email());
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let result = match line.trim() {
            "" => Ok(()),
            "register" => register(&mut service, &mut lines).await,
            "login" => login(&mut service, &mut lines).await,
            "send" => send(&service, &keyring, &mut lines).await,
            "read" => read(&service, &keyring, &mut lines).await,
            "preview" => preview(&service, &keyring).await,
            "friends" => friends(&service, &keyring).await,
            "key" => {
                println!(
                    "{} <{}>\n{}",
                    keyring.name(),
                    keyring.email(),
                    keyring.public_key_base64()
                );
                Ok(())
            }
            "trust" => trust(&mut keyring, &mut lines).await,
            "add-friend" | "send-file" | "get-file" => {
                println!("Not yet implemented.");
                Ok(())
            }
            "help" => {
                print_help();
                Ok(())
            }
            "quit" | "exit" => break,
            other => {
                println!("Unknown command '{}'. Try 'help'.", other);
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("{}", e);
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        "Commands:\n  \
         register    create an account\n  \
         login       authenticate\n  \
         send        send an encrypted message\n  \
         read        view a conversation\n  \
         preview     preview all conversations\n  \
         friends     list users you can message\n  \
         key         show your public key\n  \
         trust       add a correspondent's public key\n  \
         add-friend / send-file / get-file   (not yet implemented)\n  \
         quit"
    );
}

async fn prompt(lines: &mut InputLines, text: &str) -> anyhow::Result<String> {
    println!("{}", text);
    print!("> ");
    std::io::stdout().flush()?;

    let line = lines.next_line().await?.unwrap_or_default();
    Ok(line.trim().to_string())
}

async fn register(service: &mut HttpService, lines: &mut InputLines) -> anyhow::Result<()> {
    let username =
        prompt(lines, "Enter your username. This will be used to log in to the web service.")
            .await?;
    let email = prompt(lines, "Enter your email.").await?;
    let password = rpassword::prompt_password("Enter your password: ")?;

    service.register(&username, &email, &password).await?;

    println!("Account created.\nAttempting to log in...");
    service.login(&username, &password).await?;
    println!("Login successful.");
    Ok(())
}

async fn login(service: &mut HttpService, lines: &mut InputLines) -> anyhow::Result<()> {
    let username = prompt(lines, "Enter your username:").await?;
    let password = rpassword::prompt_password("Enter your password: ")?;

    match service.login(&username, &password).await {
        Ok(()) => {
            println!("Login successful.");
            Ok(())
        }
        Err(_) => {
            println!("Failed to log in. Check your credentials.");
            Ok(())
        }
    }
}

async fn send(
    service: &HttpService,
    keyring: &Keyring,
    lines: &mut InputLines,
) -> anyhow::Result<()> {
    let ident = prompt(lines, "Enter the user who you want to send a message to:").await?;
    let friend_id = match service.lookup(&ident).await {
        Ok(id) => id,
        Err(_) => {
            println!("That person could not be found.");
            return Ok(());
        }
    };

    let message = prompt(lines, "Enter your message:").await?;
    let sealed = keyring.seal(&Plaintext::new(message), &[ident.as_str()])?;

    let thread = service.send_message(friend_id, sealed).await?;
    print!("{}", fmt_conversation(&resolve_for_display(keyring, thread)));
    Ok(())
}

async fn read(
    service: &HttpService,
    keyring: &Keyring,
    lines: &mut InputLines,
) -> anyhow::Result<()> {
    let ident = prompt(lines, "Enter the user whose conversation you want to view:").await?;
    let friend_id = match service.lookup(&ident).await {
        Ok(id) => id,
        Err(_) => {
            println!("That person could not be found.");
            return Ok(());
        }
    };

    let thread = service.transcript(friend_id).await?;
    print!("{}", fmt_conversation(&resolve_for_display(keyring, thread)));
    Ok(())
}

async fn preview(service: &HttpService, keyring: &Keyring) -> anyhow::Result<()> {
    let entries = service.previews().await?;
    print!("{}", fmt_conversation(&resolve_for_display(keyring, entries)));
    Ok(())
}

/// Who can I actually message: the server directory intersected with the
/// identities this keyring holds a public key for.
async fn friends(service: &HttpService, keyring: &Keyring) -> anyhow::Result<()> {
    let local: std::collections::BTreeSet<String> =
        keyring.known_identities().iter().map(|k| k.to_string()).collect();

    let server: std::collections::BTreeSet<String> = service
        .directory()
        .await?
        .into_iter()
        .map(|pair| format!("{} <{}>", pair.username, pair.email))
        .collect();

    println!("You can send messages to the following users:");
    for user in local.intersection(&server) {
        println!("{}", user);
    }
    Ok(())
}

/// Import a correspondent's public key, exchanged out-of-band.
async fn trust(keyring: &mut Keyring, lines: &mut InputLines) -> anyhow::Result<()> {
    let name = prompt(lines, "Contact username:").await?;
    let email = prompt(lines, "Contact email:").await?;
    let key = prompt(lines, "Contact public key (base64):").await?;

    keyring.add_contact(&name, &email, &key)?;
    println!("Trusted {} <{}>.", name, email);
    Ok(())
}
