//! Decrypt-for-display and transcript formatting.

use chrono::{Datelike, NaiveDateTime, Timelike};

use alcove_crypto::Keyring;
use alcove_crypto::envelope;
use alcove_types::api::ConversationMessage;

/// A message after the display pipeline has run: content is either the
/// decrypted plaintext or, when the envelope could not be opened (damaged,
/// truncated by previewing, or addressed to someone else), the raw content
/// exactly as the server returned it. A single undecryptable message must
/// never take down the whole listing.
pub struct DisplayMessage {
    pub sender: String,
    pub content: String,
    pub time_sent: NaiveDateTime,
}

pub fn resolve_for_display(
    keyring: &Keyring,
    messages: Vec<ConversationMessage>,
) -> Vec<DisplayMessage> {
    messages
        .into_iter()
        .map(|msg| {
            let content = if envelope::is_sealed(msg.content.as_str()) {
                match keyring.open_sealed(&msg.content) {
                    Ok(plain) => plain.into_inner(),
                    Err(_) => msg.content.into_inner(),
                }
            } else {
                msg.content.into_inner()
            };

            DisplayMessage {
                sender: msg.sender,
                content,
                time_sent: msg.time_sent,
            }
        })
        .collect()
}

/// Render a conversation (or preview list) for the terminal:
///
///     <mia> at 11:11am, 6/18/2021:
///         Hi!
///
/// Hours carry no leading zero; minutes are zero-padded; the timestamp is
/// shown exactly as sent, with no zone conversion.
pub fn fmt_conversation(messages: &[DisplayMessage]) -> String {
    let mut out = String::new();

    for message in messages {
        let ts = message.time_sent;
        let (hour, meridiem) = if ts.hour() < 13 {
            (ts.hour(), "am")
        } else {
            (ts.hour() - 12, "pm")
        };

        out.push_str(&format!(
            "<{}> at {}:{:02}{}, {}/{}/{}:\n",
            message.sender,
            hour,
            ts.minute(),
            meridiem,
            ts.month(),
            ts.day(),
            ts.year()
        ));
        out.push_str(&format!("\t{}\n\n", message.content));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alcove_crypto::{CredentialPrompt, KeyringError, Plaintext};
    use alcove_types::OpaqueBody;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    struct Canned;

    impl CredentialPrompt for Canned {
        fn passphrase(&self) -> Result<String, KeyringError> {
            Ok("a test passphrase".to_string())
        }

        fn identity(&self) -> Result<(String, String), KeyringError> {
            Ok(("mia".to_string(), "mia@example.com".to_string()))
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 6, 18).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn msg(sender: &str, content: &str, time_sent: NaiveDateTime) -> ConversationMessage {
        ConversationMessage {
            sender: sender.to_string(),
            recipient: "viewer".to_string(),
            content: OpaqueBody::new(content),
            time_sent,
        }
    }

    #[test]
    fn formats_morning_timestamp() {
        let rendered = fmt_conversation(&[DisplayMessage {
            sender: "mia".to_string(),
            content: "Hi!".to_string(),
            time_sent: at(11, 11),
        }]);

        assert_eq!(rendered, "<mia> at 11:11am, 6/18/2021:\n\tHi!\n\n");
    }

    #[test]
    fn formats_afternoon_without_leading_zero() {
        let rendered = fmt_conversation(&[DisplayMessage {
            sender: "dash".to_string(),
            content: "Oh hello there".to_string(),
            time_sent: at(13, 7),
        }]);

        assert_eq!(rendered, "<dash> at 1:07pm, 6/18/2021:\n\tOh hello there\n\n");
    }

    #[test]
    fn concatenates_messages_in_order() {
        let rendered = fmt_conversation(&[
            DisplayMessage {
                sender: "mia".to_string(),
                content: "first".to_string(),
                time_sent: at(9, 0),
            },
            DisplayMessage {
                sender: "dash".to_string(),
                content: "second".to_string(),
                time_sent: at(9, 30),
            },
        ]);

        assert_eq!(
            rendered,
            "<mia> at 9:00am, 6/18/2021:\n\tfirst\n\n<dash> at 9:30am, 6/18/2021:\n\tsecond\n\n"
        );
    }

    #[test]
    fn sealed_content_is_decrypted_for_display() {
        let home = TempDir::new().unwrap();
        let keyring = Keyring::open(home.path(), &Canned).unwrap();

        let sealed = keyring.seal(&Plaintext::new("the secret"), &["mia"]).unwrap();
        let resolved =
            resolve_for_display(&keyring, vec![msg("dash", sealed.as_str(), at(8, 15))]);

        assert_eq!(resolved[0].content, "the secret");
    }

    #[test]
    fn plain_content_is_left_alone() {
        let home = TempDir::new().unwrap();
        let keyring = Keyring::open(home.path(), &Canned).unwrap();

        let resolved =
            resolve_for_display(&keyring, vec![msg("dash", "never sealed", at(8, 15))]);

        assert_eq!(resolved[0].content, "never sealed");
    }

    #[test]
    fn undecryptable_content_falls_back_to_raw() {
        let mia_home = TempDir::new().unwrap();
        let other_home = TempDir::new().unwrap();
        let mia = Keyring::open(mia_home.path(), &Canned).unwrap();

        struct Other;
        impl CredentialPrompt for Other {
            fn passphrase(&self) -> Result<String, KeyringError> {
                Ok("another passphrase".to_string())
            }
            fn identity(&self) -> Result<(String, String), KeyringError> {
                Ok(("finn".to_string(), "finn@example.com".to_string()))
            }
        }
        let finn = Keyring::open(other_home.path(), &Other).unwrap();

        // Sealed for finn alone; mia's render keeps the armored text.
        let sealed = finn.seal(&Plaintext::new("not for mia"), &["finn"]).unwrap();
        let raw = sealed.as_str().to_string();

        let resolved = resolve_for_display(&mia, vec![msg("finn", &raw, at(8, 15))]);
        assert_eq!(resolved[0].content, raw);
    }
}
