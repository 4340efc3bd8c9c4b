//! Recipient masking rule shared by API responses, adapter log lines, and
//! webhook payloads (`spec.md` §6, law L3).

use crate::db::models::Channel;

/// For EMAIL: `ab***@domain`. For everything else: `abcd***yz` (show the
/// first 4 and last 2 characters), or `***` when the recipient is shorter
/// than 6 characters.
pub fn mask_recipient(channel: Channel, recipient: &str) -> String {
    match channel {
        Channel::Email => mask_email(recipient),
        _ => mask_generic(recipient),
    }
}

fn mask_email(recipient: &str) -> String {
    match recipient.split_once('@') {
        Some((local, domain)) => {
            let shown: String = local.chars().take(2).collect();
            format!("{}***@{}", shown, domain)
        }
        None => mask_generic(recipient),
    }
}

fn mask_generic(recipient: &str) -> String {
    let chars: Vec<char> = recipient.chars().collect();
    if chars.len() < 6 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_email_recipients() {
        assert_eq!(mask_recipient(Channel::Email, "user@example.com"), "us***@example.com");
    }

    #[test]
    fn masks_email_without_at_sign_generically() {
        assert_eq!(mask_recipient(Channel::Email, "not-an-email"), "not-***il");
    }

    #[test]
    fn masks_phone_numbers() {
        assert_eq!(mask_recipient(Channel::Sms, "+15551234567"), "+155***67");
    }

    #[test]
    fn masks_short_recipients_fully() {
        assert_eq!(mask_recipient(Channel::Telegram, "abc"), "***");
        assert_eq!(mask_recipient(Channel::Telegram, "abcde"), "***");
    }

    #[test]
    fn masks_exactly_six_chars() {
        assert_eq!(mask_recipient(Channel::Telegram, "abcdef"), "abcd***ef");
    }
}
