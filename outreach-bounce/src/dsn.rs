//! Delivery Status Notification scraping.
//!
//! Bounces are expected to be RFC 3464 reports:
//!
//! ```text
//! multipart/report; report-type="delivery-status"
//! ├── text/plain                 (human-readable explanation)
//! ├── message/delivery-status    (Final-Recipient: rfc822; user@example.com)
//! └── message/rfc822 or headers  (the original message)
//! ```
//!
//! Providers that send a plain-text notice instead are handled by scanning
//! for `delivered to <address>` anywhere in the message.

use std::{collections::BTreeSet, sync::LazyLock};

use mailparse::{MailHeaderMap, ParsedMail};
use regex::Regex;
use tracing::debug;

const DELIVERY_STATUS: &str = "message/delivery-status";

#[allow(clippy::expect_used)]
static FINAL_RECIPIENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^Final-Recipient:[^;\n]*;\s*([\w.+\-@]+)").expect("valid pattern")
});

#[allow(clippy::expect_used)]
static DELIVERED_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)delivered to\s+([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})")
        .expect("valid pattern")
});

/// Addresses a bounce message reports as undeliverable.
///
/// `Final-Recipient` fields of every `message/delivery-status` part win; the
/// free-text fallback only runs when there are none.
#[must_use]
pub fn extract_failed_addresses(raw: &[u8]) -> BTreeSet<String> {
    let mut failed = BTreeSet::new();

    match mailparse::parse_mail(raw) {
        Ok(mail) => walk(&mail, &mut |part| {
            if part.ctype.mimetype != DELIVERY_STATUS {
                return;
            }
            let Ok(body) = part.get_body_raw() else {
                return;
            };
            let text = String::from_utf8_lossy(&body);
            for capture in FINAL_RECIPIENT.captures_iter(&text) {
                failed.insert(capture[1].trim().to_string());
            }
        }),
        Err(err) => debug!("Unparseable bounce, falling back to text scan: {err}"),
    }

    if failed.is_empty() {
        let text = String::from_utf8_lossy(raw);
        failed.extend(
            DELIVERED_TO
                .captures_iter(&text)
                .map(|capture| capture[1].to_string()),
        );
    }

    failed
}

/// A mailer-daemon notice saying the address was not found.
///
/// The sender must mention `mailer-daemon` and the subject or any decoded
/// body part must mention `address not found`, both case-insensitively.
#[must_use]
pub fn is_address_not_found(raw: &[u8]) -> bool {
    let Ok(mail) = mailparse::parse_mail(raw) else {
        return false;
    };

    let from_daemon = mail
        .headers
        .get_first_value("From")
        .is_some_and(|from| from.to_ascii_lowercase().contains("mailer-daemon"));
    if !from_daemon {
        return false;
    }

    let mut text = mail.headers.get_first_value("Subject").unwrap_or_default();
    walk(&mail, &mut |part| {
        if part.subparts.is_empty()
            && let Ok(body) = part.get_body()
        {
            text.push('\n');
            text.push_str(&body);
        }
    });

    text.to_ascii_lowercase().contains("address not found")
}

/// Depth-first over a part and all of its descendants.
fn walk<'a>(part: &'a ParsedMail<'a>, visit: &mut impl FnMut(&'a ParsedMail<'a>)) {
    visit(part);
    for sub in &part.subparts {
        walk(sub, visit);
    }
}
