use tracing::{debug, warn};

use folio_types::events::NewMessageEvent;

/// Header carrying the shared bot secret, in both directions.
pub const BOT_SECRET_HEADER: &str = "x-bot-secret";

/// Outbound webhook to the bot integration.
///
/// Delivery is at most once and best effort: each event is sent from a
/// detached task, never retried, and failures are only logged.
#[derive(Clone)]
pub struct BotNotifier {
    client: reqwest::Client,
    events_url: Option<String>,
    secret: Option<String>,
}

impl BotNotifier {
    pub fn new(client: reqwest::Client, events_url: Option<String>, secret: Option<String>) -> Self {
        Self {
            client,
            events_url,
            secret,
        }
    }

    pub fn disabled() -> Self {
        Self::new(reqwest::Client::new(), None, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.events_url.is_some() && self.secret.is_some()
    }

    /// Returns immediately; the POST happens in the background.
    pub fn notify_new_message(&self, event: NewMessageEvent) {
        let (Some(base), Some(secret)) = (self.events_url.clone(), self.secret.clone()) else {
            return;
        };
        let client = self.client.clone();

        tokio::spawn(async move {
            let url = format!("{}/events/new-message", base.trim_end_matches('/'));
            let result = client
                .post(&url)
                .header(BOT_SECRET_HEADER, secret)
                .json(&event)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => debug!(id = event.id, "Bot notified"),
                Ok(resp) => warn!(id = event.id, status = %resp.status(), "Bot rejected new-message event"),
                Err(e) => warn!(id = event.id, "Bot notification failed: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_both_url_and_secret() {
        let client = reqwest::Client::new();
        assert!(!BotNotifier::disabled().is_enabled());
        assert!(!BotNotifier::new(client.clone(), Some("http://bot".into()), None).is_enabled());
        assert!(!BotNotifier::new(client.clone(), None, Some("s".into())).is_enabled());
        assert!(BotNotifier::new(client, Some("http://bot".into()), Some("s".into())).is_enabled());
    }
}
