//! Credential probe and event URL resolution.
//!
//! Both operations are infallible from the caller's point of view: an
//! unauthorized token is `false`, an unusable URL or payload is `None`.

use tracing::{debug, info, warn};

use crate::api::TicketApi;
use crate::types::{AuthorizedUser, Credential, EventReference};

/// Event id following `prefix` in `url`, up to the first path, query or
/// fragment separator.
pub fn extract_event_id<'a>(url: &'a str, prefix: &str) -> Option<&'a str> {
    let start = url.find(prefix)? + prefix.len();
    let id = url[start..]
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("")
        .trim();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

pub async fn validate_credential(api: &dyn TicketApi, credential: &Credential) -> bool {
    authorize(api, credential).await.is_some()
}

/// Account behind `credential`, or `None` when it is empty, rejected or the
/// probe could not be sent.
pub async fn authorize(api: &dyn TicketApi, credential: &Credential) -> Option<AuthorizedUser> {
    if credential.is_empty() {
        debug!("Empty credential; skipping authentication probe");
        return None;
    }

    match api.check_authorization(credential).await {
        Ok(Some(user)) => {
            info!(full_name = ?user.full_name, "Credential authorized");
            Some(user)
        }
        Ok(None) => {
            warn!("Credential rejected by the platform");
            None
        }
        Err(e) => {
            warn!(error = %e, category = e.category().metric_label(), "Authentication probe failed");
            None
        }
    }
}

pub async fn resolve_event(api: &dyn TicketApi, url: &str, prefix: &str) -> Option<EventReference> {
    let Some(event_id) = extract_event_id(url, prefix) else {
        debug!(url, prefix, "URL does not contain the event prefix");
        return None;
    };

    let payload = match api.fetch_product(event_id).await {
        Ok(p) => p,
        Err(e) => {
            warn!(event_id, error = %e, "Event lookup failed");
            return None;
        }
    };

    match payload.event_reference() {
        Ok(event) => {
            info!(
                event_id = %event.id,
                name = %event.name,
                sale_start_at = %event.sale_start_at,
                "Event resolved"
            );
            Some(event)
        }
        Err(e) => {
            warn!(event_id, error = %e, "Event payload malformed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "https://kide.app/events/";

    #[test]
    fn extracts_id_after_prefix() {
        assert_eq!(extract_event_id("https://kide.app/events/E1", PREFIX), Some("E1"));
        assert_eq!(
            extract_event_id("https://kide.app/events/abc-123?utm=x#top", PREFIX),
            Some("abc-123")
        );
        assert_eq!(
            extract_event_id("  https://kide.app/events/E2/ ", PREFIX),
            Some("E2")
        );
    }

    #[test]
    fn rejects_urls_without_prefix_or_id() {
        assert_eq!(extract_event_id("https://kide.app/products/E1", PREFIX), None);
        assert_eq!(extract_event_id("E1", PREFIX), None);
        assert_eq!(extract_event_id("https://kide.app/events/", PREFIX), None);
        assert_eq!(extract_event_id("https://kide.app/events/?q=1", PREFIX), None);
    }
}
