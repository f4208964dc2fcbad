//! Rendering records into trust-tagged context fragments.
//!
//! All retrieved content is rendered at `TrustLevel::TripData`. Inferred
//! content uses `ContextSource::Inferred` with `assumed = true` and is
//! worded as an assumption, never as fact.

use wayfarer_core::context::{ContextFragment, ContextSource, TrustLevel};
use wayfarer_core::records::{
    Balance, CalendarEvent, ChatMessage, Place, Poll, Preference, Receipt, TaskItem,
};

fn data_fragment(
    source: ContextSource,
    content: String,
    record_id: &str,
    version: u64,
    recency: chrono::DateTime<chrono::Utc>,
) -> ContextFragment {
    ContextFragment {
        source,
        content,
        record_id: record_id.to_string(),
        record_version: version,
        recency,
        trust: TrustLevel::TripData,
        assumed: false,
    }
}

pub fn event(e: &CalendarEvent) -> ContextFragment {
    let mut content = format!("{} on {}", e.title, e.start.format("%a %Y-%m-%d at %H:%M"));
    if let Some(location) = &e.location {
        content.push_str(&format!(" ({location})"));
    }
    data_fragment(ContextSource::Calendar, content, &e.id, e.version, e.start)
}

pub fn basecamp(p: &Place) -> ContextFragment {
    let mut content = format!("Basecamp: {}", p.name);
    if let Some(address) = &p.address {
        content.push_str(&format!(", {address}"));
    }
    data_fragment(ContextSource::Basecamp, content, &p.id, p.version, p.saved_at)
}

pub fn place(p: &Place) -> ContextFragment {
    let mut content = format!("Saved place: {}", p.name);
    if let Some(address) = &p.address {
        content.push_str(&format!(", {address}"));
    }
    let source = if p.url.is_some() {
        // A saved place that is primarily a link ranks as a saved link
        ContextSource::SavedLinks
    } else {
        ContextSource::SavedPlaces
    };
    data_fragment(source, content, &p.id, p.version, p.saved_at)
}

pub fn chat(m: &ChatMessage) -> ContextFragment {
    let content = format!("{} said: {}", m.sender_id, m.text);
    data_fragment(ContextSource::Chat, content, &m.id, m.version, m.sent_at)
}

pub fn balance(b: &Balance) -> ContextFragment {
    let content = format!(
        "{} owes {} {} {:.2}",
        b.debtor_id,
        b.creditor_id,
        b.currency,
        b.amount_cents as f64 / 100.0
    );
    data_fragment(ContextSource::Payments, content, &b.id, b.version, b.updated_at)
}

pub fn task(t: &TaskItem) -> ContextFragment {
    let mut content = format!("Open task: {}", t.title);
    if let Some(assignee) = &t.assignee_id {
        content.push_str(&format!(" (assigned to {assignee})"));
    }
    if let Some(due) = &t.due {
        content.push_str(&format!(", due {}", due.format("%Y-%m-%d")));
    }
    data_fragment(ContextSource::Tasks, content, &t.id, t.version, t.updated_at)
}

pub fn poll(p: &Poll) -> ContextFragment {
    let tally = p
        .options
        .iter()
        .map(|o| format!("{} ({})", o.label, o.votes))
        .collect::<Vec<_>>()
        .join(", ");
    let content = format!("Open poll: {} — {}", p.question, tally);
    data_fragment(ContextSource::Polls, content, &p.id, p.version, p.updated_at)
}

/// A labeled assumption derived from an open poll's leading option.
pub fn poll_assumption(p: &Poll) -> Option<ContextFragment> {
    let leader = p.leading_option()?;
    Some(ContextFragment {
        source: ContextSource::Inferred,
        content: format!(
            "Assumption (poll still open, not final): the group is leaning toward {}",
            leader.label
        ),
        record_id: p.id.clone(),
        record_version: p.version,
        recency: p.updated_at,
        trust: TrustLevel::TripData,
        assumed: true,
    })
}

pub fn receipt(r: &Receipt) -> ContextFragment {
    let content = format!(
        "Receipt: {} {:.2} at {} (paid by {})",
        r.currency,
        r.total_cents as f64 / 100.0,
        r.merchant,
        r.paid_by
    );
    data_fragment(ContextSource::Receipts, content, &r.id, r.version, r.uploaded_at)
}

pub fn preference(p: &Preference) -> ContextFragment {
    let content = format!("{}'s preference — {}: {}", p.user_id, p.key, p.value);
    data_fragment(ContextSource::Preferences, content, &p.id, p.version, p.updated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wayfarer_core::records::PollOption;

    #[test]
    fn event_rendering_includes_time_and_location() {
        let frag = event(&CalendarEvent {
            id: "e1".into(),
            trip_id: "t1".into(),
            title: "Show".into(),
            start: "2026-03-01T20:00:00Z".parse().unwrap(),
            end: None,
            location: Some("Alfama".into()),
            version: 1,
        });
        assert!(frag.content.contains("Show"));
        assert!(frag.content.contains("20:00"));
        assert!(frag.content.contains("Alfama"));
        assert_eq!(frag.source, ContextSource::Calendar);
        assert_eq!(frag.trust, TrustLevel::TripData);
        assert!(!frag.assumed);
    }

    #[test]
    fn place_with_url_ranks_as_saved_link() {
        let linked = place(&Place {
            id: "p1".into(),
            trip_id: "t1".into(),
            name: "Market".into(),
            address: None,
            url: Some("https://example.com".into()),
            saved_at: Utc::now(),
            version: 1,
        });
        assert_eq!(linked.source, ContextSource::SavedLinks);
    }

    #[test]
    fn poll_assumption_is_labeled() {
        let p = Poll {
            id: "poll1".into(),
            trip_id: "t1".into(),
            question: "Dinner?".into(),
            options: vec![PollOption { label: "Ramen".into(), votes: 4 }],
            closed: false,
            updated_at: Utc::now(),
            version: 1,
        };
        let frag = poll_assumption(&p).unwrap();
        assert!(frag.assumed);
        assert_eq!(frag.source, ContextSource::Inferred);
        assert!(frag.content.starts_with("Assumption"));
    }

    #[test]
    fn balance_formats_cents() {
        let frag = balance(&Balance {
            id: "b1".into(),
            trip_id: "t1".into(),
            debtor_id: "ana".into(),
            creditor_id: "chris".into(),
            amount_cents: 8250,
            currency: "EUR".into(),
            updated_at: Utc::now(),
            version: 1,
        });
        assert!(frag.content.contains("EUR 82.50"));
    }
}
