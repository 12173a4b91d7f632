//! Fictional portal content used by the demo scenarios and tests.

use chrono::{TimeZone, Utc};

use crate::model::{Faq, NewsPosting};

pub fn sample_faqs() -> Vec<Faq> {
    vec![
        Faq {
            id: "faq-1".to_string(),
            question: "How do I reset my password?".to_string(),
            answer: "Contact the service desk.".to_string(),
        },
        Faq {
            id: "faq-2".to_string(),
            question: "Who can create an organization?".to_string(),
            answer: "Any verified user.".to_string(),
        },
        Faq {
            id: "faq-3".to_string(),
            question: "Where are service tickets tracked?".to_string(),
            answer: "Under 'My tickets' on the dashboard.".to_string(),
        },
    ]
}

pub fn sample_news() -> Vec<NewsPosting> {
    vec![
        NewsPosting {
            id: "news-1".to_string(),
            headline: "Portal maintenance window".to_string(),
            text: "The portal is read-only on Sunday between 02:00 and 04:00 UTC.".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single(),
        },
        NewsPosting {
            id: "news-2".to_string(),
            headline: "New FAQ section".to_string(),
            text: "Frequently asked questions now have their own page.".to_string(),
            published_at: None,
        },
    ]
}
