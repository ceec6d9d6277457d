//! Digest composition: select up to five unseen headlines across the topic
//! list and render them into the single outbound message template.
//!
//! Ordering is strictly topic-list order, then API-response order within a
//! topic. There is no scoring or recency sort beyond what the upstream
//! returns.
use crate::config::MAX_HEADLINES;
use crate::news::{Headline, NewsApi};
use std::collections::HashSet;

/// One line of a rendered digest: a selected headline plus its shortened URL.
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub title: String,
    pub source_url: String,
    pub short_url: String,
}

/// Append unseen headlines from one topic's fetch result to the running
/// selection, preserving fetch order.
///
/// Skips any headline whose URL is in `sent` or already selected this cycle,
/// and stops once the selection holds [`MAX_HEADLINES`].
pub fn fill_from_topic(
    selected: &mut Vec<Headline>,
    fetched: Vec<Headline>,
    sent: &HashSet<String>,
) {
    for headline in fetched {
        if selected.len() >= MAX_HEADLINES {
            return;
        }
        if sent.contains(&headline.source_url) {
            continue;
        }
        if selected.iter().any(|s| s.source_url == headline.source_url) {
            continue;
        }
        selected.push(headline);
    }
}

/// Compose one digest's worth of headlines.
///
/// Iterates `topics` in declared order and fetches each one live, stopping
/// as soon as [`MAX_HEADLINES`] unseen headlines are accumulated — later
/// topics are then not fetched at all. A per-topic fetch failure is logged
/// and contributes zero headlines; it never aborts the cycle. An empty
/// result is the "no new content" condition, not an error.
pub async fn compose(
    news: &NewsApi,
    topics: &[&str],
    sent: &HashSet<String>,
) -> Vec<Headline> {
    let mut selected = Vec::with_capacity(MAX_HEADLINES);
    for topic in topics {
        if selected.len() >= MAX_HEADLINES {
            break;
        }
        match news.fetch(topic).await {
            Ok(fetched) => fill_from_topic(&mut selected, fetched, sent),
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Topic fetch failed, skipping");
            }
        }
    }
    selected
}

/// Render the fixed message template: one numbered bold title per entry,
/// followed by its shortened link.
pub fn render(entries: &[DigestEntry]) -> String {
    let mut message = String::new();
    for (idx, entry) in entries.iter().enumerate() {
        message.push_str(&format!(
            "*{}. {}*\nLINK: {}\n\n",
            idx + 1,
            entry.title,
            entry.short_url
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headline(n: usize) -> Headline {
        Headline {
            title: format!("Title {n}"),
            source_url: format!("https://news.example/{n}"),
        }
    }

    #[test]
    fn test_fill_preserves_fetch_order() {
        let mut selected = Vec::new();
        fill_from_topic(
            &mut selected,
            vec![headline(1), headline(2), headline(3)],
            &HashSet::new(),
        );
        assert_eq!(
            selected.iter().map(|h| h.title.as_str()).collect::<Vec<_>>(),
            vec!["Title 1", "Title 2", "Title 3"]
        );
    }

    #[test]
    fn test_fill_skips_already_sent() {
        let sent: HashSet<String> = ["https://news.example/2".to_string()].into();
        let mut selected = Vec::new();
        fill_from_topic(&mut selected, vec![headline(1), headline(2), headline(3)], &sent);
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|h| h.source_url != "https://news.example/2"));
    }

    #[test]
    fn test_fill_skips_duplicates_within_cycle() {
        let mut selected = vec![headline(1)];
        fill_from_topic(&mut selected, vec![headline(1), headline(2)], &HashSet::new());
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_fill_caps_at_five() {
        let mut selected = Vec::new();
        fill_from_topic(
            &mut selected,
            (1..=8).map(headline).collect(),
            &HashSet::new(),
        );
        assert_eq!(selected.len(), MAX_HEADLINES);
        assert_eq!(selected[4].title, "Title 5");
    }

    #[test]
    fn test_render_template() {
        let entries = vec![
            DigestEntry {
                title: "AI does a thing".into(),
                source_url: "https://news.example/ai".into(),
                short_url: "https://tiny.example/a".into(),
            },
            DigestEntry {
                title: "Chain blocked".into(),
                source_url: "https://news.example/chain".into(),
                short_url: "https://tiny.example/b".into(),
            },
        ];
        assert_eq!(
            render(&entries),
            "*1. AI does a thing*\nLINK: https://tiny.example/a\n\n\
             *2. Chain blocked*\nLINK: https://tiny.example/b\n\n"
        );
    }

    #[test]
    fn test_render_empty_is_empty() {
        assert_eq!(render(&[]), "");
    }

    mod composing {
        use super::*;
        use pretty_assertions::assert_eq;
        use crate::news::NewsApi;
        use secrecy::SecretString;
        use std::time::Duration;
        use wiremock::matchers::{method, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn api_for(server: &MockServer) -> NewsApi {
            NewsApi::new(
                reqwest::Client::new(),
                server.uri(),
                SecretString::from("test-key"),
                Duration::ZERO,
            )
        }

        fn articles_body(urls: &[(&str, &str)]) -> String {
            let items: Vec<String> = urls
                .iter()
                .map(|(title, url)| format!(r#"{{"title":"{title}","url":"{url}"}}"#))
                .collect();
            format!(r#"{{"articles":[{}]}}"#, items.join(","))
        }

        #[tokio::test]
        async fn test_topics_consumed_in_declared_order() {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(query_param("q", "first"))
                .respond_with(ResponseTemplate::new(200).set_body_string(articles_body(&[
                    ("A1", "https://news.example/a1"),
                    ("A2", "https://news.example/a2"),
                ])))
                .mount(&mock_server)
                .await;
            Mock::given(method("GET"))
                .and(query_param("q", "second"))
                .respond_with(ResponseTemplate::new(200).set_body_string(articles_body(&[
                    ("B1", "https://news.example/b1"),
                ])))
                .mount(&mock_server)
                .await;

            let selected = compose(&api_for(&mock_server), &["first", "second"], &HashSet::new()).await;
            assert_eq!(
                selected.iter().map(|h| h.title.as_str()).collect::<Vec<_>>(),
                vec!["A1", "A2", "B1"]
            );
        }

        #[tokio::test]
        async fn test_stops_fetching_once_full() {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(query_param("q", "plenty"))
                .respond_with(ResponseTemplate::new(200).set_body_string(articles_body(&[
                    ("1", "https://news.example/1"),
                    ("2", "https://news.example/2"),
                    ("3", "https://news.example/3"),
                    ("4", "https://news.example/4"),
                    ("5", "https://news.example/5"),
                ])))
                .expect(1)
                .mount(&mock_server)
                .await;
            Mock::given(method("GET"))
                .and(query_param("q", "never"))
                .respond_with(ResponseTemplate::new(200).set_body_string(articles_body(&[])))
                .expect(0) // digest is already full; this topic must not be fetched
                .mount(&mock_server)
                .await;

            let selected = compose(&api_for(&mock_server), &["plenty", "never"], &HashSet::new()).await;
            assert_eq!(selected.len(), MAX_HEADLINES);
        }

        #[tokio::test]
        async fn test_failed_topic_contributes_nothing() {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(query_param("q", "broken"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&mock_server)
                .await;
            Mock::given(method("GET"))
                .and(query_param("q", "working"))
                .respond_with(ResponseTemplate::new(200).set_body_string(articles_body(&[
                    ("W", "https://news.example/w"),
                ])))
                .mount(&mock_server)
                .await;

            let selected = compose(&api_for(&mock_server), &["broken", "working"], &HashSet::new()).await;
            assert_eq!(selected.len(), 1);
            assert_eq!(selected[0].title, "W");
        }

        #[tokio::test]
        async fn test_all_empty_is_no_new_content() {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"articles":[]}"#))
                .mount(&mock_server)
                .await;

            let selected = compose(&api_for(&mock_server), &["a", "b"], &HashSet::new()).await;
            assert!(selected.is_empty());
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_headline() -> impl Strategy<Value = Headline> {
            // Small URL space on purpose so sent-set hits and intra-cycle
            // duplicates actually occur.
            (0usize..12, "[A-Za-z ]{0,8}").prop_map(|(n, title)| Headline {
                title,
                source_url: format!("https://news.example/{n}"),
            })
        }

        proptest! {
            #[test]
            fn selection_never_exceeds_cap_or_reuses_sent(
                batches in proptest::collection::vec(
                    proptest::collection::vec(arb_headline(), 0..6), 0..6),
                sent_ids in proptest::collection::hash_set(0usize..12, 0..12),
            ) {
                let sent: HashSet<String> = sent_ids
                    .iter()
                    .map(|n| format!("https://news.example/{n}"))
                    .collect();

                let mut selected = Vec::new();
                for batch in batches {
                    if selected.len() >= MAX_HEADLINES {
                        break;
                    }
                    fill_from_topic(&mut selected, batch, &sent);
                }

                prop_assert!(selected.len() <= MAX_HEADLINES);
                // Never re-selects a sent URL
                prop_assert!(selected.iter().all(|h| !sent.contains(&h.source_url)));
                // No duplicate URLs within one digest
                let urls: HashSet<&str> =
                    selected.iter().map(|h| h.source_url.as_str()).collect();
                prop_assert_eq!(urls.len(), selected.len());
            }
        }
    }
}
