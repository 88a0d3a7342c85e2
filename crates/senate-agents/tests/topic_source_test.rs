//! Topic sourcing against a temporary cache file.

use std::sync::Arc;

use curia::topics::{fallback_topics, TopicCache};
use senate_agents::llm::MockProvider;
use senate_agents::TopicSource;
use tempfile::TempDir;

#[tokio::test]
async fn test_generated_topics_are_cached_and_reused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache").join("topics.json");
    let mock = Arc::new(MockProvider::new("mock"));

    let mut source = TopicSource::new(mock.clone(), TopicCache::empty(&path));
    let first = source.topics(-63, 3).await;
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].title, "Funding for a new aqueduct to the Aventine");
    assert_eq!(mock.call_count(), 1);
    assert!(path.exists());

    // Same source: served from memory
    let again = source.topics(-63, 3).await;
    assert_eq!(again.len(), 3);
    assert_eq!(mock.call_count(), 1);

    // Fresh source over the saved file: no model call either
    let mut reloaded = TopicSource::new(mock.clone(), TopicCache::load(&path).unwrap());
    let cached = reloaded.topics(-63, 4).await;
    assert_eq!(cached.len(), 4);
    assert_eq!(mock.call_count(), 1);
    assert!(cached.iter().all(|t| t.year == Some(-63)));
}

#[tokio::test]
async fn test_malformed_reply_falls_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("topics.json");
    let mock = Arc::new(MockProvider::new("mock").with_json("nope"));

    let mut source = TopicSource::new(mock.clone(), TopicCache::empty(&path));
    let topics = source.topics(-50, 3).await;

    let expected: Vec<_> = fallback_topics(-50).into_iter().take(3).collect();
    assert_eq!(topics, expected);
    assert_eq!(mock.call_count(), 1);
    assert!(!source.cache().has_year(-50));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_failing_model_falls_back_and_tops_up_from_cache() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("topics.json");
    let mut cache = TopicCache::empty(&path);
    cache.insert(-63, "Religion", &["Restoring the temple of Jupiter".to_string()]);

    let mock = Arc::new(MockProvider::failing("mock"));
    let mut source = TopicSource::new(mock.clone(), cache);
    let topics = source.topics(-63, 3).await;

    assert_eq!(topics.len(), 3);
    assert_eq!(topics[0].title, "Restoring the temple of Jupiter");
    assert_eq!(topics[1], fallback_topics(-63)[0]);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_request_larger_than_any_source_is_capped() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockProvider::failing("mock"));
    let mut source = TopicSource::new(mock, TopicCache::empty(dir.path().join("t.json")));

    let topics = source.topics(-63, 50).await;
    assert_eq!(topics.len(), fallback_topics(-63).len());
}

#[tokio::test]
async fn test_generated_duplicates_collapse_to_one_topic() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("topics.json");
    let mock = Arc::new(MockProvider::new("mock").with_json(
        r#"[{"title": "Grain Dole"}, {"title": "grain dole!"}, {"title": "New legions"}]"#,
    ));

    let mut source = TopicSource::new(mock, TopicCache::empty(&path));
    let topics = source.topics(-63, 3).await;

    let ids: Vec<&str> = topics.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["grain-dole", "new-legions", fallback_topics(-63)[0].id.as_str()]);
    assert_eq!(source.cache().get(-63).len(), 2);
}
