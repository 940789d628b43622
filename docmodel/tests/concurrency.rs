mod common;

use common::TrackedStore;
use docmodel::prelude::*;

async fn seeded(concurrency: Option<usize>) -> (TrackedStore, DocumentStore, Model) {
    let backend = TrackedStore::new();
    let store = DocumentStore::new(backend.clone());

    let mut config = ModelConfig::builder("Post").with_page_size(50);
    if let Some(concurrency) = concurrency {
        config = config.with_concurrency(concurrency);
    }

    let posts = store
        .register_with(
            "Post",
            Schema::new()
                .field("title", FieldSpec::string())
                .field("owner", FieldSpec::string().reference("Post"))
                .field("views", FieldSpec::number().default(0)),
            config.build(),
        )
        .expect("register");

    for n in 0..10 {
        posts
            .create(doc! { "id": format!("p{n}"), "title": format!("Post {n}"), "owner": "p0" })
            .await
            .expect("create");
    }

    (backend, store, posts)
}

#[tokio::test]
async fn bulk_writes_run_four_at_a_time_by_default() {
    let (backend, _store, posts) = seeded(None).await;
    let calls = backend.calls();

    let mut results = posts.find(doc! {}).exec().await.expect("search").into_results();
    assert_eq!(results.len(), 10);

    calls.reset_peak();
    results.update(doc! { "views": 1 }).await.expect("update");
    assert_eq!(calls.peak(), 4);

    for post in results.iter_mut() {
        post.set("views", 2).expect("views");
    }
    calls.reset_peak();
    results.save().await.expect("save");
    assert_eq!(calls.peak(), 4);

    calls.reset_peak();
    results.remove().await.expect("remove");
    assert_eq!(calls.peak(), 4);
}

#[tokio::test]
async fn bulk_population_honors_the_configured_limit() {
    let (backend, _store, posts) = seeded(Some(2)).await;
    let calls = backend.calls();

    let mut results = posts.find(doc! {}).exec().await.expect("search").into_results();

    calls.reset_peak();
    results.populate("owner").await.expect("populate");
    assert_eq!(calls.peak(), 2);
    assert!(
        results
            .iter()
            .all(|post| post.get("owner").is_some_and(|owner| owner.as_document().is_some()))
    );
}
