mod common;

use common::TrackedStore;
use docmodel::{memory::InMemoryStore, prelude::*};

struct Fixture {
    _store: DocumentStore,
    users: Model,
    posts: Model,
}

async fn fixture() -> Fixture {
    let store = DocumentStore::new(InMemoryStore::new());

    let users = store
        .register(
            "User",
            Schema::new()
                .field("name", FieldSpec::string())
                .field("manager", FieldSpec::string()),
        )
        .expect("register users");
    let posts = store
        .register(
            "Post",
            Schema::new()
                .field("title", FieldSpec::string())
                .field("owner", FieldSpec::string().reference("User"))
                .field("watchers", FieldSpec::array_of(FieldSpec::string()).reference("User"))
                .field(
                    "comments",
                    FieldSpec::array_of(FieldSpec::object([
                        ("author", FieldSpec::string().reference("User")),
                        ("text", FieldSpec::string()),
                    ])),
                ),
        )
        .expect("register posts");

    for (id, name, manager) in [("u1", "Alice", "u2"), ("u2", "Bob", "u3"), ("u3", "Carol", "")] {
        let mut user = users
            .new_document(doc! { "id": id, "name": name })
            .expect("user");
        if !manager.is_empty() {
            user.set("manager", manager).expect("manager");
        }
        user.save().await.expect("save user");
    }

    Fixture {
        _store: store,
        users,
        posts,
    }
}

fn name_of(value: Option<Value>) -> Option<String> {
    value
        .as_ref()
        .and_then(Value::as_document)
        .and_then(|document| document.get("name"))
        .and_then(|name| name.as_str().map(str::to_owned))
}

#[tokio::test]
async fn single_references_become_documents() {
    let Fixture { posts, _store, .. } = fixture().await;

    let mut post = posts
        .create(doc! { "title": "Hello", "owner": "u1" })
        .await
        .expect("create");
    post.populate("owner").await.expect("populate");

    let owner = post.get("owner").expect("owner");
    let owner = owner.as_document().expect("document");
    assert_eq!(owner.model().name(), "User");
    assert_eq!(owner.id(), Some("u1"));
    assert_eq!(owner.get("name"), Some(Value::from("Alice")));
}

#[tokio::test]
async fn missing_references_are_left_in_place() {
    let Fixture { posts, _store, .. } = fixture().await;

    let mut post = posts
        .create(doc! { "title": "Hello", "owner": "ghost" })
        .await
        .expect("create");
    post.populate("owner").await.expect("soft miss");

    assert_eq!(post.get("owner"), Some(Value::from("ghost")));
}

#[tokio::test]
async fn identifier_arrays_are_resolved_in_place() {
    let Fixture { posts, _store, .. } = fixture().await;

    let mut post = posts
        .create(doc! { "title": "Hello", "watchers": ["u3", "ghost", "u1"] })
        .await
        .expect("create");
    post.populate("watchers").await.expect("populate");

    let watchers = post.get("watchers").expect("watchers");
    let watchers = watchers.as_array().expect("array");
    assert_eq!(watchers.len(), 3);
    assert_eq!(name_of(watchers.get(0).cloned()).as_deref(), Some("Carol"));
    assert_eq!(watchers.get(1), Some(&Value::from("ghost")));
    assert_eq!(name_of(watchers.get(2).cloned()).as_deref(), Some("Alice"));
}

#[tokio::test]
async fn nested_paths_walk_through_arrays_of_objects() {
    let Fixture { posts, _store, .. } = fixture().await;

    let mut post = posts
        .create(doc! {
            "title": "Hello",
            "comments": [
                { "author": "u2", "text": "first" },
                { "author": "u1", "text": "second" },
            ],
        })
        .await
        .expect("create");
    post.populate("comments.author").await.expect("populate");

    let comments = post.get("comments").expect("comments");
    let authors = comments
        .as_array()
        .expect("array")
        .iter()
        .map(|comment| comment.as_object().and_then(|object| object.get("author")))
        .map(name_of)
        .collect::<Vec<_>>();

    assert_eq!(authors, vec![Some("Bob".to_string()), Some("Alice".to_string())]);
}

#[tokio::test]
async fn populated_documents_can_be_walked_further() {
    let Fixture { users, _store, .. } = fixture().await;

    let mut alice = users
        .find_by_id("u1")
        .exec()
        .await
        .expect("find")
        .into_document()
        .expect("found");
    alice.populate("manager.manager").await.expect("populate");

    let manager = alice.get("manager").expect("manager");
    let bob = manager.as_document().expect("bob");
    assert_eq!(bob.get("name"), Some(Value::from("Bob")));
    assert_eq!(name_of(bob.get("manager")).as_deref(), Some("Carol"));
}

#[tokio::test]
async fn queries_populate_every_result() {
    let Fixture { posts, _store, .. } = fixture().await;

    posts.create(doc! { "title": "One", "owner": "u1" }).await.expect("create");
    posts.create(doc! { "title": "Two", "owner": "u2" }).await.expect("create");

    let results = posts
        .find(doc! {})
        .populate("owner")
        .exec()
        .await
        .expect("search")
        .into_results();

    let owners = results
        .iter()
        .map(|post| name_of(post.get("owner")))
        .collect::<Vec<_>>();
    assert_eq!(owners, vec![Some("Alice".to_string()), Some("Bob".to_string())]);

    let lean = posts
        .find(doc! { "title": "One" })
        .lean()
        .populate("owner")
        .exec()
        .await
        .expect("lean with populate hydrates");
    assert!(matches!(lean, QueryOutput::Documents(ref results) if results.len() == 1));
}

#[tokio::test]
async fn unknown_reference_models_fail_population() {
    let store = DocumentStore::new(InMemoryStore::new());
    let tasks = store
        .register(
            "Task",
            Schema::new().field("assignee", FieldSpec::string().reference("Nobody")),
        )
        .expect("register");

    let mut task = tasks
        .create(doc! { "assignee": "x" })
        .await
        .expect("create");
    let err = task.populate("assignee").await.expect_err("unknown model");

    match err {
        ModelError::Population { path, source } => {
            assert_eq!(path, "assignee");
            assert!(matches!(*source, ModelError::ModelNotRegistered(ref name) if name == "Nobody"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

async fn failing_fixture() -> (TrackedStore, DocumentStore, Model) {
    let backend = TrackedStore::new();
    let store = DocumentStore::new(backend.clone());

    let users = store
        .register("User", Schema::new().field("name", FieldSpec::string()))
        .expect("register users");
    let posts = store
        .register(
            "Post",
            Schema::new()
                .field("owner", FieldSpec::string().reference("User"))
                .field("watchers", FieldSpec::array_of(FieldSpec::string()).reference("User")),
        )
        .expect("register posts");

    users.create(doc! { "id": "u1", "name": "Alice" }).await.expect("create");
    users.create(doc! { "id": "u2", "name": "Bob" }).await.expect("create");

    (backend, store, posts)
}

fn assert_backend_failure(err: ModelError, expected_path: &str) {
    match err {
        ModelError::Population { path, source } => {
            assert_eq!(path, expected_path);
            assert!(matches!(
                *source,
                ModelError::Backend(DocumentStoreError::Backend(ref message)) if message == "read refused"
            ));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn backend_failures_abort_single_references() {
    let (backend, _store, posts) = failing_fixture().await;

    let mut post = posts.create(doc! { "owner": "u1" }).await.expect("create");
    backend.calls().fail_reads();

    let err = post.populate("owner").await.expect_err("read failure");
    assert_backend_failure(err, "owner");
    assert_eq!(post.get("owner"), Some(Value::from("u1")));
}

#[tokio::test]
async fn backend_failures_abort_identifier_arrays() {
    let (backend, _store, posts) = failing_fixture().await;

    let mut post = posts
        .create(doc! { "watchers": ["u1", "u2"] })
        .await
        .expect("create");
    backend.calls().fail_reads();

    let err = post.populate("watchers").await.expect_err("read failure");
    assert_backend_failure(err, "watchers");

    let watchers = post.get("watchers").expect("watchers");
    let watchers = watchers.as_array().expect("array");
    assert_eq!(watchers.get(0), Some(&Value::from("u1")));
    assert_eq!(watchers.get(1), Some(&Value::from("u2")));
}

#[tokio::test]
async fn backend_failures_stop_bulk_population() {
    let (backend, _store, posts) = failing_fixture().await;

    for _ in 0..8 {
        posts.create(doc! { "owner": "u1" }).await.expect("create");
    }
    let mut results = posts.find(doc! {}).exec().await.expect("search").into_results();
    assert_eq!(results.len(), 8);

    let calls = backend.calls();
    calls.fail_reads();

    let err = results.populate("owner").await.expect_err("read failure");
    assert_backend_failure(err, "owner");
    assert!(calls.multi_gets() <= 4);
    assert!(
        results
            .iter()
            .all(|post| post.get("owner") == Some(Value::from("u1")))
    );
}
