use docmodel::{memory::InMemoryStore, prelude::*};

#[test]
fn names_register_once() {
    let store = DocumentStore::new(InMemoryStore::new());
    store.register("User", Schema::new()).expect("first registration");

    let err = store.register("User", Schema::new()).expect_err("duplicate");
    assert!(matches!(err, ModelError::ModelAlreadyRegistered(ref name) if name == "User"));
    assert_eq!(store.models().len(), 1);
}

#[test]
fn lookups_by_name_and_schema() {
    let store = DocumentStore::new(InMemoryStore::new());
    let schema = std::sync::Arc::new(Schema::new().field("name", FieldSpec::string()));
    let users = store.register("User", std::sync::Arc::clone(&schema)).expect("register");

    assert!(store.lookup("User").is_some_and(|found| found.is(&users)));
    assert!(store.lookup("Post").is_none());
    assert!(matches!(
        store.model("Post"),
        Err(ModelError::ModelNotRegistered(ref name)) if name == "Post"
    ));
    assert!(store.model_for_schema(&schema).is_some_and(|found| found.is(&users)));
    assert!(store.model_for_schema(&std::sync::Arc::new(Schema::new())).is_none());
}

#[tokio::test]
async fn configuration_addresses_the_backend() {
    let store = DocumentStore::new(InMemoryStore::builder().build().await.expect("backend"));
    let events = store
        .register_with(
            "Event",
            Schema::new().field("kind", FieldSpec::string()),
            ModelConfig::builder("Event").with_index("events-2024").with_doc_type("event").build(),
        )
        .expect("register");

    events.create(doc! { "kind": "login" }).await.expect("create");

    let backend = store.backend_as::<InMemoryStore>().expect("memory backend");
    assert_eq!(backend.document_count("events-2024", "event").await, 1);
    assert_eq!(backend.document_count("Event", "Event").await, 0);
}

#[tokio::test]
async fn shutdown_closes_registered_models() {
    let store = DocumentStore::new(InMemoryStore::new());
    let users = store.register("User", Schema::new()).expect("register");

    let shared = store.clone();
    let err = shared.shutdown().await.expect_err("store still shared");
    assert!(matches!(err, ModelError::Unsupported(_)));

    store.shutdown().await.expect("shutdown");

    let err = users.find(doc! {}).exec().await.expect_err("closed");
    assert!(matches!(err, ModelError::StoreClosed));
    assert!(matches!(users.new_document(doc! {}), Ok(_)));
}
