use async_trait::async_trait;
use bson::{Bson, doc};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use recordlayer::{
    memory::{InMemoryStore, MemoryChangeSink},
    notify::AttributeValue,
    prelude::*,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn schema_file() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/users.yml")
}

fn users_config() -> AdapterConfig {
    AdapterConfig::builder()
        .collection("users")
        .model_schema_file(schema_file())
        .model_schema("user")
        .model_identifier("user_id")
        .model_version_key("modified")
        .author_identifier("modified_by")
        .build()
        .unwrap()
}

async fn users_on<B: StoreBackend>(
    backend: B,
    config: AdapterConfig,
) -> (RecordAdapter<B>, MemoryChangeSink) {
    init_tracing();
    let events = MemoryChangeSink::new();
    let adapter = RecordAdapter::connect(backend, config, &SchemaCache::new())
        .await
        .unwrap()
        .with_sink(events.clone());

    (adapter, events)
}

async fn users() -> (RecordAdapter<InMemoryStore>, MemoryChangeSink) {
    users_on(InMemoryStore::new(), users_config()).await
}

#[tokio::test]
async fn create_then_update_stores_projected_records() {
    let (users, events) = users().await;

    let created = users
        .create(&doc! {
            "user_id": "u1",
            "email": "ada@example.com",
            "tags": ["a"],
            "modified": "1",
            "password": "hunter2",
        })
        .await
        .unwrap();

    assert_eq!(
        created,
        doc! {
            "user_id": "u1",
            "email": "ada@example.com",
            "tags": ["a"],
            "profile": { "name": Bson::Null, "age": Bson::Null },
            "addresses": [],
            "modified": "1",
            "modified_by": Bson::Null,
        }
    );

    let updated = users
        .update(
            "u1",
            &doc! {
                "tags": ["b", "a"],
                "profile": { "age": 36 },
                "modified": "2",
                "password": "ignored",
            },
            MergePolicy::default(),
        )
        .await
        .unwrap();

    assert_eq!(updated.get_array("tags").unwrap(), &vec![Bson::from("a"), Bson::from("b")]);
    assert_eq!(
        updated.get_document("profile").unwrap(),
        &doc! { "name": Bson::Null, "age": 36 }
    );
    assert_eq!(updated.get_str("modified").unwrap(), "2");
    assert!(!updated.contains_key("password"));
    assert_eq!(users.read("u1").await.unwrap(), Some(updated.clone()));

    let published = events.events().await;
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].operation, Operation::Create);
    assert_eq!(published[1].operation, Operation::Update);
    assert_eq!(published[1].record, updated);
    assert_eq!(published[1].collection, "users");
}

#[tokio::test]
async fn create_rejects_taken_identities_and_overwrite_replaces() {
    let (users, events) = users().await;
    users
        .create(&doc! { "user_id": "u1", "email": "first@example.com" })
        .await
        .unwrap();

    let duplicate = users
        .create(&doc! { "user_id": "u1", "email": "second@example.com" })
        .await;
    assert!(matches!(
        duplicate,
        Err(RecordStoreError::RecordAlreadyExists(id, collection)) if id == "u1" && collection == "users"
    ));
    assert_eq!(events.events().await.len(), 1);

    users
        .overwrite(&doc! { "user_id": "u1", "email": "second@example.com" })
        .await
        .unwrap();
    let stored = users.read("u1").await.unwrap().unwrap();
    assert_eq!(stored.get_str("email").unwrap(), "second@example.com");
}

#[tokio::test]
async fn create_requires_an_identity() {
    let (users, events) = users().await;

    let result = users.create(&doc! { "email": "nobody@example.com" }).await;

    assert!(matches!(result, Err(RecordStoreError::InvalidRecord(_))));
    assert!(events.events().await.is_empty());
}

#[tokio::test]
async fn updating_a_missing_record_writes_nothing() {
    let (users, events) = users().await;

    let result = users
        .update("ghost", &doc! { "email": "x@example.com" }, MergePolicy::default())
        .await;

    assert!(matches!(
        result,
        Err(RecordStoreError::MergeTargetMissing(id, _)) if id == "ghost"
    ));
    assert_eq!(users.backend().len("users").await, 0);
    assert!(events.events().await.is_empty());
}

#[tokio::test]
async fn updates_cannot_change_the_identity() {
    let (users, events) = users().await;
    users
        .create(&doc! { "user_id": "u1", "modified": "1" })
        .await
        .unwrap();

    let renamed = users
        .update("u1", &doc! { "user_id": "u2" }, MergePolicy::default())
        .await;
    assert!(matches!(renamed, Err(RecordStoreError::InvalidRecord(_))));

    let cleared = users
        .update(
            "u1",
            &doc! { "user_id": "ignored" },
            MergePolicy::default().with_dict_policy(DictPolicy::Remove),
        )
        .await;
    assert!(matches!(cleared, Err(RecordStoreError::InvalidRecord(_))));

    let stored = users.read("u1").await.unwrap().unwrap();
    assert_eq!(stored.get_str("user_id").unwrap(), "u1");
    assert_eq!(users.read("u2").await.unwrap(), None);
    assert!(events.events_of(Operation::Update).await.is_empty());

    users.create(&doc! { "user_id": "u2" }).await.unwrap();
    let claiming_u2 = users
        .query(Query::builder().filter(Filter::eq("user_id", "u2")).build())
        .await
        .unwrap();
    assert_eq!(claiming_u2.len(), 1);
}

#[tokio::test]
async fn upsert_keeps_the_identity_it_was_given() {
    let (users, _) = users().await;
    users.create(&doc! { "user_id": "u1" }).await.unwrap();

    let updated = users
        .upsert(&doc! { "user_id": "u1", "email": "a@example.com" }, MergePolicy::default())
        .await
        .unwrap();

    assert_eq!(updated.get_str("user_id").unwrap(), "u1");
    assert_eq!(updated.get_str("email").unwrap(), "a@example.com");
}

#[tokio::test]
async fn list_and_dict_policies_apply_through_update() {
    let (users, _) = users().await;
    users
        .create(&doc! {
            "user_id": "u1",
            "email": "ada@example.com",
            "tags": ["a", "b", "a"],
            "addresses": [{ "city": "London", "zip": "N1" }, { "city": "Paris", "zip": "75001" }],
        })
        .await
        .unwrap();

    let removed = users
        .update(
            "u1",
            &doc! { "tags": ["a"], "addresses": [{ "zip": "75001", "city": "Paris" }] },
            MergePolicy::default().with_list_policy(ListPolicy::Remove),
        )
        .await
        .unwrap();
    assert_eq!(removed.get_array("tags").unwrap(), &vec![Bson::from("b")]);
    assert_eq!(
        removed.get_array("addresses").unwrap(),
        &vec![Bson::Document(doc! { "city": "London", "zip": "N1" })]
    );

    let replaced = users
        .update(
            "u1",
            &doc! { "tags": ["z"] },
            MergePolicy::default().with_list_policy(ListPolicy::Replace),
        )
        .await
        .unwrap();
    assert_eq!(replaced.get_array("tags").unwrap(), &vec![Bson::from("z")]);

    let cleared = users
        .update(
            "u1",
            &doc! { "email": Bson::Null },
            MergePolicy::default().with_dict_policy(DictPolicy::Remove),
        )
        .await
        .unwrap();
    assert_eq!(cleared.get("email"), Some(&Bson::Null));
}

/// Reads through to an in-memory store, but lets another writer bump the version right after
/// every read.
#[derive(Debug, Clone, Default)]
struct RacingStore {
    inner: InMemoryStore,
}

#[async_trait]
impl StoreBackend for RacingStore {
    async fn get_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        let read = self.inner.get_record(id, collection).await?;

        if let Some(record) = &read {
            let mut newer = record.clone();
            newer.insert("modified", "concurrent");
            self.inner
                .put_record(id, newer, WriteCondition::Always, collection)
                .await?;
        }

        Ok(read)
    }

    async fn get_records(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        self.inner.get_records(ids, collection).await
    }

    async fn query_records(&self, query: Query, collection: &str) -> RecordStoreResult<Vec<Record>> {
        self.inner.query_records(query, collection).await
    }

    async fn put_record(
        &self,
        id: &str,
        record: Record,
        condition: WriteCondition,
        collection: &str,
    ) -> RecordStoreResult<()> {
        self.inner.put_record(id, record, condition, collection).await
    }

    async fn delete_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        self.inner.delete_record(id, collection).await
    }

    async fn create_collection(&self, name: &str) -> RecordStoreResult<()> {
        self.inner.create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> RecordStoreResult<()> {
        self.inner.drop_collection(name).await
    }

    async fn list_collections(&self) -> RecordStoreResult<Vec<String>> {
        self.inner.list_collections().await
    }
}

#[tokio::test]
async fn concurrent_writes_cause_a_version_conflict() {
    let (users, events) = users_on(RacingStore::default(), users_config()).await;
    users
        .create(&doc! { "user_id": "u1", "modified": "1" })
        .await
        .unwrap();

    let result = users
        .update("u1", &doc! { "email": "late@example.com" }, MergePolicy::default())
        .await;

    assert!(matches!(
        result,
        Err(RecordStoreError::VersionConflict { id, field, .. }) if id == "u1" && field == "modified"
    ));
    let stored = users.backend().inner.get_record("u1", "users").await.unwrap().unwrap();
    assert_eq!(stored.get_str("modified").unwrap(), "concurrent");
    assert_eq!(stored.get("email"), Some(&Bson::Null));
    assert!(events.events_of(Operation::Update).await.is_empty());
}

#[tokio::test]
async fn without_a_version_key_the_last_write_wins() {
    let mut config = users_config();
    config.model_version_key = None;
    let (users, _) = users_on(RacingStore::default(), config).await;
    users
        .create(&doc! { "user_id": "u1", "modified": "1" })
        .await
        .unwrap();

    let updated = users
        .update("u1", &doc! { "email": "late@example.com" }, MergePolicy::default())
        .await
        .unwrap();

    assert_eq!(updated.get_str("modified").unwrap(), "1");
    assert_eq!(updated.get_str("email").unwrap(), "late@example.com");
}

#[tokio::test]
async fn upsert_creates_then_merges() {
    let (users, events) = users().await;

    let created = users
        .upsert(&doc! { "user_id": "u1", "tags": ["a"] }, MergePolicy::default())
        .await
        .unwrap();
    assert_eq!(created.get_array("tags").unwrap(), &vec![Bson::from("a")]);

    let merged = users
        .upsert(&doc! { "user_id": "u1", "tags": ["b"] }, MergePolicy::default())
        .await
        .unwrap();
    assert_eq!(
        merged.get_array("tags").unwrap(),
        &vec![Bson::from("a"), Bson::from("b")]
    );

    let operations: Vec<Operation> = events.events().await.iter().map(|e| e.operation).collect();
    assert_eq!(operations, vec![Operation::Create, Operation::Update]);
}

#[tokio::test]
async fn delete_publishes_the_removed_record() {
    let (users, events) = users().await;
    let created = users.create(&doc! { "user_id": "u1" }).await.unwrap();

    assert_eq!(users.delete("u1").await.unwrap(), Some(created.clone()));
    assert_eq!(users.delete("u1").await.unwrap(), None);
    assert_eq!(users.read("u1").await.unwrap(), None);

    let deletes = events.events_of(Operation::Delete).await;
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].record, created);
}

#[tokio::test]
async fn events_carry_routing_attributes() {
    let mut config = users_config();
    config
        .custom_attributes
        .insert("team".into(), serde_json::json!("growth"));
    config
        .custom_attributes
        .insert("priority".into(), serde_json::json!(3));
    config
        .custom_attributes
        .insert("author_identifier".into(), serde_json::Value::Null);
    let (users, events) = users_on(InMemoryStore::new(), config).await;

    users.create(&doc! { "user_id": "u1" }).await.unwrap();

    let attributes = &events.events().await[0].attributes;
    assert_eq!(attributes.get("model_schema"), Some(&AttributeValue::from("user")));
    assert_eq!(attributes.get("model_identifier"), Some(&AttributeValue::from("user_id")));
    assert_eq!(attributes.get("model_version_key"), Some(&AttributeValue::from("modified")));
    assert_eq!(attributes.get("operation"), Some(&AttributeValue::from("create")));
    assert_eq!(attributes.get("team"), Some(&AttributeValue::from("growth")));
    assert_eq!(
        attributes.get("priority"),
        Some(&AttributeValue::Number("3".into()))
    );
    assert!(!attributes.contains_key("author_identifier"));
}

#[tokio::test]
async fn failed_notifications_do_not_fail_writes() {
    let (users, events) = users().await;
    events.fail_deliveries(true);

    users.create(&doc! { "user_id": "u1" }).await.unwrap();
    users
        .update("u1", &doc! { "email": "x@example.com" }, MergePolicy::default())
        .await
        .unwrap();

    assert!(events.events().await.is_empty());
    let stored = users.read("u1").await.unwrap().unwrap();
    assert_eq!(stored.get_str("email").unwrap(), "x@example.com");
}

#[tokio::test]
async fn query_pages_ignore_the_query_window() {
    let (users, _) = users().await;
    for n in 1..=5 {
        let id = format!("u{n}");
        let age = n * 10;
        users
            .create(&doc! { "user_id": id, "profile": { "age": age } })
            .await
            .unwrap();
    }

    let query = Query::builder()
        .filter(Filter::gte("profile.age", 20))
        .sort("profile.age", SortDirection::Asc)
        .limit(1)
        .build();
    let page = users
        .query_page(query, PaginationParams::new(2, 2))
        .await
        .unwrap();

    let ids: Vec<&str> = page
        .items
        .iter()
        .map(|record| record.get_str("user_id").unwrap())
        .collect();
    assert_eq!(ids, vec!["u4", "u5"]);
    assert_eq!(page.count, 4);
    assert_eq!(page.next_page, None);
    assert_eq!(page.previous_page, Some(1));

    let found = users.read_many(["u1", "u3", "nope"]).await.unwrap();
    assert_eq!(found.len(), 2);
}

fn layer_yaml(backend: &str) -> String {
    format!(
        "{backend}adapter:\n  collection: users\n  model_schema_file: '{}'\n  model_schema: user\n  model_identifier: user_id\n",
        schema_file().display()
    )
}

#[tokio::test]
async fn configured_layers_default_to_memory() {
    let config = RecordLayerConfig::from_yaml_str(&layer_yaml("")).unwrap();
    assert_eq!(config.backend, Engine::Memory);
    assert_eq!(config.adapter.model_version_key, None);

    let users = config.build(&SchemaCache::new()).await.unwrap();
    users.create(&doc! { "user_id": "u1" }).await.unwrap();

    assert!(users.read("u1").await.unwrap().is_some());
    assert_eq!(
        users.backend().list_collections().await.unwrap(),
        vec!["users".to_string()]
    );
    users.shutdown().await.unwrap();
}

#[tokio::test]
async fn configured_layers_reject_unknown_engines() {
    let explicit = RecordLayerConfig::from_yaml_str(&layer_yaml("backend:\n  engine: memory\n"));
    assert!(matches!(explicit, Ok(config) if config.backend == Engine::Memory));

    let unknown = RecordLayerConfig::from_yaml_str(&layer_yaml("backend:\n  engine: dynamo\n"));
    assert!(matches!(unknown, Err(RecordStoreError::InvalidConfig(_))));
}

#[test]
fn configured_layers_require_adapter_fields() {
    let result = RecordLayerConfig::from_yaml_str(
        "adapter:\n  collection: ''\n  model_schema_file: x.yml\n  model_schema: user\n  model_identifier: user_id\n",
    );

    assert!(matches!(result, Err(RecordStoreError::InvalidConfig(_))));
}
