#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use futures::TryStreamExt as _;
    use mongodb::bson::{bson, doc, Bson, Document};
    use serde_json::json;

    use crate::{
        store::{DocumentStore, DocumentStream, FindSpec, InsertOutcome, MemoryStore},
        AnimalShelter,
        ConfigKey,
        ConnectionArgs,
        ConnectionConfig,
        Result,
        ShelterError,
    };

    fn test_config() -> ConnectionConfig {
        ConnectionArgs::new()
            .named(ConfigKey::Password, "test-secret")
            .resolve()
            .unwrap()
    }

    async fn setup_shelter() -> (AnimalShelter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let shelter = AnimalShelter::with_store(store.clone(), test_config())
            .await
            .unwrap();
        (shelter, store)
    }

    async fn read_all(shelter: &AnimalShelter, filter: Document) -> Vec<Document> {
        shelter
            .read(Some(filter))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    fn rec_nums(docs: &[Document]) -> Vec<i64> {
        let mut nums: Vec<i64> = docs.iter().map(|d| d.get_i64("rec_num").unwrap()).collect();
        nums.sort_unstable();
        nums
    }

    /// A store whose liveness check always fails.
    #[derive(Debug, Default)]
    struct UnreachableStore;

    #[async_trait]
    impl DocumentStore for UnreachableStore {
        async fn ping(&self) -> Result<()> {
            Err(ShelterError::Internal {
                message: "server selection timed out".to_owned(),
            })
        }

        async fn find(&self, _filter: Document, _spec: FindSpec) -> Result<DocumentStream> {
            unreachable!("find on an unreachable store")
        }

        async fn insert_one(&self, _document: Document) -> Result<InsertOutcome> {
            unreachable!("insert on an unreachable store")
        }

        async fn update_many(&self, _filter: Document, _update: Document) -> Result<u64> {
            unreachable!("update on an unreachable store")
        }

        async fn delete_many(&self, _filter: Document) -> Result<u64> {
            unreachable!("delete on an unreachable store")
        }

        async fn counter_value(&self, _counter: &str) -> Result<Option<i64>> {
            unreachable!("counter read on an unreachable store")
        }

        async fn advance_counter(&self, _counter: &str, _floor: i64) -> Result<i64> {
            unreachable!("counter advance on an unreachable store")
        }
    }

    /// Wraps a `MemoryStore`, acknowledging only the first `acknowledged`
    /// inserts and failing every update and delete.
    #[derive(Debug)]
    struct FlakyStore {
        inner:        MemoryStore,
        acknowledged: usize,
        inserts:      AtomicUsize,
    }

    impl FlakyStore {
        fn new(acknowledged: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                acknowledged,
                inserts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn ping(&self) -> Result<()> { Ok(()) }

        async fn find(&self, filter: Document, spec: FindSpec) -> Result<DocumentStream> {
            self.inner.find(filter, spec).await
        }

        async fn insert_one(&self, document: Document) -> Result<InsertOutcome> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) < self.acknowledged {
                self.inner.insert_one(document).await
            }
            else {
                Ok(InsertOutcome {
                    acknowledged: false,
                    inserted_id:  None,
                })
            }
        }

        async fn update_many(&self, _filter: Document, _update: Document) -> Result<u64> {
            Err(ShelterError::Internal {
                message: "primary stepped down".to_owned(),
            })
        }

        async fn delete_many(&self, _filter: Document) -> Result<u64> {
            Err(ShelterError::Internal {
                message: "primary stepped down".to_owned(),
            })
        }

        async fn counter_value(&self, counter: &str) -> Result<Option<i64>> {
            self.inner.counter_value(counter).await
        }

        async fn advance_counter(&self, counter: &str, floor: i64) -> Result<i64> {
            self.inner.advance_counter(counter, floor).await
        }
    }

    #[tokio::test]
    async fn test_construction_fails_when_ping_fails() {
        let result = AnimalShelter::with_store(Arc::new(UnreachableStore), test_config()).await;
        match result {
            Err(ShelterError::ConnectionFailed {
                source,
            }) => assert!(source.to_string().contains("server selection timed out")),
            other => panic!("Expected ConnectionFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_config_is_exposed() {
        let (shelter, _store) = setup_shelter().await;
        assert_eq!(shelter.config().database(), "aac");
        assert_eq!(shelter.name(), "animals");
    }

    #[tokio::test]
    async fn test_first_create_gets_rec_num_one() {
        let (shelter, store) = setup_shelter().await;
        assert_eq!(shelter.next_record_number().await.unwrap(), 1);

        assert!(shelter.create(doc! { "name": "Rex" }).await.unwrap());

        let stored = store.snapshot().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get_i64("rec_num").unwrap(), 1);
        assert_eq!(shelter.next_record_number().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_numbering_continues_from_existing_maximum() {
        let (shelter, store) = setup_shelter().await;
        store
            .insert_one(doc! { "name": "Old", "rec_num": 41 })
            .await
            .unwrap();
        store
            .insert_one(doc! { "name": "Older", "rec_num": 7 })
            .await
            .unwrap();

        assert!(
            shelter
                .create(vec![doc! { "name": "Bella" }, doc! { "name": "Max" }])
                .await
                .unwrap()
        );

        let bella = read_all(&shelter, doc! { "name": "Bella" }).await;
        let max = read_all(&shelter, doc! { "name": "Max" }).await;
        assert_eq!(bella[0].get_i64("rec_num").unwrap(), 42);
        assert_eq!(max[0].get_i64("rec_num").unwrap(), 43);
    }

    #[tokio::test]
    async fn test_numbering_accepts_stored_numeric_widths() {
        let (shelter, store) = setup_shelter().await;
        store.insert_one(doc! { "rec_num": 9.0 }).await.unwrap();
        assert_eq!(shelter.next_record_number().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_numbering_rejects_non_integer_maximum() {
        let (shelter, store) = setup_shelter().await;
        store.insert_one(doc! { "rec_num": "abc" }).await.unwrap();

        assert!(matches!(
            shelter.next_record_number().await,
            Err(ShelterError::InvalidRecordNumber { .. })
        ));
        assert!(matches!(
            shelter.create(doc! { "name": "Rex" }).await,
            Err(ShelterError::InvalidRecordNumber { .. })
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_top_document_without_rec_num_starts_at_one() {
        let (shelter, store) = setup_shelter().await;
        store.insert_one(doc! { "name": "Unnumbered" }).await.unwrap();
        assert_eq!(shelter.next_record_number().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_list_numbers_in_order() {
        let (shelter, store) = setup_shelter().await;
        let animals: Vec<Document> = (0..5).map(|i| doc! { "name": format!("animal-{}", i) }).collect();

        assert!(shelter.create(animals).await.unwrap());

        let stored = store.snapshot().await;
        let numbered: Vec<(String, i64)> = stored
            .iter()
            .map(|d| {
                (
                    d.get_str("name").unwrap().to_owned(),
                    d.get_i64("rec_num").unwrap(),
                )
            })
            .collect();
        let expected: Vec<(String, i64)> = (0..5_i64)
            .map(|i| (format!("animal-{}", i), i + 1))
            .collect();
        assert_eq!(numbered, expected);
    }

    #[tokio::test]
    async fn test_create_discards_caller_id_and_rec_num() {
        let (shelter, store) = setup_shelter().await;
        shelter.create(doc! { "name": "First" }).await.unwrap();

        assert!(
            shelter
                .create(doc! { "_id": 999, "rec_num": 500, "name": "Rex" })
                .await
                .unwrap()
        );

        let stored = store.snapshot().await;
        let rex = stored
            .iter()
            .find(|d| d.get_str("name").ok() == Some("Rex"))
            .unwrap();
        assert_eq!(rex.get_i64("rec_num").unwrap(), 2);
        assert!(rex.get_object_id("_id").is_ok());
        assert_ne!(rex.get("_id"), Some(&Bson::Int32(999)));
    }

    #[tokio::test]
    async fn test_create_puts_rec_num_last() {
        let (shelter, store) = setup_shelter().await;
        shelter
            .create(doc! { "rec_num": 3, "name": "Rex", "breed": "Lab" })
            .await
            .unwrap();

        let stored = store.snapshot().await;
        let keys: Vec<&str> = stored[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["_id", "name", "breed", "rec_num"]);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_input() {
        let (shelter, store) = setup_shelter().await;

        assert!(matches!(
            shelter.create(Bson::Null).await,
            Err(ShelterError::EmptyInput)
        ));
        assert!(matches!(
            shelter.create(Vec::<Document>::new()).await,
            Err(ShelterError::EmptyInput)
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_rejects_wrong_types_before_inserting() {
        let (shelter, store) = setup_shelter().await;

        let err = shelter.create(42_i32).await.unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(err, ShelterError::WrongElementType { .. }));

        let err = shelter
            .create(bson!([{ "name": "Rex" }, "not a document"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ShelterError::WrongElementType { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_json() {
        let (shelter, store) = setup_shelter().await;

        assert!(
            shelter
                .create_json(json!([{ "name": "Rex", "age_upon_outcome_in_weeks": 52 }, { "name": "Luna" }]))
                .await
                .unwrap()
        );
        assert_eq!(rec_nums(&store.snapshot().await), vec![1, 2]);

        assert!(matches!(
            shelter.create_json(json!(null)).await,
            Err(ShelterError::EmptyInput)
        ));
        assert!(matches!(
            shelter.create_json(json!("Rex")).await,
            Err(ShelterError::WrongElementType { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_reports_unacknowledged_insert() {
        let store = Arc::new(FlakyStore::new(2));
        let shelter = AnimalShelter::with_store(store.clone(), test_config())
            .await
            .unwrap();

        let batch: Vec<Document> = (0..4).map(|i| doc! { "n": i }).collect();
        assert!(!shelter.create(batch).await.unwrap());

        // The two acknowledged inserts stay, and nothing after the failure is attempted.
        assert_eq!(rec_nums(&store.inner.snapshot().await), vec![1, 2]);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_numbers() {
        let (shelter, store) = setup_shelter().await;
        let shelter = Arc::new(shelter);

        let mut handles = Vec::new();
        for i in 0..10_i32 {
            let shelter = shelter.clone();
            handles.push(tokio::spawn(async move {
                shelter
                    .create(vec![doc! { "task": i, "part": 0 }, doc! { "task": i, "part": 1 }])
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let stored = store.snapshot().await;
        assert_eq!(rec_nums(&stored), (1..=20).collect::<Vec<_>>());

        // A list is numbered as one contiguous run.
        for task in 0..10_i32 {
            let parts: Vec<&Document> = stored.iter().filter(|d| d.get_i32("task").ok() == Some(task)).collect();
            let first = parts[0].get_i64("rec_num").unwrap();
            let second = parts[1].get_i64("rec_num").unwrap();
            assert_eq!(second, first + 1);
        }
    }

    #[tokio::test]
    async fn test_read_without_filter_is_empty() {
        let (shelter, _store) = setup_shelter().await;
        shelter.create(doc! { "name": "Rex" }).await.unwrap();

        let docs: Vec<Document> = shelter.read(None).await.unwrap().try_collect().await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_read_hides_id() {
        let (shelter, _store) = setup_shelter().await;
        shelter
            .create(vec![
                doc! { "name": "Rex", "animal_type": "Dog" },
                doc! { "name": "Tom", "animal_type": "Cat" },
            ])
            .await
            .unwrap();

        let all = read_all(&shelter, doc! {}).await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|d| !d.contains_key("_id")));

        let dogs = read_all(&shelter, doc! { "animal_type": "Dog" }).await;
        assert_eq!(dogs, vec![doc! { "name": "Rex", "animal_type": "Dog", "rec_num": 1_i64 }]);

        let none = read_all(&shelter, doc! { "animal_type": "Horse" }).await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_read_invalid_filter_is_an_error() {
        let (shelter, _store) = setup_shelter().await;
        shelter.create(doc! { "name": "Rex", "age": 2 }).await.unwrap();
        let result = shelter.read(Some(doc! { "age": { "$regexish": 1 } })).await;
        assert!(matches!(result, Err(ShelterError::InvalidFilter { .. })));
    }

    #[tokio::test]
    async fn test_update_counts_modified_documents() {
        let (shelter, _store) = setup_shelter().await;
        shelter
            .create(vec![
                doc! { "name": "Rex", "outcome_type": "Transfer" },
                doc! { "name": "Tom", "outcome_type": "Transfer" },
                doc! { "name": "Ace", "outcome_type": "Adoption" },
            ])
            .await
            .unwrap();

        let modified = shelter
            .update(
                doc! { "outcome_type": "Transfer" },
                doc! { "outcome_type": "Adoption" },
            )
            .await;
        assert_eq!(modified, 2);

        let adopted = read_all(&shelter, doc! { "outcome_type": "Adoption" }).await;
        assert_eq!(adopted.len(), 3);

        // Setting a value that is already there modifies nothing.
        let again = shelter
            .update(doc! { "name": "Rex" }, doc! { "outcome_type": "Adoption" })
            .await;
        assert_eq!(again, 0);

        let missing = shelter
            .update(doc! { "name": "Nobody" }, doc! { "outcome_type": "Adoption" })
            .await;
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn test_update_may_overwrite_rec_num() {
        let (shelter, _store) = setup_shelter().await;
        shelter.create(doc! { "name": "Rex" }).await.unwrap();

        assert_eq!(
            shelter
                .update(doc! { "name": "Rex" }, doc! { "rec_num": 100_i64 })
                .await,
            1
        );
        assert_eq!(shelter.next_record_number().await.unwrap(), 101);
    }

    #[tokio::test]
    async fn test_update_and_delete_swallow_errors() {
        let store = Arc::new(FlakyStore::new(usize::MAX));
        let shelter = AnimalShelter::with_store(store, test_config()).await.unwrap();
        shelter.create(doc! { "name": "Rex" }).await.unwrap();

        assert_eq!(
            shelter
                .update(doc! { "name": "Rex" }, doc! { "age": 3 })
                .await,
            0
        );
        assert_eq!(shelter.delete(doc! { "name": "Rex" }).await, 0);

        assert!(
            shelter
                .try_update(doc! { "name": "Rex" }, doc! { "age": 3 })
                .await
                .is_err()
        );
        assert!(shelter.try_delete(doc! { "name": "Rex" }).await.is_err());
    }

    #[tokio::test]
    async fn test_try_update_reports_id_change() {
        let (shelter, _store) = setup_shelter().await;
        shelter.create(doc! { "name": "Rex" }).await.unwrap();

        assert!(
            shelter
                .try_update(doc! { "name": "Rex" }, doc! { "_id": 5 })
                .await
                .is_err()
        );
        assert_eq!(
            shelter.update(doc! { "name": "Rex" }, doc! { "_id": 5 }).await,
            0
        );
    }

    #[tokio::test]
    async fn test_delete_counts_removed_documents() {
        let (shelter, store) = setup_shelter().await;
        shelter
            .create(vec![
                doc! { "name": "Rex", "animal_type": "Dog" },
                doc! { "name": "Fido", "animal_type": "Dog" },
                doc! { "name": "Tom", "animal_type": "Cat" },
            ])
            .await
            .unwrap();

        assert_eq!(shelter.delete(doc! { "animal_type": "Dog" }).await, 2);
        assert_eq!(shelter.delete(doc! { "animal_type": "Dog" }).await, 0);
        assert_eq!(store.len().await, 1);

        assert_eq!(shelter.try_delete(doc! {}).await.unwrap(), 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_deleted_numbers_are_not_reused() {
        let (shelter, _store) = setup_shelter().await;
        shelter
            .create(vec![doc! { "name": "A" }, doc! { "name": "B" }])
            .await
            .unwrap();

        shelter.delete(doc! { "name": "B" }).await;
        assert_eq!(shelter.next_record_number().await.unwrap(), 3);

        shelter.create(doc! { "name": "C" }).await.unwrap();
        let c = read_all(&shelter, doc! { "name": "C" }).await;
        assert_eq!(c[0].get_i64("rec_num").unwrap(), 3);

        // Emptying the collection does not restart numbering either.
        shelter.delete(doc! {}).await;
        assert_eq!(shelter.next_record_number().await.unwrap(), 4);
        shelter.create(doc! { "name": "D" }).await.unwrap();
        let docs = read_all(&shelter, doc! {}).await;
        assert_eq!(rec_nums(&docs), vec![4]);
    }

    #[tokio::test]
    async fn test_accessors_sharing_a_store_get_distinct_numbers() {
        let store = Arc::new(MemoryStore::new());
        let mut shelters = Vec::new();
        for _ in 0..2 {
            shelters.push(Arc::new(
                AnimalShelter::with_store(store.clone(), test_config())
                    .await
                    .unwrap(),
            ));
        }

        let mut handles = Vec::new();
        for i in 0..10_i32 {
            let shelter = shelters[usize::try_from(i).unwrap() % 2].clone();
            handles.push(tokio::spawn(async move {
                shelter.create(doc! { "task": i }).await.unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(rec_nums(&store.snapshot().await), (1..=10).collect::<Vec<_>>());
    }
}
