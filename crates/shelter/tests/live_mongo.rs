//! Tests against a real MongoDB server.
//!
//! These are ignored by default. To run them, point the `SHELTER_TEST_*`
//! variables at a disposable database and run
//! `cargo test -p shelter-dbms -- --ignored`. Each test clears the collection
//! it uses.

use futures::TryStreamExt as _;
use serial_test::serial;
use shelter::{bson::doc, AnimalShelter, ConfigKey, ConnectionArgs, ShelterError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn live_args() -> Option<ConnectionArgs> {
    let password = std::env::var("SHELTER_TEST_PASSWORD").ok()?;
    let mut args = ConnectionArgs::new().named(ConfigKey::Password, password);
    for (key, var) in [
        (ConfigKey::Username, "SHELTER_TEST_USERNAME"),
        (ConfigKey::Host, "SHELTER_TEST_HOST"),
        (ConfigKey::Port, "SHELTER_TEST_PORT"),
        (ConfigKey::Database, "SHELTER_TEST_DATABASE"),
        (ConfigKey::AuthSource, "SHELTER_TEST_AUTH_SOURCE"),
    ] {
        if let Ok(value) = std::env::var(var) {
            args = args.named(key, value);
        }
    }
    Some(args.named(ConfigKey::Collection, "shelter_live_tests"))
}

async fn fresh_shelter() -> Option<AnimalShelter> {
    init_tracing();
    let Some(args) = live_args()
    else {
        eprintln!("SHELTER_TEST_PASSWORD not set, skipping");
        return None;
    };
    let shelter = AnimalShelter::connect(&args).await.unwrap();
    shelter.try_delete(doc! {}).await.unwrap();
    Some(shelter)
}

#[tokio::test]
#[ignore = "requires a running MongoDB server"]
#[serial]
async fn test_live_crud_round() {
    let Some(shelter) = fresh_shelter().await
    else {
        return;
    };

    // The rec_num counter survives clearing the collection.
    let first = shelter.next_record_number().await.unwrap();
    assert!(
        shelter
            .create(vec![
                doc! { "name": "Rex", "animal_type": "Dog", "outcome_type": "Transfer" },
                doc! { "name": "Tom", "animal_type": "Cat", "outcome_type": "Transfer" },
            ])
            .await
            .unwrap()
    );
    assert_eq!(shelter.next_record_number().await.unwrap(), first + 2);

    let dogs: Vec<_> = shelter
        .read(Some(doc! { "animal_type": "Dog" }))
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(dogs.len(), 1);
    assert!(!dogs[0].contains_key("_id"));
    assert_eq!(dogs[0].get_i64("rec_num").unwrap(), first);

    assert_eq!(
        shelter
            .update(doc! { "outcome_type": "Transfer" }, doc! { "outcome_type": "Adoption" })
            .await,
        2
    );
    assert_eq!(shelter.delete(doc! { "animal_type": "Cat" }).await, 1);
    assert_eq!(shelter.delete(doc! {}).await, 1);

    shelter.create(doc! { "name": "Max", "animal_type": "Dog" }).await.unwrap();
    let max: Vec<_> = shelter
        .read(Some(doc! { "name": "Max" }))
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(max[0].get_i64("rec_num").unwrap(), first + 2);
}

#[tokio::test]
#[ignore = "requires a running MongoDB server"]
#[serial]
async fn test_live_wrong_password_fails_construction() {
    init_tracing();
    let Some(args) = live_args()
    else {
        return;
    };
    let args = args.named(ConfigKey::Password, "definitely-not-the-password");
    assert!(matches!(
        AnimalShelter::connect(&args).await,
        Err(ShelterError::ConnectionFailed { .. })
    ));
}
