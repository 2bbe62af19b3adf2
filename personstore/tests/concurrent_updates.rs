// Concurrent update tests
//
// Many tasks update the same record at once; no write may be lost.
// Run with: cargo test --test concurrent_updates

use futures::future::join_all;
use personstore::{memory::InMemoryStore, prelude::*};
use std::sync::Arc;
use tokio::sync::Barrier;

const WRITERS: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_all_land() {
    let config = StoreConfig::default().with_max_update_attempts(WRITERS as u32 + 1);
    let people = Arc::new(PersonStore::open(InMemoryStore::new(), &config).await.unwrap());
    let id = people.create(NewPerson::named("Alice Johnson")).await.unwrap().id;
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles = (0..WRITERS).map(|i| {
        let people = Arc::clone(&people);
        let barrier = Arc::clone(&barrier);
        let food = format!("food-{i}");

        tokio::spawn(async move {
            barrier.wait().await;
            people
                .update_by_read_modify_write(id, move |p| p.favorite_foods.push(food.clone()))
                .await
        })
    });

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let stored = people.find_by_id(id).await.unwrap();
    assert_eq!(stored.favorite_foods.len(), WRITERS);
    for i in 0..WRITERS {
        assert!(
            stored.favorite_foods.contains(&format!("food-{i}")),
            "food-{i} was lost: {:?}",
            stored.favorite_foods
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_find_one_and_update_is_atomic() {
    let people = Arc::new(
        PersonStore::open(InMemoryStore::new(), &StoreConfig::default())
            .await
            .unwrap(),
    );
    let created = people.create(NewPerson::named("Bob Smith").age(0)).await.unwrap();

    let handles = (0..WRITERS as i32).map(|age| {
        let people = Arc::clone(&people);
        tokio::spawn(async move {
            people
                .find_one_and_update(
                    Filter::eq(PersonField::Name, "Bob Smith"),
                    PersonPatch::new().age(age + 1),
                    FindOneAndUpdateOptions::returning_original(),
                )
                .await
        })
    });

    let mut previous: Vec<i32> = Vec::new();
    for result in join_all(handles).await {
        let before = result.unwrap().unwrap().unwrap();
        previous.push(before.age.unwrap());
    }

    // Every write saw a distinct predecessor, so none overwrote another unseen.
    previous.sort_unstable();
    previous.dedup();
    assert_eq!(previous.len(), WRITERS);

    let stored = people.find_by_id(created.id).await.unwrap();
    assert!(stored.age.is_some_and(|age| (1..=WRITERS as i32).contains(&age)));
}

#[tokio::test]
async fn exhausted_attempts_surface_conflict() {
    let backend = InMemoryStore::new();
    let config = StoreConfig::default().with_max_update_attempts(1);
    let people = PersonStore::open(backend.clone(), &config).await.unwrap();
    let created = people.create(NewPerson::named("Cathy Brown")).await.unwrap();

    // A second handle over the same backend writes between the read and the write.
    let other = Arc::new(PersonStore::open(backend, &config).await.unwrap());
    let id = created.id;

    let err = people
        .update_by_read_modify_write(id, {
            let other = Arc::clone(&other);
            move |p| {
                let other = Arc::clone(&other);
                // Runs inside the mutation, after the read.
                std::thread::scope(|s| {
                    s.spawn(|| {
                        tokio::runtime::Builder::new_current_thread()
                            .build()
                            .unwrap()
                            .block_on(other.update_by_read_modify_write(id, |q| q.age = Some(1)))
                            .unwrap();
                    });
                });
                p.age = Some(2);
            }
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(people.find_by_id(id).await.unwrap().age, Some(1));
}
