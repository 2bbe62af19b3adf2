//! Runs every person store operation once against the configured backend.
//!
//! ```text
//! RUST_LOG=debug cargo run --bin walkthrough
//! PERSON_STORE_BACKEND=mongodb MONGO_URI=mongodb://localhost:27017 cargo run --features mongodb --bin walkthrough
//! ```

use personstore::{prelude::*, telemetry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> DocumentStoreResult<()> {
    telemetry::init();

    let config = StoreConfig::from_env()?;
    info!(backend = ?config.backend, collection = %config.collection, "connecting");

    let people = config.connect().await?;

    let result = walkthrough(&people).await;
    if let Err(err) = &result {
        error!(error = %err, kind = ?err.kind(), "walkthrough failed");
    }

    people.close().await?;
    result
}

async fn walkthrough<B: StoreBackend>(people: &PersonStore<B>) -> DocumentStoreResult<()> {
    let alice = people
        .create(NewPerson::named("Alice Johnson").age(28).favorite_foods(["tacos", "salad"]))
        .await?;
    info!(?alice, "created one");

    let created = people
        .create_many(vec![
            NewPerson::named("Bob Smith").age(34).favorite_foods(["ramen", "burger"]),
            NewPerson::named("Cathy Brown").age(29).favorite_foods(["pasta", "ice cream"]),
            NewPerson::named("Mary").age(22).favorite_foods(["sushi", "tea"]),
            NewPerson::named("Mary").age(41).favorite_foods(["soup"]),
        ])
        .await?;
    info!(created = created.len(), "created many");

    let by_name = people.find_by_predicate(Filter::eq(PersonField::Name, "Alice Johnson")).await?;
    info!(?by_name, "found by name");

    let ramen = people.find_one(Filter::includes(PersonField::FavoriteFoods, "ramen")).await?;
    info!(?ramen, "found one by favorite food");

    let by_id = people.find_by_id(alice.id.to_string()).await?;
    info!(?by_id, "found by id");

    let updated = people
        .update_by_read_modify_write(alice.id, |p| p.favorite_foods.push("sushi".to_string()))
        .await?;
    info!(?updated, "added a favorite food");

    let bob = people
        .find_one_and_update(
            Filter::eq(PersonField::Name, "Bob Smith"),
            PersonPatch::new().age(35),
            FindOneAndUpdateOptions::returning_updated(),
        )
        .await?;
    info!(?bob, "found and updated");

    if let Some(cathy) = created.iter().find(|p| p.name == "Cathy Brown") {
        let removed = people.delete_by_id(cathy.id).await?;
        info!(?removed, "removed by id");
    }

    let removed = people.delete_many(Filter::eq(PersonField::Name, "Mary")).await?;
    info!(removed, "removed many");

    let sushi = people
        .query()
        .filter(Filter::includes(PersonField::FavoriteFoods, "sushi"))
        .sort_by(PersonField::Name, SortDirection::Asc)
        .limit(2)
        .project([PersonField::Age])
        .execute()
        .await?;
    info!(?sushi, "query chain");

    info!(remaining = people.count(None).await?, "done");
    Ok(())
}
