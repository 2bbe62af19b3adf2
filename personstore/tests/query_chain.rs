use personstore::{memory::InMemoryStore, prelude::*};

async fn seeded() -> PersonStore<InMemoryStore> {
    let people = PersonStore::open(InMemoryStore::new(), &StoreConfig::default())
        .await
        .unwrap();

    people
        .create_many(vec![
            NewPerson::named("Mary").age(22).favorite_foods(["sushi", "tea"]),
            NewPerson::named("Bob Smith").age(34).favorite_foods(["ramen", "burger"]),
            NewPerson::named("Zoe").age(31).favorite_foods(["sushi"]),
            NewPerson::named("Alice Johnson").age(28).favorite_foods(["tacos", "sushi"]),
            NewPerson::named("Cathy Brown").age(29).favorite_foods(["pasta"]),
        ])
        .await
        .unwrap();

    people
}

fn names(people: &[Person]) -> Vec<&str> {
    people.iter().map(|p| p.name.as_str()).collect()
}

#[tokio::test]
async fn sushi_chain() {
    let people = seeded().await;

    let result = people
        .query()
        .filter(Filter::includes(PersonField::FavoriteFoods, "sushi"))
        .sort_by(PersonField::Name, SortDirection::Asc)
        .limit(2)
        .project([PersonField::Age])
        .execute()
        .await
        .unwrap();

    assert_eq!(names(&result), vec!["Alice Johnson", "Mary"]);
    assert!(result.iter().all(|p| p.age.is_none()));
    assert_eq!(result[0].favorite_foods, vec!["tacos", "sushi"]);
}

#[tokio::test]
async fn call_order_does_not_matter() {
    let people = seeded().await;
    let sushi = || Filter::includes(PersonField::FavoriteFoods, "sushi");
    let q = people.query();

    let variants = [
        q.filter(sushi()).sort_by(PersonField::Name, SortDirection::Asc).limit(2).project([PersonField::Age]),
        q.limit(2).project([PersonField::Age]).sort_by(PersonField::Name, SortDirection::Asc).filter(sushi()),
        q.project([PersonField::Age]).filter(sushi()).limit(2).sort_by(PersonField::Name, SortDirection::Asc),
        q.sort_by(PersonField::Name, SortDirection::Asc).limit(2).filter(sushi()).project([PersonField::Age]),
    ];

    let expected = variants[0].execute().await.unwrap();
    assert_eq!(expected.len(), 2);

    for variant in &variants[1..] {
        assert_eq!(variant.execute().await.unwrap(), expected);
    }
}

#[tokio::test]
async fn branches_do_not_interfere() {
    let people = seeded().await;

    let sushi = people
        .query()
        .filter(Filter::includes(PersonField::FavoriteFoods, "sushi"));
    let youngest = sushi.sort_by(PersonField::Age, SortDirection::Asc).limit(1);
    let oldest = sushi.sort_by(PersonField::Age, SortDirection::Desc).limit(1);

    assert_eq!(names(&youngest.execute().await.unwrap()), vec!["Mary"]);
    assert_eq!(names(&oldest.execute().await.unwrap()), vec!["Zoe"]);
    assert_eq!(sushi.execute().await.unwrap().len(), 3);
}

#[tokio::test]
async fn repeated_calls_combine_or_replace() {
    let people = seeded().await;

    let result = people
        .query()
        .filter(Filter::includes(PersonField::FavoriteFoods, "sushi"))
        .filter(Filter::gt(PersonField::Age, 25))
        .sort_by(PersonField::Name, SortDirection::Desc)
        .limit(1)
        .limit(5)
        .project([PersonField::Age])
        .project([PersonField::FavoriteFoods])
        .execute()
        .await
        .unwrap();

    assert_eq!(names(&result), vec!["Zoe", "Alice Johnson"]);
    assert!(result.iter().all(|p| p.age.is_none() && p.favorite_foods.is_empty()));
}

#[tokio::test]
async fn secondary_sort_keys_break_ties() {
    let people = seeded().await;
    people
        .create(NewPerson::named("Aaron").age(29))
        .await
        .unwrap();

    let result = people
        .query()
        .filter(Filter::and([Filter::gte(PersonField::Age, 28), Filter::lte(PersonField::Age, 29)]))
        .sort_by(PersonField::Age, SortDirection::Desc)
        .sort_by(PersonField::Name, SortDirection::Asc)
        .execute()
        .await
        .unwrap();

    assert_eq!(names(&result), vec!["Aaron", "Cathy Brown", "Alice Johnson"]);
}

#[tokio::test]
async fn skip_applies_after_sort_and_before_limit() {
    let people = seeded().await;

    let result = people
        .query()
        .limit(2)
        .skip(1)
        .sort_by(PersonField::Name, SortDirection::Asc)
        .execute()
        .await
        .unwrap();

    assert_eq!(names(&result), vec!["Bob Smith", "Cathy Brown"]);
}

#[tokio::test]
async fn unsorted_results_keep_insertion_order() {
    let people = seeded().await;

    let result = people.query().execute().await.unwrap();

    assert_eq!(
        names(&result),
        vec!["Mary", "Bob Smith", "Zoe", "Alice Johnson", "Cathy Brown"]
    );
}

#[tokio::test]
async fn required_fields_cannot_be_projected_away() {
    let people = seeded().await;

    for field in [PersonField::Id, PersonField::Name] {
        let err = people
            .query()
            .project([PersonField::Age, field])
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{field}");
    }
}

#[tokio::test]
async fn empty_result_is_not_an_error() {
    let people = seeded().await;

    let result = people
        .query()
        .filter(Filter::includes(PersonField::FavoriteFoods, "pizza"))
        .execute()
        .await
        .unwrap();

    assert!(result.is_empty());
}

#[tokio::test]
async fn zero_limit_returns_nothing() {
    let people = seeded().await;

    let result = people
        .query()
        .sort_by(PersonField::Name, SortDirection::Asc)
        .limit(0)
        .execute()
        .await
        .unwrap();

    assert!(result.is_empty());
}
