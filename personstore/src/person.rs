//! The `Person` record and the shapes used to create and patch it.

use bson::{Document as BsonDocument, Uuid};
use serde::{Deserialize, Serialize};
use std::fmt;

use personstore_core::{
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Default collection holding person records.
pub const PERSON_COLLECTION: &str = "Person";

/// A stored person.
///
/// Serialized with camelCase field names (`id`, `name`, `age`, `favoriteFoods`).
/// Fields left out by a projection deserialize to their empty value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(default)]
    pub favorite_foods: Vec<String>,
}

impl Document for Person {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        PERSON_COLLECTION
    }

    fn validate(&self) -> DocumentStoreResult<()> {
        validate_name(Some(&self.name))
    }
}

fn validate_name(name: Option<&str>) -> DocumentStoreResult<()> {
    match name {
        Some(name) if !name.trim().is_empty() => Ok(()),
        Some(_) => Err(DocumentStoreError::Validation("Person name must not be empty".into())),
        None => Err(DocumentStoreError::Validation("Person name is required".into())),
    }
}

/// Candidate fields for a new person. The store assigns the id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPerson {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub favorite_foods: Vec<String>,
}

impl NewPerson {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn age(mut self, age: i32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn favorite_foods<I, S>(mut self, foods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.favorite_foods = foods.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> DocumentStoreResult<()> {
        validate_name(self.name.as_deref())
    }

    /// Validates the candidate and turns it into a person with a fresh id.
    pub(crate) fn into_person(self) -> DocumentStoreResult<Person> {
        self.validate()?;

        Ok(Person {
            id: Uuid::new(),
            name: self.name.unwrap_or_default(),
            age: self.age,
            favorite_foods: self.favorite_foods,
        })
    }
}

/// Fields set by [`PersonStore::find_one_and_update`](crate::people::PersonStore::find_one_and_update).
///
/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonPatch {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub favorite_foods: Option<Vec<String>>,
}

impl PersonPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn age(mut self, age: i32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn favorite_foods<I, S>(mut self, foods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.favorite_foods = Some(foods.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.favorite_foods.is_none()
    }

    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.is_empty() {
            return Err(DocumentStoreError::Validation("Person patch sets no fields".into()));
        }
        if self.name.is_some() {
            validate_name(self.name.as_deref())?;
        }
        Ok(())
    }

    /// The stored field values this patch sets.
    pub fn to_set_document(&self) -> BsonDocument {
        let mut set = BsonDocument::new();
        if let Some(name) = &self.name {
            set.insert(PersonField::Name.as_str(), name.clone());
        }
        if let Some(age) = self.age {
            set.insert(PersonField::Age.as_str(), age);
        }
        if let Some(foods) = &self.favorite_foods {
            set.insert(PersonField::FavoriteFoods.as_str(), foods.clone());
        }
        set
    }
}

/// Typed selector for the stored fields of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonField {
    Id,
    Name,
    Age,
    FavoriteFoods,
}

impl PersonField {
    pub const ALL: [PersonField; 4] = [
        PersonField::Id,
        PersonField::Name,
        PersonField::Age,
        PersonField::FavoriteFoods,
    ];

    /// Stored field name.
    pub fn as_str(self) -> &'static str {
        match self {
            PersonField::Id => "id",
            PersonField::Name => "name",
            PersonField::Age => "age",
            PersonField::FavoriteFoods => "favoriteFoods",
        }
    }

    /// Whether every person must carry this field.
    pub fn is_required(self) -> bool {
        matches!(self, PersonField::Id | PersonField::Name)
    }
}

impl fmt::Display for PersonField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PersonField> for String {
    fn from(field: PersonField) -> Self {
        field.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc};
    use personstore_core::{document::DocumentExt, error::ErrorKind};

    #[test]
    fn serializes_with_stored_field_names() {
        let person = Person {
            id: Uuid::new(),
            name: "Alice Johnson".into(),
            age: Some(28),
            favorite_foods: vec!["pizza".into(), "pasta".into()],
        };

        let bson = person.to_bson().unwrap();
        let doc = bson.as_document().unwrap();

        assert_eq!(doc.get_str("name").unwrap(), "Alice Johnson");
        assert_eq!(doc.get_i32("age").unwrap(), 28);
        assert!(doc.get_array("favoriteFoods").is_ok());
        assert!(doc.contains_key("id"));
    }

    #[test]
    fn missing_optional_fields_take_empty_values() {
        let id = Uuid::new();
        let person = Person::from_bson(Bson::Document(doc! { "id": id, "name": "Mary" })).unwrap();

        assert_eq!(person.age, None);
        assert!(person.favorite_foods.is_empty());
    }

    #[test]
    fn new_person_requires_a_name() {
        assert_eq!(NewPerson::default().validate().unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(NewPerson::named("   ").validate().unwrap_err().kind(), ErrorKind::Validation);

        let person = NewPerson::named("Bob Smith").age(34).into_person().unwrap();
        assert_eq!(person.name, "Bob Smith");
        assert_eq!(person.age, Some(34));
    }

    #[test]
    fn patch_rules() {
        assert!(PersonPatch::new().validate().is_err());
        assert!(PersonPatch::new().name("").validate().is_err());
        assert!(PersonPatch::new().age(35).validate().is_ok());

        assert_eq!(
            PersonPatch::new().age(35).favorite_foods(["tacos"]).to_set_document(),
            doc! { "age": 35, "favoriteFoods": ["tacos"] }
        );
    }

    #[test]
    fn only_id_and_name_are_required() {
        let required: Vec<_> = PersonField::ALL.into_iter().filter(|f| f.is_required()).collect();
        assert_eq!(required, vec![PersonField::Id, PersonField::Name]);
    }
}
