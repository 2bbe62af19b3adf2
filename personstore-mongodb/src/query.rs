//! Query translation from the filter AST to MongoDB query syntax.

use bson::{Document, Bson, doc};

use personstore_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::DocumentStoreError,
};

use crate::sanitizer::ValueSanitizer;


/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; `None` matches every document.
    pub(crate) fn translate(filter: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }
}

/// Escapes regex metacharacters so a value matches literally.
fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn string_operand<'a>(op: &str, value: &'a Bson) -> Result<&'a str, DocumentStoreError> {
    value
        .as_str()
        .ok_or_else(|| DocumentStoreError::Backend(format!("{op} operator requires a string value")))
}

fn array_operand(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        single => Bson::Array(vec![single.clone()]),
    }
}

/// Arrays match on an equal element; string fields match on a literal substring.
///
/// A bare `$regex` would also match array elements by substring, so the regex branch
/// is limited to fields whose value is itself a string.
fn contains_clause(field: &str, value: &Bson) -> Document {
    match value {
        Bson::String(s) => doc! {
            "$or": [
                { field: { "$elemMatch": { "$eq": s } } },
                {
                    "$and": [
                        { "$expr": { "$eq": [{ "$type": format!("${field}") }, "string"] } },
                        { field: { "$regex": escape_regex(s) } },
                    ]
                },
            ]
        },
        other => doc! { field: { "$elemMatch": { "$eq": other } } },
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        // `$not` is field-level only; `$nor` negates a whole clause.
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        let field = ValueSanitizer::sanitize_path(field);

        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field = ValueSanitizer::sanitize_path(field);

        Ok(match op {
            FieldOp::Eq => doc! { field: { "$eq": value } },
            FieldOp::Ne => doc! { field: { "$ne": value } },
            FieldOp::Gt => doc! { field: { "$gt": value } },
            FieldOp::Gte => doc! { field: { "$gte": value } },
            FieldOp::Lt => doc! { field: { "$lt": value } },
            FieldOp::Lte => doc! { field: { "$lte": value } },
            FieldOp::Contains => contains_clause(&field, value),
            FieldOp::NotContains => doc! { "$nor": [contains_clause(&field, value)] },
            FieldOp::StartsWith => doc! {
                field: { "$regex": format!("^{}", escape_regex(string_operand("StartsWith", value)?)) }
            },
            FieldOp::EndsWith => doc! {
                field: { "$regex": format!("{}$", escape_regex(string_operand("EndsWith", value)?)) }
            },
            FieldOp::Includes => doc! { field: { "$elemMatch": { "$eq": value } } },
            FieldOp::AnyOf => doc! { field: { "$in": array_operand(value) } },
            FieldOp::NoneOf => doc! { field: { "$nin": array_operand(value) } },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use personstore_core::query::Filter;

    fn translate(expr: Expr) -> Document {
        MongoQueryTranslator::translate(Some(&expr)).unwrap()
    }

    #[test]
    fn equality_and_membership() {
        assert_eq!(
            translate(Filter::eq("name", "Alice Johnson")),
            doc! { "name": { "$eq": "Alice Johnson" } }
        );
        assert_eq!(
            translate(Filter::includes("favoriteFoods", "sushi")),
            doc! { "favoriteFoods": { "$elemMatch": { "$eq": "sushi" } } }
        );
        assert_eq!(
            translate(Filter::any_of("name", ["Mary", "Bob Smith"])),
            doc! { "name": { "$in": ["Mary", "Bob Smith"] } }
        );
    }

    #[test]
    fn string_operators_match_literally() {
        assert_eq!(
            translate(Filter::starts_with("name", "Dr. ")),
            doc! { "name": { "$regex": "^Dr\\. " } }
        );
        assert!(MongoQueryTranslator::translate(Some(&Filter::ends_with("age", 3))).is_err());
    }

    #[test]
    fn contains_splits_strings_from_arrays() {
        let expected = doc! {
            "$or": [
                { "favoriteFoods": { "$elemMatch": { "$eq": "cream" } } },
                {
                    "$and": [
                        { "$expr": { "$eq": [{ "$type": "$favoriteFoods" }, "string"] } },
                        { "favoriteFoods": { "$regex": "cream" } },
                    ]
                },
            ]
        };
        assert_eq!(translate(Filter::contains("favoriteFoods", "cream")), expected);

        let literal = translate(Filter::contains("name", "a+b"));
        let branches = literal.get_array("$or").unwrap();
        let and = branches[1].as_document().unwrap().get_array("$and").unwrap();
        assert_eq!(and[1], Bson::Document(doc! { "name": { "$regex": "a\\+b" } }));

        assert_eq!(
            translate(Filter::contains("scores", 7)),
            doc! { "scores": { "$elemMatch": { "$eq": 7 } } }
        );
    }

    #[test]
    fn not_contains_negates_the_whole_clause() {
        assert_eq!(
            translate(Filter::not_contains("favoriteFoods", 7)),
            doc! { "$nor": [{ "favoriteFoods": { "$elemMatch": { "$eq": 7 } } }] }
        );
    }

    #[test]
    fn negation_uses_nor() {
        assert_eq!(
            translate(Filter::eq("name", "Mary").not()),
            doc! { "$nor": [{ "name": { "$eq": "Mary" } }] }
        );
    }

    #[test]
    fn conjunctions_and_missing_filter() {
        assert_eq!(
            translate(Filter::and([Filter::gt("age", 30), Filter::exists("name")])),
            doc! { "$and": [{ "age": { "$gt": 30 } }, { "name": { "$exists": true } }] }
        );
        assert_eq!(MongoQueryTranslator::translate(None).unwrap(), doc! {});
    }
}
