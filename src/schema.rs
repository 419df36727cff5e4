//! Output schemas and the schema-complete result type.
//!
//! A [`StructuredResult`] can only be built from a [`Schema`], and always
//! holds exactly that schema's fields in declaration order. Fields the model
//! did not supply carry [`NOT_PROVIDED`].

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Placeholder for a declared field the model did not return.
pub const NOT_PROVIDED: &str = "Not Provided";

/// A fixed, ordered set of field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    name: &'static str,
    fields: &'static [&'static str],
}

impl Schema {
    /// Identity documents.
    pub const IDENTITY: Schema = Schema {
        name: "identity",
        fields: &["Document Type", "Full Name", "Date of Birth"],
    };

    /// Financial documents.
    pub const FINANCIAL: Schema = Schema {
        name: "financial",
        fields: &["Document Type", "Amounts"],
    };

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }
}

/// Field values projected onto a [`Schema`].
///
/// Serialises as a flat JSON object in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredResult {
    schema: Schema,
    values: Vec<String>,
}

impl StructuredResult {
    /// Build a result by asking `lookup` for each declared field.
    ///
    /// `None` becomes [`NOT_PROVIDED`].
    pub fn from_lookup<F>(schema: &Schema, mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let values = schema
            .fields()
            .iter()
            .map(|field| lookup(field).unwrap_or_else(|| NOT_PROVIDED.to_string()))
            .collect();
        Self {
            schema: *schema,
            values,
        }
    }

    /// Value of a declared field, or `None` if the schema has no such field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.schema
            .fields()
            .iter()
            .position(|f| *f == field)
            .map(|i| self.values[i].as_str())
    }

    /// `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.schema
            .fields()
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of fields that fell back to [`NOT_PROVIDED`].
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| *v == NOT_PROVIDED).count()
    }
}

impl Serialize for StructuredResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_get_sentinel() {
        let r = StructuredResult::from_lookup(&Schema::IDENTITY, |f| {
            (f == "Full Name").then(|| "Jane Doe".to_string())
        });
        assert_eq!(r.len(), 3);
        assert_eq!(r.get("Full Name"), Some("Jane Doe"));
        assert_eq!(r.get("Document Type"), Some(NOT_PROVIDED));
        assert_eq!(r.get("Date of Birth"), Some(NOT_PROVIDED));
        assert_eq!(r.get("Amounts"), None);
        assert_eq!(r.missing_count(), 2);
    }

    #[test]
    fn serialises_in_schema_order() {
        let r = StructuredResult::from_lookup(&Schema::FINANCIAL, |f| Some(format!("<{f}>")));
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(
            json,
            r#"{"Document Type":"<Document Type>","Amounts":"<Amounts>"}"#
        );
    }
}
