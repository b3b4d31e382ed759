//! Relation kinds that a merge can collapse

use crate::graph::EntityType;
use crate::storage::{filter_clause, validate_identifier, RowFilter, StorageError, StorageResult};
use serde::{Deserialize, Serialize};

/// One relation table seen from the entity whose ids sit in `from_column`.
///
/// `natural_key` is the column tuple that must be unique once duplicates are
/// merged; `filter` narrows shared tables such as `global_id` to one subject
/// type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    pub name: String,
    pub entity: EntityType,
    pub table: String,
    pub from_column: String,
    pub natural_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<RowFilter>,
}

impl RelationSpec {
    pub fn new(
        name: impl Into<String>,
        entity: EntityType,
        table: impl Into<String>,
        from_column: impl Into<String>,
        natural_key: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            entity,
            table: table.into(),
            from_column: from_column.into(),
            natural_key: natural_key.iter().map(|c| (*c).to_string()).collect(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(RowFilter::new(column, value));
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.from_column)?;
        if self.natural_key.is_empty() {
            return Err(StorageError::InvalidIdentifier(format!("{}: empty natural key", self.name)));
        }
        for column in &self.natural_key {
            validate_identifier(column)?;
        }
        self.filter.as_ref().map_or(Ok(()), RowFilter::validate)
    }

    /// `UPDATE` moving rows from `?2` (secondary) to `?1` (primary); filter value at `?3`
    pub(crate) fn reassign_sql(&self) -> (String, Option<&String>) {
        let (clause, value) = filter_clause(self.filter.as_ref(), 3);
        (
            format!(
                "UPDATE {table} SET {col} = ?1 WHERE {col} = ?2{clause}",
                table = self.table,
                col = self.from_column,
            ),
            value,
        )
    }

    /// `DELETE` keeping the lowest id of every natural-key group; filter value at `?1`
    pub(crate) fn compact_sql(&self) -> (String, Option<&String>) {
        let (clause, value) = filter_clause(self.filter.as_ref(), 1);
        let key = self.natural_key.join(", ");
        (
            format!(
                "DELETE FROM {table} WHERE 1 = 1{clause} AND id NOT IN \
                 (SELECT MIN(id) FROM {table} WHERE 1 = 1{clause} GROUP BY {key})",
                table = self.table,
            ),
            value,
        )
    }
}

/// Ordered collection of relation kinds
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RelationCatalog {
    relations: Vec<RelationSpec>,
}

const FACTOID_KEY: &[&str] = &["subject_id", "object_id", "date", "interval", "location_id", "factoid_type"];
const OFFICE_KEY: &[&str] = &["person_id", "office_id", "place_id"];
const AUTHORSHIP_KEY: &[&str] = &["person_id", "document_id", "role_id"];
const IDENTIFIER_KEY: &[&str] = &["authority_id", "subject_type", "subject_id"];

impl RelationCatalog {
    /// Relations of the built-in schema
    pub fn builtin() -> Self {
        use EntityType::*;

        let relations = vec![
            // person
            RelationSpec::new("authorship", Person, "document_person", "person_id", AUTHORSHIP_KEY),
            RelationSpec::new("factoid_subject", Person, "factoid", "subject_id", FACTOID_KEY),
            RelationSpec::new("factoid_object", Person, "factoid", "object_id", FACTOID_KEY),
            RelationSpec::new("office_holding", Person, "person_office", "person_id", OFFICE_KEY),
            RelationSpec::new("person_identifier", Person, "global_id", "subject_id", IDENTIFIER_KEY)
                .with_filter("subject_type", Person.as_str()),
            // document
            RelationSpec::new("document_authorship", Document, "document_person", "document_id", AUTHORSHIP_KEY),
            RelationSpec::new(
                "document_citation",
                Document,
                "document_bib",
                "document_id",
                &["document_id", "bib_id", "pages"],
            ),
            RelationSpec::new(
                "document_tagging",
                Document,
                "document_content",
                "document_id",
                &["document_id", "content_id"],
            ),
            RelationSpec::new("document_identifier", Document, "global_id", "subject_id", IDENTIFIER_KEY)
                .with_filter("subject_type", Document.as_str()),
            // place
            RelationSpec::new("document_place", Place, "document_place", "place_id", &["document_id", "place_id"]),
            RelationSpec::new("factoid_location", Place, "factoid", "location_id", FACTOID_KEY),
            RelationSpec::new("office_seat", Place, "person_office", "place_id", OFFICE_KEY),
            RelationSpec::new("place_identifier", Place, "global_id", "subject_id", IDENTIFIER_KEY)
                .with_filter("subject_type", Place.as_str()),
            // bibliography
            RelationSpec::new(
                "citation",
                Bibliography,
                "document_bib",
                "bib_id",
                &["document_id", "bib_id", "pages"],
            ),
            RelationSpec::new("bib_containment", Bibliography, "bib", "parent_id", &["id"]),
            // hierarchies
            RelationSpec::new(
                "content_tagging",
                Content,
                "document_content",
                "content_id",
                &["document_id", "content_id"],
            ),
            RelationSpec::new("content_children", Content, "content", "parent_id", &["id"]),
            RelationSpec::new("office_assignment", Office, "person_office", "office_id", OFFICE_KEY),
            RelationSpec::new("office_children", Office, "office", "parent_id", &["id"]),
            RelationSpec::new("region_places", Region, "place", "region_id", &["id"]),
            RelationSpec::new("region_children", Region, "region", "parent_id", &["id"]),
            // vocabularies
            RelationSpec::new("role_usage", Role, "document_person", "role_id", AUTHORSHIP_KEY),
            RelationSpec::new("authority_usage", Authority, "global_id", "authority_id", IDENTIFIER_KEY),
        ];

        Self { relations }
    }

    pub fn get(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Relations whose `from_column` holds ids of `entity`, in declaration order
    pub fn for_entity(&self, entity: EntityType) -> impl Iterator<Item = &RelationSpec> {
        self.relations.iter().filter(move |r| r.entity == entity)
    }

    /// Add a relation, replacing any existing one with the same name
    pub fn add(&mut self, spec: RelationSpec) -> StorageResult<()> {
        spec.validate()?;
        match self.relations.iter_mut().find(|r| r.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.relations.push(spec),
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationSpec> {
        self.relations.iter()
    }
}
