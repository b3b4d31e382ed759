//! Declarative dependency rules
//!
//! For every entity type the guard needs two ordered lists: the checks that
//! must all count zero before the entity may go, and the owned child rows it
//! removes first when it does. Both are plain data so that a new relation only
//! needs a new entry here (or in the configuration file).

use crate::graph::EntityType;
use crate::storage::{filter_clause, validate_identifier, RowFilter, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// "Is `id` still referenced from `table.column`?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<RowFilter>,
    /// Reported when this check blocks a deletion
    pub message: String,
}

impl DependencyCheck {
    pub fn new(table: impl Into<String>, column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            filter: None,
            message: message.into(),
        }
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(RowFilter::new(column, value));
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.column)?;
        self.filter.as_ref().map_or(Ok(()), RowFilter::validate)
    }

    /// `SELECT COUNT(*)` with the entity id at `?1` and the filter value, if any, at `?2`
    pub(crate) fn count_sql(&self) -> (String, Option<&String>) {
        let (clause, value) = filter_clause(self.filter.as_ref(), 2);
        (
            format!("SELECT COUNT(*) FROM {} WHERE {} = ?1{}", self.table, self.column, clause),
            value,
        )
    }
}

/// Owned child rows removed before the root row: `DELETE FROM table WHERE column = id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeStep {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<RowFilter>,
}

impl CascadeStep {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(RowFilter::new(column, value));
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.column)?;
        self.filter.as_ref().map_or(Ok(()), RowFilter::validate)
    }

    pub(crate) fn delete_sql(&self) -> (String, Option<&String>) {
        let (clause, value) = filter_clause(self.filter.as_ref(), 2);
        (
            format!("DELETE FROM {} WHERE {} = ?1{}", self.table, self.column, clause),
            value,
        )
    }
}

/// Checks and cascade steps for one entity type, both in evaluation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRule {
    pub checks: Vec<DependencyCheck>,
    pub cascade: Vec<CascadeStep>,
}

impl EntityRule {
    fn check(mut self, check: DependencyCheck) -> Self {
        self.checks.push(check);
        self
    }

    fn cascade(mut self, step: CascadeStep) -> Self {
        self.cascade.push(step);
        self
    }

    /// Cascade step for the entity's rows in the shared `global_id` table
    fn identifiers(self, entity: EntityType) -> Self {
        self.cascade(CascadeStep::new("global_id", "subject_id").with_filter("subject_type", entity.as_str()))
    }
}

/// The full rule table, keyed by entity type
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: BTreeMap<EntityType, EntityRule>,
}

impl RuleSet {
    /// Rules for the built-in schema
    pub fn builtin() -> Self {
        let mut rules = BTreeMap::new();

        rules.insert(
            EntityType::Document,
            EntityRule::default()
                .check(DependencyCheck::new(
                    "document_reference",
                    "source_id",
                    "document is the source of a reference to another document",
                ))
                .check(DependencyCheck::new(
                    "document_reference",
                    "target_id",
                    "document is referenced by another document",
                ))
                .check(DependencyCheck::new(
                    "document_person",
                    "document_id",
                    "persons are still attached to the document",
                ))
                .check(DependencyCheck::new(
                    "factoid",
                    "document_id",
                    "document is cited as the source of a factoid",
                ))
                .check(DependencyCheck::new(
                    "document_bib",
                    "document_id",
                    "document is cited by a bibliography item",
                ))
                .cascade(CascadeStep::new("document_title", "document_id"))
                .cascade(CascadeStep::new("document_date", "document_id"))
                .cascade(CascadeStep::new("translation", "document_id"))
                .cascade(CascadeStep::new("document_content", "document_id"))
                .cascade(CascadeStep::new("document_place", "document_id"))
                .identifiers(EntityType::Document),
        );

        rules.insert(
            EntityType::Person,
            EntityRule::default()
                .check(DependencyCheck::new(
                    "document_person",
                    "person_id",
                    "person is attached to a document",
                ))
                .check(DependencyCheck::new(
                    "factoid",
                    "subject_id",
                    "person is the subject of a factoid",
                ))
                .check(DependencyCheck::new(
                    "factoid",
                    "object_id",
                    "person is the object of a factoid",
                ))
                .cascade(CascadeStep::new("person_office", "person_id"))
                .identifiers(EntityType::Person),
        );

        rules.insert(
            EntityType::Place,
            EntityRule::default()
                .check(DependencyCheck::new(
                    "document_place",
                    "place_id",
                    "place is linked to a document",
                ))
                .check(DependencyCheck::new(
                    "factoid",
                    "location_id",
                    "place is the location of a factoid",
                ))
                .check(DependencyCheck::new(
                    "person_office",
                    "place_id",
                    "place is the seat of an office holding",
                ))
                .identifiers(EntityType::Place),
        );

        rules.insert(
            EntityType::Bibliography,
            EntityRule::default()
                .check(DependencyCheck::new(
                    "bib",
                    "parent_id",
                    "bibliography item contains other items",
                ))
                .check(DependencyCheck::new(
                    "document_bib",
                    "bib_id",
                    "bibliography item cites documents",
                ))
                .identifiers(EntityType::Bibliography),
        );

        rules.insert(
            EntityType::Content,
            EntityRule::default()
                .check(DependencyCheck::new(
                    "content",
                    "parent_id",
                    "content category has sub-categories",
                ))
                .check(DependencyCheck::new(
                    "document_content",
                    "content_id",
                    "content category is assigned to documents",
                )),
        );

        rules.insert(
            EntityType::Office,
            EntityRule::default()
                .check(DependencyCheck::new("office", "parent_id", "office has sub-offices"))
                .check(DependencyCheck::new(
                    "person_office",
                    "office_id",
                    "office is held by a person",
                )),
        );

        rules.insert(
            EntityType::Region,
            EntityRule::default()
                .check(DependencyCheck::new("region", "parent_id", "region has sub-regions"))
                .check(DependencyCheck::new("place", "region_id", "region contains places")),
        );

        rules.insert(
            EntityType::Role,
            EntityRule::default().check(DependencyCheck::new(
                "document_person",
                "role_id",
                "role is used by an authorship",
            )),
        );

        rules.insert(
            EntityType::Authority,
            EntityRule::default().check(DependencyCheck::new(
                "global_id",
                "authority_id",
                "authority has identifiers assigned",
            )),
        );

        Self { rules }
    }

    pub fn get(&self, entity: EntityType) -> Option<&EntityRule> {
        self.rules.get(&entity)
    }

    /// Append a check after the existing ones for `entity`
    pub fn add_check(&mut self, entity: EntityType, check: DependencyCheck) -> StorageResult<()> {
        check.validate()?;
        self.rules.entry(entity).or_default().checks.push(check);
        Ok(())
    }

    /// Append a cascade step after the existing ones for `entity`
    pub fn add_cascade(&mut self, entity: EntityType, step: CascadeStep) -> StorageResult<()> {
        step.validate()?;
        self.rules.entry(entity).or_default().cascade.push(step);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityType, &EntityRule)> {
        self.rules.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_builtin_covers_every_entity_type() {
        let rules = RuleSet::builtin();
        for entity in EntityType::ALL {
            assert!(rules.get(entity).is_some(), "no rule for {entity}");
        }
    }

    #[test]
    fn test_builtin_rules_are_valid_identifiers() {
        for (_, rule) in RuleSet::builtin().iter() {
            for check in &rule.checks {
                check.validate().unwrap();
            }
            for step in &rule.cascade {
                step.validate().unwrap();
            }
        }
    }

    #[test]
    fn test_document_checks_reference_source_first() {
        let rules = RuleSet::builtin();
        let first = &rules.get(EntityType::Document).unwrap().checks[0];
        assert_eq!(first.table, "document_reference");
        assert_eq!(first.column, "source_id");
    }

    #[test]
    fn test_count_sql_with_and_without_filter() {
        let plain = DependencyCheck::new("factoid", "subject_id", "m");
        let (sql, value) = plain.count_sql();
        assert_eq!(sql, "SELECT COUNT(*) FROM factoid WHERE subject_id = ?1");
        assert!(value.is_none());

        let step = CascadeStep::new("global_id", "subject_id").with_filter("subject_type", "person");
        let (sql, value) = step.delete_sql();
        assert_eq!(sql, "DELETE FROM global_id WHERE subject_id = ?1 AND subject_type = ?2");
        assert_eq!(value.map(String::as_str), Some("person"));
    }

    #[test]
    fn test_add_check_appends_in_order() {
        let mut rules = RuleSet::builtin();
        let before = rules.get(EntityType::Person).unwrap().checks.len();

        rules
            .add_check(
                EntityType::Person,
                DependencyCheck::new("letter_witness", "person_id", "person witnesses a letter"),
            )
            .unwrap();

        let checks = &rules.get(EntityType::Person).unwrap().checks;
        assert_eq!(checks.len(), before + 1);
        assert_eq!(checks.last().unwrap().table, "letter_witness");
    }

    #[test]
    fn test_add_check_rejects_bad_identifier() {
        let mut rules = RuleSet::default();
        let err = rules
            .add_check(
                EntityType::Place,
                DependencyCheck::new("place; DROP TABLE place", "id", "m"),
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidIdentifier(_)));
        assert!(rules.get(EntityType::Place).is_none());
    }
}
