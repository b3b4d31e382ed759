//! Insertable records
//!
//! Each record writes its root row, plus any rows it owns, through the
//! unit of work it is handed and returns the generated id of the root row.
//! Nothing here checks that referenced ids exist; the schema carries no
//! foreign keys and the engine does not pretend otherwise.

use crate::graph::{EntityId, EntityType, IntegrityError, IntegrityResult};
use crate::hierarchy::HierarchyKind;
use crate::storage::{StorageResult, UnitOfWork};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

/// A row (or group of rows) that can be inserted in one unit of work
pub trait Record {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId>;

    /// The hierarchy this record writes to, if any
    fn hierarchy(&self) -> Option<HierarchyKind> {
        None
    }
}

/// Node of a content, office or region hierarchy
#[derive(Debug, Clone)]
pub struct NewNode {
    pub kind: HierarchyKind,
    pub parent_id: Option<EntityId>,
    pub label: String,
}

impl NewNode {
    pub fn root(kind: HierarchyKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            parent_id: None,
            label: label.into(),
        }
    }

    pub fn child(kind: HierarchyKind, parent_id: EntityId, label: impl Into<String>) -> Self {
        Self {
            kind,
            parent_id: Some(parent_id),
            label: label.into(),
        }
    }
}

impl Record for NewNode {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        let sql = format!("INSERT INTO {} (parent_id, name) VALUES (?1, ?2)", self.kind.table());
        uow.insert_returning_id(&sql, params![self.parent_id.map(EntityId::get), self.label])
    }

    fn hierarchy(&self) -> Option<HierarchyKind> {
        Some(self.kind)
    }
}

#[derive(Debug, Clone)]
pub struct Title {
    pub title: String,
    pub language: Option<String>,
}

/// Dating of a document: a day, optionally widened by `interval` years
#[derive(Debug, Clone)]
pub struct Dating {
    pub date: NaiveDate,
    pub interval: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Translation {
    pub language: String,
    pub body: String,
}

/// A document with its titles, datings, translations and content tags.
///
/// Every owned row is written in the same unit of work as the document, so a
/// failure leaves no partial document behind.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub document_type: String,
    pub shelfmark: Option<String>,
    pub titles: Vec<Title>,
    pub dates: Vec<Dating>,
    pub translations: Vec<Translation>,
    pub content: Vec<EntityId>,
}

impl NewDocument {
    pub fn new(document_type: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            ..Self::default()
        }
    }

    pub fn shelfmark(mut self, shelfmark: impl Into<String>) -> Self {
        self.shelfmark = Some(shelfmark.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>, language: Option<&str>) -> Self {
        self.titles.push(Title {
            title: title.into(),
            language: language.map(str::to_string),
        });
        self
    }

    pub fn dated(mut self, date: NaiveDate, interval: Option<i64>) -> Self {
        self.dates.push(Dating { date, interval });
        self
    }

    pub fn translation(mut self, language: impl Into<String>, body: impl Into<String>) -> Self {
        self.translations.push(Translation {
            language: language.into(),
            body: body.into(),
        });
        self
    }

    pub fn tagged(mut self, content_id: EntityId) -> Self {
        self.content.push(content_id);
        self
    }
}

impl Record for NewDocument {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        let id = uow.insert_returning_id(
            "INSERT INTO document (document_type, shelfmark) VALUES (?1, ?2)",
            params![self.document_type, self.shelfmark],
        )?;
        for t in &self.titles {
            uow.execute(
                "INSERT INTO document_title (document_id, title, language) VALUES (?1, ?2, ?3)",
                params![id.get(), t.title, t.language],
            )?;
        }
        for d in &self.dates {
            uow.execute(
                "INSERT INTO document_date (document_id, date, interval) VALUES (?1, ?2, ?3)",
                params![id.get(), d.date, d.interval],
            )?;
        }
        for t in &self.translations {
            uow.execute(
                "INSERT INTO translation (document_id, language, body) VALUES (?1, ?2, ?3)",
                params![id.get(), t.language, t.body],
            )?;
        }
        for content_id in &self.content {
            uow.execute(
                "INSERT INTO document_content (document_id, content_id) VALUES (?1, ?2)",
                params![id.get(), content_id.get()],
            )?;
        }
        Ok(id)
    }
}

#[derive(Debug, Clone)]
pub struct NewPerson {
    pub name: String,
}

impl NewPerson {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Record for NewPerson {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id("INSERT INTO person (name) VALUES (?1)", params![self.name])
    }
}

#[derive(Debug, Clone)]
pub struct NewPlace {
    pub name: String,
    pub region_id: Option<EntityId>,
}

impl NewPlace {
    pub fn new(name: impl Into<String>, region_id: Option<EntityId>) -> Self {
        Self {
            name: name.into(),
            region_id,
        }
    }
}

impl Record for NewPlace {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id(
            "INSERT INTO place (name, region_id) VALUES (?1, ?2)",
            params![self.name, self.region_id.map(EntityId::get)],
        )
    }
}

/// Bibliography item; `parent_id` points at the containing volume or series
#[derive(Debug, Clone)]
pub struct NewBibItem {
    pub title: String,
    pub bib_type: String,
    pub parent_id: Option<EntityId>,
}

impl NewBibItem {
    pub fn new(title: impl Into<String>, bib_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            bib_type: bib_type.into(),
            parent_id: None,
        }
    }

    pub fn within(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

impl Record for NewBibItem {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id(
            "INSERT INTO bib (title, bib_type, parent_id) VALUES (?1, ?2, ?3)",
            params![self.title, self.bib_type, self.parent_id.map(EntityId::get)],
        )
    }
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
}

impl NewRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Record for NewRole {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id("INSERT INTO role (name) VALUES (?1)", params![self.name])
    }
}

/// Issuer of external identifiers, such as an authority file or an edition series
#[derive(Debug, Clone)]
pub struct NewAuthority {
    pub name: String,
    pub multi_volume: bool,
}

impl NewAuthority {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multi_volume: false,
        }
    }

    pub fn multi_volume(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multi_volume: true,
        }
    }
}

impl Record for NewAuthority {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id(
            "INSERT INTO authority (name, multi_volume) VALUES (?1, ?2)",
            params![self.name, self.multi_volume],
        )
    }
}

/// Person attached to a document in a role
#[derive(Debug, Clone, Copy)]
pub struct Authorship {
    pub document_id: EntityId,
    pub person_id: EntityId,
    pub role_id: EntityId,
}

impl Record for Authorship {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id(
            "INSERT INTO document_person (document_id, person_id, role_id) VALUES (?1, ?2, ?3)",
            params![self.document_id.get(), self.person_id.get(), self.role_id.get()],
        )
    }
}

/// Directed document-to-document reference (reply, copy, mention)
#[derive(Debug, Clone)]
pub struct Reference {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub reference_type: String,
}

impl Record for Reference {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id(
            "INSERT INTO document_reference (source_id, target_id, reference_type) VALUES (?1, ?2, ?3)",
            params![self.source_id.get(), self.target_id.get(), self.reference_type],
        )
    }
}

/// Document cited in a bibliography item
#[derive(Debug, Clone)]
pub struct Citation {
    pub document_id: EntityId,
    pub bib_id: EntityId,
    pub pages: Option<String>,
}

impl Record for Citation {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id(
            "INSERT INTO document_bib (document_id, bib_id, pages) VALUES (?1, ?2, ?3)",
            params![self.document_id.get(), self.bib_id.get(), self.pages],
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OfficeHolding {
    pub person_id: EntityId,
    pub office_id: EntityId,
    pub place_id: Option<EntityId>,
}

impl Record for OfficeHolding {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id(
            "INSERT INTO person_office (person_id, office_id, place_id) VALUES (?1, ?2, ?3)",
            params![self.person_id.get(), self.office_id.get(), self.place_id.map(EntityId::get)],
        )
    }
}

/// Assertion about a person, optionally relating them to another person,
/// a place and a source document
#[derive(Debug, Clone)]
pub struct Factoid {
    pub subject_id: EntityId,
    pub object_id: Option<EntityId>,
    pub date: Option<NaiveDate>,
    pub interval: Option<i64>,
    pub location_id: Option<EntityId>,
    pub factoid_type: String,
    pub document_id: Option<EntityId>,
}

impl Factoid {
    pub fn new(subject_id: EntityId, factoid_type: impl Into<String>) -> Self {
        Self {
            subject_id,
            object_id: None,
            date: None,
            interval: None,
            location_id: None,
            factoid_type: factoid_type.into(),
            document_id: None,
        }
    }
}

impl Record for Factoid {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id(
            "INSERT INTO factoid (subject_id, object_id, date, interval, location_id, factoid_type, document_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.subject_id.get(),
                self.object_id.map(EntityId::get),
                self.date,
                self.interval,
                self.location_id.map(EntityId::get),
                self.factoid_type,
                self.document_id.map(EntityId::get),
            ],
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentPlace {
    pub document_id: EntityId,
    pub place_id: EntityId,
}

impl Record for DocumentPlace {
    fn insert(&self, uow: &UnitOfWork<'_>) -> StorageResult<EntityId> {
        uow.insert_returning_id(
            "INSERT INTO document_place (document_id, place_id) VALUES (?1, ?2)",
            params![self.document_id.get(), self.place_id.get()],
        )
    }
}

/// Highest number of volumes an identifier list may span
pub const MAX_VOLUMES: usize = 256;

/// Set identifier `position` of the `(authority, subject)` entry to `value`.
///
/// Creates the entry when absent and pads skipped positions with empty
/// strings. Only multi-volume authorities accept positions above zero, and
/// no authority accepts one at or beyond [`MAX_VOLUMES`].
pub fn assign_identifier(
    uow: &UnitOfWork<'_>,
    authority: EntityId,
    subject_type: EntityType,
    subject: EntityId,
    position: usize,
    value: &str,
) -> IntegrityResult<Vec<String>> {
    let conn = uow.connection();
    let multi_volume: bool = conn
        .query_row(
            "SELECT multi_volume FROM authority WHERE id = ?1",
            [authority.get()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(IntegrityError::NotFound {
            entity: EntityType::Authority,
            id: authority,
        })?;
    if position >= MAX_VOLUMES || (position > 0 && !multi_volume) {
        return Err(IntegrityError::InvalidVolume { authority, position });
    }

    let existing: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, identifiers FROM global_id
             WHERE authority_id = ?1 AND subject_type = ?2 AND subject_id = ?3
             ORDER BY id LIMIT 1",
            params![authority.get(), subject_type.as_str(), subject.get()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let mut identifiers: Vec<String> = match &existing {
        Some((_, json)) => serde_json::from_str(json)?,
        None => Vec::new(),
    };
    if identifiers.len() <= position {
        identifiers.resize(position + 1, String::new());
    }
    identifiers[position] = value.to_string();
    let json = serde_json::to_string(&identifiers)?;

    match existing {
        Some((row_id, _)) => {
            uow.execute("UPDATE global_id SET identifiers = ?1 WHERE id = ?2", params![json, row_id])?;
        }
        None => {
            uow.execute(
                "INSERT INTO global_id (authority_id, subject_type, subject_id, identifiers) VALUES (?1, ?2, ?3, ?4)",
                params![authority.get(), subject_type.as_str(), subject.get(), json],
            )?;
        }
    }
    Ok(identifiers)
}
