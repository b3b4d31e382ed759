//! Common fixtures for integration tests
//!
//! `seeded()` builds a small Carolingian corpus through the public record
//! API: a region hierarchy, a content hierarchy, people, a letter with a
//! reply, and a duplicate person carrying copies of the original's edges.

#![allow(dead_code)]

use prosopa::records::{
    Authorship, DocumentPlace, Factoid, NewAuthority, NewDocument, NewNode, NewPerson, NewPlace, NewRole,
    OfficeHolding, Reference,
};
use prosopa::{EntityId, EntityType, HierarchyKind, IntegrityEngine, OpenStore, Record, SqliteStore, StorageResult};

pub fn memory_engine() -> IntegrityEngine {
    IntegrityEngine::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

/// Ids of the seeded corpus
pub struct Seeded {
    pub engine: IntegrityEngine,
    // regions: Francia -> Austrasia -> Metz
    pub francia: EntityId,
    pub austrasia: EntityId,
    pub metz_region: EntityId,
    // content: Letters -> Private letters
    pub letters: EntityId,
    pub private_letters: EntityId,
    pub bishop: EntityId,
    pub metz: EntityId,
    pub author: EntityId,
    pub alcuin: EntityId,
    /// Duplicate of `alcuin`
    pub albinus: EntityId,
    pub charlemagne: EntityId,
    pub letter: EntityId,
    pub reply: EntityId,
    pub gnd: EntityId,
}

pub fn seeded() -> Seeded {
    let engine = memory_engine();

    let francia = create(&engine, &NewNode::root(HierarchyKind::Region, "Francia"));
    let austrasia = create(&engine, &NewNode::child(HierarchyKind::Region, francia, "Austrasia"));
    let metz_region = create(&engine, &NewNode::child(HierarchyKind::Region, austrasia, "Metz"));
    let letters = create(&engine, &NewNode::root(HierarchyKind::Content, "Letters"));
    let private_letters = create(&engine, &NewNode::child(HierarchyKind::Content, letters, "Private letters"));
    let bishop = create(&engine, &NewNode::root(HierarchyKind::Office, "Bishop"));

    let metz = create(&engine, &NewPlace::new("Metz", Some(metz_region)));
    let author = create(&engine, &NewRole::new("author"));
    let alcuin = create(&engine, &NewPerson::new("Alcuin of York"));
    let albinus = create(&engine, &NewPerson::new("Albinus"));
    let charlemagne = create(&engine, &NewPerson::new("Charlemagne"));

    let letter = create(&engine, &NewDocument::new("letter").title("Epistola ad Carolum", Some("la")).tagged(private_letters));
    let reply = create(&engine, &NewDocument::new("letter").title("Responsio", Some("la")));
    create(&engine, &Reference {
        source_id: reply,
        target_id: letter,
        reference_type: "reply".into(),
    });
    create(&engine, &DocumentPlace {
        document_id: letter,
        place_id: metz,
    });

    // The same authorship and office holding, recorded once per duplicate
    for person in [alcuin, albinus] {
        create(&engine, &Authorship {
            document_id: letter,
            person_id: person,
            role_id: author,
        });
        create(&engine, &OfficeHolding {
            person_id: person,
            office_id: bishop,
            place_id: Some(metz),
        });
    }
    create(&engine, &Factoid {
        object_id: Some(charlemagne),
        ..Factoid::new(albinus, "correspondent")
    });

    let gnd = create(&engine, &NewAuthority::new("GND"));
    engine
        .assign_identifier(gnd, EntityType::Person, alcuin, 0, "118501569")
        .expect("seed identifier");
    engine
        .assign_identifier(gnd, EntityType::Person, albinus, 0, "118501569")
        .expect("seed identifier");

    Seeded {
        engine,
        francia,
        austrasia,
        metz_region,
        letters,
        private_letters,
        bishop,
        metz,
        author,
        alcuin,
        albinus,
        charlemagne,
        letter,
        reply,
        gnd,
    }
}

pub fn create(engine: &IntegrityEngine, record: &dyn Record) -> EntityId {
    engine.create(record).expect("seed record")
}

/// Run a `SELECT COUNT(*)`-style query
pub fn count(engine: &IntegrityEngine, sql: &str) -> i64 {
    engine
        .read(|conn| -> StorageResult<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) })
        .expect("count query")
}
