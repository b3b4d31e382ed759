//! Serialization tests with the JSON shapes the CLI emits

use serde_json::{json, Value};

/// Fixture: ancestor path of region C under A → B → C
fn ancestor_path_fixture() -> Value {
    json!([
        { "id": 1, "label": "Francia" },
        { "id": 2, "label": "Austrasia" },
        { "id": 3, "label": "Metz" }
    ])
}

/// Fixture: committed deletion of a document with two titles and one identifier
fn delete_report_fixture() -> Value {
    json!({
        "entity": "document",
        "id": 12,
        "cascaded": [
            { "table": "document_title", "rows": 2 },
            { "table": "global_id", "rows": 1 }
        ]
    })
}

fn merge_report_fixture() -> Value {
    json!({
        "relation": "authorship",
        "primary": 1,
        "secondary": 2,
        "reassigned": 2,
        "removed": 1
    })
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use crate::graph::{EntityId, EntityType};
    use crate::guard::{CascadeCount, DeleteReport};
    use crate::hierarchy::{AncestorPath, HierarchyKind, PathStep};
    use crate::merge::MergeReport;

    #[test]
    fn entity_id_serializes_as_number() {
        assert_eq!(serde_json::to_value(EntityId::new(42)).unwrap(), json!(42));
        let id: EntityId = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(id, EntityId::new(7));
    }

    #[test]
    fn entity_type_serializes_lowercase() {
        assert_eq!(serde_json::to_value(EntityType::Bibliography).unwrap(), json!("bibliography"));
        let t: EntityType = serde_json::from_value(json!("authority")).unwrap();
        assert_eq!(t, EntityType::Authority);
    }

    #[test]
    fn hierarchy_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(HierarchyKind::Region).unwrap(), json!("region"));
    }

    #[test]
    fn ancestor_path_matches_fixture() {
        let path: AncestorPath = vec![
            PathStep { id: EntityId::new(1), label: "Francia".into() },
            PathStep { id: EntityId::new(2), label: "Austrasia".into() },
            PathStep { id: EntityId::new(3), label: "Metz".into() },
        ];
        assert_eq!(serde_json::to_value(&path).unwrap(), ancestor_path_fixture());
    }

    #[test]
    fn ancestor_path_deserializes_from_fixture() {
        let path: AncestorPath = serde_json::from_value(ancestor_path_fixture()).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.last().unwrap().id, EntityId::new(3));
    }

    #[test]
    fn delete_report_matches_fixture() {
        let report = DeleteReport {
            entity: EntityType::Document,
            id: EntityId::new(12),
            cascaded: vec![
                CascadeCount { table: "document_title".into(), rows: 2 },
                CascadeCount { table: "global_id".into(), rows: 1 },
            ],
        };
        assert_eq!(serde_json::to_value(&report).unwrap(), delete_report_fixture());
    }

    #[test]
    fn merge_report_matches_fixture() {
        let report = MergeReport {
            relation: "authorship".into(),
            primary: EntityId::new(1),
            secondary: EntityId::new(2),
            reassigned: 2,
            removed: 1,
        };
        assert_eq!(serde_json::to_value(&report).unwrap(), merge_report_fixture());
    }
}
