//! Fixed dataset served by the offline repository.

use chrono::{DateTime, TimeZone, Utc};

use kbsync_core::{Connection, KnowledgeBase, Organization, Resource};

pub const MOCK_CONNECTION_ID: &str = "96891794-4313-42f1-9d98-237e526165b8";
pub const MOCK_ORG_ID: &str = "0d582f36-52dd-403f-a38a-ccf4dfa06180";

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

pub fn connections() -> Vec<Connection> {
    vec![Connection {
        connection_id: MOCK_CONNECTION_ID.to_string(),
        name: "Google Drive".to_string(),
        connection_provider: "gdrive".to_string(),
        // 2025-06-19T02:28:05Z / 2025-08-26T22:28:26Z
        created_at: timestamp(1_750_300_085),
        updated_at: timestamp(1_756_247_306),
    }]
}

pub fn organization() -> Organization {
    Organization {
        org_id: MOCK_ORG_ID.to_string(),
        name: None,
    }
}

pub fn knowledge_bases() -> Vec<KnowledgeBase> {
    let kb = |id: &str, name: &str, created: i64| KnowledgeBase {
        knowledge_base_id: id.to_string(),
        name: Some(name.to_string()),
        description: Some("This is the description, edit it as you see fit.".to_string()),
        connection_id: None,
        connection_source_ids: Vec::new(),
        created_at: timestamp(created),
    };
    vec![
        kb("9d376111-8357-4455-8119-78a3c3067110", "Victor BC", 1_756_225_000),
        kb("28919395-e766-48f9-8282-e4c4f19391fc", "TestTest", 1_755_788_949),
        kb(
            "f9fa84c3-d454-4765-81f1-883f7834fa6d",
            "Documents for \"Agent Builder\"",
            1_755_075_535,
        ),
    ]
}

/// The whole resource tree, parents listed before their children.
pub fn resources() -> Vec<Resource> {
    vec![
        Resource::directory("mock-folder-1", "My Documents"),
        Resource::file("mock-file-1", "document.pdf").with_mime_type("application/pdf"),
        Resource::directory("mock-folder-2", "Images"),
        Resource::file("mock-file-2", "image.jpg").with_mime_type("image/jpeg"),
        Resource::file("mock-file-3", "spreadsheet.xlsx").with_mime_type(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        Resource::directory("mock-subfolder-1", "My Documents/Subfolder A")
            .with_parent("mock-folder-1"),
        Resource::file("mock-file-a", "My Documents/File A.txt")
            .with_mime_type("text/plain")
            .with_parent("mock-folder-1"),
        Resource::file("mock-image-a", "Images/Vacation.jpg")
            .with_mime_type("image/jpeg")
            .with_parent("mock-folder-2"),
        Resource::file("mock-image-b", "Images/Family.png")
            .with_mime_type("image/png")
            .with_parent("mock-folder-2"),
        Resource::file("mock-nested-file", "My Documents/Subfolder A/Nested File.doc")
            .with_mime_type("application/msword")
            .with_parent("mock-subfolder-1"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parents_exist_and_precede_children() {
        let resources = resources();
        let mut seen = HashSet::new();
        for resource in &resources {
            if let Some(parent) = &resource.parent_id {
                assert!(seen.contains(parent), "{} listed before its parent", resource.path);
                let dir = resources.iter().find(|r| &r.resource_id == parent).unwrap();
                assert!(resource.is_descendant_of(dir));
            }
            seen.insert(resource.resource_id.clone());
        }
    }

    #[test]
    fn test_fixed_identities() {
        assert_eq!(connections()[0].connection_id, MOCK_CONNECTION_ID);
        assert_eq!(knowledge_bases().len(), 3);
        assert_eq!(organization().org_id, MOCK_ORG_ID);
    }
}
