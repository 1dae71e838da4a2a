use super::*;
use tempfile::TempDir;

fn folder(tmp: &TempDir) -> String {
    tmp.path().to_string_lossy().into_owned()
}

fn file_in(tmp: &TempDir, name: &str) -> String {
    let path = tmp.path().join(name);
    std::fs::write(&path, "export class Cart {}\n").unwrap();
    path.to_string_lossy().into_owned()
}

// ===== ProjectRef =====

#[test]
fn test_project_id_precedence() {
    let reference = ProjectRef {
        project: Some("named".to_string()),
        project_file: Some("/home/me/shop.sublime-project".to_string()),
        folders: vec!["/home/me/shop".to_string()],
    };
    assert_eq!(reference.id(), Some(ProjectId::new("named")));

    let reference = ProjectRef {
        project: None,
        ..reference
    };
    assert_eq!(reference.id(), Some(ProjectId::new("shop")));

    let reference = ProjectRef {
        project_file: None,
        folders: vec!["/work/storefront".to_string()],
        ..reference
    };
    assert_eq!(reference.id(), Some(ProjectId::new("storefront")));
}

#[test]
fn test_project_ref_requires_identity() {
    let result = ProjectRef::default().validate();
    assert!(result.unwrap_err().contains("must be given"));
}

#[test]
fn test_project_ref_empty_name() {
    let reference = ProjectRef::new(Some("  ".to_string()), vec![]);
    assert!(reference.validate().unwrap_err().contains("cannot be empty"));
}

#[test]
fn test_project_ref_name_too_long() {
    let reference = ProjectRef::new(Some("a".repeat(300)), vec![]);
    assert!(reference.validate().unwrap_err().contains("too long"));
}

#[test]
fn test_project_ref_folder_checks() {
    let reference = ProjectRef::new(None, vec!["relative/dir".to_string()]);
    assert!(reference.validate().unwrap_err().contains("absolute"));

    let reference = ProjectRef::new(None, vec!["/nonexistent/goto/usage".to_string()]);
    assert!(reference.validate().unwrap_err().contains("does not exist"));

    let tmp = TempDir::new().unwrap();
    let file = file_in(&tmp, "a.js");
    let reference = ProjectRef::new(None, vec![file]);
    assert!(reference.validate().unwrap_err().contains("not a directory"));

    let reference = ProjectRef::new(None, vec![folder(&tmp)]);
    assert!(reference.validate().is_ok());
}

#[test]
fn test_to_project_needs_folders() {
    let reference = ProjectRef::new(Some("shop".to_string()), vec![]);
    assert!(reference.to_project().unwrap_err().contains("no folders"));

    let tmp = TempDir::new().unwrap();
    let reference = ProjectRef::new(Some("shop".to_string()), vec![folder(&tmp)]);
    let project = reference.to_project().unwrap();
    assert_eq!(project.id, ProjectId::new("shop"));
    assert_eq!(project.folders.len(), 1);
}

// ===== Requests =====

#[test]
fn test_goto_usage_request_validation() {
    let tmp = TempDir::new().unwrap();
    let mut req = GotoUsageRequest {
        project: ProjectRef::new(None, vec![folder(&tmp)]),
        file_path: file_in(&tmp, "cart.js"),
        line: 1,
    };
    assert!(req.validate().is_ok());

    req.line = 0;
    assert!(req.validate().unwrap_err().contains("1-based"));

    req.line = 1;
    req.file_path = tmp.path().join("missing.js").to_string_lossy().into_owned();
    assert!(req.validate().unwrap_err().contains("does not exist"));
}

#[test]
fn test_find_usages_request_validation() {
    let tmp = TempDir::new().unwrap();
    let mut req = FindUsagesRequest {
        project: ProjectRef::new(None, vec![folder(&tmp)]),
        symbol: "Cart".to_string(),
        defining_file: file_in(&tmp, "cart.js"),
    };
    assert!(req.validate().is_ok());

    req.symbol = "   ".to_string();
    assert!(req.validate().unwrap_err().contains("symbol cannot be empty"));

    req.symbol = "x".repeat(2000);
    assert!(req.validate().unwrap_err().contains("too long"));
}

#[test]
fn test_rebuild_request_needs_folders() {
    let req = RebuildRequest {
        project: ProjectRef::new(Some("shop".to_string()), vec![]),
    };
    assert!(req.validate().unwrap_err().contains("folders cannot be empty"));
}

#[test]
fn test_file_saved_accepts_deleted_files() {
    let tmp = TempDir::new().unwrap();
    let req = FileSavedRequest {
        project: ProjectRef::new(None, vec![folder(&tmp)]),
        file_path: tmp.path().join("deleted.js").to_string_lossy().into_owned(),
    };
    assert!(req.validate().is_ok());

    let req = FileSavedRequest {
        file_path: "relative.js".to_string(),
        ..req
    };
    assert!(req.validate().unwrap_err().contains("absolute"));
}

#[test]
fn test_invalidate_by_name_only() {
    let req = InvalidateRequest {
        project: ProjectRef::new(Some("shop".to_string()), vec![]),
    };
    assert!(req.validate().is_ok());
}

// ===== Serialization =====

#[test]
fn test_flattened_project_fields() {
    let json = r#"{"project": "shop", "folders": ["/p"], "file_path": "/p/a.js", "line": 3}"#;
    let req: GotoUsageRequest = serde_json::from_str(json).unwrap();
    assert_eq!(req.project.project.as_deref(), Some("shop"));
    assert_eq!(req.project.folders, vec!["/p"]);
    assert_eq!(req.line, 3);

    let json = r#"{"file_path": "/p/a.js"}"#;
    let req: FileSavedRequest = serde_json::from_str(json).unwrap();
    assert!(req.project.project.is_none());
    assert!(req.project.folders.is_empty());
}

#[test]
fn test_no_symbol_response() {
    let response = UsageResponse::no_symbol(&ProjectId::new("shop"), "/p/a.js", 4);
    assert!(response.symbol.is_none());
    assert!(response.results.is_empty());
    assert_eq!(response.message.as_deref(), Some("No symbol found at /p/a.js:4"));
}

#[test]
fn test_file_saved_response_serialization() {
    let response = FileSavedResponse {
        project: "shop".to_string(),
        file_path: "/p/a.js".to_string(),
        outcome: FileSavedOutcome::Updated {
            dependencies_changed: true,
        },
    };
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["outcome"]["status"], "updated");
    assert_eq!(value["outcome"]["dependencies_changed"], true);
}
