use actionloop_core::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::metadata::{ParamDecl, ToolDescriptor};
use crate::{Tool, ToolContext};

pub(crate) fn expand_path(path: &str, workspace: &Path) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|h| h.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else if path.starts_with('/') {
        PathBuf::from(path)
    } else {
        workspace.join(path)
    }
}

// ============ list_files ============

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("list_files")
            .description("List the files in the workspace directory.")
            .param(ParamDecl::untyped("action_context"))
            .tags(&["file_operations"])
    }

    async fn execute(&self, ctx: ToolContext, _params: Value) -> Result<Value> {
        let mut entries = tokio::fs::read_dir(&ctx.workspace).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        files.sort();
        Ok(json!(files))
    }
}

// ============ read_file ============

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("read_file")
            .description("Read the content of a file in the workspace.")
            .param(
                ParamDecl::required("file_name", "str")
                    .describe("Path of the file, relative to the workspace"),
            )
            .tags(&["file_operations"])
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let file_name = params
            .get("file_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("Missing required parameter: file_name".to_string()))?;
        let path = expand_path(file_name, &ctx.workspace);

        if !path.is_file() {
            return Err(Error::NotFound(format!("File not found: {}", path.display())));
        }

        let content = tokio::fs::read_to_string(&path).await?;
        Ok(Value::String(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{derive_metadata, MetadataOverrides};

    fn ctx(dir: &Path) -> ToolContext {
        ToolContext::new(dir.to_path_buf())
    }

    #[test]
    fn test_list_files_schema_hides_context() {
        let meta = derive_metadata(&ListFilesTool.descriptor(), &MetadataOverrides::default());
        assert_eq!(meta.name, "list_files");
        assert!(meta.parameters["properties"].as_object().unwrap().is_empty());
        assert_eq!(meta.parameters["required"], json!([]));
    }

    #[test]
    fn test_read_file_schema() {
        let meta = derive_metadata(&ReadFileTool.descriptor(), &MetadataOverrides::default());
        assert_eq!(meta.parameters["properties"]["file_name"]["type"], "string");
        assert_eq!(meta.parameters["required"], json!(["file_name"]));
    }

    #[tokio::test]
    async fn test_list_files_sorted_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let out = ListFilesTool.execute(ctx(dir.path()), json!({})).await.unwrap();
        assert_eq!(out, json!(["a.txt", "b.txt"]));
    }

    #[tokio::test]
    async fn test_read_file_relative_to_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# hello").unwrap();

        let out = ReadFileTool
            .execute(ctx(dir.path()), json!({"file_name": "README.md"}))
            .await
            .unwrap();
        assert_eq!(out, json!("# hello"));
    }

    #[tokio::test]
    async fn test_read_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadFileTool
            .execute(ctx(dir.path()), json!({"file_name": "nope.md"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = ReadFileTool.execute(ctx(dir.path()), json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
