//! Built-in filesystem capabilities.
//!
//! Provides `create_folder`, `edit_file`, `read_file` and `search_files`, and
//! [`BuiltinSource`] which offers them to a registry as ordinary plugins.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use omni::tools::{BackendFamily, BuiltinSource, CapabilityContext, ToolRegistry};
//!
//! # async fn demo() -> omni::error::Result<()> {
//! let ctx = CapabilityContext::new(BackendFamily::Structured, "gpt-4o");
//! let mut registry = ToolRegistry::new(ctx, Arc::new(BuiltinSource));
//! registry.load().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::source::{CapabilitySource, Dependency, PluginEntry, PluginInitError};
use super::tool::{Capability, FnCapability};
use super::types::ToolParameters;
use crate::error::OmniError;

const READ_FILE_MAX_BYTES: usize = 65_536;
const SEARCH_OUTPUT_MAX_BYTES: usize = 32_768;
const INVALID_PATH_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }

    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    s[..cutoff].to_string()
}

/// Locate an executable on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Create the `create_folder` capability.
///
/// Creates the directory and any missing parents. An existing directory is
/// success; an existing file at the path is a conflict.
pub fn create_folder_tool() -> Arc<dyn Capability> {
    Arc::new(FnCapability::new(
        "create_folder",
        "Creates a new folder at the specified absolute or relative path. \
         Nested paths such as parent/child are created in one call.",
        ToolParameters::object()
            .string(
                "path",
                "The absolute or relative path where the folder should be created",
                true,
            )
            .build(),
        |args| async move {
            let path = args.get_str("path")?.trim().to_string();
            if path.is_empty() {
                return Err(OmniError::tool("create_folder", "No folder path provided"));
            }
            if path.contains(INVALID_PATH_CHARS) {
                return Err(OmniError::tool("create_folder", "Invalid characters in path"));
            }

            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => {
                    return Ok(serde_json::json!(format!("Folder already exists: {path}")));
                }
                Ok(_) => {
                    return Err(OmniError::tool(
                        "create_folder",
                        format!("Path conflict: {path} already exists and is a file"),
                    ));
                }
                Err(_) => {}
            }

            tokio::fs::create_dir_all(&path).await.map_err(|e| {
                let message = if e.kind() == std::io::ErrorKind::PermissionDenied {
                    "Permission denied: Unable to create folder".to_string()
                } else {
                    format!("Error creating folder: {e}")
                };
                OmniError::tool("create_folder", message)
            })?;

            Ok(serde_json::json!(format!("Successfully created folder: {path}")))
        },
    ))
}

/// Create the `edit_file` capability. Edits existing files only.
pub fn edit_file_tool() -> Arc<dyn Capability> {
    let parameters = ToolParameters::object()
        .string("file_path", "Path to the file to edit (must exist)", true)
        .string_enum(
            "edit_type",
            "Type of edit operation",
            &["full", "partial"],
            true,
        )
        .string("new_content", "New content to write", true)
        .integer("start_line", "Starting line number for partial edits (1-based)", false)
        .integer("end_line", "Ending line number for partial edits (inclusive)", false)
        .string("search_pattern", "Regex to search for in partial edits", false)
        .string("replacement_text", "Text to replace matched patterns", false)
        .build();

    Arc::new(FnCapability::new(
        "edit_file",
        "Edits an EXISTING file. Use edit_type \"full\" to replace the whole \
         file with new_content, or \"partial\" with start_line/end_line to \
         replace a line range, or with search_pattern/replacement_text to \
         find and replace.",
        parameters,
        |args| async move {
            let file_path = args.get_str("file_path")?.to_string();
            let edit_type = args.get_str("edit_type")?;
            let new_content = args.get_str("new_content")?;

            let original = tokio::fs::read_to_string(&file_path)
                .await
                .map_err(|e| OmniError::tool("edit_file", format!("{file_path}: {e}")))?;

            let updated = match edit_type {
                "full" => new_content.to_string(),
                "partial" => {
                    match (
                        args.get_i64_opt("start_line"),
                        args.get_i64_opt("end_line"),
                        args.get_str_opt("search_pattern"),
                        args.get_str_opt("replacement_text"),
                    ) {
                        (Some(start), Some(end), _, _) => {
                            replace_lines(&original, start, end, new_content)?
                        }
                        (_, _, Some(pattern), Some(replacement)) if !pattern.is_empty() => {
                            find_and_replace(&original, pattern, replacement)?
                        }
                        _ => {
                            return Err(OmniError::tool(
                                "edit_file",
                                "Invalid partial edit parameters",
                            ))
                        }
                    }
                }
                other => {
                    return Err(OmniError::tool(
                        "edit_file",
                        format!("Unknown edit_type: {other}"),
                    ))
                }
            };

            tokio::fs::write(&file_path, &updated)
                .await
                .map_err(|e| OmniError::tool("edit_file", format!("{file_path}: {e}")))?;

            Ok(serde_json::json!(format!(
                "File successfully updated: {file_path}\n{updated}"
            )))
        },
    ))
}

fn replace_lines(original: &str, start: i64, end: i64, new_content: &str) -> Result<String, OmniError> {
    let mut lines: Vec<&str> = original.lines().collect();
    if start < 1 || start > end || end as usize > lines.len() {
        return Err(OmniError::tool("edit_file", "Invalid line numbers"));
    }

    lines.splice((start - 1) as usize..end as usize, new_content.lines());
    let mut updated = lines.join("\n");
    if original.ends_with('\n') {
        updated.push('\n');
    }
    Ok(updated)
}

fn find_and_replace(original: &str, pattern: &str, replacement: &str) -> Result<String, OmniError> {
    let re = Regex::new(pattern).map_err(|e| {
        OmniError::tool("edit_file", format!("Invalid regular expression pattern: {e}"))
    })?;
    Ok(re.replace_all(original, replacement).into_owned())
}

/// Create the `read_file` capability. Content is capped at 64 KiB.
pub fn read_file_tool() -> Arc<dyn Capability> {
    Arc::new(FnCapability::new(
        "read_file",
        "Read a file's contents as UTF-8 text",
        ToolParameters::object()
            .string("path", "Path to the file to read", true)
            .build(),
        |args| async move {
            let path = args.get_str("path")?;

            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| OmniError::tool("read_file", format!("{path}: {e}")))?;

            let total_bytes = content.len();
            let truncated = total_bytes > READ_FILE_MAX_BYTES;
            let display = if truncated {
                let mut s = truncate_utf8(&content, READ_FILE_MAX_BYTES);
                s.push_str("\n... (truncated)");
                s
            } else {
                content
            };

            Ok(serde_json::json!({
                "content": display,
                "bytes": total_bytes,
                "truncated": truncated,
            }))
        },
    ))
}

/// Create the `search_files` capability backed by the `rg` executable at `rg_path`.
pub fn search_files_tool(rg_path: PathBuf) -> Arc<dyn Capability> {
    Arc::new(FnCapability::new(
        "search_files",
        "Search file contents for a regex pattern using ripgrep",
        ToolParameters::object()
            .string("pattern", "The regex pattern to search for", true)
            .string(
                "path",
                "Directory or file to search in (defaults to '.')",
                false,
            )
            .build(),
        move |args| {
            let rg_path = rg_path.clone();
            async move {
                let pattern = args.get_str("pattern")?;
                let path = args.get_str_opt("path").unwrap_or(".");

                let output = tokio::process::Command::new(&rg_path)
                    .args(["--line-number", "--no-heading", "--", pattern, path])
                    .output()
                    .await
                    .map_err(|e| OmniError::tool("search_files", e.to_string()))?;

                let mut result = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.is_empty() {
                    result.push_str(&stderr);
                }

                let truncated = result.len() > SEARCH_OUTPUT_MAX_BYTES;
                if truncated {
                    result = truncate_utf8(&result, SEARCH_OUTPUT_MAX_BYTES);
                    result.push_str("\n... (truncated)");
                }

                Ok(serde_json::json!({
                    "exit_code": output.status.code(),
                    "output": result,
                    "truncated": truncated,
                }))
            }
        },
    ))
}

/// Plugin entry for `search_files`; reports a missing `rg` as a dependency.
pub fn search_files_entry() -> PluginEntry {
    PluginEntry::new("search_files", |_ctx| match find_executable("rg") {
        Some(rg) => Ok(search_files_tool(rg)),
        None => Err(PluginInitError::MissingDependency(Dependency::new(
            "rg", "ripgrep",
        ))),
    })
}

/// Return the dependency-free built-in capabilities.
pub fn all_tools() -> Vec<Arc<dyn Capability>> {
    vec![create_folder_tool(), edit_file_tool(), read_file_tool()]
}

/// Source offering every built-in capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinSource;

#[async_trait]
impl CapabilitySource for BuiltinSource {
    async fn discover(&self) -> Result<Vec<PluginEntry>, OmniError> {
        let mut entries: Vec<PluginEntry> =
            all_tools().into_iter().map(PluginEntry::from_capability).collect();
        entries.push(search_files_entry());
        Ok(entries)
    }
}
