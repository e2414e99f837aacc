//! # CLI Commands Implementation
//!
//! Each command loads what it needs, drives the kernel and prints either
//! a human-readable report or JSON.

use super::OutputFormat;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::script::{ModelScript, ScriptReport};
use schemata_core::formats::MAX_PERSISTENCE_PAYLOAD_SIZE;
use schemata_core::snapshot::SNAPSHOT_MAGIC;
use schemata_core::{
    Model, ModelSnapshot, export_snapshot, import_snapshot, model_from_bytes, model_to_bytes,
};
use std::path::{Path, PathBuf};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum model script size (4 MB).
pub const MAX_SCRIPT_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Maximum size of a file handed to `inspect`.
pub const MAX_INSPECT_FILE_SIZE: u64 = MAX_PERSISTENCE_PAYLOAD_SIZE as u64 + 1024;

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json_mode: bool,
    pub quiet: bool,
    pub verbose: bool,
}

// =============================================================================
// HELPERS
// =============================================================================

/// Validate that an input path names an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, AppError> {
    let canonical = path.canonicalize().map_err(|e| AppError::io(path, e))?;

    if !canonical.is_file() {
        return Err(AppError::Io {
            path: path.to_path_buf(),
            message: "not a regular file".to_string(),
        });
    }

    Ok(canonical)
}

/// Validate that an output path lives in an existing directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, AppError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| AppError::io(parent, e))?;
    if !canonical_parent.is_dir() {
        return Err(AppError::Io {
            path: parent.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let filename = path.file_name().ok_or_else(|| AppError::Io {
        path: path.to_path_buf(),
        message: "output path has no filename".to_string(),
    })?;

    Ok(canonical_parent.join(filename))
}

/// Read a file after checking its size against `max_size`.
fn read_limited(path: &Path, max_size: u64) -> Result<Vec<u8>, AppError> {
    let path = validate_file_path(path)?;
    let size = std::fs::metadata(&path)
        .map_err(|e| AppError::io(&path, e))?
        .len();
    if size > max_size {
        return Err(AppError::Io {
            path,
            message: format!("file is {} bytes, maximum is {}", size, max_size),
        });
    }
    std::fs::read(&path).map_err(|e| AppError::io(&path, e))
}

fn print_json(value: &serde_json::Value) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| AppError::Output(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn snapshot_json(snapshot: &ModelSnapshot) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(snapshot).map_err(|e| AppError::Output(e.to_string()))
}

/// Print one line per entity type.
fn print_entity_table(snapshot: &ModelSnapshot) {
    let name_of = |id: u64| {
        snapshot
            .entity_types
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.name.as_str())
            .unwrap_or("?")
    };

    for entity in &snapshot.entity_types {
        let properties: Vec<&str> = snapshot
            .properties
            .iter()
            .filter(|p| p.entity == entity.id)
            .map(|p| p.name.as_str())
            .collect();
        let mut line = format!("  {}", entity.name);
        if let Some(base) = entity.base_type {
            line.push_str(&format!(" : {}", name_of(base)));
        }
        if entity.is_keyless {
            line.push_str(" [keyless]");
        }
        if entity.is_synthesized {
            line.push_str(" [join]");
        }
        println!("{}", line);
        if !properties.is_empty() {
            println!("      properties: {}", properties.join(", "));
        }
    }

    for fk in &snapshot.foreign_keys {
        println!(
            "  {} -> {}{}{}",
            name_of(fk.dependent),
            name_of(fk.principal),
            if fk.is_required { " (required)" } else { "" },
            if fk.is_ownership { " (owned)" } else { "" }
        );
    }
}

// =============================================================================
// MODEL PIPELINE
// =============================================================================

/// Parse the model script at `path`.
pub fn load_script(path: &Path) -> Result<ModelScript, AppError> {
    let bytes = read_limited(path, MAX_SCRIPT_FILE_SIZE)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| AppError::Script(format!("'{}' is not valid UTF-8", path.display())))?;
    ModelScript::from_toml(&text)
}

/// Replay a script, run the cleanup checkpoint when configured, finalize.
pub fn build_model(config: &AppConfig, script: &Path) -> Result<(Model, ScriptReport), AppError> {
    let script = load_script(script)?;
    tracing::info!("Replaying {} directives", script.directives.len());

    let mut model = Model::new();
    let mut report = script.apply(&mut model, config)?;

    if config.remove_unreachable {
        report.removed = model.remove_unreachable()?;
        if !report.removed.is_empty() {
            tracing::info!("Removed unreachable entity types: {:?}", report.removed);
        }
    }

    model.finalize()?;
    tracing::info!(
        entity_types = model.entity_type_count(),
        applied = report.applied,
        outranked = report.outranked.len(),
        "model finalized"
    );
    Ok((model, report))
}

// =============================================================================
// BUILD COMMAND
// =============================================================================

/// Build a finalized model and optionally write it out.
pub fn cmd_build(
    config: &AppConfig,
    output: Output,
    script: &Path,
    target: Option<&Path>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let (model, report) = build_model(config, script)?;
    let snapshot = ModelSnapshot::from(&model);

    let written = match target {
        Some(target) => {
            let path = validate_output_path(target)?;
            let bytes = match format {
                OutputFormat::Snapshot => export_snapshot(&model)?,
                OutputFormat::Model => model_to_bytes(&model)?,
            };
            std::fs::write(&path, &bytes).map_err(|e| AppError::io(&path, e))?;
            tracing::info!("Wrote {} bytes to {:?}", bytes.len(), path);
            Some((path, bytes.len()))
        }
        None => None,
    };

    if output.json_mode {
        let value = serde_json::json!({
            "checksum": snapshot.checksum(),
            "applied": report.applied,
            "outranked": report.outranked,
            "removed": report.removed,
            "output": written.as_ref().map(|(path, _)| path.to_string_lossy().to_string()),
            "snapshot": snapshot_json(&snapshot)?,
        });
        return print_json(&value);
    }

    if output.quiet {
        return Ok(());
    }

    println!("Schemata Build");
    println!("==============");
    println!("Script:       {:?}", script);
    println!("Applied:      {}", report.applied);
    println!("Outranked:    {}", report.outranked.len());
    println!("Removed:      {}", report.removed.len());
    println!("Entity types: {}", snapshot.entity_types.len());
    println!("Elements:     {}", snapshot.element_count());
    println!("Checksum:     {:016x}", snapshot.checksum());
    if let Some((path, size)) = &written {
        println!("Output:       {:?} ({} bytes)", path, size);
    }

    if output.verbose {
        println!();
        print_entity_table(&snapshot);
    }

    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Replay a script and report whether it finalizes.
pub fn cmd_check(config: &AppConfig, output: Output, script: &Path) -> Result<(), AppError> {
    let result = build_model(config, script);

    if output.json_mode {
        let value = match &result {
            Ok((model, report)) => serde_json::json!({
                "ok": true,
                "applied": report.applied,
                "outranked": report.outranked,
                "removed": report.removed,
                "checksum": ModelSnapshot::from(model).checksum(),
            }),
            Err(err) => serde_json::json!({
                "ok": false,
                "kind": err.kind(),
                "error": err.to_string(),
            }),
        };
        print_json(&value)?;
    } else if !output.quiet {
        if let Ok((_, report)) = &result {
            println!(
                "OK: {} applied, {} outranked, {} removed",
                report.applied,
                report.outranked.len(),
                report.removed.len()
            );
        }
    }

    result.map(|_| ())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Describe a snapshot or persisted model file.
pub fn cmd_inspect(output: Output, input: &Path) -> Result<(), AppError> {
    let bytes = read_limited(input, MAX_INSPECT_FILE_SIZE)?;

    let (kind, snapshot) = if bytes.starts_with(&SNAPSHOT_MAGIC) {
        ("snapshot", import_snapshot(&bytes)?)
    } else {
        let model = model_from_bytes(&bytes)?;
        ("model", ModelSnapshot::from(&model))
    };

    if output.json_mode {
        let value = serde_json::json!({
            "file_kind": kind,
            "checksum": snapshot.checksum(),
            "snapshot": snapshot_json(&snapshot)?,
        });
        return print_json(&value);
    }

    if output.quiet {
        return Ok(());
    }

    println!("Schemata Inspect");
    println!("================");
    println!("File:         {:?}", input);
    println!("Kind:         {}", kind);
    println!("Read-only:    {}", snapshot.read_only);
    println!("Entity types: {}", snapshot.entity_types.len());
    println!("Elements:     {}", snapshot.element_count());
    println!("Checksum:     {:016x}", snapshot.checksum());
    println!();
    print_entity_table(&snapshot);

    Ok(())
}
