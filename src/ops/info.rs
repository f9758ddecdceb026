//! Implementation of `dockhand info`.
//!
//! Shows what a build would use: the project's revision, each builder's
//! dev settings and relayed variables, and the images it produces.

use anyhow::{Context, Result};

use crate::core::manifest::Manifest;
use crate::core::revision::RevisionId;
use crate::util::GlobalContext;
use crate::vcs;

/// Everything `info` prints.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub project_name: String,
    pub revision: RevisionId,
    pub builders: Vec<BuilderInfo>,
    pub images: Vec<ImageInfo>,
}

#[derive(Debug, Clone)]
pub struct BuilderInfo {
    pub name: String,
    pub mount_destination: String,
    pub dev_command: String,
    /// Relayed variable names and whether each is set on this host
    pub pass_envs: Vec<(String, bool)>,
}

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub image: String,
    pub dockerfile_path: String,
}

/// Collect project info for the project enclosing the current directory.
pub fn info(gctx: &GlobalContext) -> Result<ProjectInfo> {
    let root = gctx.find_project_root()?;
    let manifest = Manifest::find_and_load(&root)?;

    let vcs = vcs::detect_for_directory(&root)?;
    let revision = vcs::current_revision_id(vcs.as_ref(), true)
        .context("failed to resolve current revision")?;

    let builders = manifest
        .builders
        .iter()
        .map(|b| BuilderInfo {
            name: b.name.clone(),
            mount_destination: b.mount_destination.clone(),
            dev_command: b.dev_command_or_default().join(" "),
            pass_envs: b
                .pass_envs
                .iter()
                .map(|name| (name.clone(), gctx.host_env().is_set(name)))
                .collect(),
        })
        .collect();

    let images = manifest
        .images
        .iter()
        .map(|i| ImageInfo {
            image: i.image.clone(),
            dockerfile_path: i.dockerfile_path.display().to_string(),
        })
        .collect();

    Ok(ProjectInfo {
        project_name: manifest.project_name,
        revision,
        builders,
        images,
    })
}

/// Render project info as plain-text tables.
pub fn format_info(info: &ProjectInfo) -> String {
    let mut tables = vec![table(
        "BASIC DETAILS",
        vec![
            ("Project name".to_string(), info.project_name.clone()),
            ("VcKind".to_string(), info.revision.source.to_string()),
            (
                "Revision ID (full)".to_string(),
                format!(
                    "{} ({})",
                    info.revision.revision_id_short, info.revision.revision_id
                ),
            ),
            (
                "Friendly revision".to_string(),
                info.revision.friendly_revision_id.clone(),
            ),
        ],
    )];

    for builder in &info.builders {
        let mut rows = vec![
            ("Name".to_string(), builder.name.clone()),
            (
                "Mount destination".to_string(),
                builder.mount_destination.clone(),
            ),
            ("Dev command".to_string(), builder.dev_command.clone()),
        ];
        for (name, set) in &builder.pass_envs {
            let status = if *set { "✓ (set)" } else { "✗ (not set)" };
            rows.push((format!("ENV({name})"), status.to_string()));
        }
        tables.push(table("BUILDER", rows));
    }

    for image in &info.images {
        tables.push(table(
            "DOCKER IMAGE",
            vec![
                ("Image".to_string(), image.image.clone()),
                (
                    "Dockerfile path".to_string(),
                    image.dockerfile_path.clone(),
                ),
            ],
        ));
    }

    tables.join("\n")
}

fn table(title: &str, rows: Vec<(String, String)>) -> String {
    let width = rows.iter().map(|(key, _)| key.chars().count()).max().unwrap_or(0);

    let mut lines = vec![title.to_string(), "=".repeat(title.len())];
    for (key, value) in rows {
        lines.push(format!("{key:<width$}  {value}"));
    }
    lines.push(String::new());
    lines.join("\n")
}
