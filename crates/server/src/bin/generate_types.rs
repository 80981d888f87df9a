use std::{env, fs, path::PathBuf};

use anyhow::Context;
use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        db::models::project::Project::decl(),
        db::models::project::ProjectWithRole::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::user::User::decl(),
        db::models::user::SyncUser::decl(),
        db::models::user_to_project::ProjectRole::decl(),
        db::models::user_to_project::UserToProject::decl(),
        db::models::user_to_project::AssignUser::decl(),
        db::models::task::TaskStatus::decl(),
        db::models::task::TaskPriority::decl(),
        db::models::task::Position::decl(),
        db::models::task::TaskData::decl(),
        db::models::task::FlowNode::decl(),
        db::models::task::CreateTask::decl(),
        db::models::task::UpdateTaskPosition::decl(),
        db::models::edge::EdgeStyle::decl(),
        db::models::edge::FlowEdge::decl(),
        db::models::edge::CreateEdge::decl(),
        db::models::edge::UpdateEdgeLabel::decl(),
        db::models::edge::UpdateEdgeAnimation::decl(),
        db::models::graph::ProjectGraph::decl(),
        db::models::graph::GraphSnapshot::decl(),
        server::identity::DirectoryUser::decl(),
        server::routes::projects::ProjectAccessInfo::decl(),
        server::routes::members::UpdateMemberRole::decl(),
        server::routes::edges::RemovedEdges::decl(),
        server::error::ApiError::decl(),
        utils::response::ApiResponse::<()>::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| format!("export {}", decl.trim_start_matches("export ")))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `generate_types`. Do not edit it by hand.\n\n{body}\n"
    )
}

fn main() -> anyhow::Result<()> {
    let output = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("shared/types.ts"));

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&output, generate_types_content())
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("wrote TypeScript declarations to {}", output.display());
    Ok(())
}
