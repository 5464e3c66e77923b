use std::path::Path;

use anyhow::Result;
use log::info;

use crate::app::AppConfig;
use crate::export::{self, ExportFormat};
use crate::tree::scene_graph::TreeSceneGraph;
use crate::tree::viewer::TreeViewer;
use crate::tree::{Tree, TreeFileFormat};

const PREVIEW_LIMIT: usize = 3;

/// Prints what was loaded and how the shown tree will be drawn.
pub fn render_summary(viewer: &TreeViewer, format: TreeFileFormat, config: &AppConfig) {
    let trees = viewer.trees();
    println!("Loaded {format:?} file with {} tree(s).", trees.len());
    for tree in trees.iter().take(PREVIEW_LIMIT) {
        println!("- {}", describe(tree));
    }
    if trees.len() > PREVIEW_LIMIT {
        println!("... ({} more tree(s) omitted)", trees.len() - PREVIEW_LIMIT);
    }

    if let Some(tree) = viewer.current_tree() {
        println!(
            "Showing tree #{} as {:?} at {}x{} px.",
            viewer.current_tree_index() + 1,
            viewer.options.layout_kind,
            config.width,
            config.height
        );
        println!(
            "  visible tips: {}, depth: {}, height: {:.4}",
            tree.visible_tips().len(),
            tree.max_depth(),
            tree.height()
        );
    }
}

fn describe(tree: &Tree) -> String {
    let name = match &tree.label {
        Some(label) => label.clone(),
        None => format!("tree #{}", tree.id + 1),
    };
    let lengths = if tree.has_branch_lengths() {
        format!("max distance {:.4}", tree.max_distance_to_root())
    } else {
        "no branch lengths".to_string()
    };
    format!(
        "{name}: {} external / {} total nodes, {}, {lengths}",
        tree.leaf_count(),
        tree.node_count(),
        if tree.rooted { "rooted" } else { "unrooted" },
    )
}

pub fn export(scene: &TreeSceneGraph, format: ExportFormat, output: &Path, scale: f32) -> Result<()> {
    info!(
        "Exporting {:.0}x{:.0} scene ({} primitives) as {format:?}",
        scene.size.x,
        scene.size.y,
        scene.primitives.len()
    );
    export::write_scene(scene, format, output, scale)?;
    println!("Wrote {}", output.display());
    Ok(())
}
