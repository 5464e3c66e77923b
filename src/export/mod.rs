use std::path::Path;

use anyhow::{bail, Result};
use clap::ValueEnum;

use crate::tree::scene_graph::TreeSceneGraph;
use crate::tree::skia_renderer::SkiaTreeRenderer;

pub mod svg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Png,
    Svg,
}

impl ExportFormat {
    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ExportFormat::Png),
            "svg" => Some(ExportFormat::Svg),
            _ => None,
        }
    }
}

/// Writes a painted scene to `path`. PNG output is rasterised at `scale`.
pub fn write_scene(scene: &TreeSceneGraph, format: ExportFormat, path: &Path, scale: f32) -> Result<()> {
    if scene.size.x < 1.0 || scene.size.y < 1.0 {
        bail!("Cannot export an empty {}x{} canvas", scene.size.x, scene.size.y);
    }
    match format {
        ExportFormat::Png => SkiaTreeRenderer::new().write_png(scene, scale, path),
        ExportFormat::Svg => svg::write_svg(scene, path),
    }
}
