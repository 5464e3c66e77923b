use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, ValueEnum};
use egui::{Pos2, Rect, Vec2};
use log::{info, warn};

use crate::export::ExportFormat;
use crate::tree::fonts::{FontPreset, TreeFontSet};
use crate::tree::layout::{CladogramType, LayoutKind, OverviewPlacement};
use crate::tree::painter::{BranchStyle, DisplayOptions};
use crate::tree::scene_graph::PaintRequest;
use crate::tree::viewer::TreeViewer;
use crate::{io, ui};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "phylo-canvas",
    about = "Lays out, edits and renders phylogenetic trees to PNG or SVG."
)]
pub struct AppConfig {
    /// Tree file to load (Newick or Nexus formats).
    #[arg(value_name = "TREE_FILE")]
    pub tree_path: PathBuf,

    /// Export path for the rendered tree.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Export format; guessed from the output extension when omitted.
    #[arg(long)]
    pub export_format: Option<ExportFormat>,

    /// Canvas width in pixels
    #[arg(long, default_value_t = 1100)]
    pub width: u32,

    /// Canvas height in pixels
    #[arg(long, default_value_t = 760)]
    pub height: u32,

    /// Pixel ratio for PNG output
    #[arg(long, default_value_t = 1.0)]
    pub scale: f32,

    /// Paint only this part of the canvas, as screen output: X,Y,WIDTH,HEIGHT
    #[arg(long, value_parser = parse_viewport)]
    pub viewport: Option<Rect>,

    /// Which tree of a multi-tree file to render (0-based).
    #[arg(long, default_value_t = 0)]
    pub tree_index: usize,

    #[arg(long, value_enum, default_value_t = LayoutChoice::Rectangular)]
    pub layout: LayoutChoice,

    /// Ignore branch lengths.
    #[arg(long)]
    pub cladogram: bool,

    #[arg(long, value_enum, default_value_t = CladogramChoice::ExtNodeSum)]
    pub cladogram_type: CladogramChoice,

    #[arg(long, value_enum)]
    pub font: Option<FontChoice>,

    #[arg(long)]
    pub no_node_names: bool,

    /// Show taxonomy codes and scientific names.
    #[arg(long)]
    pub taxonomy: bool,

    /// Show sequence names and symbols.
    #[arg(long)]
    pub sequence: bool,

    #[arg(long)]
    pub confidences: bool,

    #[arg(long)]
    pub branch_lengths: bool,

    /// Support values below this are not printed.
    #[arg(long, default_value_t = 0.0)]
    pub min_confidence: f64,

    #[arg(long)]
    pub black_and_white: bool,

    /// Draw the overview when only part of the canvas is painted.
    #[arg(long)]
    pub overview: bool,

    #[arg(long, value_enum, default_value_t = CornerChoice::UpperLeft)]
    pub overview_placement: CornerChoice,

    /// Collapse clades whose support is below this value.
    #[arg(long, value_name = "SUPPORT")]
    pub collapse_below: Option<f64>,

    /// Root the tree at the midpoint of its longest path.
    #[arg(long)]
    pub midpoint_root: bool,

    /// Only write the output; skip the printed summary.
    #[arg(long)]
    pub headless: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum LayoutChoice {
    Rectangular,
    Euro,
    Rounded,
    Curved,
    Convex,
    Triangular,
    Circular,
    Unrooted,
}

impl LayoutChoice {
    fn kind_and_style(self) -> (LayoutKind, BranchStyle) {
        match self {
            LayoutChoice::Rectangular => (LayoutKind::Rectangular, BranchStyle::Rectangular),
            LayoutChoice::Euro => (LayoutKind::Rectangular, BranchStyle::Euro),
            LayoutChoice::Rounded => (LayoutKind::Rectangular, BranchStyle::Rounded),
            LayoutChoice::Curved => (LayoutKind::Rectangular, BranchStyle::Curved),
            LayoutChoice::Convex => (LayoutKind::Rectangular, BranchStyle::Convex),
            LayoutChoice::Triangular => (LayoutKind::Rectangular, BranchStyle::Triangular),
            LayoutChoice::Circular => (LayoutKind::Circular, BranchStyle::Rectangular),
            LayoutChoice::Unrooted => (LayoutKind::Unrooted, BranchStyle::Rectangular),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum CladogramChoice {
    ExtNodeSum,
    NonLinedUp,
    Uniform,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum FontChoice {
    Large,
    Medium,
    Small,
    Tiny,
    SuperTiny,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum CornerChoice {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

fn parse_viewport(text: &str) -> Result<Rect, String> {
    let parts: Vec<f32> = text
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|err| format!("invalid viewport '{text}': {err}"))?;
    let [x, y, w, h] = parts[..] else {
        return Err(format!("viewport needs X,Y,WIDTH,HEIGHT, got '{text}'"));
    };
    if w <= 0.0 || h <= 0.0 {
        return Err(format!("viewport size must be positive, got {w}x{h}"));
    }
    Ok(Rect::from_min_size(Pos2::new(x, y), Vec2::new(w, h)))
}

impl AppConfig {
    pub fn display_options(&self) -> DisplayOptions {
        let (layout_kind, branch_style) = self.layout.kind_and_style();
        DisplayOptions {
            layout_kind,
            branch_style,
            phylogram: !self.cladogram,
            cladogram_type: match self.cladogram_type {
                CladogramChoice::ExtNodeSum => CladogramType::ExtNodeSum,
                CladogramChoice::NonLinedUp => CladogramType::NonLinedUp,
                CladogramChoice::Uniform => CladogramType::Uniform,
            },
            show_node_names: !self.no_node_names,
            show_taxonomy_code: self.taxonomy,
            show_taxonomy_scientific: self.taxonomy,
            show_sequence_name: self.sequence,
            show_sequence_symbol: self.sequence,
            show_confidences: self.confidences,
            show_branch_lengths: self.branch_lengths,
            min_confidence: self.min_confidence,
            print_black_and_white: self.black_and_white,
            show_overview: self.overview,
            overview_placement: match self.overview_placement {
                CornerChoice::UpperLeft => OverviewPlacement::UpperLeft,
                CornerChoice::UpperRight => OverviewPlacement::UpperRight,
                CornerChoice::LowerLeft => OverviewPlacement::LowerLeft,
                CornerChoice::LowerRight => OverviewPlacement::LowerRight,
            },
            ..DisplayOptions::default()
        }
    }

    pub fn canvas(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn paint_request(&self) -> PaintRequest {
        match self.viewport {
            Some(visible) => PaintRequest::screen(self.canvas(), visible),
            None => PaintRequest::export(self.canvas()),
        }
    }

    fn font_set(&self) -> TreeFontSet {
        let mut fonts = TreeFontSet::system();
        if let Some(choice) = self.font {
            fonts.apply_preset(match choice {
                FontChoice::Large => FontPreset::Large,
                FontChoice::Medium => FontPreset::Medium,
                FontChoice::Small => FontPreset::Small,
                FontChoice::Tiny => FontPreset::Tiny,
                FontChoice::SuperTiny => FontPreset::SuperTiny,
            });
        }
        fonts
    }

    fn export_format(&self) -> Result<Option<ExportFormat>> {
        let Some(output) = &self.output else {
            return Ok(None);
        };
        match self.export_format.or_else(|| ExportFormat::from_path(output)) {
            Some(format) => Ok(Some(format)),
            None => bail!(
                "cannot tell the export format of {}; pass --export-format",
                output.display()
            ),
        }
    }
}

pub struct PhyloCanvasApp;

impl PhyloCanvasApp {
    pub fn run(config: &AppConfig) -> Result<()> {
        let format = config.export_format()?;
        let bundle = io::load_trees(&config.tree_path)?;
        let tree_count = bundle.trees.len();
        if config.tree_index >= tree_count {
            bail!(
                "tree index {} is out of range; the file holds {tree_count} tree(s)",
                config.tree_index
            );
        }

        let mut viewer = TreeViewer::new(config.display_options(), config.font_set());
        viewer.set_trees(bundle.trees);
        viewer.show_tree(config.tree_index);
        Self::prepare(&mut viewer, config)?;

        if !config.headless || config.output.is_none() {
            ui::render_summary(&viewer, bundle.format, config);
        }

        if let (Some(dest), Some(format)) = (&config.output, format) {
            let scene = viewer
                .paint(&config.paint_request())
                .ok_or_else(|| anyhow!("nothing to paint"))?;
            ui::export(&scene, format, dest, config.scale)?;
        }
        Ok(())
    }

    /// Applies the structural edits requested on the command line.
    fn prepare(viewer: &mut TreeViewer, config: &AppConfig) -> Result<()> {
        if config.midpoint_root {
            match viewer.midpoint_root() {
                Ok(true) => info!("Re-rooted at the midpoint"),
                Ok(false) => info!("Tree is already rooted at its midpoint"),
                Err(err) => warn!("Skipping midpoint rooting: {err}"),
            }
        }
        if let Some(min) = config.collapse_below {
            let collapsed = viewer.collapse_by_confidence(min)?;
            info!("Collapsed {collapsed} clade(s) with support below {min}");
        }
        Ok(())
    }
}
