use std::collections::HashSet;

use egui::Color32;

use super::layout::{CladogramType, LayoutKind, OverviewPlacement};
use super::simplify::HidingConfig;
use super::{Confidence, NodeId, Taxonomy, Tree, TreeNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchStyle {
    Rectangular,
    Euro,
    Rounded,
    Curved,
    Convex,
    Triangular,
}

impl BranchStyle {
    pub fn label(self) -> &'static str {
        match self {
            Self::Rectangular => "Rectangular",
            Self::Euro => "Euro",
            Self::Rounded => "Rounded",
            Self::Curved => "Curved",
            Self::Convex => "Convex",
            Self::Triangular => "Triangular",
        }
    }

    /// Styles that keep an explicit horizontal segment on every branch.
    pub fn has_horizontal_segment(self) -> bool {
        matches!(self, Self::Rectangular | Self::Euro | Self::Rounded)
    }

    /// Horizontal offset at which annotations along a branch start.
    pub fn annotation_offset(self) -> f32 {
        match self {
            Self::Euro => EURO_D,
            Self::Rounded => ROUNDED_D,
            _ => 3.0,
        }
    }
}

pub const EURO_D: f32 = 10.0;
pub const ROUNDED_D: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabelDirection {
    Horizontal,
    Radial,
}

impl NodeLabelDirection {
    pub fn label(self) -> &'static str {
        match self {
            Self::Horizontal => "Horizontal",
            Self::Radial => "Radial",
        }
    }
}

/// Where a paint pass ends up. Only `Screen` culls, shortcuts and highlights
/// copied nodes; the others honour the black-and-white override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Screen,
    Print,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeShape {
    Circle,
    Rectangle,
}

impl NodeShape {
    pub fn label(self) -> &'static str {
        match self {
            Self::Circle => "Circle",
            Self::Rectangle => "Rectangle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeFill {
    Solid,
    /// Background fill with an outline.
    None,
    Gradient,
}

impl NodeFill {
    pub fn label(self) -> &'static str {
        match self {
            Self::Solid => "Solid",
            Self::None => "None",
            Self::Gradient => "Gradient",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorScheme {
    Default,
    BlackAndWhite,
}

impl ColorScheme {
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::BlackAndWhite => "Black & White",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOptions {
    pub layout_kind: LayoutKind,
    pub branch_style: BranchStyle,
    pub phylogram: bool,
    pub cladogram_type: CladogramType,
    /// Radians.
    pub circular_start_angle: f64,
    /// Radians.
    pub unrooted_start_angle: f64,
    pub node_label_direction: NodeLabelDirection,
    pub show_node_names: bool,
    pub show_taxonomy_code: bool,
    pub show_taxonomy_scientific: bool,
    pub show_taxonomy_common: bool,
    pub show_sequence_symbol: bool,
    pub show_sequence_name: bool,
    pub show_gene_name: bool,
    pub show_sequence_accession: bool,
    pub show_properties: bool,
    pub show_confidences: bool,
    pub show_confidence_std_dev: bool,
    pub show_branch_lengths: bool,
    pub show_scale: bool,
    pub show_events: bool,
    pub color_by_taxonomy: bool,
    pub color_by_sequence: bool,
    pub use_visual_styles: bool,
    pub color_labels_same_as_branch: bool,
    pub node_shape: NodeShape,
    pub node_fill: NodeFill,
    pub node_shape_size: f32,
    pub show_node_shapes_internal: bool,
    pub show_node_shapes_external: bool,
    pub min_confidence: f64,
    pub confidence_digits: usize,
    pub branch_length_digits: usize,
    pub antialias: bool,
    pub print_black_and_white: bool,
    pub print_line_width: f32,
    pub show_overview: bool,
    pub overview_placement: OverviewPlacement,
    pub overview_width: f32,
    pub overview_height: f32,
    pub auto_font_size: bool,
    pub dynamic_hiding: bool,
    pub hiding: HidingConfig,
}

impl DisplayOptions {
    /// Branch lengths place nodes only when the tree carries any; otherwise every
    /// branch falls back to the unit step of a cladogram.
    pub fn phylogram_for(&self, tree: &Tree) -> bool {
        self.phylogram && tree.has_branch_lengths()
    }
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            layout_kind: LayoutKind::Rectangular,
            branch_style: BranchStyle::Rectangular,
            phylogram: true,
            cladogram_type: CladogramType::ExtNodeSum,
            circular_start_angle: 0.0,
            unrooted_start_angle: 0.0,
            node_label_direction: NodeLabelDirection::Horizontal,
            show_node_names: true,
            show_taxonomy_code: true,
            show_taxonomy_scientific: false,
            show_taxonomy_common: false,
            show_sequence_symbol: false,
            show_sequence_name: false,
            show_gene_name: false,
            show_sequence_accession: false,
            show_properties: false,
            show_confidences: false,
            show_confidence_std_dev: false,
            show_branch_lengths: false,
            show_scale: true,
            show_events: false,
            color_by_taxonomy: false,
            color_by_sequence: false,
            use_visual_styles: true,
            color_labels_same_as_branch: false,
            node_shape: NodeShape::Circle,
            node_fill: NodeFill::Gradient,
            node_shape_size: 4.0,
            show_node_shapes_internal: true,
            show_node_shapes_external: false,
            min_confidence: 0.0,
            confidence_digits: 3,
            branch_length_digits: 3,
            antialias: true,
            print_black_and_white: false,
            print_line_width: 1.0,
            show_overview: true,
            overview_placement: OverviewPlacement::UpperLeft,
            overview_width: 80.0,
            overview_height: 80.0,
            auto_font_size: true,
            dynamic_hiding: true,
            hiding: HidingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeColorSet {
    pub background: Color32,
    pub sequence: Color32,
    pub taxonomy: Color32,
    pub confidence: Color32,
    pub branch_length: Color32,
    pub branch: Color32,
    pub node_box: Color32,
    pub collapse_fill: Color32,
    pub found: Color32,
    pub duplication: Color32,
    pub speciation: Color32,
    pub duplication_or_speciation: Color32,
    pub overview: Color32,
}

impl TreeColorSet {
    pub fn from_scheme(scheme: ColorScheme) -> Self {
        match scheme {
            ColorScheme::Default => Self {
                background: Color32::BLACK,
                sequence: Color32::from_gray(230),
                taxonomy: Color32::from_gray(180),
                confidence: Color32::from_gray(180),
                branch_length: Color32::from_gray(140),
                branch: Color32::WHITE,
                node_box: Color32::WHITE,
                collapse_fill: Color32::WHITE,
                found: Color32::GREEN,
                duplication: Color32::RED,
                speciation: Color32::GREEN,
                duplication_or_speciation: Color32::YELLOW,
                overview: Color32::from_gray(130),
            },
            ColorScheme::BlackAndWhite => Self {
                background: Color32::WHITE,
                sequence: Color32::BLACK,
                taxonomy: Color32::BLACK,
                confidence: Color32::BLACK,
                branch_length: Color32::BLACK,
                branch: Color32::BLACK,
                node_box: Color32::BLACK,
                collapse_fill: Color32::BLACK,
                found: Color32::RED,
                duplication: Color32::BLACK,
                speciation: Color32::BLACK,
                duplication_or_speciation: Color32::BLACK,
                overview: Color32::BLACK,
            },
        }
    }
}

impl Default for TreeColorSet {
    fn default() -> Self {
        Self::from_scheme(ColorScheme::Default)
    }
}

/// Formats with at most `digits` fraction digits and no trailing zeros.
pub fn format_decimal(value: f64, digits: usize) -> String {
    let text = format!("{value:.digits$}");
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    };
    if text == "-0" {
        "0".to_string()
    } else {
        text
    }
}

pub fn taxonomy_text(taxonomy: &Taxonomy, options: &DisplayOptions) -> String {
    let mut parts: Vec<String> = Vec::new();
    let non_empty = |s: &Option<String>| s.as_deref().filter(|v| !v.is_empty()).map(str::to_string);
    if options.show_taxonomy_code {
        if let Some(code) = non_empty(&taxonomy.code) {
            parts.push(code);
        }
    }
    let scientific = non_empty(&taxonomy.scientific_name);
    let common = non_empty(&taxonomy.common_name);
    match (
        options.show_taxonomy_scientific,
        options.show_taxonomy_common,
        scientific,
        common,
    ) {
        (true, true, Some(s), Some(c)) => parts.push(format!("{s} ({c})")),
        (true, _, Some(s), _) => parts.push(s),
        (_, true, _, Some(c)) => parts.push(c),
        _ => {}
    }
    parts.join(" ")
}

/// Name, sequence fields and properties, in that order, per the visibility toggles.
pub fn node_data_text(node: &TreeNode, options: &DisplayOptions) -> String {
    let mut parts: Vec<String> = Vec::new();
    if options.show_node_names {
        if let Some(name) = node.name.as_deref().filter(|n| !n.is_empty()) {
            parts.push(name.to_string());
        }
    }
    if let Some(seq) = &node.data.sequence {
        let fields = [
            (options.show_sequence_symbol, &seq.symbol),
            (options.show_gene_name, &seq.gene_name),
            (options.show_sequence_name, &seq.name),
        ];
        for (shown, value) in fields {
            if let Some(v) = value.as_deref().filter(|v| shown && !v.is_empty()) {
                parts.push(v.to_string());
            }
        }
        if options.show_sequence_accession {
            if let Some(acc) = &seq.accession {
                match acc.source.as_deref().filter(|s| !s.is_empty()) {
                    Some(source) => parts.push(format!("{source}:{}", acc.value)),
                    None => parts.push(acc.value.clone()),
                }
            }
        }
    }
    if options.show_properties && !node.data.properties.is_empty() {
        let props: Vec<String> = node
            .data
            .properties
            .iter()
            .map(|(key, value)| {
                let key = key.rsplit(':').next().unwrap_or(key);
                format!("{key}={value}")
            })
            .collect();
        parts.push(props.join(" "));
    }
    parts.join(" ")
}

/// Full text drawn next to a node: taxonomy first, then the node data.
pub fn node_label_text(node: &TreeNode, options: &DisplayOptions) -> String {
    let taxonomy = node
        .data
        .taxonomy
        .as_ref()
        .map(|t| taxonomy_text(t, options))
        .unwrap_or_default();
    let data = node_data_text(node, options);
    match (taxonomy.is_empty(), data.is_empty()) {
        (true, _) => data,
        (false, true) => taxonomy,
        (false, false) => format!("{taxonomy} {data}"),
    }
}

/// Confidence values joined with "/". Nothing is shown when any value falls
/// below the minimum.
pub fn confidence_text(confidences: &[Confidence], options: &DisplayOptions) -> Option<String> {
    if confidences.is_empty() {
        return None;
    }
    let mut sorted: Vec<&Confidence> = confidences.iter().collect();
    sorted.sort_by(|a, b| a.kind.cmp(&b.kind));
    if sorted.iter().any(|c| c.value < options.min_confidence) {
        return None;
    }
    let parts: Vec<String> = sorted
        .iter()
        .map(|c| {
            let mut text = format_decimal(c.value, options.confidence_digits);
            if options.show_confidence_std_dev {
                if let Some(sd) = c.std_dev {
                    text.push_str(&format!("({})", format_decimal(sd, options.confidence_digits)));
                }
            }
            text
        })
        .collect();
    Some(parts.join("/"))
}

pub fn branch_length_text(node: &TreeNode, options: &DisplayOptions) -> Option<String> {
    node.length
        .filter(|l| *l >= 0.0)
        .map(|l| format_decimal(l, options.branch_length_digits))
}

/// Deterministic colour derived from up to three characters of a label.
pub fn color_from_string(text: &str, is_taxonomy: bool) -> Color32 {
    let chars: Vec<char> = text.to_uppercase().chars().collect();
    let Some(&first) = chars.first() else {
        return Color32::GRAY;
    };
    let len = chars.len();
    let mut second = ' ';
    let mut third = ' ';
    if len > 1 {
        second = if is_taxonomy { chars[1] } else { chars[len - 1] };
        if len > 2 {
            third = if is_taxonomy {
                match chars.iter().position(|&c| c == ' ') {
                    Some(space) if space > 0 && space + 1 < len => chars[space + 1],
                    _ => chars[2],
                }
            } else {
                chars[(len - 1) / 2]
            };
        }
    }
    let normalize = |c: char| ((c as i64 - 65) as f64 * 10.2).clamp(0.0, 255.0) as u8;
    let (mut r, mut g, b) = (normalize(first), normalize(second), normalize(third));
    if r > 235 && g > 235 && b > 235 {
        r = 0;
    } else if r < 60 && g < 60 && b < 60 {
        g = 255;
    }
    Color32::from_rgb(r, g, b)
}

/// Stroke width for branches on screen, thinner as tips get denser.
pub fn branch_stroke_width(y_distance: f32) -> f32 {
    match y_distance {
        d if d < 0.001 => 0.05,
        d if d < 0.01 => 0.1,
        d if d < 0.5 => 0.25,
        d if d < 1.0 => 0.5,
        d if d < 2.0 => 0.75,
        d if d < 20.0 => 1.0,
        _ => 2.0,
    }
}

/// Colour and stroke decisions for one paint pass.
#[derive(Debug, Clone, Copy)]
pub struct TreePainter<'a> {
    pub options: &'a DisplayOptions,
    pub colors: &'a TreeColorSet,
    pub target: RenderTarget,
    pub found: &'a HashSet<NodeId>,
    pub selected: Option<&'a HashSet<NodeId>>,
    pub copied: &'a HashSet<NodeId>,
}

impl<'a> TreePainter<'a> {
    pub fn new(
        options: &'a DisplayOptions,
        colors: &'a TreeColorSet,
        target: RenderTarget,
        found: &'a HashSet<NodeId>,
        copied: &'a HashSet<NodeId>,
    ) -> Self {
        Self {
            options,
            colors,
            target,
            found,
            selected: None,
            copied,
        }
    }

    /// Nodes the user currently has selected; painted like found nodes.
    pub fn with_selected(mut self, selected: &'a HashSet<NodeId>) -> Self {
        self.selected = Some(selected);
        self
    }

    pub fn black_and_white(&self) -> bool {
        self.target != RenderTarget::Screen && self.options.print_black_and_white
    }

    /// Found or selected. Highlighted nodes keep their labels and get the found colour.
    pub fn is_highlighted(&self, id: NodeId) -> bool {
        self.found.contains(&id) || self.selected.is_some_and(|s| s.contains(&id))
    }

    pub fn background(&self) -> Color32 {
        if self.black_and_white() {
            Color32::WHITE
        } else {
            self.colors.background
        }
    }

    pub fn stroke_width(&self, y_distance: f32) -> f32 {
        match self.target {
            RenderTarget::Screen => branch_stroke_width(y_distance),
            RenderTarget::Print | RenderTarget::Export => self.options.print_line_width,
        }
    }

    pub fn branch_color(&self, node: &TreeNode) -> Color32 {
        if self.black_and_white() {
            return Color32::BLACK;
        }
        if self.target == RenderTarget::Screen && self.copied.contains(&node.id) {
            return self.colors.found;
        }
        match node.data.branch_color {
            Some(color) if self.options.use_visual_styles => color,
            _ => self.colors.branch,
        }
    }

    pub fn node_box_color(&self, node: &TreeNode) -> Color32 {
        if self.black_and_white() {
            return Color32::BLACK;
        }
        if self.is_highlighted(node.id) {
            return self.colors.found;
        }
        if self.options.show_events {
            if let Some(event) = &node.data.event {
                return match (event.is_duplication(), event.is_speciation()) {
                    (true, false) => self.colors.duplication,
                    (false, true) => self.colors.speciation,
                    (true, true) => self.colors.duplication_or_speciation,
                    (false, false) => self.branch_color(node),
                };
            }
        }
        self.branch_color(node)
    }

    pub fn taxonomy_color(&self, node: &TreeNode) -> Option<Color32> {
        let tax = node.data.taxonomy.as_ref()?;
        let key = tax
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .or_else(|| tax.scientific_name.as_deref().filter(|s| !s.is_empty()))?;
        Some(color_from_string(key, true))
    }

    pub fn sequence_color(&self, node: &TreeNode) -> Option<Color32> {
        let name = node.data.sequence.as_ref()?.name.as_deref()?;
        (!name.is_empty()).then(|| color_from_string(name, false))
    }

    pub fn label_color(&self, node: &TreeNode) -> Color32 {
        if self.black_and_white() {
            return Color32::BLACK;
        }
        if self.is_highlighted(node.id) {
            return self.colors.found;
        }
        if self.options.color_labels_same_as_branch && self.options.use_visual_styles {
            if let Some(color) = node.data.branch_color {
                return color;
            }
        }
        if self.options.color_by_taxonomy {
            if let Some(color) = self.taxonomy_color(node) {
                return color;
            }
        }
        if self.options.color_by_sequence {
            if let Some(color) = self.sequence_color(node) {
                return color;
            }
        }
        self.colors.sequence
    }

    pub fn collapsed_color(&self, tree: &Tree, node: &TreeNode) -> Color32 {
        if self.black_and_white() {
            return Color32::BLACK;
        }
        if self.is_highlighted(node.id) {
            return self.colors.found;
        }
        if self.options.color_by_taxonomy {
            if let Some(color) = self.taxonomy_color(node) {
                return color;
            }
        }
        if self.options.color_labels_same_as_branch && self.options.use_visual_styles {
            let parent_color = node
                .parent
                .and_then(|p| tree.nodes.get(p))
                .and_then(|p| p.data.branch_color);
            if let Some(color) = node.data.branch_color.or(parent_color) {
                return color;
            }
        }
        if self.options.color_by_sequence {
            if let Some(color) = self.sequence_color(node) {
                return color;
            }
        }
        self.colors.collapse_fill
    }

    pub fn confidence_color(&self) -> Color32 {
        if self.black_and_white() {
            Color32::BLACK
        } else {
            self.colors.confidence
        }
    }

    pub fn branch_length_color(&self) -> Color32 {
        if self.black_and_white() {
            Color32::BLACK
        } else {
            self.colors.branch_length
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::test_support::*;
    use crate::tree::{Accession, Event, Sequence};

    fn node_with_data() -> TreeNode {
        let mut node = TreeNode::new(0, Some("n1".into()), Some(0.5));
        node.data.taxonomy = Some(Taxonomy {
            code: Some("HUMAN".into()),
            scientific_name: Some("Homo sapiens".into()),
            common_name: Some("human".into()),
        });
        node.data.sequence = Some(Sequence {
            symbol: Some("BCL2".into()),
            name: Some("Apoptosis regulator".into()),
            gene_name: None,
            accession: Some(Accession {
                source: Some("UniProtKB".into()),
                value: "P10415".into(),
            }),
        });
        node
    }

    #[test]
    fn test_label_text_follows_toggles() {
        let node = node_with_data();
        let options = DisplayOptions::default();
        assert_eq!(node_label_text(&node, &options), "HUMAN n1");

        let options = DisplayOptions {
            show_taxonomy_code: false,
            show_taxonomy_scientific: true,
            show_taxonomy_common: true,
            show_sequence_symbol: true,
            show_sequence_accession: true,
            ..DisplayOptions::default()
        };
        assert_eq!(
            node_label_text(&node, &options),
            "Homo sapiens (human) n1 BCL2 UniProtKB:P10415"
        );
    }

    #[test]
    fn test_properties_drop_namespace() {
        let mut node = TreeNode::new(0, None, None);
        node.data.properties = vec![("ncbi:size".into(), "12".into()), ("host".into(), "pig".into())];
        let options = DisplayOptions {
            show_properties: true,
            ..DisplayOptions::default()
        };
        assert_eq!(node_data_text(&node, &options), "size=12 host=pig");
    }

    #[test]
    fn test_confidence_text_suppressed_below_minimum() {
        let confidences = vec![Confidence::new(95.0), Confidence::new(0.8)];
        let options = DisplayOptions::default();
        assert_eq!(confidence_text(&confidences, &options).as_deref(), Some("95/0.8"));
        let strict = DisplayOptions {
            min_confidence: 50.0,
            ..DisplayOptions::default()
        };
        assert_eq!(confidence_text(&confidences, &strict), None);
    }

    #[test]
    fn test_confidence_std_dev() {
        let mut c = Confidence::new(0.9);
        c.std_dev = Some(0.0512);
        let options = DisplayOptions {
            show_confidence_std_dev: true,
            ..DisplayOptions::default()
        };
        assert_eq!(confidence_text(&[c], &options).as_deref(), Some("0.9(0.051)"));
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(1.0, 3), "1");
        assert_eq!(format_decimal(0.12345, 3), "0.123");
        assert_eq!(format_decimal(-0.0001, 3), "0");
        assert_eq!(format_decimal(12.4, 0), "12");
    }

    #[test]
    fn test_stroke_width_ladder() {
        assert_eq!(branch_stroke_width(0.0005), 0.05);
        assert_eq!(branch_stroke_width(0.7), 0.5);
        assert_eq!(branch_stroke_width(10.0), 1.0);
        assert_eq!(branch_stroke_width(25.0), 2.0);
    }

    #[test]
    fn test_color_from_string_is_stable() {
        let a = color_from_string("HUMAN", true);
        assert_eq!(a, color_from_string("human", true));
        assert_ne!(a, color_from_string("MOUSE", true));
    }

    #[test]
    fn test_branch_color_precedence() {
        let tree = create_test_tree();
        let ab = tree.find_by_name("AB").unwrap();
        let mut node = tree.nodes[ab].clone();
        node.data.branch_color = Some(Color32::BLUE);
        let options = DisplayOptions {
            print_black_and_white: true,
            ..DisplayOptions::default()
        };
        let colors = TreeColorSet::default();
        let found = HashSet::new();
        let copied: HashSet<NodeId> = [ab].into_iter().collect();

        let screen = TreePainter::new(&options, &colors, RenderTarget::Screen, &found, &copied);
        assert_eq!(screen.branch_color(&node), colors.found, "Copied nodes highlight on screen");
        let export = TreePainter::new(&options, &colors, RenderTarget::Export, &found, &copied);
        assert_eq!(export.branch_color(&node), Color32::BLACK);

        let plain = DisplayOptions::default();
        let export = TreePainter::new(&plain, &colors, RenderTarget::Export, &found, &copied);
        assert_eq!(export.branch_color(&node), Color32::BLUE);
        let no_styles = DisplayOptions {
            use_visual_styles: false,
            ..DisplayOptions::default()
        };
        let export = TreePainter::new(&no_styles, &colors, RenderTarget::Export, &found, &copied);
        assert_eq!(export.branch_color(&node), colors.branch);
    }

    #[test]
    fn test_node_box_event_colors() {
        let mut node = TreeNode::new(3, None, None);
        node.data.event = Some(Event {
            duplications: 1,
            speciations: 0,
        });
        let options = DisplayOptions {
            show_events: true,
            ..DisplayOptions::default()
        };
        let colors = TreeColorSet::default();
        let empty = HashSet::new();
        let painter = TreePainter::new(&options, &colors, RenderTarget::Screen, &empty, &empty);
        assert_eq!(painter.node_box_color(&node), colors.duplication);

        let found: HashSet<NodeId> = [3].into_iter().collect();
        let painter = TreePainter::new(&options, &colors, RenderTarget::Screen, &found, &empty);
        assert_eq!(painter.node_box_color(&node), colors.found);
    }

    #[test]
    fn test_collapsed_color_uses_parent_branch_color() {
        let mut tree = create_test_tree();
        let root = tree.root.unwrap();
        let cde = tree.find_by_name("CDE").unwrap();
        tree.nodes[root].data.branch_color = Some(Color32::RED);
        let options = DisplayOptions {
            color_labels_same_as_branch: true,
            ..DisplayOptions::default()
        };
        let colors = TreeColorSet::default();
        let empty = HashSet::new();
        let painter = TreePainter::new(&options, &colors, RenderTarget::Screen, &empty, &empty);
        assert_eq!(painter.collapsed_color(&tree, &tree.nodes[cde]), Color32::RED);

        let plain = DisplayOptions::default();
        let painter = TreePainter::new(&plain, &colors, RenderTarget::Screen, &empty, &empty);
        assert_eq!(painter.collapsed_color(&tree, &tree.nodes[cde]), colors.collapse_fill);
    }

    #[test]
    fn test_selected_nodes_paint_like_found() {
        let node = TreeNode::new(3, Some("X".into()), None);
        let options = DisplayOptions::default();
        let colors = TreeColorSet::default();
        let empty = HashSet::new();
        let selected: HashSet<NodeId> = [3].into_iter().collect();
        let plain = TreePainter::new(&options, &colors, RenderTarget::Screen, &empty, &empty);
        assert!(!plain.is_highlighted(3));
        let painter = plain.with_selected(&selected);
        assert!(painter.is_highlighted(3));
        assert!(!painter.is_highlighted(4));
        assert_eq!(painter.label_color(&node), colors.found);
        assert_eq!(painter.node_box_color(&node), colors.found);
    }

    #[test]
    fn test_collapsed_color_prefers_taxonomy_over_sequence() {
        let mut tree = create_test_tree();
        let cde = tree.find_by_name("CDE").unwrap();
        tree.nodes[cde].data.taxonomy = Some(Taxonomy {
            code: Some("MOUSE".into()),
            ..Taxonomy::default()
        });
        tree.nodes[cde].data.sequence = Some(Sequence {
            name: Some("actin".into()),
            ..Sequence::default()
        });
        let options = DisplayOptions {
            color_by_taxonomy: true,
            color_by_sequence: true,
            ..DisplayOptions::default()
        };
        let colors = TreeColorSet::default();
        let empty = HashSet::new();
        let painter = TreePainter::new(&options, &colors, RenderTarget::Screen, &empty, &empty);
        assert_eq!(
            painter.collapsed_color(&tree, &tree.nodes[cde]),
            color_from_string("MOUSE", true)
        );

        tree.nodes[cde].data.taxonomy = None;
        assert_eq!(
            painter.collapsed_color(&tree, &tree.nodes[cde]),
            color_from_string("actin", false),
            "Sequence colour only when nothing ranked above it applies"
        );
    }
}
