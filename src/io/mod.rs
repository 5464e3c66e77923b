use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use phylotree::tree::Tree as PhyloTree;

use crate::tree::{Confidence, Tree, TreeBundle, TreeFileFormat};

pub fn load_trees(path: &Path) -> Result<TreeBundle> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read tree file: {}", path.display()))?;

    let bundle = parse_trees(&raw)?;
    info!(
        "Loaded {} {:?} tree(s) from {}",
        bundle.trees.len(),
        bundle.format,
        path.display()
    );
    Ok(bundle)
}

pub fn parse_trees(raw: &str) -> Result<TreeBundle> {
    let format = detect_format(raw);
    let trees = match format {
        TreeFileFormat::Newick => parse_newick(raw)?,
        TreeFileFormat::Nexus => parse_nexus(raw)?,
    };

    if trees.is_empty() {
        bail!("tree file did not contain any trees");
    }

    Ok(TreeBundle::new(format, trees))
}

fn detect_format(raw: &str) -> TreeFileFormat {
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            continue;
        }

        let upper = trimmed.to_ascii_uppercase();
        if upper.starts_with("#NEXUS") {
            return TreeFileFormat::Nexus;
        }
        if trimmed.starts_with('(') || trimmed.contains('(') && trimmed.contains(')') {
            return TreeFileFormat::Newick;
        }
        if upper.starts_with("BEGIN ") || upper.starts_with("TREE ") {
            return TreeFileFormat::Nexus;
        }
    }

    TreeFileFormat::Newick
}

fn parse_newick(raw: &str) -> Result<Vec<Tree>> {
    let cleaned = strip_comments(raw);
    let mut trees = Vec::new();

    for chunk in cleaned.split_inclusive(';') {
        let candidate = chunk.trim();
        if candidate.is_empty() || !candidate.ends_with(';') {
            continue;
        }
        let index = trees.len();
        trees.push(build_tree(index, None, candidate)?);
    }

    Ok(trees)
}

/// One `TREE`/`UTREE` statement from a TREES block.
#[derive(Debug, PartialEq)]
struct NexusTree {
    label: Option<String>,
    rooted: bool,
    newick: String,
}

fn parse_nexus(raw: &str) -> Result<Vec<Tree>> {
    let mut in_trees_block = false;
    let mut translate: HashMap<String, String> = HashMap::new();
    let mut statements = Vec::new();

    // Statements end at ';', possibly spanning lines. Comments may carry
    // the [&R]/[&U] rooting hint, so they are stripped per statement.
    for statement in split_statements(raw) {
        let statement = statement_head(&statement);
        let upper = statement.to_ascii_uppercase();
        if upper.starts_with("BEGIN TREES") {
            in_trees_block = true;
            continue;
        }
        if upper.starts_with("END") {
            in_trees_block = false;
            continue;
        }
        if !in_trees_block {
            continue;
        }
        if upper.starts_with("TRANSLATE") {
            translate = parse_translate(&statement[9..]);
            debug!("Nexus translate table with {} entries", translate.len());
        } else if upper.starts_with("TREE ") || upper.starts_with("UTREE ") {
            statements.push(parse_nexus_tree_line(statement)?);
        }
    }

    let mut trees = Vec::with_capacity(statements.len());
    for NexusTree {
        label,
        rooted,
        newick,
    } in statements
    {
        let mut tree = build_tree(trees.len(), label, &newick)?;
        tree.rooted = rooted;
        apply_translation(&mut tree, &translate);
        trees.push(tree);
    }
    Ok(trees)
}

/// Splits on ';' outside quotes and comments, keeping comments in the text.
fn split_statements(raw: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth == 0 => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                let statement = current.split_whitespace().collect::<Vec<_>>().join(" ");
                if !statement.is_empty() {
                    statements.push(statement);
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    let rest = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !rest.is_empty() {
        statements.push(rest);
    }
    statements
}

/// Drops leading comments and the `#NEXUS` marker so the command keyword comes first.
fn statement_head(statement: &str) -> &str {
    let mut rest = statement.trim();
    loop {
        if rest.starts_with('[') {
            match rest.find(']') {
                Some(end) => rest = rest[end + 1..].trim_start(),
                None => return "",
            }
        } else if rest.get(..6).is_some_and(|h| h.eq_ignore_ascii_case("#NEXUS")) {
            rest = rest[6..].trim_start();
        } else {
            return rest;
        }
    }
}

/// Removes blanks outside quoted labels.
fn compact_newick(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut quote: Option<char> = None;
    for ch in raw.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch.is_whitespace() => continue,
            None => {}
        }
        out.push(ch);
    }
    out
}

/// Removes `[...]` comments outside quoted labels.
fn strip_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in raw.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth == 0 => quote = Some(ch),
            (None, '[') => {
                depth += 1;
                continue;
            }
            (None, ']') if depth > 0 => {
                depth -= 1;
                continue;
            }
            _ => {}
        }
        if depth == 0 {
            out.push(ch);
        }
    }
    out
}

fn parse_translate(body: &str) -> HashMap<String, String> {
    strip_comments(body)
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let key = parts.next()?;
            let value = parts.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(&value)))
        })
        .collect()
}

fn apply_translation(tree: &mut Tree, translate: &HashMap<String, String>) {
    if translate.is_empty() {
        return;
    }
    for id in tree.external_nodes() {
        let node = &mut tree.nodes[id];
        if let Some(name) = node.name.as_ref().and_then(|n| translate.get(n)) {
            node.name = Some(name.clone());
        }
    }
}

fn unquote(text: &str) -> String {
    text.trim().trim_matches('"').trim_matches('\'').to_owned()
}

fn parse_nexus_tree_line(line: &str) -> Result<NexusTree> {
    let lower = line.to_ascii_lowercase();
    let (tree_start, mut rooted) = if lower.starts_with("tree ") {
        (5, true)
    } else if lower.starts_with("utree ") {
        (6, false)
    } else {
        return Err(anyhow!("Invalid tree line: {line}"));
    };

    let tree_def = line[tree_start..].trim();
    let (label_part, tree_part) = tree_def
        .split_once('=')
        .ok_or_else(|| anyhow!("missing tree definition in nexus line: {line}"))?;

    let label = {
        let cleaned = label_part.trim().trim_start_matches('*');
        let cleaned = unquote(cleaned);
        (!cleaned.is_empty()).then_some(cleaned)
    };

    let mut payload = tree_part.trim();
    while payload.starts_with('[') {
        let Some(end) = payload.find(']') else {
            break;
        };
        match payload[..end].to_ascii_uppercase().as_str() {
            "[&U" => rooted = false,
            "[&R" => rooted = true,
            _ => {}
        }
        payload = payload[end + 1..].trim();
    }

    Ok(NexusTree {
        label,
        rooted,
        newick: normalise_newick(&strip_comments(payload)),
    })
}

fn normalise_newick(raw: &str) -> String {
    let mut cleaned = raw.trim().trim_end_matches(';').trim().to_owned();
    cleaned.push(';');
    cleaned
}

fn build_tree(index: usize, label: Option<String>, newick: &str) -> Result<Tree> {
    let phylo = PhyloTree::from_newick(&compact_newick(newick))
        .map_err(|err| anyhow!("failed to parse newick tree: {err}"))?;
    let mut tree = Tree::from_phylo(index, label, &phylo);
    internal_names_to_confidences(&mut tree);
    Ok(tree)
}

/// Support values written as internal node names become confidences.
fn internal_names_to_confidences(tree: &mut Tree) {
    for id in tree.preorder() {
        let node = &mut tree.nodes[id];
        if node.is_leaf() {
            continue;
        }
        let Some(value) = node.name.as_deref().and_then(|n| n.trim().parse::<f64>().ok()) else {
            continue;
        };
        if value.is_finite() {
            node.data.confidences.push(Confidence::new(value));
            node.name = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_correctly() {
        assert_eq!(detect_format("#NEXUS\nBEGIN TREES;"), TreeFileFormat::Nexus);
        assert_eq!(detect_format("(A:0.1,B:0.2);"), TreeFileFormat::Newick);
        assert_eq!(detect_format("   #nexus   \n"), TreeFileFormat::Nexus);
        assert_eq!(detect_format("[comment]\n(A,B);"), TreeFileFormat::Newick);
    }

    #[test]
    fn parses_simple_newick() {
        let trees = parse_newick("(A:0.1,B:0.2);").unwrap();
        assert_eq!(trees.len(), 1);
        let tree = &trees[0];
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.leaf_names(), vec!["A", "B"]);
        assert!(tree.root.is_some());
        assert!(tree.rooted);
    }

    #[test]
    fn parses_multiple_newick() {
        let trees = parse_newick("(A:0.1,B:0.2);\n(C:0.3,D:0.4);\n").unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[1].id, 1);
    }

    #[test]
    fn numeric_internal_names_become_confidences() {
        let trees = parse_newick("((A:1,B:1)95:1,(C:1,D:1)clade:1);").unwrap();
        let tree = &trees[0];
        let supported: Vec<f64> = tree
            .nodes
            .iter()
            .filter_map(|n| n.confidence())
            .collect();
        assert_eq!(supported, vec![95.0]);
        assert!(tree.find_by_name("95").is_none());
        assert!(tree.find_by_name("clade").is_some(), "Text names stay names");
    }

    #[test]
    fn parses_simple_nexus() {
        let input = "#NEXUS\nBEGIN TREES;\nTREE tree1 = [&R] (A:0.1,B:0.2);\nEND;";
        let trees = parse_nexus(input).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].label.as_deref(), Some("tree1"));
        assert_eq!(trees[0].leaf_count(), 2);
        assert!(trees[0].rooted);
    }

    #[test]
    fn parses_nexus_with_annotations() {
        let input = "#NEXUS
BEGIN TREES;
    TREE tree1 = [&R] ((A[&rate=0.5]:0.1,B:0.2)[&posterior=0.99]:0.3,C:0.4);
END;";
        let trees = parse_nexus(input).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].leaf_names(), vec!["A", "B", "C"]);
    }

    #[test]
    fn parses_nexus_with_hpd_annotations() {
        let input = "#NEXUS
BEGIN TREES;
    UTREE 1 = (((Sly: 1.108043, (Mtr: 1.025109, (Ppr: 0.931515, Ath: 0.931515) [&95%HPD={0.884857, 0.976439}]: 0.093594) [&95%HPD={1.00855, 1.04577}]: 0.082934) [&95%HPD={1.08281, 1.1334}]: 0.084596, Osa: 1.535707) [&95%HPD={1.42368, 1.64135}];
END;";
        let trees = parse_nexus(input).unwrap();
        assert_eq!(trees.len(), 1);
        let tree = &trees[0];
        assert!(!tree.rooted, "UTREE marks the tree unrooted");
        assert_eq!(tree.leaf_count(), 5);
        assert!(tree.has_branch_lengths());
    }

    #[test]
    fn parses_nexus_multiline_tree() {
        let input = "#NEXUS
BEGIN TREES;
    TREE tree1 =
        (A:0.1,
         B:0.2);
END;";
        let trees = parse_nexus(input).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].label.as_deref(), Some("tree1"));
    }

    #[test]
    fn parses_nexus_with_comments() {
        let input = "#NEXUS
[This is a comment]
BEGIN TREES;
    TREE tree1 = (A:0.1,B:0.2); [inline comment]
    [Another comment]
    TREE tree2 = (C:0.3,D:0.4);
END;";
        let trees = parse_nexus(input).unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].label.as_deref(), Some("tree1"));
        assert_eq!(trees[1].label.as_deref(), Some("tree2"));
    }

    #[test]
    fn parses_nexus_unrooted_hint() {
        let input = "#NEXUS
BEGIN TREES;
    TREE tree1 = [&U] (A:0.1,B:0.2,C:0.3);
END;";
        let trees = parse_nexus(input).unwrap();
        assert!(!trees[0].rooted);
    }

    #[test]
    fn applies_translate_table() {
        let input = "#NEXUS
BEGIN TREES;
    TRANSLATE
        1 Homo_sapiens,
        2 'Pan troglodytes',
        3 Gorilla;
    TREE t = ((1:0.1,2:0.1):0.2,3:0.3);
END;";
        let trees = parse_nexus(input).unwrap();
        assert_eq!(
            trees[0].leaf_names(),
            vec!["Gorilla", "Homo_sapiens", "Pan troglodytes"]
        );
    }

    #[test]
    fn handles_quoted_labels() {
        let input = "#NEXUS
BEGIN TREES;
    TREE 'my tree' = (A:0.1,B:0.2);
    TREE \"another tree\" = (C:0.3,D:0.4);
END;";
        let trees = parse_nexus(input).unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].label.as_deref(), Some("my tree"));
        assert_eq!(trees[1].label.as_deref(), Some("another tree"));
    }

    #[test]
    fn rejects_input_without_trees() {
        assert!(parse_trees("#NEXUS\nBEGIN TAXA;\nEND;").is_err());
    }

    #[test]
    fn strips_nested_comments_but_not_quoted_brackets() {
        assert_eq!(strip_comments("(A[x[y]],B);"), "(A,B);");
        assert_eq!(strip_comments("('a[1]',B);"), "('a[1]',B);");
    }

    #[test]
    fn statement_head_skips_marker_and_comments() {
        assert_eq!(statement_head("#NEXUS [c] BEGIN TREES"), "BEGIN TREES");
        assert_eq!(statement_head("[a] [b] TREE t = (A,B)"), "TREE t = (A,B)");
        assert_eq!(compact_newick("(A : 1, 'b c':2);"), "(A:1,'b c':2);");
    }
}
