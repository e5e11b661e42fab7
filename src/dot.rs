//! QTree to DOT (Graphviz) conversion.
//!
//! The generated DOT output follows these conventions:
//! - **Split nodes** are rendered as ellipses labeled with their term
//! - **Leaves** are rendered as boxes at the bottom (sink rank): accepting leaves show
//!   their branch index or `+`, rejecting leaves show `-`
//! - **Edges**:
//!   - Solid lines lead to the "yes" children of a split
//!   - Dashed lines lead to the "no" children
//! - **The root** is rendered as a point at the top (source rank)
//!
//! # Examples
//!
//! ```
//! use redescription_rs::literal::Literal;
//! use redescription_rs::qtree::QTree;
//! use redescription_rs::term::Term;
//!
//! let a = Literal::positive(Term::boolean(0));
//! let b = Literal::positive(Term::boolean(1));
//! let tree = QTree::build(&[vec![a.clone(), b], vec![-a]]);
//!
//! let dot = tree.to_dot().unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::Write as _;

use crate::qtree::{LeafLabel, NodeId, NodeKind, QTree, Slot};

/// Configuration options for DOT output generation.
///
/// Use `DotConfig::default()` for standard settings.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for split nodes (default: "ellipse")
    pub split_shape: &'static str,
    /// Shape for accepting leaves (default: "box")
    pub leaf_shape: &'static str,
    /// Shape for rejecting leaves (default: "plaintext")
    pub reject_shape: &'static str,
    /// Shape for the root (default: "point")
    pub root_shape: &'static str,
    /// Style for "yes" edges (default: "solid")
    pub yes_edge_style: &'static str,
    /// Style for "no" edges (default: "dashed")
    pub no_edge_style: &'static str,
    /// Whether to prefix labels with the arena index (default: false)
    pub show_ids: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            split_shape: "ellipse",
            leaf_shape: "box",
            reject_shape: "plaintext",
            root_shape: "point",
            yes_edge_style: "solid",
            no_edge_style: "dashed",
            show_ids: false,
        }
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl QTree {
    /// Converts the tree to DOT (Graphviz) format with the default configuration.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    /// Converts the tree to DOT format with custom configuration.
    ///
    /// Only nodes reachable from the root are emitted.
    ///
    /// ```
    /// use redescription_rs::dot::DotConfig;
    /// use redescription_rs::literal::Literal;
    /// use redescription_rs::qtree::QTree;
    /// use redescription_rs::term::Term;
    ///
    /// let tree = QTree::build(&[vec![Literal::positive(Term::boolean(0))]]);
    /// let config = DotConfig {
    ///     show_ids: true,
    ///     ..DotConfig::default()
    /// };
    /// let dot = tree.to_dot_with_config(&config).unwrap();
    /// assert!(dot.contains("(1)"));
    /// ```
    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "node [shape={}];", config.split_shape)?;

        let mut reachable = Vec::new();
        let mut stack = vec![QTree::ROOT];
        while let Some(id) = stack.pop() {
            reachable.push(id);
            for slot in Slot::BOTH {
                stack.extend(self.children(id, slot).iter().rev());
            }
        }
        reachable.sort_unstable();

        let label = |id: NodeId, text: String| {
            if config.show_ids {
                escape(&format!("({}) {}", id, text))
            } else {
                escape(&text)
            }
        };

        writeln!(dot, "{{ rank=source")?;
        writeln!(dot, "{} [shape={}, label=\"\"];", QTree::ROOT, config.root_shape)?;
        writeln!(dot, "}}")?;

        for &id in &reachable {
            if let NodeKind::Split { term, .. } = &self.node(id).kind {
                writeln!(dot, "{} [label=\"{}\"];", id, label(id, term.to_string()))?;
            }
        }

        // Leaves
        writeln!(dot, "{{ rank=sink")?;
        for &id in &reachable {
            match self.label(id) {
                Some(LeafLabel::Reject) => {
                    writeln!(
                        dot,
                        "{} [shape={}, label=\"{}\"];",
                        id,
                        config.reject_shape,
                        label(id, LeafLabel::Reject.to_string())
                    )?;
                }
                Some(l) if id != QTree::ROOT => {
                    writeln!(dot, "{} [shape={}, label=\"{}\"];", id, config.leaf_shape, label(id, l.to_string()))?;
                }
                _ => {}
            }
        }
        writeln!(dot, "}}")?;

        for &id in &reachable {
            for slot in Slot::BOTH {
                let style = match slot {
                    Slot::Yes => config.yes_edge_style,
                    Slot::No => config.no_edge_style,
                };
                for &child in self.children(id, slot) {
                    writeln!(dot, "{} -> {} [style={}];", id, child, style)?;
                }
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;
    use crate::term::Term;
    use test_log::test;

    fn b(col: usize) -> Literal {
        Literal::positive(Term::boolean(col))
    }

    #[test]
    fn test_to_dot_basic() {
        let tree = QTree::build(&[vec![b(0), b(1)], vec![-b(0)]]);
        let dot = tree.to_dot().unwrap();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("label=\"v0\""));
        assert!(dot.contains("style=dashed"));
    }

    #[test]
    fn test_to_dot_filled() {
        let mut tree = QTree::build(&[vec![b(0)]]);
        tree.fill();
        let dot = tree.to_dot().unwrap();
        assert!(dot.contains("label=\"-\""));
        assert!(dot.contains("label=\"#0\""));
    }

    #[test]
    fn test_to_dot_empty() {
        let dot = QTree::empty().to_dot().unwrap();
        assert!(dot.starts_with("digraph {"));
        assert!(!dot.contains("->"));
    }

    #[test]
    fn test_to_dot_escapes_names() {
        let cat = Term::categorical(0, ["a\"b"]).unwrap();
        let tree = QTree::build(&[vec![Literal::positive(cat)]]);
        let dot = tree.to_dot().unwrap();
        assert!(dot.contains("\\\""));
    }

    #[test]
    fn test_to_dot_with_config() {
        let tree = QTree::build(&[vec![b(2)]]);
        let config = DotConfig {
            yes_edge_style: "bold",
            ..DotConfig::default()
        };
        let dot = tree.to_dot_with_config(&config).unwrap();
        assert!(dot.contains("style=bold"));
    }
}
