//! Text rendering of terms, literals and queries.
//!
//! Three styles are available:
//!
//! - [`RenderStyle::Plain`]: ASCII, parseable back with [`Query::parse`].
//! - [`RenderStyle::Math`]: Unicode connectives `∧ ∨ ¬ ∈ ∉ ≤`, also parseable.
//! - [`RenderStyle::Tex`]: LaTeX math, for display only.
//!
//! Columns are written `v3` unless a name table is supplied, in which case the
//! parseable styles quote the name: `"age" <= 30`.

use std::fmt;

use crate::literal::Literal;
use crate::query::{Node, Query};
use crate::term::{Shape, Term};
use crate::types::Op;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum RenderStyle {
    #[default]
    Plain,
    Math,
    Tex,
}

struct Tokens {
    and: &'static str,
    or: &'static str,
    neg: &'static str,
    cat_in: &'static str,
    cat_out: &'static str,
    leq: &'static str,
    set_open: &'static str,
    set_close: &'static str,
}

impl RenderStyle {
    fn tokens(self) -> Tokens {
        match self {
            RenderStyle::Plain => Tokens {
                and: "&",
                or: "|",
                neg: "! ",
                cat_in: "=",
                cat_out: "~",
                leq: "<=",
                set_open: "{",
                set_close: "}",
            },
            RenderStyle::Math => Tokens {
                and: "∧",
                or: "∨",
                neg: "¬ ",
                cat_in: "∈",
                cat_out: "∉",
                leq: "≤",
                set_open: "{",
                set_close: "}",
            },
            RenderStyle::Tex => Tokens {
                and: "\\land",
                or: "\\lor",
                neg: "\\neg ",
                cat_in: "\\in",
                cat_out: "\\notin",
                leq: "\\leq",
                set_open: "\\{",
                set_close: "\\}",
            },
        }
    }
}

/// Renders query parts in one style, with optional column names.
#[derive(Debug, Copy, Clone, Default)]
pub struct Renderer<'a> {
    style: RenderStyle,
    names: Option<&'a [String]>,
}

impl<'a> Renderer<'a> {
    pub fn new(style: RenderStyle) -> Self {
        Renderer { style, names: None }
    }

    pub fn with_names(mut self, names: &'a [String]) -> Self {
        self.names = Some(names);
        self
    }

    pub fn style(&self) -> RenderStyle {
        self.style
    }

    pub fn variable(&self, col: usize) -> String {
        let name = self.names.and_then(|names| names.get(col));
        match (self.style, name) {
            (RenderStyle::Tex, Some(name)) => format!("\\text{{{}}}", tex_escape(name)),
            (RenderStyle::Tex, None) => format!("v_{{{}}}", col),
            (_, Some(name)) => quote(name),
            (_, None) => format!("v{}", col),
        }
    }

    fn category(&self, cat: &str) -> String {
        match self.style {
            RenderStyle::Tex => format!("\\text{{{}}}", tex_escape(cat)),
            _ if is_bare(cat) => cat.to_string(),
            _ => quote(cat),
        }
    }

    /// Renders the positive literal of `term`.
    pub fn term(&self, term: &Term) -> String {
        self.literal(&Literal::positive(term.clone()))
    }

    pub fn literal(&self, literal: &Literal) -> String {
        let t = self.style.tokens();
        let var = self.variable(literal.col());
        let neg = if literal.is_negated() { t.neg } else { "" };
        match literal.term().shape() {
            Shape::Boolean => format!("{}{}", neg, var),
            Shape::Categorical(cats) => {
                let op = if literal.is_negated() { t.cat_out } else { t.cat_in };
                let cats: Vec<String> = cats.iter().map(|c| self.category(c)).collect();
                format!("{} {} {}{}{}", var, op, t.set_open, cats.join(", "), t.set_close)
            }
            Shape::Numerical { lo, hi } => {
                let body = if lo.is_infinite() {
                    format!("{} {} {}", var, t.leq, hi)
                } else if hi.is_infinite() {
                    format!("{} {} {}", lo, t.leq, var)
                } else {
                    format!("{} {} {} {} {}", lo, t.leq, var, t.leq, hi)
                };
                format!("{}{}", neg, body)
            }
            Shape::Anonymous { .. } => format!("{}?{}", neg, var),
        }
    }

    pub fn query(&self, query: &Query) -> String {
        if query.is_empty() {
            return "[]".to_string();
        }
        self.bucket(query.nodes(), query.op(), false)
    }

    fn bucket(&self, nodes: &[Node], op: Op, nested: bool) -> String {
        let t = self.style.tokens();
        let markers = nodes.iter().filter(|n| matches!(n, Node::Neg)).count();
        let items: Vec<String> = nodes
            .iter()
            .filter_map(|n| match n {
                Node::Leaf(l) => Some(self.literal(l)),
                Node::Group(children) => Some(self.bucket(children, op.dual(), true)),
                Node::Neg => None,
            })
            .collect();
        let sep = match op {
            Op::And => format!(" {} ", t.and),
            Op::Or => format!(" {} ", t.or),
        };
        let joined = items.join(&sep);
        if markers % 2 == 1 {
            format!("{}({})", t.neg, joined)
        } else if nested && items.len() > 1 {
            format!("({})", joined)
        } else {
            joined
        }
    }
}

fn is_bare(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn tex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '&' | '%' | '$' | '#' | '{' | '}') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl Query {
    /// Renders the query in `style`, naming columns from `names` when given.
    pub fn render(&self, style: RenderStyle, names: Option<&[String]>) -> String {
        let renderer = Renderer::new(style);
        match names {
            Some(names) => renderer.with_names(names).query(self),
            None => renderer.query(self),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Renderer::default().term(self))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Renderer::default().literal(self))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Renderer::default().query(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn b(col: usize) -> Literal {
        Literal::positive(Term::boolean(col))
    }

    #[test]
    fn test_literals_plain() {
        assert_eq!(b(3).to_string(), "v3");
        assert_eq!((-b(3)).to_string(), "! v3");
        let cat = Literal::positive(Term::categorical(1, ["b", "a"]).unwrap());
        assert_eq!(cat.to_string(), "v1 = {a, b}");
        assert_eq!(cat.flip().to_string(), "v1 ~ {a, b}");
        let num = Term::numerical(2, 1.5, 4.0).unwrap();
        assert_eq!(num.to_string(), "1.5 <= v2 <= 4");
        let le = Term::numerical(2, f64::NEG_INFINITY, 4.0).unwrap();
        assert_eq!(le.to_string(), "v2 <= 4");
        assert_eq!(le.complement().unwrap().to_string(), "4 <= v2");
        assert_eq!(Literal::negative(le).to_string(), "! v2 <= 4");
        assert_eq!(Term::anonymous(7).to_string(), "?v7");
    }

    #[test]
    fn test_query_nesting() {
        let q = Query::new(
            Op::And,
            vec![
                Node::Leaf(b(0)),
                Node::Group(vec![Node::Leaf(b(1)), Node::Leaf(-b(2))]),
            ],
        );
        assert_eq!(q.to_string(), "v0 & (v1 | ! v2)");
        assert_eq!(q.render(RenderStyle::Math, None), "v0 ∧ (v1 ∨ ¬ v2)");
        assert_eq!(q.render(RenderStyle::Tex, None), "v_{0} \\land (v_{1} \\lor \\neg v_{2})");
    }

    #[test]
    fn test_marker_rendering() {
        let q = Query::new(Op::Or, vec![Node::Neg, Node::Leaf(b(0)), Node::Leaf(b(1))]);
        assert_eq!(q.to_string(), "! (v0 | v1)");
    }

    #[test]
    fn test_empty() {
        assert_eq!(Query::empty().to_string(), "[]");
    }

    #[test]
    fn test_names() {
        let names = vec!["age".to_string(), "blood type".to_string()];
        let q = Query::conjunction([
            Literal::positive(Term::numerical(0, f64::NEG_INFINITY, 30.0).unwrap()),
            Literal::positive(Term::categorical(1, ["A+", "O x"]).unwrap()),
        ]);
        assert_eq!(
            q.render(RenderStyle::Plain, Some(&names)),
            "\"age\" <= 30 & \"blood type\" = {A+, \"O x\"}"
        );
        assert_eq!(
            q.render(RenderStyle::Tex, Some(&names)),
            "\\text{age} \\leq 30 \\land \\text{blood type} \\in \\{\\text{A+}, \\text{O x}\\}"
        );
    }
}
