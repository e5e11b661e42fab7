//! Parsing queries from their text form.
//!
//! The grammar lives in `query.pest`. Operators of one level cannot be mixed without
//! parentheses: `a & b | c` is rejected, `(a & b) | c` is accepted. Both the ASCII
//! and the Unicode connectives written by [`RenderStyle::Plain`] and
//! [`RenderStyle::Math`] are understood.
//!
//! [`RenderStyle::Plain`]: crate::display::RenderStyle::Plain
//! [`RenderStyle::Math`]: crate::display::RenderStyle::Math

use std::str::FromStr;

use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::{Error, Result};
use crate::literal::Literal;
use crate::query::{Node, Query};
use crate::term::Term;
use crate::types::Op;

#[derive(Parser)]
#[grammar = "query.pest"]
struct QueryParser;

/// A parsed sub-formula before it is embedded into its parent bucket.
struct Piece {
    op: Op,
    nodes: Vec<Node>,
    negated: bool,
}

impl Piece {
    fn literal(literal: Literal, negated: bool) -> Self {
        Piece {
            op: Op::And,
            nodes: vec![Node::Leaf(literal)],
            negated,
        }
    }

    /// Nodes to append to a bucket whose operator is `op`.
    fn embed(self, op: Op) -> Vec<Node> {
        if let [Node::Leaf(l)] = self.nodes.as_slice() {
            return vec![Node::Leaf(if self.negated { l.flip() } else { l.clone() })];
        }
        if self.nodes.is_empty() {
            return Vec::new();
        }
        match (self.op == op, self.negated) {
            (true, false) => self.nodes,
            (false, negated) => {
                let mut nodes = Vec::with_capacity(self.nodes.len() + 1);
                if negated {
                    nodes.push(Node::Neg);
                }
                nodes.extend(self.nodes);
                vec![Node::Group(nodes)]
            }
            (true, true) => vec![Node::Group(vec![Node::Neg, Node::Group(self.nodes)])],
        }
    }
}

struct Builder<'a> {
    input: &'a str,
    names: &'a [String],
}

impl Builder<'_> {
    fn formula(&self, pair: Pair<Rule>) -> Result<Piece> {
        let op = match pair.as_rule() {
            Rule::formula => {
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| Error::parse(self.input, 0, "empty formula"))?;
                return self.formula(inner);
            }
            Rule::item => return self.item(pair),
            Rule::conjunction => Op::And,
            Rule::disjunction => Op::Or,
            rule => return Err(self.unexpected(&pair, rule)),
        };
        let mut nodes = Vec::new();
        for item in pair.into_inner() {
            nodes.extend(self.item(item)?.embed(op));
        }
        Ok(Piece {
            op,
            nodes,
            negated: false,
        })
    }

    fn item(&self, pair: Pair<Rule>) -> Result<Piece> {
        let mut negated = false;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::neg => negated = true,
                Rule::group => {
                    let formula = inner
                        .into_inner()
                        .next()
                        .ok_or_else(|| Error::parse(self.input, 0, "empty group"))?;
                    let mut piece = self.formula(formula)?;
                    piece.negated ^= negated;
                    return Ok(piece);
                }
                _ => return Ok(Piece::literal(self.literal(inner)?, negated)),
            }
        }
        Err(Error::parse(self.input, 0, "empty item"))
    }

    fn literal(&self, pair: Pair<Rule>) -> Result<Literal> {
        let position = pair.as_span().start();
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();
        match rule {
            Rule::boolean => {
                let col = self.variable(inner.next(), position)?;
                Ok(Literal::positive(Term::boolean(col)))
            }
            Rule::anonymous => {
                let col = self.variable(inner.next(), position)?;
                Ok(Literal::positive(Term::anonymous(col)))
            }
            Rule::categorical => {
                let col = self.variable(inner.next(), position)?;
                let negated = matches!(inner.next().map(|p| p.as_rule()), Some(Rule::cat_out));
                let cats: Vec<String> = inner
                    .map(|p| match p.as_rule() {
                        Rule::quoted => unquote(p.as_str()),
                        _ => p.as_str().to_string(),
                    })
                    .collect();
                Ok(Literal::new(Term::categorical(col, cats)?, negated))
            }
            Rule::realvalued => {
                let mut lo = f64::NEG_INFINITY;
                let mut hi = f64::INFINITY;
                let mut col = None;
                for p in inner {
                    match p.as_rule() {
                        Rule::bound => {
                            let x = parse_bound(p.as_str())
                                .ok_or_else(|| Error::parse(self.input, p.as_span().start(), "invalid bound"))?;
                            if col.is_none() {
                                lo = x;
                            } else {
                                hi = x;
                            }
                        }
                        _ => col = Some(self.variable(Some(p), position)?),
                    }
                }
                let col = col.ok_or_else(|| Error::parse(self.input, position, "missing variable"))?;
                Ok(Literal::positive(Term::numerical(col, lo, hi)?))
            }
            rule => Err(Error::parse(self.input, position, format!("unexpected {:?}", rule))),
        }
    }

    fn variable(&self, pair: Option<Pair<Rule>>, position: usize) -> Result<usize> {
        let pair = pair.ok_or_else(|| Error::parse(self.input, position, "missing variable"))?;
        match pair.as_rule() {
            Rule::index_var => pair.as_str()[1..]
                .parse()
                .map_err(|_| Error::parse(self.input, pair.as_span().start(), "invalid column index")),
            Rule::name_var => {
                let name = unquote(pair.as_str());
                self.names
                    .iter()
                    .position(|n| *n == name)
                    .ok_or(Error::UnknownVariable(name))
            }
            rule => Err(self.unexpected(&pair, rule)),
        }
    }

    fn unexpected(&self, pair: &Pair<Rule>, rule: Rule) -> Error {
        Error::parse(self.input, pair.as_span().start(), format!("unexpected {:?}", rule))
    }
}

fn unquote(quoted: &str) -> String {
    let body = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(quoted);
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_bound(text: &str) -> Option<f64> {
    let (sign, magnitude) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };
    if magnitude.eq_ignore_ascii_case("inf") {
        return Some(sign * f64::INFINITY);
    }
    magnitude.parse::<f64>().ok().map(|x| sign * x)
}

impl Query {
    /// Parses a query whose columns are written `vK`.
    pub fn parse(text: &str) -> Result<Query> {
        Self::parse_with_names(text, &[])
    }

    /// Parses a query, resolving quoted column names against `names`.
    ///
    /// Returns [`Error::Parse`] on a syntax error, [`Error::UnknownVariable`] for a
    /// quoted name missing from `names`, and the construction errors of [`Term`] for
    /// invalid intervals. The result carries no negation marker.
    pub fn parse_with_names(text: &str, names: &[String]) -> Result<Query> {
        let mut pairs = QueryParser::parse(Rule::query, text).map_err(|e| {
            let position = match e.location {
                InputLocation::Pos(p) => p,
                InputLocation::Span((start, _)) => start,
            };
            Error::parse(text, position, e.variant.message())
        })?;
        let builder = Builder { input: text, names };
        let query = pairs
            .next()
            .ok_or_else(|| Error::parse(text, 0, "empty input"))?;
        let Some(body) = query.into_inner().find(|p| matches!(p.as_rule(), Rule::formula | Rule::empty)) else {
            return Ok(Query::empty());
        };
        if body.as_rule() == Rule::empty {
            return Ok(Query::empty());
        }
        let piece = builder.formula(body)?;
        let parsed = match piece.nodes.as_slice() {
            [Node::Leaf(_)] => Query::new(Op::And, piece.embed(Op::And)),
            _ => {
                let mut nodes = Vec::with_capacity(piece.nodes.len() + 1);
                if piece.negated {
                    nodes.push(Node::Neg);
                }
                nodes.extend(piece.nodes);
                Query::new(piece.op, nodes).push_negation()
            }
        };
        log::trace!("Parsed {:?} into {}", text, parsed);
        Ok(parsed)
    }
}

impl FromStr for Query {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Query::parse(s)
    }
}
