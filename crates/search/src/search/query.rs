//! Engine-independent query tree
//!
//! Builders produce a [`QueryNode`] tree that refers to fields by name.
//! The tree is compiled against a concrete index right before execution,
//! which keeps query construction pure and lets tests assert on structure.

use std::ops::Bound;

use anyhow::{Context, Result, bail};
use tantivy::Index;
use tantivy::query::{
    AllQuery, BooleanQuery, EmptyQuery, Occur, Query, RangeQuery, RegexQuery, TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption, Term};
use tantivy::tokenizer::TokenStream;

use super::schema::{FieldKind, IndexKind, field_kind};

/// A node of a boolean query tree
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// Matches every document
    MatchAll,
    /// Exact match of a keyword field value
    Term { field: &'static str, value: String },
    /// Keyword values starting with `value`
    Prefix { field: &'static str, value: String },
    /// Analyzed text match; any token of `text` may match
    Match { field: &'static str, text: String },
    /// Inclusive numeric range; an absent bound is open
    NumericRange {
        field: &'static str,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Every child must match
    Conjunction(Vec<QueryNode>),
    /// At least one child must match
    Disjunction(Vec<QueryNode>),
    /// All `must` clauses match and no `must_not` clause does
    Boolean {
        must: Vec<QueryNode>,
        must_not: Vec<QueryNode>,
    },
}

impl QueryNode {
    pub fn term(field: &'static str, value: impl Into<String>) -> Self {
        QueryNode::Term {
            field,
            value: value.into(),
        }
    }

    pub fn prefix(field: &'static str, value: impl Into<String>) -> Self {
        QueryNode::Prefix {
            field,
            value: value.into(),
        }
    }

    pub fn matching(field: &'static str, text: impl Into<String>) -> Self {
        QueryNode::Match {
            field,
            text: text.into(),
        }
    }

    pub fn range(field: &'static str, min: Option<f64>, max: Option<f64>) -> Self {
        QueryNode::NumericRange { field, min, max }
    }

    /// Disjunction of exact matches, one per value
    pub fn any_term<S: AsRef<str>>(field: &'static str, values: &[S]) -> Self {
        QueryNode::Disjunction(
            values
                .iter()
                .map(|v| QueryNode::term(field, v.as_ref()))
                .collect(),
        )
    }

    /// Compile into a Tantivy query for `index`, checking every field
    /// reference against the declared field table of `kind`
    pub fn compile(&self, index: &Index, kind: IndexKind) -> Result<Box<dyn Query>> {
        let query: Box<dyn Query> = match self {
            QueryNode::MatchAll => Box::new(AllQuery),

            QueryNode::Term { field, value } => {
                let field = resolve(index, kind, field, FieldKind::Keyword)?;
                Box::new(TermQuery::new(
                    Term::from_field_text(field, value),
                    IndexRecordOption::Basic,
                ))
            }

            QueryNode::Prefix { field, value } => {
                let field = resolve(index, kind, field, FieldKind::Keyword)?;
                let pattern = format!("{}.*", regex::escape(value));
                Box::new(
                    RegexQuery::from_pattern(&pattern, field)
                        .with_context(|| format!("Invalid prefix {:?}", value))?,
                )
            }

            QueryNode::Match { field, text } => {
                let field = resolve(index, kind, field, FieldKind::Text)?;
                compile_match(index, field, text)?
            }

            QueryNode::NumericRange { field, min, max } => {
                if min.is_none() && max.is_none() {
                    bail!("Range on {} has no bounds", field);
                }
                let field = resolve(index, kind, field, FieldKind::Numeric)?;
                let bound = |v: &Option<f64>| match v {
                    Some(v) => Bound::Included(Term::from_field_f64(field, *v)),
                    None => Bound::Unbounded,
                };
                Box::new(RangeQuery::new(bound(min), bound(max)))
            }

            QueryNode::Conjunction(children) => {
                if children.is_empty() {
                    Box::new(AllQuery)
                } else {
                    Box::new(BooleanQuery::new(compile_all(children, Occur::Must, index, kind)?))
                }
            }

            QueryNode::Disjunction(children) => {
                if children.is_empty() {
                    Box::new(EmptyQuery)
                } else {
                    Box::new(BooleanQuery::new(compile_all(children, Occur::Should, index, kind)?))
                }
            }

            QueryNode::Boolean { must, must_not } => {
                let mut clauses = compile_all(must, Occur::Must, index, kind)?;
                // A Tantivy boolean query with only exclusions matches nothing
                if clauses.is_empty() {
                    clauses.push((Occur::Must, Box::new(AllQuery)));
                }
                clauses.extend(compile_all(must_not, Occur::MustNot, index, kind)?);
                Box::new(BooleanQuery::new(clauses))
            }
        };
        Ok(query)
    }
}

fn compile_all(
    nodes: &[QueryNode],
    occur: Occur,
    index: &Index,
    kind: IndexKind,
) -> Result<Vec<(Occur, Box<dyn Query>)>> {
    nodes
        .iter()
        .map(|node| Ok((occur, node.compile(index, kind)?)))
        .collect()
}

/// Tokenize with the field's own analyzer and OR the resulting terms
fn compile_match(index: &Index, field: Field, text: &str) -> Result<Box<dyn Query>> {
    let mut analyzer = index
        .tokenizer_for_field(field)
        .context("No tokenizer registered for field")?;

    let mut terms: Vec<Term> = Vec::new();
    let mut stream = analyzer.token_stream(text);
    stream.process(&mut |token| {
        let term = Term::from_field_text(field, &token.text);
        if !terms.contains(&term) {
            terms.push(term);
        }
    });

    let query: Box<dyn Query> = match terms.len() {
        0 => Box::new(AllQuery),
        1 => Box::new(TermQuery::new(
            terms.remove(0),
            IndexRecordOption::WithFreqs,
        )),
        _ => Box::new(BooleanQuery::new(
            terms
                .into_iter()
                .map(|term| {
                    let q: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                    (Occur::Should, q)
                })
                .collect(),
        )),
    };
    Ok(query)
}

fn resolve(index: &Index, kind: IndexKind, name: &str, expected: FieldKind) -> Result<Field> {
    match field_kind(kind, name) {
        Some(actual) if actual == expected => {}
        Some(actual) => bail!(
            "Field {} of the {} index is {:?}, expected {:?}",
            name,
            kind,
            actual,
            expected
        ),
        None => bail!("The {} index has no field named {}", kind, name),
    }
    index
        .schema()
        .get_field(name)
        .with_context(|| format!("Field {} missing from {} index schema", name, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::schema::{build_schema, channel, post};

    fn posts_index() -> Index {
        Index::create_in_ram(build_schema(IndexKind::Posts))
    }

    #[test]
    fn test_any_term_builds_disjunction() {
        let node = QueryNode::any_term(post::CHANNEL_ID, &["c1", "c2"]);
        assert_eq!(
            node,
            QueryNode::Disjunction(vec![
                QueryNode::term(post::CHANNEL_ID, "c1"),
                QueryNode::term(post::CHANNEL_ID, "c2"),
            ])
        );
    }

    #[test]
    fn test_compile_full_tree() {
        let node = QueryNode::Boolean {
            must: vec![
                QueryNode::any_term(post::CHANNEL_ID, &["c1"]),
                QueryNode::Conjunction(vec![QueryNode::matching(post::MESSAGE, "deploy prod")]),
                QueryNode::range(post::CREATE_AT, Some(1.0), None),
            ],
            must_not: vec![QueryNode::term(post::USER_ID, "u9")],
        };
        assert!(node.compile(&posts_index(), IndexKind::Posts).is_ok());
    }

    #[test]
    fn test_compile_rejects_wrong_field_kind() {
        let index = posts_index();
        let range_on_keyword = QueryNode::range(post::CHANNEL_ID, Some(1.0), Some(2.0));
        assert!(range_on_keyword.compile(&index, IndexKind::Posts).is_err());

        let match_on_keyword = QueryNode::matching(post::USER_ID, "alice");
        assert!(match_on_keyword.compile(&index, IndexKind::Posts).is_err());
    }

    #[test]
    fn test_compile_rejects_field_of_other_index() {
        let node = QueryNode::prefix(channel::NAME_SUGGEST, "eng");
        assert!(node.compile(&posts_index(), IndexKind::Posts).is_err());
    }

    #[test]
    fn test_compile_rejects_unbounded_range() {
        let node = QueryNode::range(post::CREATE_AT, None, None);
        assert!(node.compile(&posts_index(), IndexKind::Posts).is_err());
    }

    #[test]
    fn test_prefix_with_regex_metacharacters_compiles() {
        let index = Index::create_in_ram(build_schema(IndexKind::Channels));
        let node = QueryNode::prefix(channel::NAME_SUGGEST, "c++ (dev).*");
        assert!(node.compile(&index, IndexKind::Channels).is_ok());
    }
}
