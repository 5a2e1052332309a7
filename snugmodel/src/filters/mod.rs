//! Filter nodes produced by fields.
//!
//! Fields only build filters; executing them belongs to the storage backend. Leaf
//! conditions always carry base-typed values.

mod predicate;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

pub use predicate::RepeatedStructuredPredicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl FilterOp {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }
}

/// A composable filter condition.
///
/// # Examples
///
/// ```
/// use snugmodel::filters::{FilterNode, FilterOp};
///
/// let city = FilterNode::compare("address.city", FilterOp::Eq, "MPLS");
/// let active = FilterNode::compare("address.is_active", FilterOp::Eq, true);
/// let both = FilterNode::and([city, active]);
/// assert_eq!(both.to_string(), r#"(address.city = "MPLS" AND address.is_active = true)"#);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Compare { field: String, op: FilterOp, value: Value },
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    /// Predicate evaluated on candidate entities after the index lookup.
    PostFilter(RepeatedStructuredPredicate),
    /// Matches nothing.
    False,
}

impl FilterNode {
    #[inline]
    pub fn compare(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[inline]
    pub fn and(conditions: impl IntoIterator<Item = FilterNode>) -> Self {
        Self::And(conditions.into_iter().collect())
    }

    #[inline]
    pub fn or(conditions: impl IntoIterator<Item = FilterNode>) -> Self {
        Self::Or(conditions.into_iter().collect())
    }

    /// Leaf comparisons in this node, depth first.
    pub fn comparisons(&self) -> Vec<(&str, FilterOp, &Value)> {
        let mut leaves = Vec::new();
        self.collect_comparisons(&mut leaves);
        leaves
    }

    fn collect_comparisons<'a>(&'a self, leaves: &mut Vec<(&'a str, FilterOp, &'a Value)>) {
        match self {
            Self::Compare { field, op, value } => leaves.push((field, *op, value)),
            Self::And(nodes) | Self::Or(nodes) => nodes.iter().for_each(|node| node.collect_comparisons(leaves)),
            Self::PostFilter(_) | Self::False => {}
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { field, op, value } => {
                let rendered = serde_json::to_string(value).map_err(|_| fmt::Error)?;
                write!(f, "{field} {} {rendered}", op.as_str())
            }
            Self::And(nodes) => write_joined(f, nodes, " AND "),
            Self::Or(nodes) => write_joined(f, nodes, " OR "),
            Self::PostFilter(predicate) => write!(f, "{predicate}"),
            Self::False => f.write_str("FALSE"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[FilterNode], separator: &str) -> fmt::Result {
    f.write_str("(")?;
    for (index, node) in nodes.iter().enumerate() {
        if index > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{node}")?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_clauses() {
        let node = FilterNode::or([
            FilterNode::compare("a", FilterOp::Ge, 3),
            FilterNode::and([
                FilterNode::compare("b", FilterOp::Ne, "x"),
                FilterNode::compare("c", FilterOp::Eq, Value::Null),
            ]),
        ]);
        assert_eq!(node.to_string(), r#"(a >= 3 OR (b != "x" AND c = null))"#);
        assert_eq!(FilterNode::False.to_string(), "FALSE");
    }

    #[test]
    fn collects_leaf_comparisons() {
        let node = FilterNode::and([
            FilterNode::compare("a", FilterOp::Eq, 1),
            FilterNode::or([FilterNode::compare("b", FilterOp::Lt, 2)]),
        ]);
        let fields: Vec<_> = node.comparisons().into_iter().map(|(field, _, _)| field).collect();
        assert_eq!(fields, ["a", "b"]);
    }
}
