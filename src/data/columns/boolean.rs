// Boolean views: conditions and masks
// Author: Gabriel Demetrios Lafis

use std::ops::{BitAnd, BitOr, BitXor, Not};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{Column, ColumnExpr, ColumnType, FloatColumnView, Node, Operand, StringColumnView};

/// Lazily evaluated boolean column, used for conditions and row masks
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanColumnView {
    node: Arc<Node>,
}

impl BooleanColumnView {
    pub(crate) fn from_node(node: Node) -> Self {
        BooleanColumnView {
            node: Arc::new(node),
        }
    }

    pub(crate) fn node(&self) -> &Node {
        &self.node
    }

    pub fn operator(&self) -> &str {
        &self.node.operator
    }

    fn combine(&self, operator: &str, other: Option<&BooleanColumnView>) -> BooleanColumnView {
        BooleanColumnView::from_node(Node::new(
            ColumnType::BooleanColumnView,
            operator,
            Some(self.operand()),
            other.map(|o| o.operand()),
        ))
    }

    pub fn and(&self, other: &BooleanColumnView) -> BooleanColumnView {
        self.combine("and", Some(other))
    }

    pub fn or(&self, other: &BooleanColumnView) -> BooleanColumnView {
        self.combine("or", Some(other))
    }

    pub fn xor(&self, other: &BooleanColumnView) -> BooleanColumnView {
        self.combine("xor", Some(other))
    }

    /// Whether an entry is false; inverts the column
    pub fn is_false(&self) -> BooleanColumnView {
        self.combine("not", None)
    }

    pub fn equal_to(&self, other: impl Into<BooleanOperand>) -> BooleanColumnView {
        self.compare("bool_equal_to", other.into())
    }

    pub fn not_equal_to(&self, other: impl Into<BooleanOperand>) -> BooleanColumnView {
        self.compare("bool_not_equal_to", other.into())
    }

    fn compare(&self, operator: &str, other: BooleanOperand) -> BooleanColumnView {
        BooleanColumnView::from_node(Node::new(
            ColumnType::BooleanColumnView,
            operator,
            Some(self.operand()),
            Some(other.0),
        ))
    }

    /// True becomes 1.0, false becomes 0.0
    pub fn as_num(&self) -> FloatColumnView {
        FloatColumnView::from_node(Node::new(
            ColumnType::FloatColumnView,
            "boolean_as_num",
            Some(self.operand()),
            None,
        ))
    }

    pub fn as_str(&self) -> StringColumnView {
        StringColumnView::from_node(Node::new(
            ColumnType::StringColumnView,
            "as_str",
            Some(self.operand()),
            None,
        ))
    }

    pub fn subselect_operand(&self, indices: Operand) -> BooleanColumnView {
        BooleanColumnView::from_node(Node::new(
            ColumnType::BooleanColumnView,
            "bool_subselection",
            Some(self.operand()),
            Some(indices),
        ))
    }
}

impl ColumnExpr for BooleanColumnView {
    fn to_column(&self) -> Column {
        Column::Boolean(self.clone())
    }

    fn column_type(&self) -> ColumnType {
        ColumnType::BooleanColumnView
    }

    fn to_cmd(&self) -> JsonValue {
        self.node.to_cmd()
    }
}

/// A boolean literal or view
pub struct BooleanOperand(Operand);

impl From<bool> for BooleanOperand {
    fn from(v: bool) -> Self {
        BooleanOperand(Operand::from(v))
    }
}

impl From<BooleanColumnView> for BooleanOperand {
    fn from(col: BooleanColumnView) -> Self {
        BooleanOperand(Operand::from(col))
    }
}

impl From<&BooleanColumnView> for BooleanOperand {
    fn from(col: &BooleanColumnView) -> Self {
        BooleanOperand(col.operand())
    }
}

macro_rules! boolean_ops {
    ($($lhs:ty, $rhs:ty);*) => {
        $(
            impl BitAnd<$rhs> for $lhs {
                type Output = BooleanColumnView;

                fn bitand(self, rhs: $rhs) -> BooleanColumnView {
                    self.and(&rhs)
                }
            }

            impl BitOr<$rhs> for $lhs {
                type Output = BooleanColumnView;

                fn bitor(self, rhs: $rhs) -> BooleanColumnView {
                    self.or(&rhs)
                }
            }

            impl BitXor<$rhs> for $lhs {
                type Output = BooleanColumnView;

                fn bitxor(self, rhs: $rhs) -> BooleanColumnView {
                    self.xor(&rhs)
                }
            }
        )*
    };
}

boolean_ops!(
    BooleanColumnView, BooleanColumnView;
    BooleanColumnView, &BooleanColumnView;
    &BooleanColumnView, BooleanColumnView;
    &BooleanColumnView, &BooleanColumnView
);

impl Not for BooleanColumnView {
    type Output = BooleanColumnView;

    fn not(self) -> BooleanColumnView {
        self.is_false()
    }
}

impl Not for &BooleanColumnView {
    type Output = BooleanColumnView;

    fn not(self) -> BooleanColumnView {
        self.is_false()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{rowid, FloatOps};

    #[test]
    fn test_combinators() {
        let a = rowid().greater(1.0);
        let b = rowid().less(5.0);

        assert_eq!((&a & &b).operator(), "and");
        assert_eq!((&a | &b).operator(), "or");
        assert_eq!((a.clone() ^ b).operator(), "xor");
        assert_eq!((!a).operator(), "not");
    }

    #[test]
    fn test_casts() {
        let mask = rowid().greater(1.0);

        assert_eq!(mask.as_num().operator(), "boolean_as_num");
        assert_eq!(mask.as_str().operator(), "as_str");
        assert_eq!(mask.equal_to(true).to_cmd()["operand2_"]["value_"], true);
    }
}
