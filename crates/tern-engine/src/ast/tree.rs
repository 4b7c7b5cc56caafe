//! Child enumeration, tree rendering and traversal.

use std::fmt;

use super::{Literal, Node, NodeKind};

impl Node {
    /// Returns the node's children in source order.
    ///
    /// Absent optional children are skipped. Declared names are part of the
    /// label rather than children: a declarator exposes only its initializer
    /// and a parameter list has no children at all.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Literal(_) | NodeKind::Ident(_) | NodeKind::Args(_) => Vec::new(),
            NodeKind::BinaryExpr { left, right, .. } => vec![&**left, &**right],
            NodeKind::UnaryExpr { operand, .. } => operand.iter().map(|n| &**n).collect(),
            NodeKind::Declarator { init, .. } => init.iter().map(|n| &**n).collect(),
            NodeKind::VarDeclaration(nodes) | NodeKind::Block(nodes) => nodes.iter().collect(),
            NodeKind::FuncDeclaration { params, block, .. } => {
                let mut children: Vec<&Node> = params.iter().map(|n| &**n).collect();
                children.push(block);
                children
            }
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => {
                let mut children = vec![&**test, &**consequent];
                children.extend(alternate.as_deref());
                children
            }
            NodeKind::While { test, block } => vec![&**test, &**block],
            NodeKind::DoWhile { block, test } => vec![&**block, &**test],
            NodeKind::For {
                init,
                test,
                update,
                block,
            } => [init, test, update]
                .into_iter()
                .filter_map(|n| n.as_deref())
                .chain(std::iter::once(&**block))
                .collect(),
            NodeKind::Call { callee, args } => {
                std::iter::once(&**callee).chain(args.iter()).collect()
            }
            NodeKind::Return(argument) => argument.iter().map(|n| &**n).collect(),
        }
    }

    /// Renders this node and all of its descendants, one line per node.
    ///
    /// ```text
    /// function fibonacci
    /// ├ args: n
    /// └ block
    ///   └ return
    ///     └ n
    /// ```
    pub fn tree(&self) -> Vec<String> {
        let mut lines = vec![self.to_string()];
        let children = self.children();
        let last = children.len().saturating_sub(1);
        for (i, child) in children.into_iter().enumerate() {
            let (first_prefix, rest_prefix) = if i == last { ('└', ' ') } else { ('├', '│') };
            for (j, line) in child.tree().into_iter().enumerate() {
                let prefix = if j == 0 { first_prefix } else { rest_prefix };
                lines.push(format!("{} {}", prefix, line));
            }
        }
        lines
    }

    /// Applies `f` to this node and then to every descendant, pre-order.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&Node),
    {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "\"{}\"", s),
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Literal(lit) => write!(f, "{}", lit),
            NodeKind::Ident(name) => f.write_str(name),
            NodeKind::BinaryExpr { op, .. } | NodeKind::UnaryExpr { op, .. } => {
                write!(f, "{}", op)
            }
            NodeKind::Declarator { ident, .. } => write!(f, "{}", ident),
            NodeKind::VarDeclaration(_) => f.write_str("var"),
            NodeKind::Block(_) => f.write_str("block"),
            NodeKind::Args(params) => {
                let names: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "args: {}", names.join(", "))
            }
            NodeKind::FuncDeclaration { ident, .. } => write!(f, "function {}", ident),
            NodeKind::If { .. } => f.write_str("if"),
            NodeKind::While { .. } => f.write_str("while"),
            NodeKind::DoWhile { .. } => f.write_str("do while"),
            NodeKind::For { .. } => f.write_str("for"),
            NodeKind::Call { .. } => f.write_str("call"),
            NodeKind::Return(_) => f.write_str("return"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Operator;
    use crate::lexer::Position;

    fn node(kind: NodeKind) -> Node {
        Node::new(Position::new(1, 1), kind)
    }

    fn ident(name: &str) -> Node {
        node(NodeKind::Ident(name.to_string()))
    }

    fn number(n: f64) -> Node {
        node(NodeKind::Literal(Literal::Number(n)))
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(number(3.0).to_string(), "3");
        assert_eq!(number(1.5).to_string(), "1.5");
        assert_eq!(
            node(NodeKind::Literal(Literal::String("hi".into()))).to_string(),
            "\"hi\""
        );
        assert_eq!(
            node(NodeKind::Args(vec![ident("a"), ident("b")])).to_string(),
            "args: a, b"
        );
    }

    #[test]
    fn test_tree_connectors() {
        let sum = node(NodeKind::BinaryExpr {
            op: Operator::Add,
            left: Box::new(ident("a")),
            right: Box::new(node(NodeKind::BinaryExpr {
                op: Operator::Mul,
                left: Box::new(number(2.0)),
                right: Box::new(ident("b")),
            })),
        });
        assert_eq!(sum.tree(), vec!["+", "├ a", "└ *", "  ├ 2", "  └ b"]);
    }

    #[test]
    fn test_visit_reaches_every_descendant() {
        let call = node(NodeKind::Call {
            callee: Box::new(ident("logprint")),
            args: vec![node(NodeKind::BinaryExpr {
                op: Operator::Add,
                left: Box::new(ident("x")),
                right: Box::new(number(1.0)),
            })],
        });

        let mut seen = Vec::new();
        call.visit(&mut |n: &Node| seen.push(n.to_string()));
        assert_eq!(seen, vec!["call", "logprint", "+", "x", "1"]);
    }

    #[test]
    fn test_for_children_skip_absent_clauses() {
        let for_node = node(NodeKind::For {
            init: None,
            test: Some(Box::new(ident("go"))),
            update: None,
            block: Box::new(node(NodeKind::Block(Vec::new()))),
        });
        let labels: Vec<String> = for_node.children().iter().map(|c| c.to_string()).collect();
        assert_eq!(labels, vec!["go", "block"]);
    }
}
