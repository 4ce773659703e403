//! The restricted expression grammar: comparisons, boolean conjunction,
//! disjunction and negation, field access, membership, and arithmetic —
//! nothing else. Trimmed down from a much larger `core::ast::Expr`
//! (which also carried pipelines, lambdas, and regex matching for a full
//! n8n-compatible template language); a `when` guard or a recursive node's
//! `convergence_expression` never needs more than this.

use serde_json::Value;

/// One segment of a dotted/indexed field-access path, e.g. `a.b[0].c`.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// `.name` — an object key.
    Name(String),
    /// `[n]` — an array index.
    Index(i64),
}

/// A binary operator and its two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    In,
}

/// A parsed expression tree. `Box` keeps nodes uniformly sized.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal number, string, boolean, or `null`.
    Literal(Value),
    /// A field-access path rooted at the evaluation context's variables,
    /// e.g. `gate.branch` or `ctx.recursive_state.count`.
    Field(Vec<PathSegment>),
    /// `-expr`.
    Negate(Box<Expr>),
    /// `!expr`.
    Not(Box<Expr>),
    /// `left op right`.
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// `[a, b, c]` — only meaningful as the right-hand side of `in`.
    Array(Vec<Expr>),
}
