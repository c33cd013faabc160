/// Parsed, not yet type checked, expression tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expr {
    pub kind: ExprKind,
    /// Byte offset of the token that introduced this node.
    pub offset: usize,
    /// Height of the subtree rooted here, leaves are 1.
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprKind {
    Bool(bool),
    Int(i64),
    Str(String),
    Ident(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// A global call such as `size(x)` when `target` is `None`, or a method call such as
    /// `x.size()` otherwise.
    Call {
        function: String,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
}

impl BinaryOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
        }
    }
}

impl Expr {
    pub(crate) fn new(kind: ExprKind, offset: usize) -> Self {
        let children = match &kind {
            ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Str(_) | ExprKind::Ident(_) => 0,
            ExprKind::List(items) => max_depth(items),
            ExprKind::Unary { operand, .. } => operand.depth,
            ExprKind::Binary { left, right, .. } => left.depth.max(right.depth),
            ExprKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => condition
                .depth
                .max(then_branch.depth)
                .max(else_branch.depth),
            ExprKind::Call { target, args, .. } => target
                .as_ref()
                .map_or(0, |target| target.depth)
                .max(max_depth(args)),
        };
        Self {
            kind,
            offset,
            depth: children + 1,
        }
    }
}

fn max_depth(items: &[Expr]) -> usize {
    items.iter().map(|item| item.depth).max().unwrap_or(0)
}
