// Abstract Syntax Tree (AST) definitions for SysY language

#[derive(Debug)]
pub struct CompUnit {
    pub items: Vec<GlobalItem>,
}

#[derive(Debug)]
pub enum GlobalItem {
    Decl(Decl),
    FuncDef(FuncDef),
}

#[derive(Debug)]
pub struct FuncDef {
    pub func_type: FuncType,
    pub func_name: String,
    pub params: Vec<FuncFParam>,
    pub block: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncType {
    Int,
    Void,
}

/// A formal parameter.
/// `dims` is `Some` for array parameters, whose first dimension is omitted:
/// `int a[]` has `Some([])`, `int a[][3]` has `Some([3])`.
#[derive(Debug)]
pub struct FuncFParam {
    pub param_name: String,
    pub dims: Option<Vec<Expr>>,
}

#[derive(Debug)]
pub struct Block {
    pub items: Vec<BlockItem>,
}

#[derive(Debug)]
pub enum BlockItem {
    Decl(Decl),
    Stmt(Stmt),
}

#[derive(Debug)]
pub enum Decl {
    Const { defs: Vec<VarDef> },
    Var { defs: Vec<VarDef> },
}

/// One declarator of a declaration. Scalars have empty `dims`.
#[derive(Debug)]
pub struct VarDef {
    pub var_name: String,
    pub dims: Vec<Expr>,
    pub init: Option<InitVal>,
}

#[derive(Debug)]
pub enum InitVal {
    Expr(Expr),
    List(Vec<InitVal>),
}

#[derive(Debug)]
pub enum Stmt {
    Assign {
        lval: LVal,
        expr: Expr,
    },
    Expression {
        expr: Option<Expr>,
    },
    Block {
        block: Block,
    },
    If {
        cond: Expr,
        then_body: Box<Stmt>,
        else_body: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return {
        expr: Option<Expr>,
    },
}

#[derive(Debug)]
pub struct LVal {
    pub name: String,
    pub indices: Vec<Expr>,
}

#[derive(Debug)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Number(i32),
    LVal(LVal),
    Call {
        func_name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

impl Decl {
    pub fn is_const(&self) -> bool {
        matches!(self, Decl::Const { .. })
    }

    pub fn defs(&self) -> &[VarDef] {
        match self {
            Decl::Const { defs } | Decl::Var { defs } => defs,
        }
    }
}
