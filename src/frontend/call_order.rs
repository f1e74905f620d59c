use std::collections::HashMap;

use crate::ast::*;
use crate::frontend::error::{LowerError, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

/// Orders user functions so that every callee comes before its callers.
///
/// Koopa text only resolves calls to functions defined earlier in the file,
/// so this is the order in which functions are added to the program.
/// Functions that do not depend on each other keep their source order.
/// Returns indices into `funcs`.
pub fn definition_order(funcs: &[&FuncDef]) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = funcs
        .iter()
        .enumerate()
        .map(|(i, func)| (func.func_name.as_str(), i))
        .collect();

    let callees: Vec<Vec<usize>> = funcs
        .iter()
        .enumerate()
        .map(|(i, func)| {
            let mut names = Vec::new();
            calls_in_block(&func.block, &mut names);
            let mut edges = Vec::new();
            for name in names {
                if let Some(&j) = index.get(name) {
                    if j != i && !edges.contains(&j) {
                        edges.push(j);
                    }
                }
            }
            edges
        })
        .collect();

    let mut marks = vec![Mark::Unvisited; funcs.len()];
    let mut order = Vec::with_capacity(funcs.len());
    for i in 0..funcs.len() {
        visit(i, funcs, &callees, &mut marks, &mut order)?;
    }
    Ok(order)
}

fn visit(
    i: usize,
    funcs: &[&FuncDef],
    callees: &[Vec<usize>],
    marks: &mut [Mark],
    order: &mut Vec<usize>,
) -> Result<()> {
    match marks[i] {
        Mark::Done => return Ok(()),
        Mark::Active => {
            return Err(LowerError::Malformed(format!(
                "`{}` is part of a mutual recursion, which Koopa IR cannot order",
                funcs[i].func_name
            )));
        }
        Mark::Unvisited => {}
    }
    marks[i] = Mark::Active;
    for &j in &callees[i] {
        visit(j, funcs, callees, marks, order)?;
    }
    marks[i] = Mark::Done;
    order.push(i);
    Ok(())
}

fn calls_in_block<'a>(block: &'a Block, names: &mut Vec<&'a str>) {
    for item in &block.items {
        match item {
            BlockItem::Decl(decl) => {
                for def in decl.defs() {
                    calls_in_exprs(&def.dims, names);
                    if let Some(init) = &def.init {
                        calls_in_init(init, names);
                    }
                }
            }
            BlockItem::Stmt(stmt) => calls_in_stmt(stmt, names),
        }
    }
}

fn calls_in_init<'a>(init: &'a InitVal, names: &mut Vec<&'a str>) {
    match init {
        InitVal::Expr(expr) => calls_in_expr(expr, names),
        InitVal::List(list) => {
            for init in list {
                calls_in_init(init, names);
            }
        }
    }
}

fn calls_in_stmt<'a>(stmt: &'a Stmt, names: &mut Vec<&'a str>) {
    match stmt {
        Stmt::Assign { lval, expr } => {
            calls_in_exprs(&lval.indices, names);
            calls_in_expr(expr, names);
        }
        Stmt::Expression { expr } | Stmt::Return { expr } => {
            if let Some(expr) = expr {
                calls_in_expr(expr, names);
            }
        }
        Stmt::Block { block } => calls_in_block(block, names),
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => {
            calls_in_expr(cond, names);
            calls_in_stmt(then_body, names);
            if let Some(else_body) = else_body {
                calls_in_stmt(else_body, names);
            }
        }
        Stmt::While { cond, body } => {
            calls_in_expr(cond, names);
            calls_in_stmt(body, names);
        }
        Stmt::Break | Stmt::Continue => {}
    }
}

fn calls_in_exprs<'a>(exprs: &'a [Expr], names: &mut Vec<&'a str>) {
    for expr in exprs {
        calls_in_expr(expr, names);
    }
}

fn calls_in_expr<'a>(expr: &'a Expr, names: &mut Vec<&'a str>) {
    match expr {
        Expr::Binary { lhs, rhs, .. } => {
            calls_in_expr(lhs, names);
            calls_in_expr(rhs, names);
        }
        Expr::Unary { expr, .. } => calls_in_expr(expr, names),
        Expr::Number(_) => {}
        Expr::LVal(lval) => calls_in_exprs(&lval.indices, names),
        Expr::Call { func_name, args } => {
            names.push(func_name.as_str());
            calls_in_exprs(args, names);
        }
    }
}
