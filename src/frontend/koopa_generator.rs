use crate::ast::{BinaryOp as AstBinaryOp, *};
use crate::frontend::array_init_helper::{ArrayInitHelper, build_array_type};
use crate::frontend::call_order::definition_order;
use crate::frontend::error::{LowerError, Result};
use crate::frontend::koopa_context::KoopaContext;
use crate::frontend::symbol_table::{ArraySymbol, FunctionSig, Symbol};
use koopa::ir::{FunctionData, Type, TypeKind, Value, builder_traits::*, values::BinaryOp as KoopaBinaryOp};
use log::debug;

/// Trait for generating Koopa IR entities
pub trait GenerateKoopa {
    fn generate(&self, ctx: &mut KoopaContext) -> Result<()>;
}

impl GenerateKoopa for CompUnit {
    fn generate(&self, ctx: &mut KoopaContext) -> Result<()> {
        // Register all SysY library functions
        ctx.register_sysy_lib_functions()?;

        for item in &self.items {
            match item {
                GlobalItem::Decl(decl) => {
                    for def in decl.defs() {
                        ctx.reserve_name(&def.var_name);
                    }
                }
                GlobalItem::FuncDef(func_def) => ctx.reserve_name(&func_def.func_name),
            }
        }

        // Global constants and function signatures are bound before any body
        // is lowered, so that calls may precede the callee's definition.
        // Signatures are computed in source order, since array parameters may
        // be sized by constants declared above them.
        let mut signatures = Vec::new();
        for item in &self.items {
            match item {
                GlobalItem::Decl(decl) if decl.is_const() => decl.generate(ctx)?,
                GlobalItem::FuncDef(func_def) => signatures.push((func_def, func_def.signature(ctx)?)),
                GlobalItem::Decl(_) => {}
            }
        }

        // Functions enter the program callee-first
        let funcs: Vec<&FuncDef> = signatures.iter().map(|(func_def, _)| *func_def).collect();
        for i in definition_order(&funcs)? {
            let (func_def, (params, ret_type)) = &signatures[i];
            func_def.declare(params.clone(), ret_type.clone(), ctx)?;
        }

        for item in &self.items {
            match item {
                GlobalItem::Decl(decl) if !decl.is_const() => decl.generate(ctx)?,
                GlobalItem::FuncDef(func_def) => func_def.generate(ctx)?,
                GlobalItem::Decl(_) => {}
            }
        }
        Ok(())
    }
}

impl FuncDef {
    /// Parameter types and return type of the function
    fn signature(&self, ctx: &KoopaContext) -> Result<(Vec<Type>, Type)> {
        let params = self
            .params
            .iter()
            .map(|param| param.koopa_type(ctx))
            .collect::<Result<Vec<_>>>()?;
        let ret_type = match self.func_type {
            FuncType::Int => Type::get_i32(),
            FuncType::Void => Type::get_unit(),
        };
        Ok((params, ret_type))
    }

    /// Creates the function and inserts it into the global symbol table
    fn declare(&self, params: Vec<Type>, ret_type: Type, ctx: &mut KoopaContext) -> Result<()> {
        let func_data = FunctionData::new(format!("@{}", self.func_name), params.clone(), ret_type);
        let func = ctx.program.new_func(func_data);
        debug!("declared function @{}", self.func_name);
        ctx.symbol_table.declare(
            &self.func_name,
            Symbol::Function(FunctionSig {
                func,
                params,
                returns_value: self.func_type == FuncType::Int,
            }),
        )
    }
}

impl FuncFParam {
    /// `int a` -> i32, `int a[]` -> *i32, `int a[][3]` -> *[i32, 3]
    fn koopa_type(&self, ctx: &KoopaContext) -> Result<Type> {
        match &self.dims {
            None => Ok(Type::get_i32()),
            Some(dims) => {
                let shape = eval_dims(dims, ctx)?;
                Ok(Type::get_pointer(build_array_type(Type::get_i32(), &shape)))
            }
        }
    }
}

impl GenerateKoopa for FuncDef {
    fn generate(&self, ctx: &mut KoopaContext) -> Result<()> {
        let sig = match ctx.symbol_table.lookup(&self.func_name)? {
            Symbol::Function(sig) => sig.clone(),
            other => {
                return Err(LowerError::TypeMismatch(format!(
                    "`{}` is a {}, not a function",
                    self.func_name,
                    other.describe()
                )));
            }
        };
        debug!("lowering function @{}", self.func_name);
        ctx.enter_function(sig.func, sig.returns_value);

        // Create entry basic block
        let entry_bb = ctx.new_bb("%entry");
        ctx.switch_to_bb(entry_bb);

        // Parameters share the scope of the outermost block of the body
        ctx.with_scope(|ctx| {
            // Spill arguments: alloc & store
            for (i, param) in self.params.iter().enumerate() {
                let value: Value = ctx.current_func().params()[i];
                let alloc_inst = ctx.new_value().alloc(sig.params[i].clone());
                let name = ctx.local_name(&param.param_name);
                ctx.set_value_name(alloc_inst, name);
                ctx.add_inst(alloc_inst);

                let store_inst = ctx.new_value().store(value, alloc_inst);
                ctx.add_inst(store_inst);

                let symbol = match &param.dims {
                    None => Symbol::Variable(alloc_inst),
                    Some(dims) => Symbol::Array(ArraySymbol {
                        base: alloc_inst,
                        dims: eval_dims(dims, ctx)?,
                        decayed: true,
                        constant: None,
                    }),
                };
                ctx.symbol_table.declare(&param.param_name, symbol)?;
            }

            // Generate function body
            self.block.generate(ctx)?;

            // Falling off the end returns 0 from an `int` function
            if !ctx.is_current_bb_terminated() {
                let ret_value = match self.func_type {
                    FuncType::Int => Some(ctx.integer(0)),
                    FuncType::Void => None,
                };
                let ret_inst = ctx.new_value().ret(ret_value);
                ctx.add_inst(ret_inst);
            }
            Ok(())
        })
    }
}

/// A block does not open a scope by itself: function bodies share the scope
/// of their parameters, nested blocks are wrapped by `Stmt::Block`.
impl GenerateKoopa for Block {
    fn generate(&self, ctx: &mut KoopaContext) -> Result<()> {
        for item in &self.items {
            match item {
                BlockItem::Stmt(stmt) => stmt.generate(ctx)?,
                BlockItem::Decl(decl) => decl.generate(ctx)?,
            }
        }
        Ok(())
    }
}

impl GenerateKoopa for Decl {
    fn generate(&self, ctx: &mut KoopaContext) -> Result<()> {
        let is_const = self.is_const();
        for def in self.defs() {
            if def.dims.is_empty() {
                generate_scalar_def(def, is_const, ctx)?;
            } else {
                generate_array_def(def, is_const, ctx)?;
            }
        }
        Ok(())
    }
}

fn generate_scalar_def(def: &VarDef, is_const: bool, ctx: &mut KoopaContext) -> Result<()> {
    let init_expr = def.init.as_ref().map(|init| unwrap_init_val(&def.var_name, init)).transpose()?;

    if is_const {
        let Some(expr) = init_expr else {
            return Err(LowerError::Malformed(format!(
                "constant `{}` must be initialized",
                def.var_name
            )));
        };
        let value = expr.compute_constexpr(ctx)?;
        return ctx.symbol_table.declare(&def.var_name, Symbol::Constant(value));
    }

    // Global variable
    if ctx.symbol_table.is_global_scope() {
        let init = if let Some(expr) = init_expr {
            // Initializer for global variables must be a constexpr
            let init_value = expr.compute_constexpr(ctx)?;
            ctx.new_global_value().integer(init_value)
        } else {
            // Default initialize to zero
            ctx.new_global_value().zero_init(Type::get_i32())
        };
        let alloc_ptr = ctx.new_global_value().global_alloc(init);
        ctx.program.set_value_name(alloc_ptr, Some(format!("@{}", def.var_name)));
        return ctx.symbol_table.declare(&def.var_name, Symbol::Variable(alloc_ptr));
    }

    // Local variable
    let alloc_ptr = ctx.new_value().alloc(Type::get_i32());
    let unique_name = ctx.local_name(&def.var_name);
    ctx.set_value_name(alloc_ptr, unique_name);
    ctx.add_inst(alloc_ptr);
    // The initializer still sees an outer declaration of the same name
    if let Some(expr) = init_expr {
        let expr_value = expr.generate_int(ctx)?;
        let store_inst = ctx.new_value().store(expr_value, alloc_ptr);
        ctx.add_inst(store_inst);
    }
    ctx.symbol_table.declare(&def.var_name, Symbol::Variable(alloc_ptr))
}

fn generate_array_def(def: &VarDef, is_const: bool, ctx: &mut KoopaContext) -> Result<()> {
    let shape = eval_dims(&def.dims, ctx)?;
    let helper = ArrayInitHelper::new(&shape);
    let flat = match &def.init {
        None => None,
        Some(InitVal::List(items)) => Some(helper.flatten_init_list(items)?),
        Some(InitVal::Expr(_)) => {
            return Err(LowerError::TypeMismatch(format!(
                "array `{}` initialized with a scalar",
                def.var_name
            )));
        }
    };
    if is_const && flat.is_none() {
        return Err(LowerError::Malformed(format!(
            "constant array `{}` must be initialized",
            def.var_name
        )));
    }

    let is_global = ctx.symbol_table.is_global_scope();
    // Constant arrays and global arrays need their values at compile time
    let folded = if is_const || is_global {
        flat.as_ref()
            .map(|slots| fold_init_slots(slots, ctx))
            .transpose()?
    } else {
        None
    };

    let base = if is_global {
        let init = match &folded {
            Some(values) => helper.generate_global_init(ctx, values),
            None => ctx
                .new_global_value()
                .zero_init(build_array_type(Type::get_i32(), &shape)),
        };
        let alloc_ptr = ctx.new_global_value().global_alloc(init);
        ctx.program.set_value_name(alloc_ptr, Some(format!("@{}", def.var_name)));
        alloc_ptr
    } else {
        let alloc_ptr = ctx
            .new_value()
            .alloc(build_array_type(Type::get_i32(), &shape));
        let unique_name = ctx.local_name(&def.var_name);
        ctx.set_value_name(alloc_ptr, unique_name);
        ctx.add_inst(alloc_ptr);

        if let Some(slots) = &flat {
            let mut values = Vec::with_capacity(helper.flat_size());
            for (i, slot) in slots.iter().enumerate() {
                let value = match (&folded, slot) {
                    (Some(constants), _) => ctx.integer(constants[i]),
                    (None, Some(expr)) => expr.generate_int(ctx)?,
                    (None, None) => ctx.integer(0),
                };
                values.push(value);
            }
            helper.generate_local_init(ctx, alloc_ptr, &values);
        }
        alloc_ptr
    };

    ctx.symbol_table.declare(
        &def.var_name,
        Symbol::Array(ArraySymbol {
            base,
            dims: shape,
            decayed: false,
            constant: if is_const { folded } else { None },
        }),
    )
}

/// Evaluates array dimensions, which must be positive constants
fn eval_dims(dims: &[Expr], ctx: &KoopaContext) -> Result<Vec<usize>> {
    dims.iter()
        .map(|dim| {
            let len = dim.compute_constexpr(ctx)?;
            if len <= 0 {
                return Err(LowerError::Malformed(format!(
                    "array dimension must be positive, found {}",
                    len
                )));
            }
            Ok(len as usize)
        })
        .collect()
}

fn fold_init_slots(slots: &[Option<&Expr>], ctx: &KoopaContext) -> Result<Vec<i32>> {
    slots
        .iter()
        .map(|slot| match slot {
            Some(expr) => expr.compute_constexpr(ctx),
            None => Ok(0),
        })
        .collect()
}

impl GenerateKoopa for Stmt {
    fn generate(&self, ctx: &mut KoopaContext) -> Result<()> {
        match self {
            Stmt::Return { expr } => {
                let ret_value = match (expr, ctx.returns_value()) {
                    (Some(expr), true) => Some(expr.generate_int(ctx)?),
                    (None, false) => None,
                    (Some(_), false) => {
                        return Err(LowerError::TypeMismatch(
                            "returning a value from a void function".to_string(),
                        ));
                    }
                    (None, true) => {
                        return Err(LowerError::TypeMismatch(
                            "missing return value in an int function".to_string(),
                        ));
                    }
                };
                let inst = ctx.new_value().ret(ret_value);
                ctx.add_inst(inst);
            } // Stmt::Return
            Stmt::Assign { lval, expr } => {
                let addr = lval.generate_addr(ctx)?;
                let expr_value = expr.generate_int(ctx)?;
                let store_inst = ctx.new_value().store(expr_value, addr);
                ctx.add_inst(store_inst);
            } // Stmt::Assign
            Stmt::Expression { expr } => {
                if let Some(expr) = expr {
                    // Result is discarded; a void call is fine here
                    expr.generate(ctx)?;
                }
            } // Stmt::Expression
            Stmt::Block { block } => {
                ctx.with_scope(|ctx| block.generate(ctx))?;
            } // Stmt::Block
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                // If (cond) then { ... } else { ... }
                // will be translated to:
                // cond calculation
                // br cond, then_bb, else_bb
                // then_bb:
                //   then_body
                //   jump end_bb
                // else_bb:
                //   else_body
                //   jump end_bb
                // end_bb:
                //   ...
                // Without else, the branch goes to end_bb directly
                let cond_value = cond.generate_int(ctx)?;
                let then_bb = ctx.new_bb("%then");
                let else_bb = else_body.as_ref().map(|_| ctx.new_bb("%else"));
                let end_bb = ctx.new_bb("%end");

                let branch_inst = ctx
                    .new_value()
                    .branch(cond_value, then_bb, else_bb.unwrap_or(end_bb));
                ctx.add_inst(branch_inst);

                // Then body
                ctx.switch_to_bb(then_bb);
                then_body.generate(ctx)?;
                // then_bb is already terminated when then_body ends with
                // return/break/continue
                if !ctx.is_current_bb_terminated() {
                    let jump_to_merge_from_then = ctx.new_value().jump(end_bb);
                    ctx.add_inst(jump_to_merge_from_then);
                }
                // Else body
                if let (Some(else_bb), Some(else_body)) = (else_bb, else_body) {
                    ctx.switch_to_bb(else_bb);
                    else_body.generate(ctx)?;
                    // Koopa IR basic blocks must end with ret/branch/jump,
                    // even when they are adjacent to end_bb
                    if !ctx.is_current_bb_terminated() {
                        let jump_to_merge_from_else = ctx.new_value().jump(end_bb);
                        ctx.add_inst(jump_to_merge_from_else);
                    }
                }

                // End block
                ctx.switch_to_bb(end_bb);
            } // Stmt::If
            Stmt::While { cond, body } => {
                // while (cond) { body }
                // will be translated to:
                // jump cond_bb
                // cond_bb:
                //   cond calculation
                //   br cond, body_bb, end_bb
                // body_bb:
                //   body
                //   jump cond_bb
                // end_bb:
                //   ...
                let cond_bb = ctx.new_bb("%while_cond");
                let body_bb = ctx.new_bb("%while_body");
                let end_bb = ctx.new_bb("%while_end");

                // Initial jump to condition check
                let initial_jump = ctx.new_value().jump(cond_bb);
                ctx.add_inst(initial_jump);

                // Condition block
                ctx.switch_to_bb(cond_bb);
                let cond_value = cond.generate_int(ctx)?;
                let branch_inst = ctx.new_value().branch(cond_value, body_bb, end_bb);
                ctx.add_inst(branch_inst);

                // Body block
                ctx.switch_to_bb(body_bb);
                ctx.with_loop(end_bb, cond_bb, |ctx| body.generate(ctx))?;
                if !ctx.is_current_bb_terminated() {
                    let jump_to_cond = ctx.new_value().jump(cond_bb);
                    ctx.add_inst(jump_to_cond);
                }

                // End block
                ctx.switch_to_bb(end_bb);
            } // Stmt::While
            Stmt::Break => {
                let target = ctx.break_target()?;
                let jump_inst = ctx.new_value().jump(target);
                ctx.add_inst(jump_inst);
            } // Stmt::Break
            Stmt::Continue => {
                let target = ctx.continue_target()?;
                let jump_inst = ctx.new_value().jump(target);
                ctx.add_inst(jump_inst);
            } // Stmt::Continue
        }
        Ok(())
    }
}

impl LVal {
    /// Address of the scalar slot an assignment writes to
    fn generate_addr(&self, ctx: &mut KoopaContext) -> Result<Value> {
        match ctx.symbol_table.lookup(&self.name)?.clone() {
            Symbol::Constant(_) => Err(LowerError::TypeMismatch(format!(
                "cannot assign to constant `{}`",
                self.name
            ))),
            Symbol::Variable(ptr) if self.indices.is_empty() => Ok(ptr),
            Symbol::Variable(_) => Err(LowerError::TypeMismatch(format!(
                "`{}` is not an array",
                self.name
            ))),
            Symbol::Array(array) if array.constant.is_some() => Err(LowerError::TypeMismatch(
                format!("cannot assign to constant array `{}`", self.name),
            )),
            Symbol::Array(array) if self.indices.len() != array.rank() => {
                Err(LowerError::TypeMismatch(format!(
                    "array `{}` needs {} indices to be assigned",
                    self.name,
                    array.rank()
                )))
            }
            Symbol::Array(array) => self.element_ptr(&array, ctx),
            Symbol::Function(_) => Err(LowerError::TypeMismatch(format!(
                "cannot assign to function `{}`",
                self.name
            ))),
        }
    }

    /// Value of the lval: a load for scalars and fully indexed arrays, a
    /// pointer to the first element for partially indexed arrays
    fn generate_rvalue(&self, ctx: &mut KoopaContext) -> Result<Value> {
        match ctx.symbol_table.lookup(&self.name)?.clone() {
            Symbol::Constant(value) if self.indices.is_empty() => Ok(ctx.integer(value)),
            Symbol::Variable(ptr) if self.indices.is_empty() => {
                let load_inst = ctx.new_value().load(ptr);
                ctx.add_inst(load_inst);
                Ok(load_inst)
            }
            Symbol::Constant(_) | Symbol::Variable(_) => Err(LowerError::TypeMismatch(format!(
                "`{}` is not an array",
                self.name
            ))),
            Symbol::Array(array) => {
                let ptr = self.element_ptr(&array, ctx)?;
                if self.indices.len() == array.rank() {
                    let load_inst = ctx.new_value().load(ptr);
                    ctx.add_inst(load_inst);
                    Ok(load_inst)
                } else if array.decayed && self.indices.is_empty() {
                    // The parameter already holds a pointer to its first element
                    Ok(ptr)
                } else {
                    let zero = ctx.integer(0);
                    let decayed = ctx.new_value().get_elem_ptr(ptr, zero);
                    ctx.add_inst(decayed);
                    Ok(decayed)
                }
            }
            Symbol::Function(_) => Err(LowerError::TypeMismatch(format!(
                "function `{}` used as a value",
                self.name
            ))),
        }
    }

    /// Emits the `getptr`/`getelemptr` chain for the indices of this lval
    fn element_ptr(&self, array: &ArraySymbol, ctx: &mut KoopaContext) -> Result<Value> {
        if self.indices.len() > array.rank() {
            return Err(LowerError::TypeMismatch(format!(
                "too many indices for array `{}`",
                self.name
            )));
        }
        let mut indices = self.indices.iter();
        let mut ptr = array.base;
        if array.decayed {
            // Array parameters are pointers: load, then step with getptr
            let loaded = ctx.new_value().load(array.base);
            ctx.add_inst(loaded);
            ptr = loaded;
            if let Some(first) = indices.next() {
                let index = first.generate_int(ctx)?;
                ptr = ctx.new_value().get_ptr(ptr, index);
                ctx.add_inst(ptr);
            }
        }
        for index_expr in indices {
            let index = index_expr.generate_int(ctx)?;
            ptr = ctx.new_value().get_elem_ptr(ptr, index);
            ctx.add_inst(ptr);
        }
        Ok(ptr)
    }
}

impl Expr {
    pub fn compute_constexpr(&self, ctx: &KoopaContext) -> Result<i32> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Unary { op, expr } => {
                let val = expr.compute_constexpr(ctx)?;
                Ok(match op {
                    UnaryOp::Pos => val,
                    UnaryOp::Neg => val.wrapping_neg(),
                    UnaryOp::Not => (val == 0) as i32,
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = lhs.compute_constexpr(ctx)?;
                match op {
                    AstBinaryOp::And if left == 0 => return Ok(0),
                    AstBinaryOp::Or if left != 0 => return Ok(1),
                    _ => {}
                }
                let right = rhs.compute_constexpr(ctx)?;
                Ok(match op {
                    AstBinaryOp::Add => left.wrapping_add(right),
                    AstBinaryOp::Sub => left.wrapping_sub(right),
                    AstBinaryOp::Mul => left.wrapping_mul(right),
                    AstBinaryOp::Div | AstBinaryOp::Mod if right == 0 => {
                        return Err(LowerError::Malformed(
                            "division by zero in constant expression".to_string(),
                        ));
                    }
                    AstBinaryOp::Div => left.wrapping_div(right),
                    AstBinaryOp::Mod => left.wrapping_rem(right),

                    AstBinaryOp::Eq => (left == right) as i32,
                    AstBinaryOp::Neq => (left != right) as i32,
                    AstBinaryOp::Lt => (left < right) as i32,
                    AstBinaryOp::Gt => (left > right) as i32,
                    AstBinaryOp::Leq => (left <= right) as i32,
                    AstBinaryOp::Geq => (left >= right) as i32,

                    AstBinaryOp::And | AstBinaryOp::Or => (right != 0) as i32,
                })
            }
            // Constant variables are also treated as LVal here
            Expr::LVal(lval) => match ctx.symbol_table.lookup(&lval.name)? {
                Symbol::Constant(value) if lval.indices.is_empty() => Ok(*value),
                Symbol::Array(ArraySymbol {
                    dims,
                    constant: Some(values),
                    ..
                }) if lval.indices.len() == dims.len() => {
                    let mut flat_index = 0usize;
                    for (index_expr, &dim) in lval.indices.iter().zip(dims) {
                        let index = index_expr.compute_constexpr(ctx)?;
                        if index < 0 || index as usize >= dim {
                            return Err(LowerError::Malformed(format!(
                                "index {} out of bounds for `{}`",
                                index, lval.name
                            )));
                        }
                        flat_index = flat_index * dim + index as usize;
                    }
                    Ok(values[flat_index])
                }
                _ => Err(LowerError::Malformed(format!(
                    "`{}` is not a compile-time constant",
                    lval.name
                ))),
            },
            Expr::Call { func_name, .. } => Err(LowerError::Malformed(format!(
                "call to `{}` in a constant expression",
                func_name
            ))),
        }
    }

    /// Lowers the expression and checks that it produced an `i32`
    pub fn generate_int(&self, ctx: &mut KoopaContext) -> Result<Value> {
        let value = self.generate(ctx)?;
        let ty = ctx.value_type(value);
        match ty.kind() {
            TypeKind::Int32 => Ok(value),
            _ => Err(LowerError::TypeMismatch(format!(
                "expected an integer, found a value of type `{}`",
                ty
            ))),
        }
    }

    fn generate(&self, ctx: &mut KoopaContext) -> Result<Value> {
        match self {
            Expr::Number(n) => Ok(ctx.integer(*n)),
            Expr::Binary {
                op: op @ (AstBinaryOp::And | AstBinaryOp::Or),
                lhs,
                rhs,
            } => generate_short_circuit(*op, lhs, rhs, ctx),
            Expr::Binary { op, lhs, rhs } => {
                // Normal binary operations (Add, Sub, Eq, ...)
                let lhs_value = lhs.generate_int(ctx)?;
                let rhs_value = rhs.generate_int(ctx)?;
                let inst = ctx
                    .new_value()
                    .binary(map_binary_op(*op), lhs_value, rhs_value);
                ctx.add_inst(inst);
                Ok(inst)
            }
            Expr::Unary { op, expr } => match op {
                UnaryOp::Pos => expr.generate_int(ctx),
                UnaryOp::Neg => {
                    let value = expr.generate_int(ctx)?;
                    let zero = ctx.integer(0);
                    let inst = ctx.new_value().binary(KoopaBinaryOp::Sub, zero, value);
                    ctx.add_inst(inst);
                    Ok(inst)
                }
                UnaryOp::Not => {
                    let value = expr.generate_int(ctx)?;
                    let zero = ctx.integer(0);
                    let inst = ctx.new_value().binary(KoopaBinaryOp::Eq, value, zero);
                    ctx.add_inst(inst);
                    Ok(inst)
                }
            },
            Expr::LVal(lval) => lval.generate_rvalue(ctx),
            Expr::Call { func_name, args } => {
                let symbol = ctx.symbol_table.lookup(func_name)?.clone();
                let Symbol::Function(sig) = symbol else {
                    return Err(LowerError::TypeMismatch(format!(
                        "`{}` is a {}, not a function",
                        func_name,
                        symbol.describe()
                    )));
                };
                if args.len() != sig.params.len() {
                    return Err(LowerError::TypeMismatch(format!(
                        "`{}` expects {} arguments, found {}",
                        func_name,
                        sig.params.len(),
                        args.len()
                    )));
                }

                let mut arg_values = Vec::with_capacity(args.len());
                for (i, (arg, param_type)) in args.iter().zip(&sig.params).enumerate() {
                    let value = arg.generate(ctx)?;
                    let arg_type = ctx.value_type(value);
                    if arg_type != *param_type {
                        return Err(LowerError::TypeMismatch(format!(
                            "argument {} of `{}` has type `{}`, expected `{}`",
                            i + 1,
                            func_name,
                            arg_type,
                            param_type
                        )));
                    }
                    arg_values.push(value);
                }

                // `void` functions return a unit value
                let call_inst = ctx.new_value().call(sig.func, arg_values);
                ctx.add_inst(call_inst);
                Ok(call_inst)
            }
        }
    }
}

/// Short-circuiting `&&` / `||`.
///
/// `lhs && rhs`: result = 0; if (lhs != 0) { result = (rhs != 0); }
/// `lhs || rhs`: result = 1; if (lhs == 0) { result = (rhs != 0); }
///
/// The result lives in a stack slot so that both paths can write it.
fn generate_short_circuit(op: AstBinaryOp, lhs: &Expr, rhs: &Expr, ctx: &mut KoopaContext) -> Result<Value> {
    let is_and = op == AstBinaryOp::And;
    let lhs_value = lhs.generate_int(ctx)?;

    let result_ptr = ctx.new_value().alloc(Type::get_i32());
    ctx.add_inst(result_ptr);
    let default = ctx.integer(if is_and { 0 } else { 1 });
    let store_default = ctx.new_value().store(default, result_ptr);
    ctx.add_inst(store_default);

    let zero = ctx.integer(0);
    let lhs_ne_zero = ctx.new_value().binary(KoopaBinaryOp::NotEq, lhs_value, zero);
    ctx.add_inst(lhs_ne_zero);

    let (rhs_bb, end_bb) = if is_and {
        (ctx.new_bb("%and_rhs"), ctx.new_bb("%and_end"))
    } else {
        (ctx.new_bb("%or_rhs"), ctx.new_bb("%or_end"))
    };

    // `&&` evaluates rhs only when lhs is true, `||` only when it is false
    let branch = if is_and {
        ctx.new_value().branch(lhs_ne_zero, rhs_bb, end_bb)
    } else {
        ctx.new_value().branch(lhs_ne_zero, end_bb, rhs_bb)
    };
    ctx.add_inst(branch);

    // RHS evaluation block
    ctx.switch_to_bb(rhs_bb);
    let rhs_value = rhs.generate_int(ctx)?;
    let rhs_ne_zero = ctx.new_value().binary(KoopaBinaryOp::NotEq, rhs_value, zero);
    ctx.add_inst(rhs_ne_zero);
    let store_rhs = ctx.new_value().store(rhs_ne_zero, result_ptr);
    ctx.add_inst(store_rhs);
    let jump = ctx.new_value().jump(end_bb);
    ctx.add_inst(jump);

    // End block
    ctx.switch_to_bb(end_bb);
    let result = ctx.new_value().load(result_ptr);
    ctx.add_inst(result);
    Ok(result)
}

/// Unwraps the initializer of a scalar: `int a = 1;` or `int a = {1};`
fn unwrap_init_val<'e>(name: &str, init: &'e InitVal) -> Result<&'e Expr> {
    match init {
        InitVal::Expr(expr) => Ok(expr),
        InitVal::List(items) => match items.as_slice() {
            [InitVal::Expr(expr)] => Ok(expr),
            _ => Err(LowerError::TypeMismatch(format!(
                "scalar `{}` initialized with a brace list",
                name
            ))),
        },
    }
}

fn map_binary_op(op: AstBinaryOp) -> KoopaBinaryOp {
    match op {
        AstBinaryOp::Add => KoopaBinaryOp::Add,
        AstBinaryOp::Sub => KoopaBinaryOp::Sub,
        AstBinaryOp::Mul => KoopaBinaryOp::Mul,
        AstBinaryOp::Div => KoopaBinaryOp::Div,
        AstBinaryOp::Mod => KoopaBinaryOp::Mod,
        AstBinaryOp::Eq => KoopaBinaryOp::Eq,
        AstBinaryOp::Neq => KoopaBinaryOp::NotEq,
        AstBinaryOp::Lt => KoopaBinaryOp::Lt,
        AstBinaryOp::Gt => KoopaBinaryOp::Gt,
        AstBinaryOp::Leq => KoopaBinaryOp::Le,
        AstBinaryOp::Geq => KoopaBinaryOp::Ge,
        AstBinaryOp::And | AstBinaryOp::Or => {
            unreachable!("logical operators are lowered by generate_short_circuit")
        }
    }
}
