use std::collections::HashSet;

use koopa::ir::builder::{GlobalBuilder, LocalBuilder};
use koopa::ir::builder_traits::*;
use koopa::ir::entities::ValueData;
use koopa::ir::*;
use log::trace;

use crate::frontend::error::{LowerError, Result};
use crate::frontend::symbol_table::{FunctionSig, Symbol, SymbolTable};

/// Branch targets of the innermost enclosing `while`
#[derive(Debug, Clone, Copy)]
struct LoopTargets {
    break_bb: BasicBlock,
    continue_bb: BasicBlock,
}

/// Context for Koopa IR generation
pub struct KoopaContext<'a> {
    pub program: &'a mut Program,
    pub symbol_table: SymbolTable,
    current_func: Option<Function>,
    current_bb: Option<BasicBlock>,
    returns_value: bool,
    loops: Vec<LoopTargets>,
    bb_count: usize,   // For generating unique basic block names
    name_count: usize, // For generating unique local value names
    // Top-level names; local value names must not collide with them
    reserved_names: HashSet<String>,
}

impl<'a> KoopaContext<'a> {
    pub fn new(program: &'a mut Program) -> Self {
        KoopaContext {
            program,
            symbol_table: SymbolTable::new(),
            current_func: None,
            current_bb: None,
            returns_value: false,
            loops: Vec::new(),
            bb_count: 0,
            name_count: 0,
            reserved_names: HashSet::new(),
        }
    }

    /// Declares the SysY runtime library in the program and the global scope
    pub fn register_sysy_lib_functions(&mut self) -> Result<()> {
        let i32_ty = Type::get_i32();
        let unit = Type::get_unit();
        let i32_ptr = Type::get_pointer(Type::get_i32());
        let lib_functions = [
            ("getint", vec![], i32_ty.clone()),
            ("getch", vec![], i32_ty.clone()),
            ("getarray", vec![i32_ptr.clone()], i32_ty.clone()),
            ("putint", vec![i32_ty.clone()], unit.clone()),
            ("putch", vec![i32_ty.clone()], unit.clone()),
            ("putarray", vec![i32_ty.clone(), i32_ptr], unit.clone()),
            ("starttime", vec![], unit.clone()),
            ("stoptime", vec![], unit),
        ];
        for (name, params, ret_type) in lib_functions {
            let returns_value = !ret_type.is_unit();
            let func_data = FunctionData::new_decl(format!("@{}", name), params.clone(), ret_type);
            let func = self.program.new_func(func_data);
            self.reserve_name(name);
            self.symbol_table.declare(
                name,
                Symbol::Function(FunctionSig {
                    func,
                    params,
                    returns_value,
                }),
            )?;
        }
        Ok(())
    }

    pub fn reserve_name(&mut self, name: &str) {
        self.reserved_names.insert(name.to_string());
    }

    /// Koopa IR value names must be unique, and local names must not shadow
    /// a global one. Returns `@<name>_<n>`.
    pub fn local_name(&mut self, name: &str) -> String {
        loop {
            let candidate = format!("{}_{}", name, self.name_count);
            self.name_count += 1;
            if !self.reserved_names.contains(&candidate) {
                return format!("@{}", candidate);
            }
        }
    }

    pub fn current_func_mut(&mut self) -> &mut FunctionData {
        self.program.func_mut(
            self.current_func
                .expect("Current function is not set in KoopaContext"),
        )
    }

    pub fn current_func(&self) -> &FunctionData {
        self.program.func(
            self.current_func
                .expect("Current function is not set in KoopaContext"),
        )
    }

    /// Starts lowering the body of `func`
    pub fn enter_function(&mut self, func: Function, returns_value: bool) {
        self.current_func = Some(func);
        self.current_bb = None;
        self.returns_value = returns_value;
        self.loops.clear();
    }

    pub fn returns_value(&self) -> bool {
        self.returns_value
    }

    pub fn set_current_bb(&mut self, bb: BasicBlock) {
        self.current_bb = Some(bb);
    }

    /// Appends `bb` to the current function and continues emission there
    pub fn switch_to_bb(&mut self, bb: BasicBlock) {
        self.add_bb(bb);
        self.set_current_bb(bb);
    }

    pub fn get_value_data(&self, value: Value) -> &ValueData {
        self.current_func().dfg().value(value)
    }

    /// Type of a local or global value
    pub fn value_type(&self, value: Value) -> Type {
        if value.is_global() {
            self.program.borrow_value(value).ty().clone()
        } else {
            self.get_value_data(value).ty().clone()
        }
    }

    pub fn set_value_name(&mut self, value: Value, name: String) {
        self.current_func_mut()
            .dfg_mut()
            .set_value_name(value, Some(name));
    }

    pub fn is_current_bb_terminated(&mut self) -> bool {
        let current_bb = self
            .current_bb
            .expect("Current basic block is not set in KoopaContext");
        let func_data = self.current_func_mut();

        let bb_node = func_data.layout_mut().bb_mut(current_bb);
        if let Some(&last_inst) = bb_node.insts().back_key() {
            let inst_data = func_data.dfg().value(last_inst);
            matches!(
                inst_data.kind(),
                ValueKind::Branch(_) | ValueKind::Jump(_) | ValueKind::Return(_)
            )
        } else {
            false // No instructions in the current basic block
        }
    }

    /// Pushes basic block `bb` to the end of the basic block list of
    /// the current function
    pub fn add_bb(&mut self, bb: BasicBlock) {
        self.current_func_mut()
            .layout_mut()
            .bbs_mut()
            .push_key_back(bb)
            .expect("Failed to add basic block");
    }

    /// Pushes instruction `inst` to the end of the instruction list
    /// of the current basic block in the current function.
    ///
    /// Code following a `ret`/`jump`/`br` is unreachable but still lowered:
    /// it goes to a fresh block so that every block keeps exactly one
    /// terminator.
    pub fn add_inst(&mut self, inst: Value) {
        if self.is_current_bb_terminated() {
            let dead_bb = self.new_bb("%unreachable");
            self.switch_to_bb(dead_bb);
        }
        let bb = self
            .current_bb
            .expect("Current basic block is not set in KoopaContext");
        self.current_func_mut()
            .layout_mut()
            .bb_mut(bb)
            .insts_mut()
            .push_key_back(inst)
            .expect("Failed to add instruction");
    }

    /// Creates a new value in the DataFlow Graph of the current function
    /// Returns a LocalBuilder for the newly created value
    pub fn new_value(&mut self) -> LocalBuilder<'_> {
        self.current_func_mut().dfg_mut().new_value()
    }

    /// Creates a new global value in the program
    pub fn new_global_value(&mut self) -> GlobalBuilder<'_> {
        self.program.new_value()
    }

    pub fn integer(&mut self, value: i32) -> Value {
        self.new_value().integer(value)
    }

    /// Creates a new basic block in the DFG of the current function
    pub fn new_bb(&mut self, name_prefix: &str) -> BasicBlock {
        let name = format!("{}_{}", name_prefix, self.bb_count);
        self.bb_count += 1;
        trace!("new basic block {}", name);
        self.current_func_mut().dfg_mut().new_bb().basic_block(Some(name))
    }

    /// Runs `f` inside a fresh lexical scope. The scope is popped whether or
    /// not `f` succeeds.
    pub fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.symbol_table.enter_scope();
        let result = f(self);
        self.symbol_table.exit_scope();
        result
    }

    /// Runs `f` as the body of a loop whose `break` jumps to `break_bb` and
    /// whose `continue` jumps to `continue_bb`
    pub fn with_loop<T>(
        &mut self,
        break_bb: BasicBlock,
        continue_bb: BasicBlock,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.loops.push(LoopTargets {
            break_bb,
            continue_bb,
        });
        let result = f(self);
        self.loops.pop();
        result
    }

    pub fn break_target(&self) -> Result<BasicBlock> {
        self.loops
            .last()
            .map(|targets| targets.break_bb)
            .ok_or(LowerError::ControlFlow("break"))
    }

    pub fn continue_target(&self) -> Result<BasicBlock> {
        self.loops
            .last()
            .map(|targets| targets.continue_bb)
            .ok_or(LowerError::ControlFlow("continue"))
    }
}
