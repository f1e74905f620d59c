use crate::backend::asm_writer::AsmWriter;
use crate::backend::error::{CodegenError, Result};
use crate::backend::stack_frame::{ARG_REGS, FrameLayout, WORD_SIZE};
use koopa::ir::entities::{BasicBlock, FunctionData, Value, ValueKind};
use koopa::ir::{Program, Type, TypeKind, values::BinaryOp as KoopaBinaryOp};
use log::debug;
use std::collections::HashMap;
use std::io::Write;

const IMM12_MIN: i32 = -2048;
const IMM12_MAX: i32 = 2047;
/// Scratch register for addresses too far from `sp`. Never holds an operand.
const ADDR_TMP: &str = "t6";

/// Whether `value` fits the 12-bit signed immediate of I/S-type instructions
pub fn fits_imm12(value: i32) -> bool {
    (IMM12_MIN..=IMM12_MAX).contains(&value)
}

/// Splits `value` into `(hi, lo)` such that `lui hi` followed by `addi lo`
/// rebuilds it. `lo` is sign-extended by `addi`, so `hi` absorbs the carry.
pub fn split_imm(value: i32) -> (i32, i32) {
    let lo = (value << 20) >> 20;
    let hi = (value.wrapping_sub(lo) >> 12) & 0xfffff;
    (hi, lo)
}

pub struct RiscvGenerator<'p, W: Write> {
    program: &'p Program,
    writer: AsmWriter<W>,
}

impl<'p, W: Write> RiscvGenerator<'p, W> {
    pub fn new(program: &'p Program, writer: W) -> Self {
        Self {
            program,
            writer: AsmWriter::new(writer),
        }
    }

    pub fn generate_program(&mut self) -> Result<()> {
        let program = self.program;

        if !program.inst_layout().is_empty() {
            self.writer.write_directive("data", &[])?;
            for &global in program.inst_layout() {
                self.generate_global(global)?;
            }
            self.writer.write_blank_line()?;
        }

        self.writer.write_directive("text", &[])?;
        for &func in program.func_layout() {
            let func_data = program.func(func);
            // Skip function declarations (none entry basic block)
            if func_data.layout().entry_bb().is_none() {
                continue;
            }
            FunctionGenerator::new(program, &mut self.writer, func_data)?.generate_function()?;
        }
        Ok(())
    }

    fn generate_global(&mut self, global: Value) -> Result<()> {
        let program = self.program;
        let global_data = program.borrow_value(global);
        let name = symbol_name(global_data.name())
            .ok_or_else(|| CodegenError::DanglingValue("global data".to_string()))?;
        let ValueKind::GlobalAlloc(alloc) = global_data.kind() else {
            return Err(CodegenError::Unsupported(format!(
                "global `{}` is not a global alloc",
                name
            )));
        };
        let mut words = Vec::new();
        self.flatten_init(alloc.init(), &mut words)?;

        self.writer.write_directive("globl", &[&name])?;
        self.writer.write_directive("align", &["2"])?;
        self.writer.write_label(&name)?;
        for run in words.chunk_by(|a, b| (*a == 0) == (*b == 0)) {
            if run[0] == 0 {
                let bytes = run.len() as i32 * WORD_SIZE;
                self.writer.write_directive("zero", &[&bytes.to_string()])?;
            } else {
                for word in run {
                    self.writer.write_directive("word", &[&word.to_string()])?;
                }
            }
        }
        Ok(())
    }

    /// Appends the words of a global initializer in row-major order
    fn flatten_init(&self, init: Value, words: &mut Vec<i32>) -> Result<()> {
        let init_data = self.program.borrow_value(init);
        match init_data.kind() {
            ValueKind::Integer(int) => words.push(int.value()),
            ValueKind::ZeroInit(_) => {
                let count = init_data.ty().size() / WORD_SIZE as usize;
                words.resize(words.len() + count, 0);
            }
            ValueKind::Aggregate(aggregate) => {
                for &elem in aggregate.elems() {
                    self.flatten_init(elem, words)?;
                }
            }
            _ => {
                return Err(CodegenError::Unsupported(format!(
                    "global initializer of type `{}`",
                    init_data.ty()
                )));
            }
        }
        Ok(())
    }
}

/// `@name` / `%name` without its sigil
fn symbol_name(name: &Option<String>) -> Option<String> {
    name.as_ref()
        .map(|name| name.trim_start_matches(['@', '%']).to_string())
}

struct FunctionGenerator<'a, 'p, W: Write> {
    program: &'p Program,
    asm: &'a mut AsmWriter<W>,
    func: &'p FunctionData,
    frame: FrameLayout,
    name: String,
    labels: HashMap<BasicBlock, String>,
}

impl<'a, 'p, W: Write> FunctionGenerator<'a, 'p, W> {
    fn new(program: &'p Program, asm: &'a mut AsmWriter<W>, func: &'p FunctionData) -> Result<Self> {
        let frame = FrameLayout::compute(func)?;
        // Function name starts with an '@'
        let name = func.name().trim_start_matches('@').to_string();
        let labels = func
            .layout()
            .bbs()
            .into_iter()
            .enumerate()
            .map(|(i, (&bb, _))| {
                let label = match symbol_name(func.dfg().bb(bb).name()) {
                    Some(bb_name) => format!(".L{}_{}", name, bb_name),
                    None => format!(".L{}_bb{}", name, i),
                };
                (bb, label)
            })
            .collect();
        debug!("generating function {} with a {}-byte frame", name, frame.size());
        Ok(Self {
            program,
            asm,
            func,
            frame,
            name,
            labels,
        })
    }

    fn generate_function(&mut self) -> Result<()> {
        let func = self.func;
        self.asm.write_directive("globl", &[&self.name])?;
        self.asm.write_label(&self.name)?;

        self.generate_prologue()?;

        for (&bb, node) in func.layout().bbs() {
            let label = self.label(bb)?;
            self.asm.write_label(&label)?;
            for &inst in node.insts().keys() {
                self.generate_instruction(inst)?;
            }
        }
        self.asm.write_blank_line()?;
        Ok(())
    }

    fn label(&self, bb: BasicBlock) -> Result<String> {
        self.labels
            .get(&bb)
            .cloned()
            .ok_or_else(|| CodegenError::DanglingValue(format!("branch target of {}", self.name)))
    }

    fn generate_prologue(&mut self) -> Result<()> {
        let size = self.frame.size();
        if size > 0 {
            self.adjust_sp(-size)?;
        }
        if let Some(ra_offset) = self.frame.ra_offset() {
            let addr = self.memory_operand(ra_offset)?;
            self.asm.write_inst("sw", &["ra", &addr])?;
        }
        // Register arguments move to their home slots
        let func = self.func;
        for (i, &param) in func.params().iter().take(ARG_REGS).enumerate() {
            let offset = self.slot_of(param)?;
            let addr = self.memory_operand(offset)?;
            self.asm.write_inst("sw", &[&format!("a{}", i), &addr])?;
        }
        Ok(())
    }

    fn generate_epilogue(&mut self) -> Result<()> {
        if let Some(ra_offset) = self.frame.ra_offset() {
            let addr = self.memory_operand(ra_offset)?;
            self.asm.write_inst("lw", &["ra", &addr])?;
        }
        let size = self.frame.size();
        if size > 0 {
            self.adjust_sp(size)?;
        }
        self.asm.write_inst("ret", &[])?;
        Ok(())
    }

    fn adjust_sp(&mut self, delta: i32) -> Result<()> {
        if fits_imm12(delta) {
            self.asm.write_inst("addi", &["sp", "sp", &delta.to_string()])?;
        } else {
            self.load_imm(ADDR_TMP, delta)?;
            self.asm.write_inst("add", &["sp", "sp", ADDR_TMP])?;
        }
        Ok(())
    }

    fn load_imm(&mut self, reg: &str, value: i32) -> Result<()> {
        if fits_imm12(value) {
            self.asm.write_inst("li", &[reg, &value.to_string()])?;
        } else {
            let (hi, lo) = split_imm(value);
            self.asm.write_inst("lui", &[reg, &hi.to_string()])?;
            if lo != 0 {
                self.asm.write_inst("addi", &[reg, reg, &lo.to_string()])?;
            }
        }
        Ok(())
    }

    /// Returns `offset(sp)`, or materializes the address in `t6` when the
    /// offset does not fit in 12 bits
    fn memory_operand(&mut self, offset: i32) -> Result<String> {
        if fits_imm12(offset) {
            return Ok(format!("{}(sp)", offset));
        }
        self.load_imm(ADDR_TMP, offset)?;
        self.asm.write_inst("add", &[ADDR_TMP, "sp", ADDR_TMP])?;
        Ok(format!("0({})", ADDR_TMP))
    }

    fn slot_of(&self, value: Value) -> Result<i32> {
        self.frame
            .offset_of(value)
            .ok_or_else(|| CodegenError::DanglingValue(self.name.clone()))
    }

    fn global_name(&self, value: Value) -> Result<String> {
        symbol_name(self.program.borrow_value(value).name())
            .ok_or_else(|| CodegenError::DanglingValue(self.name.clone()))
    }

    fn value_type(&self, value: Value) -> Type {
        if value.is_global() {
            self.program.borrow_value(value).ty().clone()
        } else {
            self.func.dfg().value(value).ty().clone()
        }
    }

    /// Puts the value of `value` into `reg`. For `alloc` and `global alloc`
    /// the value is the address of the slot.
    fn load_value_to_reg(&mut self, value: Value, reg: &str) -> Result<()> {
        if value.is_global() {
            let name = self.global_name(value)?;
            self.asm.write_inst("la", &[reg, &name])?;
            return Ok(());
        }
        let func = self.func;
        match func.dfg().value(value).kind() {
            ValueKind::Integer(int) => self.load_imm(reg, int.value())?,
            ValueKind::ZeroInit(_) | ValueKind::Undef(_) => self.load_imm(reg, 0)?,
            ValueKind::FuncArgRef(arg) if arg.index() >= ARG_REGS => {
                let offset = self.frame.incoming_arg_offset(arg.index());
                let addr = self.memory_operand(offset)?;
                self.asm.write_inst("lw", &[reg, &addr])?;
            }
            ValueKind::Alloc(_) => {
                let offset = self.slot_of(value)?;
                if fits_imm12(offset) {
                    self.asm.write_inst("addi", &[reg, "sp", &offset.to_string()])?;
                } else {
                    self.load_imm(reg, offset)?;
                    self.asm.write_inst("add", &[reg, "sp", reg])?;
                }
            }
            // Register params and results of other instructions
            // have been spilled to their slots
            _ => {
                let offset = self.slot_of(value)?;
                let addr = self.memory_operand(offset)?;
                self.asm.write_inst("lw", &[reg, &addr])?;
            }
        }
        Ok(())
    }

    fn save_value_from_reg(&mut self, value: Value, reg: &str) -> Result<()> {
        let offset = self.slot_of(value)?;
        let addr = self.memory_operand(offset)?;
        self.asm.write_inst("sw", &[reg, &addr])?;
        Ok(())
    }

    /// Memory operand for the word `ptr` points to. `reg` may be used to
    /// hold the address.
    fn memory_ref(&mut self, ptr: Value, reg: &str) -> Result<String> {
        if !ptr.is_global() {
            if let ValueKind::Alloc(_) = self.func.dfg().value(ptr).kind() {
                let offset = self.slot_of(ptr)?;
                return self.memory_operand(offset);
            }
        }
        self.load_value_to_reg(ptr, reg)?;
        Ok(format!("0({})", reg))
    }

    fn generate_instruction(&mut self, value: Value) -> Result<()> {
        let func = self.func;
        match func.dfg().value(value).kind() {
            ValueKind::Alloc(_) => {
                // Slot assigned by the frame layout
            }

            ValueKind::Load(load) => {
                let addr = self.memory_ref(load.src(), "t0")?;
                self.asm.write_inst("lw", &["t0", &addr])?;
                self.save_value_from_reg(value, "t0")?;
            }

            ValueKind::Store(store) => {
                self.load_value_to_reg(store.value(), "t0")?;
                let addr = self.memory_ref(store.dest(), "t1")?;
                self.asm.write_inst("sw", &["t0", &addr])?;
            }

            ValueKind::GetElemPtr(gep) => {
                let stride = element_stride(&self.value_type(gep.src()), true)?;
                self.generate_pointer_offset(value, gep.src(), gep.index(), stride)?;
            }

            ValueKind::GetPtr(gp) => {
                let stride = element_stride(&self.value_type(gp.src()), false)?;
                self.generate_pointer_offset(value, gp.src(), gp.index(), stride)?;
            }

            ValueKind::Binary(bin) => {
                self.load_value_to_reg(bin.lhs(), "t0")?;
                self.load_value_to_reg(bin.rhs(), "t1")?;
                match bin.op() {
                    KoopaBinaryOp::Le => {
                        self.asm.write_inst("sgt", &["t0", "t0", "t1"])?; // t0 = (lhs > rhs)
                        self.asm.write_inst("seqz", &["t0", "t0"])?; // t0 = !(lhs > rhs)
                    }
                    KoopaBinaryOp::Ge => {
                        self.asm.write_inst("slt", &["t0", "t0", "t1"])?;
                        self.asm.write_inst("seqz", &["t0", "t0"])?;
                    }
                    KoopaBinaryOp::Eq => {
                        self.asm.write_inst("xor", &["t0", "t0", "t1"])?;
                        self.asm.write_inst("seqz", &["t0", "t0"])?;
                    }
                    KoopaBinaryOp::NotEq => {
                        self.asm.write_inst("xor", &["t0", "t0", "t1"])?;
                        self.asm.write_inst("snez", &["t0", "t0"])?;
                    }
                    op => {
                        let mnemonic = map_binary_op(op)
                            .ok_or_else(|| CodegenError::Unsupported(format!("binary op {:?}", op)))?;
                        self.asm.write_inst(mnemonic, &["t0", "t0", "t1"])?;
                    }
                }
                self.save_value_from_reg(value, "t0")?;
            }

            ValueKind::Call(call) => {
                // Load arguments into regs or stack
                for (i, &arg) in call.args().iter().enumerate() {
                    if i < ARG_REGS {
                        self.load_value_to_reg(arg, &format!("a{}", i))?;
                    } else {
                        self.load_value_to_reg(arg, "t0")?;
                        let addr = self.memory_operand((i - ARG_REGS) as i32 * WORD_SIZE)?;
                        self.asm.write_inst("sw", &["t0", &addr])?;
                    }
                }

                let callee = self.program.func(call.callee()).name().trim_start_matches('@');
                self.asm.write_inst("call", &[callee])?;

                // Save return value if there is one
                if !self.value_type(value).is_unit() {
                    self.save_value_from_reg(value, "a0")?;
                }
            }

            ValueKind::Branch(branch) => {
                self.load_value_to_reg(branch.cond(), "t0")?;
                let true_label = self.label(branch.true_bb())?;
                let false_label = self.label(branch.false_bb())?;
                self.asm.write_inst("bnez", &["t0", &true_label])?;
                self.asm.write_inst("j", &[&false_label])?;
            }

            ValueKind::Jump(jump) => {
                let target = self.label(jump.target())?;
                self.asm.write_inst("j", &[&target])?;
            }

            ValueKind::Return(ret) => {
                // Load return value into a0 if exists
                if let Some(ret_value) = ret.value() {
                    self.load_value_to_reg(ret_value, "a0")?;
                }
                self.generate_epilogue()?;
            }

            _ => {
                return Err(CodegenError::Unsupported(format!(
                    "instruction of type `{}` in {}",
                    func.dfg().value(value).ty(),
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// `value = src + index * stride`
    fn generate_pointer_offset(&mut self, value: Value, src: Value, index: Value, stride: usize) -> Result<()> {
        self.load_value_to_reg(src, "t0")?;
        let func = self.func;
        match func.dfg().value(index).kind() {
            // Constant indices are folded into an immediate
            ValueKind::Integer(int) => {
                let offset = int.value().wrapping_mul(stride as i32);
                if offset != 0 && fits_imm12(offset) {
                    self.asm.write_inst("addi", &["t0", "t0", &offset.to_string()])?;
                } else if offset != 0 {
                    self.load_imm("t1", offset)?;
                    self.asm.write_inst("add", &["t0", "t0", "t1"])?;
                }
            }
            _ => {
                self.load_value_to_reg(index, "t1")?;
                if stride.is_power_of_two() {
                    let shift = stride.trailing_zeros();
                    if shift > 0 {
                        self.asm.write_inst("slli", &["t1", "t1", &shift.to_string()])?;
                    }
                } else {
                    self.load_imm("t2", stride as i32)?;
                    self.asm.write_inst("mul", &["t1", "t1", "t2"])?;
                }
                self.asm.write_inst("add", &["t0", "t0", "t1"])?;
            }
        }
        self.save_value_from_reg(value, "t0")
    }
}

/// Byte distance between consecutive targets of a pointer step.
/// `getelemptr` on `*[T, n]` steps by `T`, `getptr` on `*T` steps by `T`.
fn element_stride(ptr_type: &Type, into_array: bool) -> Result<usize> {
    let TypeKind::Pointer(base) = ptr_type.kind() else {
        return Err(CodegenError::Unsupported(format!(
            "pointer arithmetic on `{}`",
            ptr_type
        )));
    };
    if !into_array {
        return Ok(base.size());
    }
    match base.kind() {
        TypeKind::Array(elem, _) => Ok(elem.size()),
        _ => Err(CodegenError::Unsupported(format!(
            "getelemptr on `{}`",
            ptr_type
        ))),
    }
}

fn map_binary_op(op: KoopaBinaryOp) -> Option<&'static str> {
    match op {
        // All instructions are in the format `op rd, rs1, rs2`
        KoopaBinaryOp::Add => Some("add"),
        KoopaBinaryOp::Sub => Some("sub"),
        KoopaBinaryOp::Mul => Some("mul"),
        KoopaBinaryOp::Div => Some("div"),
        KoopaBinaryOp::Mod => Some("rem"),
        KoopaBinaryOp::And => Some("and"),
        KoopaBinaryOp::Or => Some("or"),
        KoopaBinaryOp::Xor => Some("xor"),
        KoopaBinaryOp::Lt => Some("slt"),
        KoopaBinaryOp::Gt => Some("sgt"),
        KoopaBinaryOp::Shl => Some("sll"),
        KoopaBinaryOp::Shr => Some("srl"),
        KoopaBinaryOp::Sar => Some("sra"),
        KoopaBinaryOp::Eq | KoopaBinaryOp::NotEq | KoopaBinaryOp::Ge | KoopaBinaryOp::Le => None,
    }
}
