use koopa::ir::entities::{FunctionData, Value, ValueKind};
use koopa::ir::TypeKind;
use std::cmp::max;
use std::collections::HashMap;

use crate::backend::error::{CodegenError, Result};

pub const WORD_SIZE: i32 = 4;
/// Number of arguments passed in `a0`-`a7`
pub const ARG_REGS: usize = 8;

/// Stack frame of one function, computed before any of its code is emitted.
///
/// Layout, from high to low addresses:
///
/// ```text
/// incoming stack arguments (9th, 10th, ...)   <- caller's frame
/// saved ra (only when the function calls)     <- sp + size - 4
/// alloc slots, temporaries, spilled a0-a7
/// outgoing stack arguments (9th, 10th, ...)   <- sp + 0
/// ```
#[derive(Debug)]
pub struct FrameLayout {
    slots: HashMap<Value, i32>, // Stack offsets of allocs, temporaries and register params
    size: i32,                  // Total size of the frame, aligned to 16 bytes
    ra_offset: Option<i32>,     // Offset of the saved return address
}

impl FrameLayout {
    /// Scans every instruction of `func` and assigns stack slots.
    ///
    /// Also checks that every basic block ends with a terminator, which the
    /// emitter relies on.
    pub fn compute(func: &FunctionData) -> Result<Self> {
        let mut has_call = false;
        let mut max_call_args = 0;
        for (&bb, node) in func.layout().bbs() {
            let terminated = node.insts().back_key().is_some_and(|&last| {
                matches!(
                    func.dfg().value(last).kind(),
                    ValueKind::Branch(_) | ValueKind::Jump(_) | ValueKind::Return(_)
                )
            });
            if !terminated {
                let name = func
                    .dfg()
                    .bb(bb)
                    .name()
                    .clone()
                    .unwrap_or_else(|| "<unnamed>".to_string());
                return Err(CodegenError::UnterminatedBlock(format!("{} in {}", name, func.name())));
            }
            for &inst in node.insts().keys() {
                if let ValueKind::Call(call) = func.dfg().value(inst).kind() {
                    has_call = true;
                    max_call_args = max(max_call_args, call.args().len());
                }
            }
        }
        let ra_size = if has_call { WORD_SIZE } else { 0 };
        let call_args_size = max_call_args.saturating_sub(ARG_REGS) as i32 * WORD_SIZE;

        let mut slots = HashMap::new();
        let mut next_offset = call_args_size;
        // a0-a7 are clobbered by calls, so register params get a home slot
        for &param in func.params().iter().take(ARG_REGS) {
            slots.insert(param, next_offset);
            next_offset += WORD_SIZE;
        }
        for (_, node) in func.layout().bbs() {
            for &inst in node.insts().keys() {
                let inst_data = func.dfg().value(inst);
                let slot_size = match inst_data.kind() {
                    ValueKind::Alloc(_) => match inst_data.ty().kind() {
                        TypeKind::Pointer(base) => base.size() as i32,
                        _ => {
                            return Err(CodegenError::Unsupported(format!(
                                "alloc of non-pointer type `{}`",
                                inst_data.ty()
                            )));
                        }
                    },
                    _ if inst_data.ty().is_unit() => continue,
                    _ => WORD_SIZE,
                };
                slots.insert(inst, next_offset);
                next_offset += slot_size;
            }
        }

        let total_size = next_offset + ra_size;
        let size = (total_size + 15) & !15; // Align to 16 bytes
        Ok(Self {
            slots,
            size,
            ra_offset: has_call.then_some(size - WORD_SIZE),
        })
    }

    pub fn offset_of(&self, value: Value) -> Option<i32> {
        self.slots.get(&value).copied()
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn ra_offset(&self) -> Option<i32> {
        self.ra_offset
    }

    /// Offset from `sp` of the `index`-th argument passed on the stack by
    /// the caller (`index >= ARG_REGS`)
    pub fn incoming_arg_offset(&self, index: usize) -> i32 {
        self.size + (index - ARG_REGS) as i32 * WORD_SIZE
    }
}
