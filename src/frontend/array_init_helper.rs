use koopa::ir::builder_traits::*;
use koopa::ir::{Type, Value};

use crate::ast::{Expr, InitVal};
use crate::frontend::error::{LowerError, Result};
use crate::frontend::koopa_context::KoopaContext;

/// Builds a Koopa array type bottom up
/// Input: base_type=i32, dims=[2, 3] -> Output: [[i32, 3], 2]
pub fn build_array_type(base_type: Type, dims: &[usize]) -> Type {
    let mut current_type = base_type;
    for &dim in dims.iter().rev() {
        current_type = Type::get_array(current_type, dim);
    }
    current_type
}

/// Helper struct to handle array initialization logic
pub struct ArrayInitHelper<'s> {
    shape: &'s [usize], // Array dimensions [2, 3, 4]
    flat_size: usize,   // Total number of elements 24
}

impl<'s> ArrayInitHelper<'s> {
    pub fn new(shape: &'s [usize]) -> Self {
        let flat_size = shape.iter().product();
        Self { shape, flat_size }
    }

    pub fn flat_size(&self) -> usize {
        self.flat_size
    }

    /// Flattens a brace initializer into `flat_size` row-major slots.
    /// `None` marks a slot that is zero-filled.
    ///
    /// int arr[2][3][4] = {1, 2, 3, 4, {5}, {6}, {7, 8}};
    /// flattens to
    /// [1, 2, 3, 4, 5, 0, 0, 0, 6, 0, 0, 0, 7, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
    pub fn flatten_init_list<'e>(&self, items: &'e [InitVal]) -> Result<Vec<Option<&'e Expr>>> {
        let mut flat = Vec::with_capacity(self.flat_size);
        Self::fill(items, self.shape, &mut flat)?;
        Ok(flat)
    }

    /// Fills one aggregate of shape `dims` starting at the end of `out`.
    /// A nested brace list covers the largest trailing sub-aggregate that is
    /// aligned at the current position.
    fn fill<'e>(items: &'e [InitVal], dims: &[usize], out: &mut Vec<Option<&'e Expr>>) -> Result<()> {
        let total: usize = dims.iter().product();
        let start = out.len();
        for item in items {
            let pos = out.len() - start;
            if pos >= total {
                return Err(LowerError::Malformed(
                    "excess elements in array initializer".to_string(),
                ));
            }
            match item {
                InitVal::Expr(expr) => out.push(Some(expr)),
                InitVal::List(sub_items) => {
                    let sub_dims = (1..dims.len())
                        .map(|k| &dims[k..])
                        .find(|sub| pos % sub.iter().product::<usize>() == 0)
                        .ok_or_else(|| {
                            LowerError::Malformed(
                                "brace initializer is not aligned to a sub-array".to_string(),
                            )
                        })?;
                    Self::fill(sub_items, sub_dims, out)?;
                }
            }
        }
        out.resize(start + total, None);
        Ok(())
    }

    /// Generate aggregate initializer for global arrays
    pub fn generate_global_init(&self, ctx: &mut KoopaContext, flat_values: &[i32]) -> Value {
        if flat_values.iter().all(|&v| v == 0) {
            let array_type = build_array_type(Type::get_i32(), self.shape);
            return ctx.new_global_value().zero_init(array_type);
        }
        Self::build_aggregate(ctx, self.shape, flat_values)
    }

    /// Folds `values` into nested aggregates following `dims`
    fn build_aggregate(ctx: &mut KoopaContext, dims: &[usize], values: &[i32]) -> Value {
        let elems = if dims.len() == 1 {
            values
                .iter()
                .map(|&v| ctx.new_global_value().integer(v))
                .collect()
        } else {
            let stride: usize = dims[1..].iter().product();
            values
                .chunks(stride)
                .map(|chunk| Self::build_aggregate(ctx, &dims[1..], chunk))
                .collect()
        };
        ctx.new_global_value().aggregate(elems)
    }

    /// Generate store instructions for local array initialization
    pub fn generate_local_init(&self, ctx: &mut KoopaContext, alloc_ptr: Value, flat_values: &[Value]) {
        for (i, &val) in flat_values.iter().enumerate() {
            // SysY requires the elements not explicitly initialized to be
            // zero, so zeros are stored too.
            // shape=[2, 3], i=3 -> indices=[1, 0]
            let mut idx = i;
            let mut ptr = alloc_ptr;
            for dim_idx in 0..self.shape.len() {
                let stride: usize = self.shape[dim_idx + 1..].iter().product();
                let current_idx = idx / stride;
                idx %= stride;

                let idx_val = ctx.integer(current_idx as i32);
                ptr = ctx.new_value().get_elem_ptr(ptr, idx_val);
                ctx.add_inst(ptr);
            }

            let store = ctx.new_value().store(val, ptr);
            ctx.add_inst(store);
        }
    }
}
