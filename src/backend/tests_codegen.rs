use koopa::ir::builder_traits::*;
use koopa::ir::{FunctionData, Program, Type};

use crate::backend::{CodegenError, generate_assembly, parse_ir};
use crate::test_utils::{init_logger, riscv};

#[test]
fn test_minimal_main() {
    let asm = riscv("int main() { return 0; }");
    assert_eq!(
        asm,
        "  .text\n  .globl main\nmain:\n.Lmain_entry_0:\n  li a0, 0\n  ret\n\n"
    );
}

#[test]
fn test_large_literal_uses_lui() {
    let asm = riscv("int main() { return 2048; }");
    assert!(asm.contains("  lui a0, 1\n  addi a0, a0, -2048\n"), "{}", asm);

    let asm = riscv("int main() { return 4096; }");
    assert!(asm.contains("  lui a0, 1\n  ret\n"), "{}", asm);

    let asm = riscv("int main() { return 2047; }");
    assert!(asm.contains("  li a0, 2047\n"), "{}", asm);
    assert!(!asm.contains("lui"), "{}", asm);
}

#[test]
fn test_large_frame_goes_through_scratch_register() {
    let src = r#"
int main() {
    int a[1000];
    int b = 1;
    a[999] = b;
    return a[999];
}
"#;
    let asm = riscv(src);
    assert!(asm.contains("  add sp, sp, t6\n"), "{}", asm);
    // `b` lives beyond the 12-bit offset range
    assert!(asm.contains("  add t6, sp, t6\n"), "{}", asm);
    assert!(!asm.contains("addi sp, sp, -4"), "{}", asm);
}

#[test]
fn test_global_data_section() {
    let src = r#"
int g = 3;
int z[4];
int m[4] = {1, 0, 0, 2};

int main() {
    g = 5;
    return g + z[1] + m[3];
}
"#;
    let asm = riscv(src);
    assert!(asm.starts_with("  .data\n"), "{}", asm);
    assert!(asm.contains("  .globl g\n  .align 2\ng:\n  .word 3\n"), "{}", asm);
    assert!(asm.contains("z:\n  .zero 16\n"), "{}", asm);
    assert!(
        asm.contains("m:\n  .word 1\n  .zero 8\n  .word 2\n"),
        "{}",
        asm
    );
    assert!(asm.contains("  la t1, g\n  sw t0, 0(t1)\n"), "{}", asm);
}

#[test]
fn test_return_address_saved_only_when_calling() {
    let src = r#"
int leaf(int x) {
    return x + 1;
}

int main() {
    return leaf(1);
}
"#;
    let asm = riscv(src);
    let (leaf, main) = asm.split_once("  .globl main").unwrap();
    assert!(!leaf.contains("ra,"), "{}", leaf);
    assert!(main.contains("  sw ra, "), "{}", main);
    assert!(main.contains("  lw ra, "), "{}", main);
    assert!(main.contains("  call leaf\n"), "{}", main);
}

#[test]
fn test_stack_arguments() {
    let src = r#"
int f(int a, int b, int c, int d, int e, int f, int g, int h, int i, int j) {
    return i + j;
}

int main() {
    return f(1, 2, 3, 4, 5, 6, 7, 8, 9, 10);
}
"#;
    let asm = riscv(src);
    assert!(asm.contains("  li t0, 9\n  sw t0, 0(sp)\n"), "{}", asm);
    assert!(asm.contains("  li t0, 10\n  sw t0, 4(sp)\n"), "{}", asm);
    assert!(asm.contains("  li a7, 8\n"), "{}", asm);
    // Register arguments are stored to their slots on entry
    assert!(asm.contains("  sw a7, "), "{}", asm);
}

#[test]
fn test_comparison_selection() {
    let src = r#"
int main() {
    int a = getint();
    int b = getint();
    return (a <= b) + (a >= b) + (a == b) + (a != b) + (a < b) + (a > b);
}
"#;
    let asm = riscv(src);
    assert!(asm.contains("  sgt t0, t0, t1\n  seqz t0, t0\n"), "{}", asm);
    assert!(asm.contains("  slt t0, t0, t1\n  seqz t0, t0\n"), "{}", asm);
    assert!(asm.contains("  xor t0, t0, t1\n  seqz t0, t0\n"), "{}", asm);
    assert!(asm.contains("  xor t0, t0, t1\n  snez t0, t0\n"), "{}", asm);
}

#[test]
fn test_arithmetic_selection() {
    let src = r#"
int main() {
    int a = getint();
    return a * 3 / 2 % 5 - 1;
}
"#;
    let asm = riscv(src);
    for op in ["mul", "div", "rem", "sub"] {
        assert!(asm.contains(&format!("  {} t0, t0, t1\n", op)), "{}: {}", op, asm);
    }
}

#[test]
fn test_element_address_scaling() {
    let src = r#"
int main() {
    int a[3][5];
    int i = getint();
    int j = getint();
    a[i][j] = 1;
    a[2][4] = 2;
    return a[i][j];
}
"#;
    let asm = riscv(src);
    // Row stride is 20 bytes, element stride 4 bytes
    assert!(asm.contains("  li t2, 20\n  mul t1, t1, t2\n"), "{}", asm);
    assert!(asm.contains("  slli t1, t1, 2\n"), "{}", asm);
    // Constant indices fold into an immediate
    assert!(asm.contains("  addi t0, t0, 40\n"), "{}", asm);
    assert!(asm.contains("  addi t0, t0, 16\n"), "{}", asm);
}

#[test]
fn test_branch_labels() {
    let src = r#"
int main() {
    int a = getint();
    if (a) {
        a = 2;
    } else {
        a = 3;
    }
    while (a) a = a - 1;
    return a;
}
"#;
    let asm = riscv(src);
    assert!(asm.contains("  bnez t0, .Lmain_then_"), "{}", asm);
    assert!(asm.contains("  j .Lmain_else_"), "{}", asm);
    assert!(asm.contains("  j .Lmain_while_cond_"), "{}", asm);
    assert!(asm.contains("\n.Lmain_while_end_"), "{}", asm);
}

#[test]
fn test_codegen_is_idempotent() {
    let src = r#"
int g[2][2] = {{1}, {2, 3}};
int f(int a[], int n) { if (n) return a[n - 1]; return 0; }
int main() { return f(g[1], 2) && f(g[0], 1); }
"#;
    assert_eq!(riscv(src), riscv(src));

    let ir = crate::test_utils::koopa(src);
    let program = parse_ir(&ir).unwrap();
    assert_eq!(
        generate_assembly(&program).unwrap(),
        generate_assembly(&program).unwrap()
    );
}

#[test]
fn test_unterminated_block_is_rejected() {
    init_logger();
    let mut program = Program::new();
    let func = program.new_func(FunctionData::new("@f".into(), Vec::new(), Type::get_i32()));
    let func_data = program.func_mut(func);
    let entry = func_data
        .dfg_mut()
        .new_bb()
        .basic_block(Some("%entry".into()));
    func_data.layout_mut().bbs_mut().push_key_back(entry).unwrap();

    let err = generate_assembly(&program).unwrap_err();
    assert!(matches!(err, CodegenError::UnterminatedBlock(_)), "{:?}", err);
}

#[test]
fn test_malformed_ir_text_is_rejected() {
    init_logger();
    let Err(err) = parse_ir("decl @getint(): i32\n\nfun @main(): i32 {") else {
        panic!("truncated IR was accepted");
    };
    match err {
        CodegenError::IrParse(message) => {
            assert!(message.contains("[@main]"), "{}", message);
            assert!(message.contains("stderr"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

/// Returns the lines of `asm` between `label` and the next blank line
fn function_body<'a>(asm: &'a str, label: &str) -> Vec<&'a str> {
    asm.lines()
        .skip_while(|line| *line != label)
        .skip(1)
        .take_while(|line| !line.is_empty())
        .collect()
}

#[test]
fn test_call_and_callee_bodies() {
    let src = r#"
int add(int a, int b) {
    return a + b;
}

int main() {
    return add(2, 3);
}
"#;
    let asm = riscv(src);
    // Home slots at 0 and 4, allocs at 8 and 12, temporaries from 16
    assert_eq!(
        function_body(&asm, "add:"),
        [
            "  addi sp, sp, -32",
            "  sw a0, 0(sp)",
            "  sw a1, 4(sp)",
            ".Ladd_entry_0:",
            "  lw t0, 0(sp)",
            "  sw t0, 8(sp)",
            "  lw t0, 4(sp)",
            "  sw t0, 12(sp)",
            "  lw t0, 8(sp)",
            "  sw t0, 16(sp)",
            "  lw t0, 12(sp)",
            "  sw t0, 20(sp)",
            "  lw t0, 16(sp)",
            "  lw t1, 20(sp)",
            "  add t0, t0, t1",
            "  sw t0, 24(sp)",
            "  lw a0, 24(sp)",
            "  addi sp, sp, 32",
            "  ret",
        ],
        "{}",
        asm
    );
    assert_eq!(
        function_body(&asm, "main:"),
        [
            "  addi sp, sp, -16",
            "  sw ra, 12(sp)",
            ".Lmain_entry_1:",
            "  li a0, 2",
            "  li a1, 3",
            "  call add",
            "  sw a0, 0(sp)",
            "  lw a0, 0(sp)",
            "  lw ra, 12(sp)",
            "  addi sp, sp, 16",
            "  ret",
        ],
        "{}",
        asm
    );
}
