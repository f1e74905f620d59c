use crate::{Error, Mode, compile};
use crate::frontend::LowerError;
use crate::test_utils::{compile_error, koopa, run, run_with_input};

#[test]
fn test_function_call_returns_sum() {
    let src = r#"
int add(int a, int b) {
    return a + b;
}

int main() {
    return add(2, 3);
}
"#;
    assert_eq!(run(src).0, 5);
}

#[test]
fn test_array_tail_is_zero_filled() {
    let src = r#"
int main() {
    int arr[3] = {1, 2};
    return arr[2] * 100 + arr[0] + arr[1];
}
"#;
    assert_eq!(run(src).0, 3);
}

#[test]
fn test_short_circuit_skips_rhs() {
    let src = r#"
int count = 0;

int inc() {
    count = count + 1;
    return 1;
}

int main() {
    if (0 && inc()) {}
    if (1 || inc()) {}
    if (1 && inc()) {}
    if (0 || inc()) {}
    return count;
}
"#;
    assert_eq!(run(src).0, 2);
}

#[test]
fn test_logical_operators_yield_booleans() {
    let src = r#"
int main() {
    int a = 5 && 7;
    int b = 0 || -3;
    int c = 0 && 1;
    return a * 100 + b * 10 + c;
}
"#;
    assert_eq!(run(src).0, 110);
}

#[test]
fn test_break_and_continue() {
    let src = r#"
int main() {
    int i = 0;
    int sum = 0;
    while (1) {
        i = i + 1;
        if (i > 10) break;
        if (i % 2 == 0) continue;
        sum = sum + i;
    }
    return sum;
}
"#;
    assert_eq!(run(src).0, 25);
}

#[test]
fn test_nested_loops_break_innermost() {
    let src = r#"
int main() {
    int i = 0;
    int n = 0;
    while (i < 3) {
        int j = 0;
        while (1) {
            if (j == 2) break;
            j = j + 1;
            n = n + 1;
        }
        i = i + 1;
    }
    return n;
}
"#;
    assert_eq!(run(src).0, 6);
}

#[test]
fn test_break_outside_loop_fails() {
    let err = compile_error("int main() { break; return 0; }");
    assert!(matches!(err, Error::Lower(LowerError::ControlFlow("break"))));

    let err = compile_error("int main() { if (1) { continue; } return 0; }");
    assert!(matches!(err, Error::Lower(LowerError::ControlFlow("continue"))));
}

#[test]
fn test_redeclaration_in_same_scope_fails() {
    let err = compile_error("int main() { int a = 1; int a = 2; return a; }");
    assert!(matches!(err, Error::Lower(LowerError::Redeclaration(name)) if name == "a"));
}

#[test]
fn test_parameter_and_body_share_a_scope() {
    let err = compile_error("int f(int a) { int a = 2; return a; } int main() { return f(1); }");
    assert!(matches!(err, Error::Lower(LowerError::Redeclaration(name)) if name == "a"));
}

#[test]
fn test_shadowing_in_nested_block() {
    let src = r#"
int main() {
    int a = 1;
    {
        int a = 2;
        a = a + 40;
    }
    return a;
}
"#;
    assert_eq!(run(src).0, 1);
}

#[test]
fn test_initializer_sees_outer_binding() {
    let src = r#"
int main() {
    int a = 3;
    {
        int a = a + 1;
        return a;
    }
}
"#;
    assert_eq!(run(src).0, 4);
}

#[test]
fn test_undefined_symbol_fails() {
    let err = compile_error("int main() { return b; }");
    assert!(matches!(err, Error::Lower(LowerError::UndefinedSymbol(name)) if name == "b"));

    let err = compile_error("int main() { return missing(); }");
    assert!(matches!(err, Error::Lower(LowerError::UndefinedSymbol(name)) if name == "missing"));
}

#[test]
fn test_type_errors() {
    let cases = [
        "const int c = 1; int main() { c = 2; return 0; }",
        "int main() { const int a[2] = {1, 2}; a[0] = 3; return 0; }",
        "void f() { return 1; } int main() { f(); return 0; }",
        "int main() { return; }",
        "int f(int a) { return a; } int main() { return f(1, 2); }",
        "void f() {} int main() { return f(); }",
        "int main() { int a = 1; return a(); }",
        "int main() { int a = 1; return a[0]; }",
        "int main() { int a[2][2]; return a[0]; }",
        "int f(int a[]) { return 0; } int main() { int x = 1; return f(x); }",
        "int main() { return main; }",
        "int main() { int a[2] = 1; return 0; }",
    ];
    for src in cases {
        let err = compile_error(src);
        assert!(
            matches!(err, Error::Lower(LowerError::TypeMismatch(_))),
            "{}: {:?}",
            src,
            err
        );
    }
}

#[test]
fn test_recursion() {
    let src = r#"
int fib(int n) {
    if (n <= 1) return n;
    return fib(n - 1) + fib(n - 2);
}

int main() {
    return fib(10);
}
"#;
    assert_eq!(run(src).0, 55);
}

#[test]
fn test_call_before_definition() {
    let src = r#"
int main() {
    return later(4);
}

int later(int x) {
    return x * x;
}
"#;
    assert_eq!(run(src).0, 16);
}

#[test]
fn test_forward_calls_reach_assembly() {
    let src = r#"
int main() {
    return twice(later(4));
}

int later(int x) {
    return x * x;
}

int twice(int x) {
    return later(x) - later(x) + x * 2;
}
"#;
    let asm = compile(src, Mode::Riscv).unwrap_or_else(|err| panic!("{}", err));
    let later = asm.find("\nlater:\n").unwrap();
    let twice = asm.find("\ntwice:\n").unwrap();
    let main = asm.find("\nmain:\n").unwrap();
    assert!(later < twice && twice < main, "{}", asm);
    assert_eq!(run(src).0, 32);
}

#[test]
fn test_mutual_recursion_fails() {
    let src = r#"
int even(int n) {
    if (n == 0) return 1;
    return odd(n - 1);
}

int odd(int n) {
    if (n == 0) return 0;
    return even(n - 1);
}

int main() {
    return even(4);
}
"#;
    for mode in [Mode::Koopa, Mode::Riscv] {
        match compile(src, mode) {
            Err(Error::Lower(LowerError::Malformed(_))) => {}
            other => panic!("expected a malformed-program error, got {:?}", other),
        }
    }
}

#[test]
fn test_body_reads_global_constant_declared_later() {
    let src = r#"
int f() {
    return N;
}

const int N = 3;

int main() {
    return f();
}
"#;
    assert_eq!(run(src).0, 3);
}

#[test]
fn test_declarations_parse_without_type_tags() {
    let ast = crate::parse("const int a = 1, b = 2; int f(int x[][4], int y) { return 0; }").unwrap();
    let [crate::ast::GlobalItem::Decl(decl), crate::ast::GlobalItem::FuncDef(func)] = &ast.items[..] else {
        panic!("unexpected items: {:?}", ast.items);
    };
    assert!(decl.is_const());
    assert_eq!(decl.defs().len(), 2);
    assert_eq!(func.params[0].dims.as_ref().map(Vec::len), Some(1));
    assert!(func.params[1].dims.is_none());
}

#[test]
fn test_two_dimensional_array_parameter() {
    let src = r#"
const int N = 3;

int sum(int a[][N], int rows) {
    int i = 0;
    int s = 0;
    while (i < rows) {
        int j = 0;
        while (j < N) {
            s = s + a[i][j];
            j = j + 1;
        }
        i = i + 1;
    }
    return s;
}

int sum_row(int r[]) {
    return r[0] + r[1] + r[2];
}

int main() {
    int m[2][3] = {{1, 2, 3}, {4, 5, 6}};
    return sum(m, 2) * 100 + sum_row(m[1]);
}
"#;
    assert_eq!(run(src).0, 2115);
}

#[test]
fn test_more_than_eight_arguments() {
    let src = r#"
int f(int a, int b, int c, int d, int e, int f, int g, int h, int i, int j) {
    return a + b + c + d + e + f + g + h + i * 100 + j * 1000;
}

int main() {
    return f(1, 2, 3, 4, 5, 6, 7, 8, 9, 10);
}
"#;
    assert_eq!(run(src).0, 36 + 900 + 10000);
}

#[test]
fn test_dead_code_after_return_is_lowered() {
    let src = r#"
int main() {
    return 1;
    return 2;
}
"#;
    assert_eq!(run(src).0, 1);
    assert!(koopa(src).contains("%unreachable"));
}

#[test]
fn test_dead_code_after_break() {
    let src = r#"
int main() {
    int i = 0;
    while (i < 5) {
        i = i + 1;
        break;
        i = i + 100;
    }
    return i;
}
"#;
    assert_eq!(run(src).0, 1);
}

#[test]
fn test_int_function_falling_off_the_end_returns_zero() {
    let src = r#"
int f() {}

int main() {
    return f() + 7;
}
"#;
    assert_eq!(run(src).0, 7);
}

#[test]
fn test_constant_expressions_fold() {
    let src = r#"
const int N = 2 + 3;
const int table[3] = {1, 2, 4};

int main() {
    int a[N * 2];
    int b[table[2]];
    return N + table[1];
}
"#;
    let ir = koopa(src);
    assert!(ir.contains("alloc [i32, 10]"), "{}", ir);
    assert!(ir.contains("alloc [i32, 4]"), "{}", ir);
    assert_eq!(run(src).0, 7);
}

#[test]
fn test_bad_constant_expressions_fail() {
    let cases = [
        "const int a = 1 / 0; int main() { return 0; }",
        "int main() { int x = 1; const int a = x; return 0; }",
        "int g = 2; int h = g + 1; int main() { return 0; }",
        "int main() { int a[0]; return 0; }",
        "int main() { int n = 2; int a[n]; return 0; }",
        "int main() { int a[2] = {1, 2, 3}; return 0; }",
    ];
    for src in cases {
        let err = compile_error(src);
        assert!(
            matches!(err, Error::Lower(LowerError::Malformed(_))),
            "{}: {:?}",
            src,
            err
        );
    }
}

#[test]
fn test_global_arrays() {
    let src = r#"
int g[2][2] = {{1}, {2, 3}};
int z[5];

int main() {
    z[1] = 4;
    return g[0][0] + g[1][1] * 10 + z[4] + z[1] * 100;
}
"#;
    assert_eq!(run(src).0, 431);
}

#[test]
fn test_global_zero_init_and_aggregate() {
    let ir = koopa("int z[5]; int g[2] = {7}; int main() { return 0; }");
    assert!(ir.contains("global @z = alloc [i32, 5], zeroinit"), "{}", ir);
    assert!(ir.contains("global @g = alloc [i32, 2], {7, 0}"), "{}", ir);
}

#[test]
fn test_local_const_array_reads_fold() {
    let src = r#"
int main() {
    const int a[2][2] = {{1, 2}, {3, 4}};
    int i = 1;
    return a[1][0] * 10 + a[i][1];
}
"#;
    assert_eq!(run(src).0, 34);
}

#[test]
fn test_runtime_library() {
    let src = r#"
int main() {
    int a[5];
    int n = getarray(a);
    putint(getint());
    putch(10);
    putarray(n, a);
    starttime();
    stoptime();
    return n;
}
"#;
    let (code, output) = run_with_input(src, &[3, 7, 8, 9, 42]);
    assert_eq!(code, 3);
    assert_eq!(output, "42\n3: 7 8 9\n");
}

#[test]
fn test_dangling_else_binds_to_nearest_if() {
    let src = r#"
int main() {
    if (0)
        if (1) return 1;
        else return 2;
    return 3;
}
"#;
    assert_eq!(run(src).0, 3);
}

#[test]
fn test_literals_comments_and_unary_operators() {
    let src = r#"
// line comment
int main() {
    /* block
       comment */
    return 0x10 + 010 + -(-3) + !0 + !5 + +1;
}
"#;
    assert_eq!(run(src).0, 16 + 8 + 3 + 1 + 1);
}

#[test]
fn test_local_names_avoid_global_names() {
    let src = r#"
int x_0 = 5;

int main() {
    int x = 1;
    return x + x_0;
}
"#;
    assert_eq!(run(src).0, 6);
}

#[test]
fn test_lowering_is_deterministic() {
    let src = r#"
int a[2][3] = {1, 2, 3};
int f(int x) { if (x) return 1; else return 2; }
int main() { int i = 0; while (i < 3) i = i + f(i); return a[0][1]; }
"#;
    assert_eq!(koopa(src), koopa(src));
}

#[test]
fn test_wrapping_arithmetic() {
    let src = r#"
const int big = 2147483647;

int main() {
    int x = big + 1;
    return x < 0;
}
"#;
    assert_eq!(run(src).0, 1);
}

#[test]
fn test_same_tree_lowers_identically() {
    let ast = crate::parse("int g[3] = {1}; int main() { return g[0] || g[1]; }").unwrap();
    let first = crate::frontend::lower_to_ir(&ast).unwrap();
    let second = crate::frontend::lower_to_ir(&ast).unwrap();
    assert_eq!(first, second);
    assert!(crate::backend::parse_ir(&first).is_ok());
}
