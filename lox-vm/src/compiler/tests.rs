use super::compile;
use crate::{Function, OpCode, Value, VmError};

fn compile_ok(source: &str) -> Function {
    let mut diagnostics = Vec::new();
    let function = compile(source, &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty());
    function
}

fn compile_err(source: &str) -> String {
    let mut diagnostics = Vec::new();
    let result = compile(source, &mut diagnostics);
    assert!(matches!(result, Err(VmError::CompileError)));
    String::from_utf8(diagnostics).unwrap()
}

fn ops(codes: &[OpCode]) -> Vec<u8> {
    codes.iter().map(|&code| u8::from(code)).collect()
}

#[test]
fn test_arithmetic_bytecode() {
    let function = compile_ok("print 1 + 2 * 3;");
    let mut expected = vec![
        u8::from(OpCode::Constant),
        0,
        u8::from(OpCode::Constant),
        1,
        u8::from(OpCode::Constant),
        2,
    ];
    expected.extend(ops(&[
        OpCode::Multiply,
        OpCode::Add,
        OpCode::Print,
        OpCode::Nil,
        OpCode::Return,
    ]));
    assert_eq!(function.chunk.code, expected);
    assert_eq!(function.arity, 0);
    assert!(function.name.is_none());
}

#[test]
fn test_comparison_lowering() {
    let function = compile_ok("true != false;");
    assert_eq!(
        function.chunk.code,
        ops(&[
            OpCode::True,
            OpCode::False,
            OpCode::Equal,
            OpCode::Not,
            OpCode::Pop,
            OpCode::Nil,
            OpCode::Return,
        ])
    );

    let function = compile_ok("nil <= nil;");
    assert_eq!(
        &function.chunk.code[2..4],
        ops(&[OpCode::Greater, OpCode::Not]).as_slice()
    );
}

#[test]
fn test_locals_are_popped_at_scope_end() {
    let function = compile_ok("{ var a = 1; print a; }");
    assert_eq!(
        function.chunk.code,
        vec![
            u8::from(OpCode::Constant),
            0,
            u8::from(OpCode::GetLocal),
            1,
            u8::from(OpCode::Print),
            u8::from(OpCode::Pop),
            u8::from(OpCode::Nil),
            u8::from(OpCode::Return),
        ]
    );
}

#[test]
fn test_globals_use_name_constants() {
    let function = compile_ok("var answer = 42;");
    assert_eq!(function.chunk.code[..4], [
        u8::from(OpCode::Constant),
        1,
        u8::from(OpCode::DefineGlobal),
        0,
    ]);
    assert_eq!(function.chunk.constants()[0].to_string(), "answer");
    assert_eq!(function.chunk.constants()[1], Value::Number(42.0));
}

#[test]
fn test_lines_follow_tokens() {
    let function = compile_ok("print 1;\n\nprint 2;");
    assert_eq!(function.chunk.line(0), 1);
    assert_eq!(function.chunk.line(3), 3);
}

#[test]
fn test_function_declaration() {
    let function = compile_ok("fun add(a, b) { return a + b; }");
    let declared = function
        .chunk
        .constants()
        .iter()
        .find_map(|constant| constant.as_function())
        .unwrap();
    assert_eq!(declared.arity, 2);
    assert_eq!(declared.name.as_deref(), Some("add"));
    assert_eq!(declared.to_string(), "<fn add>");
    assert_eq!(
        declared.chunk.code,
        vec![
            u8::from(OpCode::GetLocal),
            1,
            u8::from(OpCode::GetLocal),
            2,
            u8::from(OpCode::Add),
            u8::from(OpCode::Return),
            u8::from(OpCode::Nil),
            u8::from(OpCode::Return),
        ]
    );
}

#[test]
fn test_missing_semicolon() {
    assert_eq!(
        compile_err("print 1"),
        "[line 1] Error at end: Expect ';' after value.\n"
    );
}

#[test]
fn test_own_initializer() {
    assert_eq!(
        compile_err("{ var a = a; }"),
        "[line 1] Error at 'a': Can't read local variable in its own initializer.\n"
    );
}

#[test]
fn test_duplicate_local() {
    assert_eq!(
        compile_err("{\n  var a = 1;\n  var a = 2;\n}"),
        "[line 3] Error at 'a': Already a variable with this name in this scope.\n"
    );
    // Globals may be redeclared.
    compile_ok("var a = 1; var a = 2;");
}

#[test]
fn test_invalid_assignment_target() {
    assert_eq!(
        compile_err("var a; var b; var c; a + b = c;"),
        "[line 1] Error at '=': Invalid assignment target.\n"
    );
}

#[test]
fn test_return_from_top_level() {
    assert_eq!(
        compile_err("return 1;"),
        "[line 1] Error at 'return': Can't return from top-level code.\n"
    );
}

#[test]
fn test_scanner_error() {
    assert_eq!(
        compile_err("print @;"),
        "[line 1] Error: Unexpected character.\n"
    );
}

#[test]
fn test_recovers_at_statement_boundary() {
    assert_eq!(
        compile_err("print ;\nprint ;\nprint 1;"),
        "[line 1] Error at ';': Expect expression.\n\
         [line 2] Error at ';': Expect expression.\n"
    );
}

#[test]
fn test_too_many_constants() {
    let source: String = (0..=256).map(|i| format!("print {i};")).collect();
    assert_eq!(
        compile_err(&source),
        "[line 1] Error at '256': Too many constants in one chunk.\n"
    );
}

#[test]
fn test_too_many_locals() {
    let declarations: String = (0..256).map(|i| format!("var a{i};")).collect();
    let source = format!("{{ {declarations} }}");
    assert_eq!(
        compile_err(&source),
        "[line 1] Error at 'a255': Too many local variables in function.\n"
    );
}

#[test]
fn test_too_many_parameters() {
    let params: Vec<String> = (0..256).map(|i| format!("p{i}")).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));
    assert!(
        compile_err(&source)
            .starts_with("[line 1] Error at 'p255': Can't have more than 255 parameters.\n")
    );
}

#[test]
fn test_jump_too_large() {
    let body = "nil;".repeat(33_000);
    let source = format!("if (true) {{ {body} }}");
    assert!(compile_err(&source).contains("Too much code to jump over."));
}

#[test]
fn test_loop_too_large() {
    let body = "nil;".repeat(33_000);
    let source = format!("while (false) {{ {body} }}");
    assert!(compile_err(&source).starts_with("[line 1] Error at '}': Loop body too large.\n"));
}
