//! End-to-end compilation scenarios
//!
//! Each test builds a small program's syntax tree, compiles it, and checks
//! diagnostics and emitted bytecode.

mod common;

use common::*;
use sola_engine::ast::*;
use sola_engine::{
    deserialize_from_bytes, disassemble, serialize_to_bytes, Compiler, CompilerOptions, Function,
    Opcode, Value,
};

fn function_constant<'f>(main: &'f Function, name: &str) -> &'f Function {
    main.chunk
        .constants
        .iter()
        .find_map(|c| match c {
            Value::Function(f) if f.name == name => Some(f.as_ref()),
            _ => None,
        })
        .expect("function constant")
}

#[test]
fn test_folded_global_declaration() {
    // var $x: int = 1 + 2 * 3;
    let init = bin(
        BinaryOp::Add,
        int(1, 1, 15),
        bin(BinaryOp::Mul, int(2, 1, 19), int(3, 1, 23)),
    );
    let f = file(vec![Statement::VarDecl(VarDecl::new(
        "x",
        Some(TypeNode::simple("int")),
        Some(init),
        pos(1, 1),
    ))]);

    let (main, diagnostics) = Compiler::new().compile_file(&f);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let ops = main.chunk.opcodes();
    assert_eq!(&ops[..3], &[Opcode::Push, Opcode::StoreGlobal, Opcode::Pop]);
    assert_eq!(main.chunk.constants[0], Value::Int(7));
    let name = main.chunk.read_u16(4).unwrap() as usize;
    assert_eq!(main.chunk.constants[name], Value::string("x"));
    assert_eq!(ops.iter().filter(|op| **op == Opcode::Mul).count(), 0);

    let listing = disassemble(&main);
    assert!(listing.contains("STORE_GLOBAL"), "{}", listing);
}

#[test]
fn test_assignment_type_mismatch() {
    // var $a: string = 1;
    let literal = int(1, 1, 18);
    let f = file(vec![Statement::VarDecl(VarDecl::new(
        "a",
        Some(TypeNode::simple("string")),
        Some(literal),
        pos(1, 1),
    ))]);

    let (main, diagnostics) = Compiler::new().compile_file(&f);
    assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics);
    assert_eq!(diagnostics[0].message, "cannot assign int to variable of type string");
    assert_eq!(diagnostics[0].pos, pos(1, 18));
    assert!(diagnostics[0].is_error());
    assert!(main.chunk.opcodes().contains(&Opcode::StoreGlobal));
}

#[test]
fn test_default_parameter_call() {
    // function f(int $a, int $b = 10): int { return $a + $b; }
    // f(1);
    let decl = Statement::Function(FunctionDecl {
        name: "f".into(),
        type_params: Vec::new(),
        params: vec![
            typed_param("a", "int", None),
            typed_param("b", "int", Some(int(10, 1, 30))),
        ],
        return_type: Some(TypeNode::simple("int")),
        body: vec![Statement::Return(ReturnStmt {
            values: vec![bin(BinaryOp::Add, var("a", 1, 48), var("b", 1, 53))],
            pos: pos(1, 41),
        })],
        pos: pos(1, 1),
    });
    let call = Statement::expr(Expression::call(
        Expression::ident("f", pos(2, 1)),
        vec![Argument::positional(int(1, 2, 3))],
        pos(2, 1),
    ));

    let (main, diagnostics) = Compiler::new().compile_file(&file(vec![decl, call]));
    assert!(diagnostics.iter().all(|d| !d.is_error()), "{:?}", diagnostics);

    let f = function_constant(&main, "f");
    assert_eq!(f.arity, 2);
    assert_eq!(f.min_arity, 1);
    assert_eq!(f.default_values, vec![Value::Int(10)]);

    // PUSH f, STORE_GLOBAL "f", POP, then the call
    let code = &main.chunk.code;
    let call_at = 3 + 3 + 1;
    assert_eq!(code[call_at], Opcode::LoadGlobal as u8);
    let callee = main.chunk.read_u16(call_at + 1).unwrap() as usize;
    assert_eq!(main.chunk.constants[callee], Value::string("f"));
    assert_eq!(code[call_at + 3], Opcode::Push as u8);
    let arg = main.chunk.read_u16(call_at + 4).unwrap() as usize;
    assert_eq!(main.chunk.constants[arg], Value::Int(1));
    assert_eq!(code[call_at + 6], Opcode::Call as u8);
    assert_eq!(code[call_at + 7], 1);
}

#[test]
fn test_non_exhaustive_enum_switch() {
    let mut f = file(Vec::new());
    f.declarations.push(Declaration::Enum(EnumDecl {
        name: "Colour".into(),
        members: vec!["Red".into(), "Green".into(), "Blue".into()],
        pos: pos(1, 1),
    }));
    let member = |name: &str, line: u32| {
        Expression::StaticProperty(StaticPropertyExpr {
            class: "Colour".into(),
            property: name.into(),
            pos: pos(line, 6),
        })
    };
    let case = |name: &str, line: u32| SwitchCase {
        value: member(name, line),
        body: vec![Statement::Break(pos(line, 20))],
        pos: pos(line, 1),
    };
    f.statements = vec![
        Statement::VarDecl(VarDecl::new(
            "colour",
            Some(TypeNode::class("Colour")),
            Some(member("Red", 2)),
            pos(2, 1),
        )),
        Statement::Switch(SwitchStmt {
            subject: var("colour", 3, 8),
            cases: vec![case("Red", 4), case("Green", 5)],
            default: None,
            pos: pos(3, 1),
        }),
    ];

    let (_, diagnostics) = Compiler::new().compile_file(&f);
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert_eq!(errors.len(), 1, "{:?}", diagnostics);
    assert_eq!(errors[0].message, "switch over Colour is not exhaustive, missing: Blue");
    assert_eq!(errors[0].pos, pos(3, 8));
}

/// `var $a = 1; var $b = 2;` then
/// `for (var $i = 0; $i < 100; $i = $i + 1) { var $x = $a + $b; }`
fn invariant_loop() -> File {
    let increment = Expression::assign(
        var("i", 3, 29),
        bin(BinaryOp::Add, var("i", 3, 34), int(1, 3, 39)),
        pos(3, 29),
    );
    file(vec![
        Statement::VarDecl(VarDecl::new("a", None, Some(int(1, 1, 10)), pos(1, 1))),
        Statement::VarDecl(VarDecl::new("b", None, Some(int(2, 2, 10)), pos(2, 1))),
        Statement::For(ForStmt {
            init: Some(Box::new(Statement::VarDecl(VarDecl::new(
                "i",
                None,
                Some(int(0, 3, 15)),
                pos(3, 6),
            )))),
            condition: Some(bin(BinaryOp::Lt, var("i", 3, 18), int(100, 3, 23))),
            update: Some(increment),
            body: vec![Statement::VarDecl(VarDecl::new(
                "x",
                None,
                Some(bin(BinaryOp::Add, var("a", 4, 14), var("b", 4, 19))),
                pos(4, 5),
            ))],
            pos: pos(3, 1),
        }),
    ])
}

#[test]
fn test_loop_invariant_hoisted() {
    let (main, diagnostics) = Compiler::new().compile_file(&invariant_loop());
    assert!(diagnostics.iter().all(|d| !d.is_error()), "{:?}", diagnostics);

    let ops = main.chunk.opcodes();
    let loop_entry = ops.iter().position(|op| *op == Opcode::Jump).unwrap();
    let adds = |range: &[Opcode]| range.iter().filter(|op| **op == Opcode::Add).count();
    // `$a + $b` before the loop; only the counter update adds inside it
    assert_eq!(adds(&ops[..loop_entry]), 1);
    assert_eq!(adds(&ops), 2);
    assert!(ops[..loop_entry].contains(&Opcode::LoadGlobal));

    let plain = Compiler::with_options(CompilerOptions {
        licm: false,
        ..CompilerOptions::default()
    })
    .compile_file(&invariant_loop())
    .0;
    let ops = plain.chunk.opcodes();
    let loop_entry = ops.iter().position(|op| *op == Opcode::Jump).unwrap();
    assert_eq!(adds(&ops[..loop_entry]), 0);
    assert_eq!(adds(&ops), 2);
}

#[test]
fn test_unit_survives_serialisation() {
    let mut compiler = Compiler::new();
    let (unit, _) = compiler.compile_unit(&invariant_loop());
    let bytes = serialize_to_bytes(&unit).unwrap();
    assert_eq!(&bytes[..4], b"SOLA");
    assert_eq!(deserialize_from_bytes(&bytes).unwrap(), unit);
}
