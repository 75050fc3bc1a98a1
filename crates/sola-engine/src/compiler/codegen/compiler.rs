//! Single-file compiler: bind, check, emit

use crate::compiler::bytecode::{ClassDef, CompiledUnit, EnumDef, Function};
use crate::config::CompilerOptions;
use crate::parser::ast::File;
use crate::parser::checker::{
    collect_diagnostics, Binder, Diagnostic, SymbolTable, TypeChecker,
};

use super::Emitter;

/// Compiles files against a symbol table that accumulates the declarations
/// of every file bound or compiled so far.
pub struct Compiler {
    options: CompilerOptions,
    symbols: SymbolTable,
    classes: Vec<ClassDef>,
    enums: Vec<EnumDef>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    pub fn with_options(options: CompilerOptions) -> Self {
        Self {
            options,
            symbols: SymbolTable::new(),
            classes: Vec::new(),
            enums: Vec::new(),
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Make an imported file's declarations visible to later compilations
    pub fn bind_dependency(&mut self, file: &File) {
        Binder::new(&mut self.symbols).bind_dependency(file);
    }

    /// Compile one file to its main function.
    ///
    /// Diagnostics from checking and emission come back together, sorted by
    /// position. The function is produced even when errors were reported.
    pub fn compile_file(&mut self, file: &File) -> (Function, Vec<Diagnostic>) {
        Binder::new(&mut self.symbols).bind_file(file);
        let checked = TypeChecker::new(&self.symbols).check_file(file);

        let mut emitter = Emitter::new(&self.symbols, &checked.expr_types, &self.options, &file.path);
        let main = emitter.emit_file(file);
        let Emitter {
            errors: emit_errors,
            classes,
            enums,
            ..
        } = emitter;

        let mut errors = checked.errors;
        errors.extend(emit_errors);
        let diagnostics = collect_diagnostics(&errors, &checked.warnings, &self.options.warnings);
        log::debug!(
            "compiled {}: {} bytes, {} classes, {} diagnostics",
            file.path,
            main.chunk.len(),
            classes.len(),
            diagnostics.len()
        );

        self.classes = classes;
        self.enums = enums;
        (main, diagnostics)
    }

    /// Compile one file to a unit holding its main function, classes and
    /// enums
    pub fn compile_unit(&mut self, file: &File) -> (CompiledUnit, Vec<Diagnostic>) {
        let (main_function, diagnostics) = self.compile_file(file);
        let unit = CompiledUnit {
            main_function,
            classes: self.classes.clone(),
            enums: self.enums.clone(),
            source_file: file.path.clone(),
        };
        (unit, diagnostics)
    }

    /// Classes of the last compiled file
    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    /// Enums of the last compiled file
    pub fn enums(&self) -> &[EnumDef] {
        &self.enums
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::{instruction_len, Opcode, Value};
    use crate::parser::ast::*;
    use crate::parser::checker::Severity;

    fn pos() -> Pos {
        Pos::new("main.sola", 1, 1)
    }

    fn int(value: i64) -> Expression {
        Expression::int(value, pos())
    }

    fn var(name: &str) -> Expression {
        Expression::var(name, pos())
    }

    fn bin(op: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::binary(op, left, right, pos())
    }

    fn call(name: &str, args: Vec<Argument>) -> Expression {
        Expression::call(Expression::ident(name, pos()), args, pos())
    }

    fn decl(name: &str, init: Expression) -> Statement {
        Statement::VarDecl(VarDecl::new(name, None, Some(init), pos()))
    }

    fn echo(value: Expression) -> Statement {
        Statement::Echo(EchoStmt { value, pos: pos() })
    }

    fn ret(value: Expression) -> Statement {
        Statement::Return(ReturnStmt {
            values: vec![value],
            pos: pos(),
        })
    }

    fn param(name: &str) -> Param {
        Param::new(name, None, pos())
    }

    fn function(name: &str, params: Vec<Param>, body: Vec<Statement>) -> Statement {
        Statement::Function(FunctionDecl {
            name: name.into(),
            type_params: Vec::new(),
            params,
            return_type: None,
            body,
            pos: pos(),
        })
    }

    fn file(statements: Vec<Statement>) -> File {
        let mut f = File::new("main.sola");
        f.statements = statements;
        f
    }

    fn compile(f: &File) -> (Function, Vec<Diagnostic>) {
        Compiler::new().compile_file(f)
    }

    fn compile_with(options: CompilerOptions, f: &File) -> Function {
        Compiler::with_options(options).compile_file(f).0
    }

    fn error_codes(diagnostics: &[Diagnostic]) -> Vec<&'static str> {
        diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.code)
            .collect()
    }

    /// Function constant named `name` in `parent`'s pool
    fn nested<'f>(parent: &'f Function, name: &str) -> &'f Function {
        parent
            .chunk
            .constants
            .iter()
            .find_map(|c| match c {
                Value::Function(f) if f.name == name => Some(f.as_ref()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no function {} in {}", name, parent.name))
    }

    /// Offset of every instruction with its opcode
    fn instructions(function: &Function) -> Vec<(usize, Opcode)> {
        let chunk = &function.chunk;
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < chunk.code.len() {
            let op = Opcode::from_u8(chunk.code[offset]).unwrap();
            out.push((offset, op));
            offset += instruction_len(chunk, offset);
        }
        out
    }

    fn count(function: &Function, op: Opcode) -> usize {
        function.chunk.opcodes().iter().filter(|o| **o == op).count()
    }

    // ── Constants and globals ───────────────────────────────────────────

    #[test]
    fn test_folded_global_initialiser() {
        let init = bin(BinaryOp::Add, int(1), bin(BinaryOp::Mul, int(2), int(3)));
        let (main, diagnostics) = compile(&file(vec![decl("x", init)]));
        assert!(error_codes(&diagnostics).is_empty(), "{:?}", diagnostics);

        let ops = main.chunk.opcodes();
        assert_eq!(&ops[..3], &[Opcode::Push, Opcode::StoreGlobal, Opcode::Pop]);
        assert_eq!(main.chunk.read_u16(1), Some(0));
        assert_eq!(main.chunk.constants[0], Value::Int(7));
        assert_eq!(ops.last(), Some(&Opcode::ReturnNull));
    }

    #[test]
    fn test_unoptimized_keeps_arithmetic() {
        let init = bin(BinaryOp::Add, int(1), bin(BinaryOp::Mul, int(2), int(3)));
        let main = compile_with(CompilerOptions::unoptimized(), &file(vec![decl("x", init)]));
        assert_eq!(
            &main.chunk.opcodes()[..5],
            &[Opcode::Push, Opcode::Push, Opcode::Push, Opcode::Mul, Opcode::Add]
        );
    }

    #[test]
    fn test_enum_member_is_constant() {
        let mut f = file(vec![decl(
            "c",
            Expression::StaticProperty(StaticPropertyExpr {
                class: "Colour".into(),
                property: "Red".into(),
                pos: pos(),
            }),
        )]);
        f.declarations.push(Declaration::Enum(EnumDecl {
            name: "Colour".into(),
            members: vec!["Red".into(), "Green".into()],
            pos: pos(),
        }));
        let mut compiler = Compiler::new();
        let (main, _) = compiler.compile_file(&f);
        assert!(main.chunk.constants.contains(&Value::Enum {
            name: "Colour".into(),
            member: "Red".into(),
        }));
        assert_eq!(compiler.enums()[0].members.len(), 2);
    }

    // ── Functions and calls ─────────────────────────────────────────────

    #[test]
    fn test_default_parameter_and_short_call() {
        let mut b = param("b");
        b.default = Some(int(2));
        let f = file(vec![
            function("f", vec![param("a"), b], vec![ret(bin(BinaryOp::Add, var("a"), var("b")))]),
            Statement::expr(call("f", vec![Argument::positional(int(1))])),
        ]);
        let (main, _) = compile(&f);

        let callee = nested(&main, "f");
        assert_eq!(callee.arity, 2);
        assert_eq!(callee.min_arity, 1);
        assert_eq!(callee.default_values, vec![Value::Int(2)]);

        let ops = main.chunk.opcodes();
        assert_eq!(
            &ops[ops.len() - 5..],
            &[Opcode::LoadGlobal, Opcode::Push, Opcode::Call, Opcode::Pop, Opcode::ReturnNull]
        );
    }

    #[test]
    fn test_named_arguments_fill_holes_with_null() {
        let mut b = param("b");
        b.default = Some(int(2));
        let mut c = param("c");
        c.default = Some(int(3));
        let f = file(vec![
            function("f", vec![param("a"), b, c], vec![echo(var("a")), echo(var("c"))]),
            Statement::expr(call(
                "f",
                vec![Argument::positional(int(1)), Argument::named("c", int(5))],
            )),
        ]);
        let (main, _) = compile(&f);
        let ops = main.chunk.opcodes();
        assert_eq!(
            &ops[ops.len() - 7..ops.len() - 2],
            &[Opcode::LoadGlobal, Opcode::Push, Opcode::Null, Opcode::Push, Opcode::Call]
        );
        let (at, _) = instructions(&main)
            .into_iter()
            .find(|(_, op)| *op == Opcode::Call)
            .unwrap();
        assert_eq!(main.chunk.code[at + 1], 3);
    }

    #[test]
    fn test_non_constant_default_reported() {
        let mut a = param("a");
        a.default = Some(var("g"));
        let f = file(vec![function("f", vec![a], vec![])]);
        let (main, diagnostics) = compile(&f);
        assert!(error_codes(&diagnostics).contains(&"E0042"));
        assert_eq!(nested(&main, "f").default_values, vec![Value::Null]);
    }

    #[test]
    fn test_small_function_inlined() {
        let f = file(vec![
            function("double", vec![param("x")], vec![ret(bin(BinaryOp::Mul, var("x"), int(2)))]),
            decl("y", call("double", vec![Argument::positional(int(5))])),
        ]);
        let (main, _) = compile(&f);
        assert!(nested(&main, "double").is_inlinable);
        assert_eq!(count(&main, Opcode::Call), 0);
        assert_eq!(count(&main, Opcode::Mul), 1);

        let plain = compile_with(CompilerOptions::unoptimized(), &f);
        assert_eq!(count(&plain, Opcode::Call), 1);
    }

    #[test]
    fn test_tail_call_outside_try_only() {
        let helper = function("g", vec![param("n")], vec![echo(var("n")), ret(var("n"))]);
        let tail = function(
            "f",
            vec![param("n")],
            vec![ret(call("g", vec![Argument::positional(var("n"))]))],
        );
        let guarded = function(
            "h",
            vec![param("n")],
            vec![Statement::Try(TryStmt {
                body: vec![ret(call("g", vec![Argument::positional(var("n"))]))],
                catches: Vec::new(),
                finally: Some(vec![echo(int(0))]),
                pos: pos(),
            })],
        );
        let main = compile_with(CompilerOptions::default(), &file(vec![helper, tail, guarded]));

        let f = nested(&main, "f");
        assert_eq!(count(f, Opcode::TailCall), 1);
        assert_eq!(count(f, Opcode::Call), 0);
        let h = nested(&main, "h");
        assert_eq!(count(h, Opcode::TailCall), 0);
        assert_eq!(count(h, Opcode::Call), 1);
    }

    #[test]
    fn test_tail_call_from_method() {
        let helper = function("f", vec![param("n")], vec![echo(var("n")), ret(var("n"))]);
        let mut source = file(vec![helper]);
        source.declarations.push(Declaration::Class(ClassDecl {
            name: "Counter".into(),
            type_params: Vec::new(),
            where_clause: Vec::new(),
            parent: None,
            interfaces: Vec::new(),
            is_final: false,
            properties: Vec::new(),
            methods: vec![MethodDecl {
                name: "down".into(),
                type_params: Vec::new(),
                params: vec![param("n")],
                return_type: None,
                body: Some(vec![ret(call(
                    "f",
                    vec![Argument::positional(bin(BinaryOp::Sub, var("n"), int(1)))],
                ))]),
                is_static: false,
                pos: pos(),
            }],
            pos: pos(),
        }));

        let (unit, diagnostics) = Compiler::new().compile_unit(&source);
        assert!(error_codes(&diagnostics).is_empty(), "{:?}", diagnostics);
        let down = unit.classes[0].method("down").unwrap();
        assert_eq!(count(down, Opcode::TailCall), 1);
        assert_eq!(count(down, Opcode::Call), 0);
    }

    #[test]
    fn test_block_locals_reuse_slots() {
        let body = vec![
            decl("a", int(1)),
            Statement::Block(BlockStmt {
                body: vec![decl("b", int(2)), decl("c", int(3))],
                pos: pos(),
            }),
            decl("d", int(4)),
            ret(bin(BinaryOp::Add, var("a"), var("d"))),
        ];
        let main = compile_with(CompilerOptions::unoptimized(), &file(vec![function("h", vec![], body)]));
        let h = nested(&main, "h");
        assert_eq!(h.local_count, 4);
        // Leaving the block pops b and c
        assert_eq!(count(h, Opcode::Pop), 2);
    }

    #[test]
    fn test_chained_assignment_declares_locals() {
        let chained = Statement::expr(Expression::assign(
            var("a"),
            Expression::assign(var("b"), int(5), pos()),
            pos(),
        ));
        let body = vec![chained, ret(bin(BinaryOp::Add, var("a"), var("b")))];
        let main = compile_with(CompilerOptions::unoptimized(), &file(vec![function("h", vec![], body)]));
        let h = nested(&main, "h");
        assert_eq!(count(h, Opcode::StoreGlobal), 0);
        assert_eq!(count(h, Opcode::LoadGlobal), 0);
        // Slot 0, then $b, then $a
        assert_eq!(h.local_count, 3);
        assert_eq!(
            h.chunk.opcodes(),
            vec![
                Opcode::Push,
                Opcode::LoadLocal,
                Opcode::LoadLocal,
                Opcode::LoadLocal,
                Opcode::Add,
                Opcode::Return,
            ]
        );
    }

    #[test]
    fn test_too_many_locals_reported() {
        let body: Vec<Statement> = (0..300).map(|i| decl(&format!("v{}", i), int(i))).collect();
        let (_, diagnostics) = compile(&file(vec![function("big", vec![], body)]));
        let codes = error_codes(&diagnostics);
        assert_eq!(codes.iter().filter(|c| **c == "E0039").count(), 1);
    }

    #[test]
    fn test_arrow_captures_enclosing_local() {
        let arrow = Expression::Arrow(ArrowFnExpr {
            params: vec![param("x")],
            return_type: None,
            body: Box::new(bin(BinaryOp::Add, var("x"), var("k"))),
            pos: pos(),
        });
        let f = file(vec![function("mk", vec![], vec![decl("k", int(1)), ret(arrow)])]);
        let main = compile_with(CompilerOptions::unoptimized(), &f);
        let mk = nested(&main, "mk");
        let closure = nested(mk, "{closure}");
        assert_eq!(closure.upvalue_count, 1);
        assert_eq!(closure.local_count, 3);

        let (at, _) = instructions(mk)
            .into_iter()
            .find(|(_, op)| *op == Opcode::Closure)
            .unwrap();
        assert_eq!(mk.chunk.read_u16(at + 1), Some(1));
    }

    // ── Loops ───────────────────────────────────────────────────────────

    fn step(name: &str) -> Expression {
        Expression::Increment(IncrementExpr {
            target: Box::new(var(name)),
            is_increment: true,
            is_prefix: false,
            pos: pos(),
        })
    }

    fn counting_loop(bound: Expression, body: Vec<Statement>) -> Statement {
        Statement::For(ForStmt {
            init: Some(Box::new(decl("i", int(0)))),
            condition: Some(bin(BinaryOp::Lt, var("i"), bound)),
            update: Some(step("i")),
            body,
            pos: pos(),
        })
    }

    /// `ADD`s emitted before the loop's exit test
    fn adds_before_exit(main: &Function) -> usize {
        let ops = main.chunk.opcodes();
        let exit = ops.iter().position(|o| *o == Opcode::JumpIfFalse).unwrap();
        ops[..exit].iter().filter(|o| **o == Opcode::Add).count()
    }

    #[test]
    fn test_invariant_sum_hoisted_out_of_loop() {
        let sum = bin(BinaryOp::Add, var("s"), bin(BinaryOp::Add, var("a"), var("b")));
        let f = file(vec![
            decl("a", int(1)),
            decl("b", int(2)),
            decl("s", int(0)),
            decl("i", int(0)),
            Statement::While(WhileStmt {
                condition: bin(BinaryOp::Lt, var("i"), int(10)),
                body: vec![
                    Statement::expr(Expression::assign(var("s"), sum, pos())),
                    Statement::expr(step("i")),
                ],
                pos: pos(),
            }),
        ]);

        let hoisted = compile_with(CompilerOptions::default(), &f);
        assert_eq!(adds_before_exit(&hoisted), 1);

        let plain = compile_with(
            CompilerOptions {
                licm: false,
                ..CompilerOptions::default()
            },
            &f,
        );
        assert_eq!(adds_before_exit(&plain), 0);
    }

    #[test]
    fn test_counting_loop_reads_unchecked() {
        let length = Expression::Property(PropertyExpr {
            object: Box::new(var("a")),
            property: "length".into(),
            nullsafe: false,
            pos: pos(),
        });
        let element = Expression::Index(IndexExpr {
            object: Box::new(var("a")),
            index: Some(Box::new(var("i"))),
            pos: pos(),
        });
        let body = vec![Statement::expr(Expression::assign(
            var("t"),
            bin(BinaryOp::Add, var("t"), element),
            pos(),
        ))];
        let f = file(vec![function(
            "total",
            vec![Param::new("a", Some(TypeNode::array_of(TypeNode::simple("int"))), pos())],
            vec![decl("t", int(0)), counting_loop(length, body), ret(var("t"))],
        )]);

        let elided = compile_with(
            CompilerOptions {
                bounds_check_elision: true,
                ..CompilerOptions::default()
            },
            &f,
        );
        let total = nested(&elided, "total");
        assert_eq!(count(total, Opcode::ArrayGetUnchecked), 1);
        assert_eq!(count(total, Opcode::ArrayGet), 0);
        assert_eq!(count(total, Opcode::ArrayLen), 1);

        let checked = compile_with(CompilerOptions::default(), &f);
        assert_eq!(count(nested(&checked, "total"), Opcode::ArrayGetUnchecked), 0);
    }

    #[test]
    fn test_constant_false_loop_dropped() {
        let f = file(vec![Statement::While(WhileStmt {
            condition: Expression::boolean(false, pos()),
            body: vec![echo(int(1))],
            pos: pos(),
        })]);
        let (main, _) = compile(&f);
        assert_eq!(main.chunk.opcodes(), vec![Opcode::ReturnNull]);
    }

    #[test]
    fn test_switch_break_jumps_to_end() {
        let f = file(vec![
            decl("x", int(1)),
            Statement::Switch(SwitchStmt {
                subject: var("x"),
                cases: vec![SwitchCase {
                    value: int(1),
                    body: vec![echo(int(10)), Statement::Break(pos())],
                    pos: pos(),
                }],
                default: Some(vec![echo(int(20))]),
                pos: pos(),
            }),
        ]);
        let (main, diagnostics) = compile(&f);
        assert!(error_codes(&diagnostics).is_empty(), "{:?}", diagnostics);
        assert_eq!(count(&main, Opcode::Loop), 0);
        assert_eq!(count(&main, Opcode::Eq), 1);
        assert_eq!(count(&main, Opcode::DebugPrint), 2);
    }

    // ── Exceptions ──────────────────────────────────────────────────────

    #[test]
    fn test_try_table_offsets() {
        let f = file(vec![Statement::Try(TryStmt {
            body: vec![echo(int(1))],
            catches: vec![CatchClause {
                class: "Exception".into(),
                var: Some("e".into()),
                body: vec![echo(int(2))],
                pos: pos(),
            }],
            finally: Some(vec![echo(int(3))]),
            pos: pos(),
        })]);
        let (main, _) = compile(&f);
        let code = &main.chunk.code;
        let (at, _) = instructions(&main)
            .into_iter()
            .find(|(_, op)| *op == Opcode::EnterTry)
            .unwrap();

        assert_eq!(code[at + 1], 1);
        let finally = main.chunk.read_i16(at + 2).unwrap() as usize;
        let catch = main.chunk.read_i16(at + 6).unwrap() as usize;
        assert_eq!(code[at + catch], Opcode::EnterCatch as u8);
        assert_eq!(code[at + finally], Opcode::EnterFinally as u8);
        let type_index = main.chunk.read_u16(at + 4).unwrap() as usize;
        assert_eq!(main.chunk.constants[type_index], Value::string("Exception"));
    }

    // ── Classes ─────────────────────────────────────────────────────────

    #[test]
    fn test_class_definition() {
        let read_x = Expression::Property(PropertyExpr {
            object: Box::new(Expression::This(pos())),
            property: "x".into(),
            nullsafe: false,
            pos: pos(),
        });
        let mut f = file(Vec::new());
        f.declarations.push(Declaration::Class(ClassDecl {
            name: "Point".into(),
            type_params: Vec::new(),
            where_clause: Vec::new(),
            parent: None,
            interfaces: Vec::new(),
            is_final: false,
            properties: vec![PropertyDecl {
                name: "x".into(),
                ty: Some(TypeNode::simple("int")),
                default: Some(int(0)),
                is_static: false,
                pos: pos(),
            }],
            methods: vec![MethodDecl {
                name: "getX".into(),
                type_params: Vec::new(),
                params: Vec::new(),
                return_type: Some(TypeNode::simple("int")),
                body: Some(vec![ret(read_x)]),
                is_static: false,
                pos: pos(),
            }],
            pos: pos(),
        }));

        let mut compiler = Compiler::new();
        let (unit, diagnostics) = compiler.compile_unit(&f);
        assert!(error_codes(&diagnostics).is_empty(), "{:?}", diagnostics);
        let point = &unit.classes[0];
        assert_eq!(point.name, "Point");
        assert_eq!(point.properties[0].default, Value::Int(0));
        assert_eq!(point.properties[0].type_name, "int");
        let get_x = point.method("getX").unwrap();
        assert_eq!(
            get_x.chunk.opcodes(),
            vec![Opcode::LoadLocal, Opcode::GetField, Opcode::Return]
        );
        assert_eq!(get_x.local_count, 1);
    }
}
