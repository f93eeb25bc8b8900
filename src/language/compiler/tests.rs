use super::*;
use crate::{
    language::{
        options::{ExitStatusPolicy, OptLevel, UnresolvedCallPolicy},
        parser::parse_program,
    },
    runtime::value::Value,
};

fn compile<'ctx>(
    context: &'ctx Context,
    source: &str,
    options: CompileOptions,
) -> CodegenResult<Compiler<'ctx>> {
    let statements = parse_program(source).expect("parse");
    let mut compiler = Compiler::new(context, "tests::build", options)?;
    compiler.compile_program(&statements)?;
    Ok(compiler)
}

fn build_with<'ctx>(
    context: &'ctx Context,
    source: &str,
    options: CompileOptions,
) -> JitProgram<'ctx> {
    let mut compiler = match compile(context, source, options) {
        Ok(compiler) => compiler,
        Err(err) => panic!("compile failed: {err}"),
    };
    compiler.entry_point().expect("entry point");
    compiler.optimize().expect("optimize");
    compiler.build_execution_engine().expect("execution engine")
}

fn build<'ctx>(context: &'ctx Context, source: &str) -> JitProgram<'ctx> {
    build_with(context, source, CompileOptions::default())
}

fn unoptimized() -> CompileOptions {
    CompileOptions {
        opt_level: OptLevel::None,
        ..CompileOptions::default()
    }
}

#[test]
fn truthiness_dispatch_agrees_with_host_values() {
    let source = "fun truth(x) { return if x then 1 else 0; }";
    for options in [CompileOptions::default(), unoptimized()] {
        let context = Context::create();
        let program = build_with(&context, source, options);
        for value in [
            Value::Null,
            Value::Int(0),
            Value::Int(3),
            Value::Int(-1),
            Value::Float(0.0),
            Value::Float(0.25),
        ] {
            let expected = value.truthiness().expect("non-string truthiness");
            let result = program.call_function("truth", &[value.clone()]).expect("call");
            assert_eq!(
                result,
                Value::Int(i64::from(expected)),
                "truthiness of {value:?} at {:?}",
                options.opt_level
            );
        }
    }
}

#[test]
fn literals_read_back_unchanged() {
    let context = Context::create();
    let program = build(
        &context,
        r#"
        fun int() { return 7; }
        fun float() { return -2.5; }
        fun text() { return "ab✓"; }
        fun empty() { return ""; }
        fun nothing() { return null; }
        fun implicit() { }
        "#,
    );
    let call = |name: &str| program.call_function(name, &[]).expect(name);
    assert_eq!(call("int"), Value::Int(7));
    assert_eq!(call("float"), Value::Float(-2.5));
    assert_eq!(call("text"), Value::String("ab✓".into()));
    assert_eq!(call("empty"), Value::String(String::new()));
    assert_eq!(call("nothing"), Value::Null);
    assert_eq!(call("implicit"), Value::Null);
}

#[test]
fn parameters_bind_by_position_and_default_to_null() {
    let context = Context::create();
    let program = build(
        &context,
        "fun first(a, b) { return a; } fun second(a, b) { return b; }",
    );
    let args = [Value::Int(1), Value::from("two")];
    assert_eq!(program.call_function("first", &args).unwrap(), Value::Int(1));
    assert_eq!(
        program.call_function("second", &args).unwrap(),
        Value::from("two")
    );
    assert_eq!(
        program.call_function("second", &args[..1]).unwrap(),
        Value::Null
    );
    assert_eq!(program.call_function("first", &[]).unwrap(), Value::Null);
}

#[test]
fn arguments_are_evaluated_left_to_right() {
    let context = Context::create();
    let program = build(
        &context,
        r#"
        fun say(x) { print(x); return x; }
        fun last(a, b, c) { return c; }
        fun main() { return last(say(1), say("-"), say(2.5)); }
        "#,
    );
    let (value, output) = program.call_function_captured("main", &[]).unwrap();
    assert_eq!(output, "1-2.5");
    assert_eq!(value, Value::Float(2.5));
}

#[test]
fn call_sites_pass_count_and_buffer() {
    let context = Context::create();
    let compiler = compile(
        &context,
        "fun f() { return 1; } fun g(a, b) { return b; } fun main() { f(); g(1, 2); }",
        unoptimized(),
    )
    .expect("compile");
    let ir = compiler.print_ir();
    assert!(ir.contains("@plsm.f(i32 0, ptr null)"), "{ir}");
    assert!(ir.contains("@plsm.g(i32 2, ptr %args)"), "{ir}");
    assert!(ir.contains("alloca %plsm.value, i64 2"), "{ir}");
}

#[test]
fn native_print_formats_arguments() {
    let context = Context::create();
    let program = build(
        &context,
        r#"fun main() { println("a", 1, -0.5, null); println(); print("x"); println("y"); }"#,
    );
    let (status, output) = program.run_captured().unwrap();
    assert_eq!(status, 42);
    assert_eq!(output, "a 1 -0.5 null\n\nxy\n");
}

#[test]
fn conditional_only_runs_the_taken_branch() {
    let context = Context::create();
    let program = build(
        &context,
        r#"
        fun main() {
          if 1 then println("then-1") else println("else-1");
          if 0 then println("then-2") else println("else-2");
          if null then println("then-3") else println("else-3");
          if 0.5 then println("then-4") else println("else-4");
        }
        "#,
    );
    let (_, output) = program.run_captured().unwrap();
    assert_eq!(output, "then-1\nelse-2\nelse-3\nthen-4\n");
}

#[test]
fn nested_conditionals_join_on_their_exit_blocks() {
    let context = Context::create();
    let program = build(
        &context,
        "fun classify(x, y) { return if x then (if y then 1 else 2) else if y then 3 else 4; }",
    );
    for (x, y, expected) in [(1, 1, 1), (1, 0, 2), (0, 1, 3), (0, 0, 4)] {
        let result = program
            .call_function("classify", &[Value::Int(x), Value::Int(y)])
            .unwrap();
        assert_eq!(result, Value::Int(expected), "classify({x}, {y})");
    }
}

#[test]
fn conditionals_nest_inside_call_arguments() {
    let context = Context::create();
    let program = build(
        &context,
        r#"
        fun id(v) { return v; }
        fun main() { return id(if 0 then 1 else if 2 then "s" else 3); }
        "#,
    );
    assert_eq!(
        program.call_function("main", &[]).unwrap(),
        Value::from("s")
    );
}

#[test]
fn redefinition_replaces_registry_entry() {
    let context = Context::create();
    let program = build(
        &context,
        r#"
        fun f() { return 1; }
        fun early() { return f(); }
        fun f() { return 2; }
        fun late() { return f(); }
        "#,
    );
    assert_eq!(program.call_function("f", &[]).unwrap(), Value::Int(2));
    assert_eq!(program.call_function("early", &[]).unwrap(), Value::Int(1));
    assert_eq!(program.call_function("late", &[]).unwrap(), Value::Int(2));
}

#[test]
fn entry_point_returns_fixed_status() {
    for body in ["return 7;", "return \"done\";", ""] {
        let context = Context::create();
        let program = build(&context, &format!("fun main() {{ {body} }}"));
        assert!(program.has_entry_point());
        assert_eq!(program.run_captured().unwrap().0, 42, "main body `{body}`");
    }
}

#[test]
fn entry_point_can_propagate_main_result() {
    let options = CompileOptions {
        exit_status: ExitStatusPolicy::Propagate,
        ..CompileOptions::default()
    };
    for (body, expected) in [
        ("return 7;", 7),
        ("return 300;", 44),
        ("return \"x\";", 0),
        ("", 0),
    ] {
        let context = Context::create();
        let program = build_with(&context, &format!("fun main() {{ {body} }}"), options);
        assert_eq!(program.run().unwrap(), expected, "main body `{body}`");
    }
}

#[test]
fn entry_point_is_synthesized_once() {
    let context = Context::create();
    let mut compiler = compile(&context, "fun main() { }", unoptimized()).unwrap();
    let first = compiler.entry_point().unwrap();
    let second = compiler.entry_point().unwrap();
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn program_without_main_has_no_entry_point() {
    let context = Context::create();
    let mut compiler = compile(&context, "fun helper() { }", unoptimized()).unwrap();
    assert!(compiler.entry_point().unwrap().is_none());
    let program = compiler.build_execution_engine().unwrap();
    assert!(!program.has_entry_point());
    assert!(matches!(
        program.run(),
        Err(CodegenError::MissingEntryPoint)
    ));
}

#[test]
fn unknown_function_fails_by_default() {
    let context = Context::create();
    let err = compile(&context, "fun main() { nope(1); }", unoptimized()).err();
    assert!(
        matches!(&err, Some(CodegenError::UnknownFunction { name }) if name == "nope"),
        "{err:?}"
    );
}

#[test]
fn unknown_function_warns_when_lenient() {
    let context = Context::create();
    let options = CompileOptions {
        unresolved_calls: UnresolvedCallPolicy::Warn,
        ..unoptimized()
    };
    let mut compiler = compile(&context, "fun main() { nope(); }", options).unwrap();
    assert_eq!(
        compiler.warnings(),
        &[CompileWarning::UnknownFunction {
            name: "nope".into()
        }]
    );
    assert_eq!(
        compiler.warnings()[0].to_string(),
        "unable to find function 'nope'"
    );
    assert!(compiler.print_ir().contains("call %plsm.value null(i32 0, ptr null)"));
    compiler.entry_point().unwrap();
    assert!(compiler.build_execution_engine().is_ok());
}

#[test]
fn logical_functions_are_memoized() {
    let context = Context::create();
    let mut compiler = Compiler::new(&context, "tests::logical", unoptimized()).unwrap();
    for (tag, name) in [
        (Tag::Null, "null_logical"),
        (Tag::Int, "int_logical"),
        (Tag::Float, "float_logical"),
    ] {
        let first = compiler.get_logical_for(tag).unwrap().expect(name);
        let second = compiler.get_logical_for(tag).unwrap().expect(name);
        assert_eq!(first, second);
        assert_eq!(first.get_name().to_str().unwrap(), name);
    }
    assert!(compiler.get_logical_for(Tag::String).unwrap().is_none());
    let ir = compiler.print_ir();
    assert_eq!(ir.matches("define i1 @int_logical").count(), 1, "{ir}");
}

#[test]
fn dispatch_table_is_ordered_by_tag() {
    let context = Context::create();
    let compiler = Compiler::new(&context, "tests::table", unoptimized()).unwrap();
    let ir = compiler.print_ir();
    assert!(
        ir.contains("[ptr @null_logical, ptr @int_logical, ptr @float_logical, ptr null]"),
        "{ir}"
    );
}

#[test]
fn statements_after_return_never_run() {
    let context = Context::create();
    let program = build(
        &context,
        r#"fun f() { return 1; println("dead"); return 2; }"#,
    );
    let (value, output) = program.call_function_captured("f", &[]).unwrap();
    assert_eq!(value, Value::Int(1));
    assert!(output.is_empty());
}

#[test]
fn nested_definitions_register_globally() {
    let context = Context::create();
    let mut compiler = compile(
        &context,
        "fun outer() { fun inner() { return 5; } return inner(); }",
        unoptimized(),
    )
    .unwrap();
    assert!(compiler.has_function("inner"));
    assert!(compiler.warnings().is_empty());
    compiler.optimize().unwrap();
    let program = compiler.build_execution_engine().unwrap();
    assert_eq!(program.call_function("outer", &[]).unwrap(), Value::Int(5));
}

#[test]
fn top_level_expressions_have_no_insertion_point() {
    let context = Context::create();
    let err = compile(&context, "println(1);", unoptimized()).err();
    assert!(matches!(err, Some(CodegenError::NoInsertionPoint { .. })), "{err:?}");
    let err = compile(&context, "return 1;", unoptimized()).err();
    assert!(matches!(err, Some(CodegenError::NoInsertionPoint { .. })), "{err:?}");
}

#[test]
fn unknown_variables_are_rejected() {
    let context = Context::create();
    let err = compile(&context, "fun f(a) { return b; }", unoptimized()).err();
    assert!(
        matches!(&err, Some(CodegenError::UnknownVariable { name }) if name == "b"),
        "{err:?}"
    );
}

#[test]
fn optimize_runs_once() {
    let context = Context::create();
    let mut compiler = compile(&context, "fun main() { return 1; }", CompileOptions::default())
        .unwrap();
    compiler.entry_point().unwrap();
    compiler.optimize().unwrap();
    let after_first = compiler.print_ir();
    compiler.optimize().unwrap();
    assert_eq!(after_first, compiler.print_ir());
}
