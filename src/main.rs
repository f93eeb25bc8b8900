use plsm::language::{
    compiler::Compiler,
    diagnostics::{emit_parse_error, report_codegen_error, report_io_error},
    options::CompileOptions,
    parser::parse_program,
};
use inkwell::context::Context;
use std::{env, fs, path::Path, process};

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        let arg0 = args.first().map(String::as_str).unwrap_or("plsm");
        println!("usage: {arg0} <file>");
        process::exit(1);
    }

    let path = Path::new(&args[1]);
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            report_io_error(path, &err);
            process::exit(1);
        }
    };

    let statements = match parse_program(&source) {
        Ok(statements) => statements,
        Err(err) => {
            emit_parse_error(path, &source, &err);
            process::exit(1);
        }
    };

    let context = Context::create();
    let options = CompileOptions::from_env();
    let module_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plsm".to_string());

    let result = Compiler::new(&context, &module_name, options).and_then(|mut compiler| {
        compiler.compile_program(&statements)?;
        for warning in compiler.warnings() {
            println!("{warning}");
        }
        if compiler.entry_point()?.is_none() {
            log::warn!("no `main` function defined; nothing to run");
        }
        compiler.optimize()?;
        let program = compiler.build_execution_engine()?;
        if program.has_entry_point() {
            program.run()?;
        }
        Ok(())
    });

    if let Err(err) = result {
        report_codegen_error(&err);
        process::exit(1);
    }
}
