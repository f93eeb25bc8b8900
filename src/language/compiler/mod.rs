use crate::{
    language::options::CompileOptions,
    runtime::{
        abi::{Tag, ALLOCATE_SYMBOL, PRINTLN_SYMBOL, PRINT_SYMBOL},
        error::RuntimeError,
    },
};
use inkwell::{
    builder::{Builder, BuilderError},
    context::Context,
    module::{Linkage, Module},
    targets::{CodeModel, InitializationConfig, RelocMode, Target, TargetMachine},
    types::{BasicTypeEnum, FloatType, FunctionType, IntType, PointerType, StructType},
    values::{BasicValueEnum, FunctionValue, GlobalValue, StructValue},
    AddressSpace, OptimizationLevel,
};
use std::{collections::HashMap, fmt, sync::OnceLock};
use thiserror::Error;

mod driver;
mod emit;
mod functions;
mod logical;
mod values;

#[cfg(test)]
mod tests;

pub use driver::JitProgram;

pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("LLVM builder error: {0}")]
    Builder(#[from] BuilderError),
    #[error("failed to initialize native target: {0}")]
    Target(String),
    #[error("unable to find function '{name}'")]
    UnknownFunction { name: String },
    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },
    #[error("{what} outside of a function body")]
    NoInsertionPoint { what: &'static str },
    #[error("module failed verification: {0}")]
    Verify(String),
    #[error("optimization failed: {0}")]
    Optimize(String),
    #[error("external symbol `{name}` is not provided by the runtime")]
    UnresolvedSymbol { name: String },
    #[error("failed to create execution engine: {0}")]
    Engine(String),
    #[error("program has no `main` function")]
    MissingEntryPoint,
    #[error("failed to look up `{name}` in the execution engine: {message}")]
    Lookup { name: String, message: String },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("internal codegen error: {0}")]
    Internal(&'static str),
}

/// Anomalies that do not stop compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileWarning {
    UnknownFunction { name: String },
    IllFormedFunction { name: String },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::UnknownFunction { name } => {
                write!(f, "unable to find function '{name}'")
            }
            CompileWarning::IllFormedFunction { name } => {
                write!(f, "function '{name}' failed verification")
            }
        }
    }
}

/// An expression node: lowers to one tagged value.
pub trait ExprCode<'ctx> {
    fn gen_code(&self, compiler: &mut Compiler<'ctx>) -> CodegenResult<StructValue<'ctx>>;
}

/// A statement node: lowers for its side effects only.
pub trait StmtCode<'ctx> {
    fn gen_code(&self, compiler: &mut Compiler<'ctx>) -> CodegenResult<()>;
}

/// A value that is already lowered.
impl<'ctx> ExprCode<'ctx> for StructValue<'ctx> {
    fn gen_code(&self, _compiler: &mut Compiler<'ctx>) -> CodegenResult<StructValue<'ctx>> {
        Ok(*self)
    }
}

/// IR types shared by every lowering routine. `value` mirrors
/// `runtime::abi::RawValue`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ValueTypes<'ctx> {
    tag: IntType<'ctx>,
    int: IntType<'ctx>,
    float: FloatType<'ctx>,
    char: IntType<'ctx>,
    count: IntType<'ctx>,
    index: IntType<'ctx>,
    status: IntType<'ctx>,
    ptr: PointerType<'ctx>,
    value: StructType<'ctx>,
    /// `{i8, ptr} (i32 argc, ptr argv)`, shared by every user function.
    function: FunctionType<'ctx>,
    /// `void (i32 argc, ptr argv)` for print/println.
    native: FunctionType<'ctx>,
    /// `i1 ({i8, ptr})`
    logical: FunctionType<'ctx>,
    allocate: FunctionType<'ctx>,
    /// `i8 (i32)`
    entry: FunctionType<'ctx>,
}

impl<'ctx> ValueTypes<'ctx> {
    fn new(context: &'ctx Context) -> Self {
        let tag = context.i8_type();
        let count = context.i32_type();
        let index = context.i64_type();
        let ptr = context.ptr_type(AddressSpace::default());
        let value = context.opaque_struct_type("plsm.value");
        value.set_body(&[tag.into(), ptr.into()], false);
        Self {
            tag,
            int: context.i64_type(),
            float: context.f64_type(),
            char: context.i32_type(),
            count,
            index,
            status: context.i8_type(),
            ptr,
            value,
            function: value.fn_type(&[count.into(), ptr.into()], false),
            native: context.void_type().fn_type(&[count.into(), ptr.into()], false),
            logical: context.bool_type().fn_type(&[value.into()], false),
            allocate: ptr.fn_type(&[index.into()], false),
            entry: context.i8_type().fn_type(&[count.into()], false),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FunctionEntry<'ctx> {
    User(FunctionValue<'ctx>),
    Native(FunctionValue<'ctx>),
}

#[derive(Clone, Copy, Debug)]
struct Natives<'ctx> {
    allocate: FunctionValue<'ctx>,
    print: FunctionValue<'ctx>,
    println: FunctionValue<'ctx>,
}

struct Frame<'ctx> {
    function: FunctionValue<'ctx>,
    params: Vec<String>,
}

/// Owns the compilation unit until `build_execution_engine` moves it into
/// the JIT.
pub struct Compiler<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    target_machine: TargetMachine,
    options: CompileOptions,
    types: ValueTypes<'ctx>,
    natives: Natives<'ctx>,
    logical_table: GlobalValue<'ctx>,
    functions: HashMap<String, FunctionEntry<'ctx>>,
    frames: Vec<Frame<'ctx>>,
    entry_point: Option<FunctionValue<'ctx>>,
    warnings: Vec<CompileWarning>,
    optimized: bool,
}

fn initialize_native_target() -> CodegenResult<()> {
    static NATIVE: OnceLock<Result<(), String>> = OnceLock::new();
    NATIVE
        .get_or_init(|| Target::initialize_native(&InitializationConfig::default()))
        .clone()
        .map_err(CodegenError::Target)
}

impl<'ctx> Compiler<'ctx> {
    pub fn new(
        context: &'ctx Context,
        module_name: &str,
        options: CompileOptions,
    ) -> CodegenResult<Self> {
        initialize_native_target()?;
        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple).map_err(|e| CodegenError::Target(e.to_string()))?;
        let target_machine = target
            .create_target_machine(
                &triple,
                &TargetMachine::get_host_cpu_name().to_string(),
                &TargetMachine::get_host_cpu_features().to_string(),
                OptimizationLevel::Default,
                RelocMode::Default,
                CodeModel::JITDefault,
            )
            .ok_or_else(|| {
                CodegenError::Target(format!(
                    "no target machine for {}",
                    triple.as_str().to_string_lossy()
                ))
            })?;

        let module = context.create_module(module_name);
        module.set_triple(&triple);
        module.set_data_layout(&target_machine.get_target_data().get_data_layout());

        let types = ValueTypes::new(context);
        let natives = Natives {
            allocate: module.add_function(ALLOCATE_SYMBOL, types.allocate, Some(Linkage::External)),
            print: module.add_function(PRINT_SYMBOL, types.native, Some(Linkage::External)),
            println: module.add_function(PRINTLN_SYMBOL, types.native, Some(Linkage::External)),
        };
        let table_type = types.ptr.array_type(Tag::ALL.len() as u32);
        let logical_table = module.add_global(table_type, None, "plsm.logical_table");

        let mut functions = HashMap::new();
        functions.insert(PRINT_SYMBOL.to_string(), FunctionEntry::Native(natives.print));
        functions.insert(
            PRINTLN_SYMBOL.to_string(),
            FunctionEntry::Native(natives.println),
        );

        let mut compiler = Self {
            context,
            module,
            builder: context.create_builder(),
            target_machine,
            options,
            types,
            natives,
            logical_table,
            functions,
            frames: Vec::new(),
            entry_point: None,
            warnings: Vec::new(),
            optimized: false,
        };
        compiler.init_logicals()?;
        Ok(compiler)
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Lower top-level statements in source order.
    pub fn compile_program<S: StmtCode<'ctx>>(&mut self, statements: &[S]) -> CodegenResult<()> {
        for stmt in statements {
            stmt.gen_code(self)?;
        }
        Ok(())
    }

    pub fn print_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    fn type_size(&self, ty: BasicTypeEnum<'ctx>) -> u64 {
        self.target_machine.get_target_data().get_abi_size(&ty)
    }

    /// Run `f` and put the builder back where it was, so synthesizing a
    /// helper never disturbs the function being lowered.
    fn detached<T>(&mut self, f: impl FnOnce(&mut Self) -> CodegenResult<T>) -> CodegenResult<T> {
        let saved = self.builder.get_insert_block();
        let result = f(self);
        match saved {
            Some(block) => self.builder.position_at_end(block),
            None => self.builder.clear_insertion_position(),
        }
        result
    }

    fn param(function: FunctionValue<'ctx>, index: u32) -> CodegenResult<BasicValueEnum<'ctx>> {
        function
            .get_nth_param(index)
            .ok_or(CodegenError::Internal("function is missing a parameter"))
    }
}
