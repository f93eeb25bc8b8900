use super::*;
use crate::{
    language::options::ExitStatusPolicy,
    runtime::{
        abi::{self, RawValue, NATIVE_SYMBOLS},
        session::{self, Output},
        value::Value,
    },
};
use inkwell::{
    execution_engine::{ExecutionEngine, JitFunction},
    passes::PassBuilderOptions,
    values::IntValue,
    IntPredicate,
};
use std::ptr;

/// Symbol of the synthesized process entry point.
pub const ENTRY_SYMBOL: &str = "main";
/// Passed to the entry point, which ignores it.
const ENTRY_ARGUMENT: i32 = 0;

type EntryFn = unsafe extern "C" fn(i32) -> i8;
type PlsmFn = unsafe extern "C" fn(i32, *const RawValue) -> RawValue;

impl<'ctx> Compiler<'ctx> {
    /// The entry point wrapping the user's `main`, synthesized on first use.
    /// `None` when no `main` has been defined.
    pub fn entry_point(&mut self) -> CodegenResult<Option<FunctionValue<'ctx>>> {
        if let Some(entry) = self.entry_point {
            return Ok(Some(entry));
        }
        if !matches!(self.functions.get("main"), Some(FunctionEntry::User(_))) {
            return Ok(None);
        }

        let function = self.module.add_function(ENTRY_SYMBOL, self.types.entry, None);
        self.detached(|this| {
            let block = this.context.append_basic_block(function, "entry");
            this.builder.position_at_end(block);
            let result = this.create_call::<StructValue<'ctx>>("main", &[])?;
            let status = match this.options.exit_status {
                ExitStatusPolicy::Fixed(code) => this.types.status.const_int(code as u64, true),
                ExitStatusPolicy::Propagate => this.status_from(function, result)?,
            };
            this.builder.build_return(Some(&status))?;
            Ok(())
        })?;
        self.entry_point = Some(function);
        Ok(Some(function))
    }

    /// INT results become the status (truncated to i8); anything else is 0.
    fn status_from(
        &mut self,
        function: FunctionValue<'ctx>,
        result: StructValue<'ctx>,
    ) -> CodegenResult<IntValue<'ctx>> {
        let tag = self.extract_tag(result)?;
        let is_int = self.builder.build_int_compare(
            IntPredicate::EQ,
            tag,
            self.types.tag.const_int(Tag::Int.as_u8().into(), false),
            "is_int",
        )?;
        let int_block = self.context.append_basic_block(function, "status_int");
        let other_block = self.context.append_basic_block(function, "status_other");
        let merge_block = self.context.append_basic_block(function, "status_merge");
        self.builder
            .build_conditional_branch(is_int, int_block, other_block)?;

        self.builder.position_at_end(int_block);
        let payload = self.extract_payload(result)?;
        let int = self
            .builder
            .build_load(self.types.int, payload, "int")?
            .into_int_value();
        let truncated = self
            .builder
            .build_int_truncate(int, self.types.status, "status")?;
        self.builder.build_unconditional_branch(merge_block)?;

        self.builder.position_at_end(other_block);
        let zero = self.types.status.const_zero();
        self.builder.build_unconditional_branch(merge_block)?;

        self.builder.position_at_end(merge_block);
        let phi = self.builder.build_phi(self.types.status, "status")?;
        phi.add_incoming(&[(&truncated, int_block), (&zero, other_block)]);
        Ok(phi.as_basic_value().into_int_value())
    }

    /// Run the configured pass pipeline over the whole module. Only the first
    /// call does anything.
    pub fn optimize(&mut self) -> CodegenResult<()> {
        if self.optimized {
            log::debug!("module already optimized");
            return Ok(());
        }
        self.optimized = true;
        self.module
            .verify()
            .map_err(|err| CodegenError::Verify(err.to_string()))?;
        let Some(passes) = self.options.opt_level.pipeline() else {
            return Ok(());
        };
        log::debug!("running pass pipeline `{passes}`");
        self.module
            .run_passes(passes, &self.target_machine, PassBuilderOptions::create())
            .map_err(|err| CodegenError::Optimize(err.to_string()))
    }

    /// Move the module into an MCJIT engine and bind the runtime symbols.
    pub fn build_execution_engine(self) -> CodegenResult<JitProgram<'ctx>> {
        self.module
            .verify()
            .map_err(|err| CodegenError::Verify(err.to_string()))?;
        self.check_external_symbols()?;
        if self.options.dump_ir {
            eprintln!("{}", self.print_ir());
        }

        let engine = self
            .module
            .create_jit_execution_engine(self.options.opt_level.codegen_level())
            .map_err(|err| CodegenError::Engine(err.to_string()))?;
        engine.add_global_mapping(&self.natives.allocate, abi::plsm_allocate as usize);
        engine.add_global_mapping(&self.natives.print, abi::plsm_print as usize);
        engine.add_global_mapping(&self.natives.println, abi::plsm_println as usize);

        let functions = self
            .functions
            .iter()
            .filter_map(|(name, entry)| match entry {
                FunctionEntry::User(function) => Some((
                    name.clone(),
                    function.get_name().to_string_lossy().into_owned(),
                )),
                FunctionEntry::Native(_) => None,
            })
            .collect();
        let entry = self
            .entry_point
            .map(|function| function.get_name().to_string_lossy().into_owned());

        // Looking up an address finalizes the engine.
        if let Some(name) = &entry {
            engine
                .get_function_address(name)
                .map_err(|err| CodegenError::Lookup {
                    name: name.clone(),
                    message: err.to_string(),
                })?;
        }
        log::debug!("execution engine ready");

        Ok(JitProgram {
            engine,
            _module: self.module,
            functions,
            entry,
        })
    }

    /// MCJIT would resolve any declaration against the host process; only the
    /// runtime's own symbols are allowed through.
    fn check_external_symbols(&self) -> CodegenResult<()> {
        for function in self.module.get_functions() {
            if function.count_basic_blocks() > 0 {
                continue;
            }
            let name = function.get_name().to_string_lossy();
            if name.starts_with("llvm.") || NATIVE_SYMBOLS.contains(&name.as_ref()) {
                continue;
            }
            return Err(CodegenError::UnresolvedSymbol {
                name: name.into_owned(),
            });
        }
        Ok(())
    }
}

/// A finalized program. Owns the engine and, through it, the module.
pub struct JitProgram<'ctx> {
    engine: ExecutionEngine<'ctx>,
    _module: Module<'ctx>,
    functions: HashMap<String, String>,
    entry: Option<String>,
}

impl<'ctx> JitProgram<'ctx> {
    pub fn has_entry_point(&self) -> bool {
        self.entry.is_some()
    }

    /// Invoke the entry point, printing to stdout.
    pub fn run(&self) -> CodegenResult<i8> {
        let (status, _) = self.run_with(Output::Stdout)?;
        Ok(status)
    }

    pub fn run_captured(&self) -> CodegenResult<(i8, String)> {
        let (status, output) = self.run_with(Output::Buffer(Vec::new()))?;
        Ok((status, output.into_string()))
    }

    fn run_with(&self, output: Output) -> CodegenResult<(i8, Output)> {
        let name = self.entry.as_deref().ok_or(CodegenError::MissingEntryPoint)?;
        let entry: JitFunction<'ctx, EntryFn> = self.lookup(name)?;
        let (status, output) = session::scoped(output, || unsafe { entry.call(ENTRY_ARGUMENT) });
        log::info!("entry point returned status {status}");
        Ok((status, output))
    }

    /// Call a compiled function directly with host values.
    pub fn call_function(&self, name: &str, args: &[Value]) -> CodegenResult<Value> {
        let (value, _) = self.call_function_with(name, args, Output::Stdout)?;
        Ok(value)
    }

    pub fn call_function_captured(
        &self,
        name: &str,
        args: &[Value],
    ) -> CodegenResult<(Value, String)> {
        let (value, output) = self.call_function_with(name, args, Output::Buffer(Vec::new()))?;
        Ok((value, output.into_string()))
    }

    fn call_function_with(
        &self,
        name: &str,
        args: &[Value],
        output: Output,
    ) -> CodegenResult<(Value, Output)> {
        let symbol = self
            .functions
            .get(name)
            .ok_or_else(|| CodegenError::UnknownFunction {
                name: name.to_string(),
            })?;
        let function: JitFunction<'ctx, PlsmFn> = self.lookup(symbol)?;
        let argc = i32::try_from(args.len())
            .map_err(|_| CodegenError::Internal("too many arguments"))?;
        let (result, output) = session::scoped(output, || {
            let raw_args: Vec<RawValue> =
                session::with_heap(|heap| args.iter().map(|arg| heap.store(arg)).collect())
                    .unwrap_or_default();
            let argv = if raw_args.is_empty() {
                ptr::null()
            } else {
                raw_args.as_ptr()
            };
            // Decode before the session's heap is released.
            unsafe { function.call(argc, argv).to_value() }
        });
        Ok((result?, output))
    }

    fn lookup<F: inkwell::execution_engine::UnsafeFunctionPointer>(
        &self,
        symbol: &str,
    ) -> CodegenResult<JitFunction<'ctx, F>> {
        unsafe { self.engine.get_function::<F>(symbol) }.map_err(|err| CodegenError::Lookup {
            name: symbol.to_string(),
            message: err.to_string(),
        })
    }
}
