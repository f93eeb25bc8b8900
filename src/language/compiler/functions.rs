use super::*;
use crate::language::options::UnresolvedCallPolicy;
use inkwell::values::{BasicMetadataValueEnum, PointerValue};

impl<'ctx> Compiler<'ctx> {
    /// Lower `body` into a new function with the uniform signature and
    /// register it under `name`, replacing any earlier definition. Calls
    /// already lowered keep pointing at the old body.
    pub fn define_function<S: StmtCode<'ctx>>(
        &mut self,
        name: &str,
        params: &[String],
        body: &[S],
    ) -> CodegenResult<FunctionValue<'ctx>> {
        let symbol = format!("plsm.{name}");
        let function = self.module.add_function(&symbol, self.types.function, None);
        log::debug!(
            "lowering `{name}` as `{}` ({} statements)",
            function.get_name().to_string_lossy(),
            body.len()
        );

        self.detached(|this| {
            let entry = this.context.append_basic_block(function, "entry");
            this.builder.position_at_end(entry);
            this.frames.push(Frame {
                function,
                params: params.to_vec(),
            });
            let lowered = body.iter().try_for_each(|stmt| stmt.gen_code(this));
            this.frames.pop();
            lowered?;
            this.seal_function(name, function)
        })?;

        if self
            .functions
            .insert(name.to_string(), FunctionEntry::User(function))
            .is_some()
        {
            log::debug!("`{name}` redefined");
        }
        Ok(function)
    }

    /// Call `name` with `(argc, argv)`. Arguments are lowered left to right
    /// into a stack buffer; a call without arguments passes a null `argv`.
    pub fn create_call<E: ExprCode<'ctx>>(
        &mut self,
        name: &str,
        args: &[E],
    ) -> CodegenResult<StructValue<'ctx>> {
        self.current_function("call")?;
        let target = match self.functions.get(name) {
            Some(entry) => Some(*entry),
            None => match self.options.unresolved_calls {
                UnresolvedCallPolicy::Error => {
                    return Err(CodegenError::UnknownFunction {
                        name: name.to_string(),
                    })
                }
                UnresolvedCallPolicy::Warn => {
                    log::warn!("unable to find function '{name}'");
                    self.warnings.push(CompileWarning::UnknownFunction {
                        name: name.to_string(),
                    });
                    None
                }
            },
        };

        let argc = self.types.count.const_int(args.len() as u64, false);
        let argv = self.build_argument_buffer(args)?;
        let call_args: [BasicMetadataValueEnum<'ctx>; 2] = [argc.into(), argv.into()];
        let call = match target {
            Some(FunctionEntry::Native(function)) => {
                self.builder.build_call(function, &call_args, "")?;
                return Ok(self.make_null());
            }
            Some(FunctionEntry::User(function)) => {
                self.builder.build_call(function, &call_args, "call")?
            }
            None => self.builder.build_indirect_call(
                self.types.function,
                self.types.ptr.const_null(),
                &call_args,
                "call",
            )?,
        };
        call.try_as_basic_value()
            .left()
            .map(|value| value.into_struct_value())
            .ok_or(CodegenError::Internal("call produced no value"))
    }

    fn build_argument_buffer<E: ExprCode<'ctx>>(
        &mut self,
        args: &[E],
    ) -> CodegenResult<PointerValue<'ctx>> {
        if args.is_empty() {
            return Ok(self.types.ptr.const_null());
        }
        let buffer = self.builder.build_array_alloca(
            self.types.value,
            self.types.index.const_int(args.len() as u64, false),
            "args",
        )?;
        for (idx, arg) in args.iter().enumerate() {
            let slot = unsafe {
                self.builder.build_in_bounds_gep(
                    self.types.value,
                    buffer,
                    &[self.types.index.const_int(idx as u64, false)],
                    "arg_slot",
                )
            }?;
            let value = arg.gen_code(self)?;
            self.builder.build_store(slot, value)?;
        }
        Ok(buffer)
    }
}
