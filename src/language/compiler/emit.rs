use super::*;
use inkwell::{basic_block::BasicBlock, IntPredicate};

impl<'ctx> Compiler<'ctx> {
    /// The function owning the current insertion block.
    pub fn current_function(&self, what: &'static str) -> CodegenResult<FunctionValue<'ctx>> {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            .ok_or(CodegenError::NoInsertionPoint { what })
    }

    /// `if cond then a else b` as an expression: both arms yield a value and a
    /// phi in the merge block picks one.
    pub fn create_if<E: ExprCode<'ctx>>(
        &mut self,
        condition: &E,
        then_expr: &E,
        else_expr: &E,
    ) -> CodegenResult<StructValue<'ctx>> {
        let function = self.current_function("conditional")?;
        let cond = condition.gen_code(self)?;
        let flag = self.coerce_to_logical(cond)?;

        let then_block = self.context.append_basic_block(function, "if_then");
        let else_block = self.context.append_basic_block(function, "if_else");
        let merge_block = self.context.append_basic_block(function, "if_merge");
        self.builder
            .build_conditional_branch(flag, then_block, else_block)?;

        self.builder.position_at_end(then_block);
        let then_value = then_expr.gen_code(self)?;
        let then_exit = self.branch_to(merge_block)?;

        self.builder.position_at_end(else_block);
        let else_value = else_expr.gen_code(self)?;
        let else_exit = self.branch_to(merge_block)?;

        self.builder.position_at_end(merge_block);
        let phi = self.builder.build_phi(self.types.value, "if_value")?;
        phi.add_incoming(&[(&then_value, then_exit), (&else_value, else_exit)]);
        Ok(phi.as_basic_value().into_struct_value())
    }

    /// Branch to `target` and report the block control actually leaves from;
    /// a nested conditional moves it away from where the arm started.
    fn branch_to(&mut self, target: BasicBlock<'ctx>) -> CodegenResult<BasicBlock<'ctx>> {
        let exit = self
            .builder
            .get_insert_block()
            .ok_or(CodegenError::NoInsertionPoint { what: "branch" })?;
        self.builder.build_unconditional_branch(target)?;
        Ok(exit)
    }

    pub fn create_return(&mut self, value: StructValue<'ctx>) -> CodegenResult<()> {
        let function = self.current_function("return")?;
        self.builder.build_return(Some(&value))?;
        // Anything after the return lands in a block with no predecessors.
        let rest = self.context.append_basic_block(function, "after_return");
        self.builder.position_at_end(rest);
        Ok(())
    }

    pub fn load_variable(&mut self, name: &str) -> CodegenResult<StructValue<'ctx>> {
        let unknown = || CodegenError::UnknownVariable {
            name: name.to_string(),
        };
        let frame = self.frames.last().ok_or_else(unknown)?;
        let index = frame
            .params
            .iter()
            .rposition(|param| param == name)
            .ok_or_else(unknown)?;
        let function = frame.function;
        self.load_argument(function, index as u64, name)
    }

    /// `argv[index]` when the caller passed that many arguments, else null.
    fn load_argument(
        &mut self,
        function: FunctionValue<'ctx>,
        index: u64,
        name: &str,
    ) -> CodegenResult<StructValue<'ctx>> {
        let argc = Self::param(function, 0)?.into_int_value();
        let argv = Self::param(function, 1)?.into_pointer_value();
        let present = self.builder.build_int_compare(
            IntPredicate::SGT,
            argc,
            self.types.count.const_int(index, false),
            "has_arg",
        )?;

        let present_block = self.context.append_basic_block(function, "arg_present");
        let missing_block = self.context.append_basic_block(function, "arg_missing");
        let merge_block = self.context.append_basic_block(function, "arg_merge");
        self.builder
            .build_conditional_branch(present, present_block, missing_block)?;

        self.builder.position_at_end(present_block);
        let slot = unsafe {
            self.builder.build_in_bounds_gep(
                self.types.value,
                argv,
                &[self.types.index.const_int(index, false)],
                "arg_slot",
            )
        }?;
        let loaded = self
            .builder
            .build_load(self.types.value, slot, name)?
            .into_struct_value();
        self.builder.build_unconditional_branch(merge_block)?;

        self.builder.position_at_end(missing_block);
        let null = self.make_null();
        self.builder.build_unconditional_branch(merge_block)?;

        self.builder.position_at_end(merge_block);
        let phi = self.builder.build_phi(self.types.value, name)?;
        phi.add_incoming(&[(&loaded, present_block), (&null, missing_block)]);
        Ok(phi.as_basic_value().into_struct_value())
    }

    /// Close a body that falls off its end with `return null`, then verify.
    /// A failed verification is recorded, not fatal.
    pub(super) fn seal_function(
        &mut self,
        name: &str,
        function: FunctionValue<'ctx>,
    ) -> CodegenResult<()> {
        if let Some(block) = self.builder.get_insert_block() {
            if block.get_terminator().is_none() {
                let null = self.make_null();
                self.builder.build_return(Some(&null))?;
            }
        }
        if !function.verify(false) {
            log::warn!("function `{name}` failed verification");
            self.warnings.push(CompileWarning::IllFormedFunction {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}
