use super::*;
use inkwell::{values::IntValue, FloatPredicate, IntPredicate};

impl<'ctx> Compiler<'ctx> {
    /// Fill the dispatch table, one slot per tag in tag order. Runs once, from
    /// `Compiler::new`, before anything can lower a conditional.
    pub(super) fn init_logicals(&mut self) -> CodegenResult<()> {
        let mut slots = Vec::with_capacity(Tag::ALL.len());
        for tag in Tag::ALL {
            let slot = match self.get_logical_for(tag)? {
                Some(function) => function.as_global_value().as_pointer_value(),
                // TODO: decide whether string truthiness means non-empty or a compile error.
                None => self.types.ptr.const_null(),
            };
            slots.push(slot);
        }
        self.logical_table
            .set_initializer(&self.types.ptr.const_array(&slots));
        self.logical_table.set_constant(true);
        Ok(())
    }

    /// The memoized truthiness function for `tag`. STRING has none.
    pub fn get_logical_for(&mut self, tag: Tag) -> CodegenResult<Option<FunctionValue<'ctx>>> {
        let name = match tag {
            Tag::Null => "null_logical",
            Tag::Int => "int_logical",
            Tag::Float => "float_logical",
            Tag::String => return Ok(None),
        };
        if let Some(function) = self.module.get_function(name) {
            return Ok(Some(function));
        }

        let function = self.module.add_function(name, self.types.logical, None);
        self.detached(|this| {
            let entry = this.context.append_basic_block(function, "entry");
            this.builder.position_at_end(entry);
            let result = match tag {
                Tag::Int => {
                    let payload = this.logical_payload(function)?;
                    let int = this
                        .builder
                        .build_load(this.types.int, payload, "int")?
                        .into_int_value();
                    this.builder.build_int_compare(
                        IntPredicate::NE,
                        int,
                        this.types.int.const_zero(),
                        "truthy",
                    )?
                }
                Tag::Float => {
                    let payload = this.logical_payload(function)?;
                    let float = this
                        .builder
                        .build_load(this.types.float, payload, "float")?
                        .into_float_value();
                    this.builder.build_float_compare(
                        FloatPredicate::UNE,
                        float,
                        this.types.float.const_zero(),
                        "truthy",
                    )?
                }
                Tag::Null | Tag::String => this.context.bool_type().const_zero(),
            };
            this.builder.build_return(Some(&result))?;
            Ok(())
        })?;
        log::debug!("synthesized `{name}`");
        Ok(Some(function))
    }

    fn logical_payload(
        &mut self,
        function: FunctionValue<'ctx>,
    ) -> CodegenResult<inkwell::values::PointerValue<'ctx>> {
        let value = Self::param(function, 0)?.into_struct_value();
        self.extract_payload(value)
    }

    /// Index the dispatch table with the value's tag and call through it.
    pub fn coerce_to_logical(&mut self, value: StructValue<'ctx>) -> CodegenResult<IntValue<'ctx>> {
        let tag = self.extract_tag(value)?;
        let index = self
            .builder
            .build_int_z_extend(tag, self.types.index, "logical_idx")?;
        let table_type = self.types.ptr.array_type(Tag::ALL.len() as u32);
        let slot = unsafe {
            self.builder.build_in_bounds_gep(
                table_type,
                self.logical_table.as_pointer_value(),
                &[self.types.index.const_zero(), index],
                "logical_slot",
            )
        }?;
        let callee = self
            .builder
            .build_load(self.types.ptr, slot, "logical_fn")?
            .into_pointer_value();
        let call =
            self.builder
                .build_indirect_call(self.types.logical, callee, &[value.into()], "truthy")?;
        call.try_as_basic_value()
            .left()
            .map(|flag| flag.into_int_value())
            .ok_or(CodegenError::Internal("logical function returned no value"))
    }
}
