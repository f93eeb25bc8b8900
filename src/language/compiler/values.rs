use super::*;
use inkwell::values::{IntValue, PointerValue};

impl<'ctx> Compiler<'ctx> {
    /// `{NULL, null}`. A constant; allocates nothing.
    pub fn make_null(&self) -> StructValue<'ctx> {
        self.types.value.const_named_struct(&[
            self.types.tag.const_int(Tag::Null.as_u8().into(), false).into(),
            self.types.ptr.const_null().into(),
        ])
    }

    pub fn make_int(&mut self, value: i64) -> CodegenResult<StructValue<'ctx>> {
        let payload = self.allocate(self.types.int.into(), 1)?;
        self.builder
            .build_store(payload, self.types.int.const_int(value as u64, true))?;
        self.build_value(Tag::Int, payload)
    }

    pub fn make_float(&mut self, value: f64) -> CodegenResult<StructValue<'ctx>> {
        let payload = self.allocate(self.types.float.into(), 1)?;
        self.builder
            .build_store(payload, self.types.float.const_float(value))?;
        self.build_value(Tag::Float, payload)
    }

    /// Code points followed by a zero terminator, in one heap block.
    pub fn make_string(&mut self, text: &str) -> CodegenResult<StructValue<'ctx>> {
        let mut points: Vec<IntValue<'ctx>> = text
            .chars()
            .map(|ch| self.types.char.const_int(u64::from(u32::from(ch)), false))
            .collect();
        points.push(self.types.char.const_zero());
        let array_type = self.types.char.array_type(points.len() as u32);
        let payload = self.allocate(array_type.into(), 1)?;
        self.builder
            .build_store(payload, self.types.char.const_array(&points))?;
        self.build_value(Tag::String, payload)
    }

    /// Call `allocate` for `count` elements of `ty`, sized by the target's
    /// data layout.
    pub(crate) fn allocate(
        &mut self,
        ty: BasicTypeEnum<'ctx>,
        count: u64,
    ) -> CodegenResult<PointerValue<'ctx>> {
        self.current_function("allocation")?;
        let size = self.type_size(ty) * count;
        let call = self.builder.build_call(
            self.natives.allocate,
            &[self.types.index.const_int(size, false).into()],
            "payload",
        )?;
        call.try_as_basic_value()
            .left()
            .map(|value| value.into_pointer_value())
            .ok_or(CodegenError::Internal("allocate returned no pointer"))
    }

    fn build_value(
        &mut self,
        tag: Tag,
        payload: PointerValue<'ctx>,
    ) -> CodegenResult<StructValue<'ctx>> {
        let tag = self.types.tag.const_int(tag.as_u8().into(), false);
        let tagged =
            self.builder
                .build_insert_value(self.types.value.get_undef(), tag, 0, "tagged")?;
        let value = self.builder.build_insert_value(tagged, payload, 1, "value")?;
        Ok(value.into_struct_value())
    }

    pub(crate) fn extract_tag(&mut self, value: StructValue<'ctx>) -> CodegenResult<IntValue<'ctx>> {
        Ok(self
            .builder
            .build_extract_value(value, 0, "tag")?
            .into_int_value())
    }

    pub(crate) fn extract_payload(
        &mut self,
        value: StructValue<'ctx>,
    ) -> CodegenResult<PointerValue<'ctx>> {
        Ok(self
            .builder
            .build_extract_value(value, 1, "payload")?
            .into_pointer_value())
    }
}
