use crate::language::compiler::{CodegenResult, Compiler, ExprCode, StmtCode};
use inkwell::values::StructValue;

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Function(FunctionDef),
    Return(Option<Expr>),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Variable(String),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

impl<'ctx> ExprCode<'ctx> for Expr {
    fn gen_code(&self, compiler: &mut Compiler<'ctx>) -> CodegenResult<StructValue<'ctx>> {
        match self {
            Expr::Null => Ok(compiler.make_null()),
            Expr::Int(value) => compiler.make_int(*value),
            Expr::Float(value) => compiler.make_float(*value),
            Expr::Str(text) => compiler.make_string(text),
            Expr::Variable(name) => compiler.load_variable(name),
            Expr::Call { name, args } => compiler.create_call(name, args),
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => compiler.create_if(
                condition.as_ref(),
                then_branch.as_ref(),
                else_branch.as_ref(),
            ),
        }
    }
}

impl<'ctx> StmtCode<'ctx> for Stmt {
    fn gen_code(&self, compiler: &mut Compiler<'ctx>) -> CodegenResult<()> {
        match self {
            Stmt::Function(def) => compiler
                .define_function(&def.name, &def.params, &def.body)
                .map(|_| ()),
            Stmt::Return(value) => {
                compiler.current_function("return statement")?;
                let value = match value {
                    Some(expr) => expr.gen_code(compiler)?,
                    None => compiler.make_null(),
                };
                compiler.create_return(value)
            }
            Stmt::Expr(expr) => {
                compiler.current_function("expression statement")?;
                expr.gen_code(compiler).map(|_| ())
            }
        }
    }
}
