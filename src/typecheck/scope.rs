use std::cell::Cell;

use crate::ast::declaration::LocalId;
use crate::source::Span;

use super::environment::Environment;
use super::r#type::Type;
use super::{Error, Result};

#[derive(Debug)]
pub struct FunctionContext {
    return_type: Option<Type>,
    next_local: Cell<u16>,
    depth: Cell<usize>,
    max_depth: usize,
}

impl FunctionContext {
    pub fn new(return_type: Option<Type>, max_depth: usize) -> Self {
        FunctionContext {
            return_type,
            next_local: Cell::new(0),
            depth: Cell::new(0),
            max_depth,
        }
    }

    pub fn allocate_local(&self, span: &Span) -> Result<LocalId> {
        let id = self.next_local.get();
        let next = id
            .checked_add(1)
            .ok_or_else(|| Error::TooManyLocals { span: span.clone() })?;
        self.next_local.set(next);
        Ok(LocalId(id))
    }
}

pub struct DepthGuard<'ctx>(&'ctx Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

#[derive(Debug, Default)]
pub struct TopLevelScope {
    env: Environment<'static>,
}

impl TopLevelScope {
    pub fn env_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    pub fn to_function_scope<'scope>(
        &'scope self,
        context: &'scope FunctionContext,
    ) -> FunctionScope<'scope> {
        FunctionScope {
            env: self.env.derive(),
            context,
        }
    }
}

#[derive(Debug)]
pub struct FunctionScope<'scope> {
    env: Environment<'scope>,
    context: &'scope FunctionContext,
}

impl<'scope> FunctionScope<'scope> {
    pub fn derive_env(&self) -> FunctionScope {
        FunctionScope {
            env: self.env.derive(),
            context: self.context,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment<'scope> {
        &mut self.env
    }

    pub fn context(&self) -> &FunctionContext {
        self.context
    }

    pub fn return_type(&self) -> Option<&Type> {
        self.context.return_type.as_ref()
    }

    pub fn descend(&self, span: &Span) -> Result<DepthGuard<'scope>> {
        let context: &'scope FunctionContext = self.context;
        let depth = &context.depth;
        if depth.get() >= context.max_depth {
            return Err(Error::TooDeep {
                limit: context.max_depth,
                span: span.clone(),
            });
        }
        depth.set(depth.get() + 1);
        Ok(DepthGuard(depth))
    }
}
