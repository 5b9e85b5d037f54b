use crate::object::{EvaluationError, Object, Primitive, Symbol};
use gc::{Finalize, Gc, GcCell, Trace};
use std::collections::HashMap;

#[derive(Trace, Finalize)]
pub struct EnvironmentCore {
    store: HashMap<Symbol, Object>,
    outer: Option<Environment>,
}

/// Shared handle to one frame of the scope chain. Clones alias the same
/// frame, so a `define` through one handle is visible through all of them.
#[derive(Clone, Trace, Finalize)]
pub struct Environment {
    environment: Gc<GcCell<EnvironmentCore>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            environment: Gc::new(GcCell::new(EnvironmentCore {
                store: HashMap::new(),
                outer: None,
            })),
        }
    }

    pub fn new_enclosed(outer: &Environment) -> Environment {
        Environment {
            environment: Gc::new(GcCell::new(EnvironmentCore {
                store: HashMap::new(),
                outer: Some(outer.clone()),
            })),
        }
    }

    /// Binds `parameters` to `arguments` position by position in a new frame
    /// under `outer`, stopping when either side runs out. A bare symbol as
    /// the parameter list receives every remaining argument as a list.
    pub fn extend(
        parameters: &Object,
        arguments: Vec<Object>,
        outer: &Environment,
    ) -> Result<Environment, EvaluationError> {
        let environment = Environment::new_enclosed(outer);
        let mut parameters = parameters.clone();
        let mut arguments = arguments.into_iter();
        loop {
            match &parameters {
                Object::Nil => break,
                Object::Symbol(rest) => {
                    environment.define(rest.clone(), Object::list(arguments));
                    break;
                }
                Object::Pair(_) => {
                    let Some(argument) = arguments.next() else {
                        break;
                    };
                    match &parameters.head()? {
                        Object::Symbol(name) => environment.define(name.clone(), argument),
                        _ => {
                            return Err(EvaluationError::MalformedSpecialForm {
                                keyword: "lambda",
                                form: parameters,
                            })
                        }
                    }
                    parameters = parameters.tail()?;
                }
                _ => return Err(EvaluationError::NotAList(parameters)),
            }
        }
        Ok(environment)
    }

    pub fn lookup(&self, symbol: &Symbol) -> Result<Object, EvaluationError> {
        let mut current = self.clone();
        loop {
            let outer = {
                let env = current.environment.borrow();
                if let Some(value) = env.store.get(symbol) {
                    return Ok(value.clone());
                }
                env.outer.clone()
            };
            match outer {
                Some(outer) => current = outer,
                None => return Err(EvaluationError::UnboundVariable(symbol.clone())),
            }
        }
    }

    /// Always binds in this frame, shadowing any outer binding.
    pub fn define(&self, symbol: Symbol, value: Object) {
        self.environment.borrow_mut().store.insert(symbol, value);
    }

    /// Overwrites the nearest existing binding. Never creates one.
    pub fn set(&self, symbol: &Symbol, value: Object) -> Result<(), EvaluationError> {
        let mut current = self.clone();
        loop {
            let outer = {
                let mut env = current.environment.borrow_mut();
                if let Some(slot) = env.store.get_mut(symbol) {
                    *slot = value;
                    return Ok(());
                }
                env.outer.clone()
            };
            match outer {
                Some(outer) => current = outer,
                None => return Err(EvaluationError::UnboundVariable(symbol.clone())),
            }
        }
    }

    pub fn define_primitives(&self, primitives: impl IntoIterator<Item = Primitive>) {
        for primitive in primitives {
            self.define(Symbol::new(primitive.name), Object::Primitive(primitive));
        }
    }

    /// The outermost frame of the chain.
    pub fn global(&self) -> Environment {
        let mut current = self.clone();
        loop {
            let outer = current.environment.borrow().outer.clone();
            match outer {
                Some(outer) => current = outer,
                None => return current,
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_bound_locally(&self, symbol: &Symbol) -> bool {
        self.environment.borrow().store.contains_key(symbol)
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Gc::ptr_eq(&self.environment, &other.environment)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env = self.environment.borrow();
        f.debug_struct("Environment")
            .field("bindings", &env.store.len())
            .field("enclosed", &env.outer.is_some())
            .finish()
    }
}
