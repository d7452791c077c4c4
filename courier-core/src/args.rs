//! Call arguments and their binding against a declared parameter list.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ArgumentError;
use crate::types::TypeExpr;

type LazyValue = dyn Fn() -> Value + Send + Sync;

/// One argument value, either ready or produced on demand.
#[derive(Clone)]
pub enum Arg {
    Value(Value),
    /// Zero-argument callable evaluated right before markers see the value.
    Lazy(Arc<LazyValue>),
}

impl Arg {
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Arg::Lazy(Arc::new(f))
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Arg::Lazy(_))
    }

    /// The value of an argument that is not lazy.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) => Some(value),
            Arg::Lazy(_) => None,
        }
    }

    /// The concrete value, calling the producer of a lazy argument.
    pub fn resolve(&self) -> Value {
        match self {
            Arg::Value(value) => value.clone(),
            Arg::Lazy(producer) => producer(),
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Arg::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

/// Raw positional and keyword arguments of one call.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Arg>,
    pub keyword: IndexMap<String, Arg>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(Arg::Value(value.into()));
        self
    }

    pub fn arg_lazy<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.positional.push(Arg::lazy(f));
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), Arg::Value(value.into()));
        self
    }

    pub fn kwarg_lazy<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.keyword.insert(name.into(), Arg::lazy(f));
        self
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOrKeyword,
    KeywordOnly,
}

/// A declared method parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Arg>,
    pub kind: ParamKind,
    /// May be omitted without a default; markers then skip it.
    pub optional: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            kind: ParamKind::PositionalOrKeyword,
            optional: false,
        }
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(Arg::Value(value.into()));
        self
    }

    pub fn lazy_default<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(Arg::lazy(f));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn keyword_only(mut self) -> Self {
        self.kind = ParamKind::KeywordOnly;
        self
    }

    fn is_required(&self) -> bool {
        self.default.is_none() && !self.optional
    }
}

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    kind: ParamKind,
    default: Option<Arg>,
    required: bool,
}

/// Maps a raw call onto the declared parameters.
#[derive(Debug, Clone)]
pub struct ArgumentBinder {
    method: String,
    slots: Arc<[Slot]>,
}

impl ArgumentBinder {
    pub fn new(method: impl Into<String>, params: &[Param]) -> Self {
        let slots = params
            .iter()
            .map(|param| Slot {
                name: param.name.clone(),
                kind: param.kind,
                default: param.default.clone(),
                required: param.is_required(),
            })
            .collect();
        Self {
            method: method.into(),
            slots,
        }
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    /// Bind the call without applying defaults.
    pub fn bind(&self, call: CallArgs) -> Result<BoundArguments, ArgumentError> {
        let CallArgs {
            positional,
            keyword,
        } = call;

        let positional_slots = self
            .slots
            .iter()
            .take_while(|slot| slot.kind == ParamKind::PositionalOrKeyword)
            .count();
        if positional.len() > positional_slots {
            return Err(ArgumentError::TooManyPositional {
                method: self.method.clone(),
                expected: positional_slots,
                given: positional.len(),
            });
        }

        let mut values: Vec<Option<Arg>> = vec![None; self.slots.len()];
        for (index, arg) in positional.into_iter().enumerate() {
            values[index] = Some(arg);
        }

        for (name, arg) in keyword {
            let Some(index) = self.slots.iter().position(|slot| slot.name == name) else {
                return Err(ArgumentError::UnexpectedKeyword {
                    method: self.method.clone(),
                    name,
                });
            };
            if values[index].is_some() {
                return Err(ArgumentError::MultipleValues {
                    method: self.method.clone(),
                    name,
                });
            }
            values[index] = Some(arg);
        }

        let mut arguments = IndexMap::with_capacity(self.slots.len());
        for (slot, value) in self.slots.iter().zip(values) {
            match value {
                Some(arg) => {
                    arguments.insert(slot.name.clone(), arg);
                }
                None if slot.required => {
                    return Err(ArgumentError::Missing {
                        method: self.method.clone(),
                        name: slot.name.clone(),
                    });
                }
                None => {}
            }
        }

        Ok(BoundArguments {
            slots: Arc::clone(&self.slots),
            arguments,
        })
    }
}

/// Arguments of one call, keyed by parameter name in declaration order.
#[derive(Debug, Clone)]
pub struct BoundArguments {
    slots: Arc<[Slot]>,
    arguments: IndexMap<String, Arg>,
}

impl BoundArguments {
    /// Fill in declared defaults for parameters the caller left out.
    pub fn apply_defaults(&mut self) {
        if self.arguments.len() == self.slots.len() {
            return;
        }
        let mut arguments = IndexMap::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            if let Some(arg) = self.arguments.swap_remove(&slot.name) {
                arguments.insert(slot.name.clone(), arg);
            } else if let Some(default) = &slot.default {
                arguments.insert(slot.name.clone(), default.clone());
            }
        }
        self.arguments = arguments;
    }

    /// Call every lazy producer once and keep its value for the rest of the
    /// call.
    pub fn resolve_lazy(&mut self) {
        for arg in self.arguments.values_mut() {
            if let Arg::Lazy(producer) = arg {
                let value = producer();
                *arg = Arg::Value(value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.arguments.get(name)
    }

    /// Resolved value of `name`, if bound.
    pub fn value(&self, name: &str) -> Option<Value> {
        self.arguments.get(name).map(Arg::resolve)
    }

    pub fn arguments(&self) -> &IndexMap<String, Arg> {
        &self.arguments
    }

    /// Resolved values of the leading positional parameters, stopping at the
    /// first one that is not bound.
    pub fn args(&self) -> Vec<Value> {
        self.slots
            .iter()
            .take_while(|slot| slot.kind == ParamKind::PositionalOrKeyword)
            .map_while(|slot| self.arguments.get(&slot.name).map(Arg::resolve))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn binder() -> ArgumentBinder {
        ArgumentBinder::new(
            "search",
            &[
                Param::new("query", TypeExpr::any()),
                Param::new("limit", TypeExpr::any()).default(10),
                Param::new("cursor", TypeExpr::any()).optional(),
                Param::new("verbose", TypeExpr::any())
                    .keyword_only()
                    .default(false),
            ],
        )
    }

    #[test]
    fn test_bind_positional_and_keyword() {
        let mut bound = binder()
            .bind(CallArgs::new().arg("rust").kwarg("verbose", true))
            .unwrap();
        assert_eq!(bound.len(), 2);

        bound.apply_defaults();
        let names: Vec<_> = bound.arguments().keys().cloned().collect();
        assert_eq!(names, vec!["query", "limit", "verbose"]);
        assert_eq!(bound.value("limit"), Some(json!(10)));
        assert_eq!(bound.value("verbose"), Some(json!(true)));
        assert_eq!(bound.value("cursor"), None);
        assert_eq!(bound.args(), vec![json!("rust"), json!(10)]);
    }

    #[test]
    fn test_bind_too_many_positional() {
        let err = binder()
            .bind(CallArgs::new().arg(1).arg(2).arg(3).arg(4))
            .unwrap_err();
        assert_eq!(
            err,
            ArgumentError::TooManyPositional {
                method: "search".into(),
                expected: 3,
                given: 4
            }
        );
    }

    #[test]
    fn test_bind_unexpected_keyword() {
        let err = binder()
            .bind(CallArgs::new().arg(1).kwarg("page", 2))
            .unwrap_err();
        assert!(matches!(err, ArgumentError::UnexpectedKeyword { name, .. } if name == "page"));
    }

    #[test]
    fn test_bind_multiple_values() {
        let err = binder()
            .bind(CallArgs::new().arg(1).kwarg("query", 2))
            .unwrap_err();
        assert!(matches!(err, ArgumentError::MultipleValues { name, .. } if name == "query"));
    }

    #[test]
    fn test_bind_missing() {
        let err = binder().bind(CallArgs::new().kwarg("limit", 5)).unwrap_err();
        assert!(matches!(err, ArgumentError::Missing { name, .. } if name == "query"));
    }

    #[test]
    fn test_args_stop_at_first_gap() {
        let binder = ArgumentBinder::new(
            "get",
            &[
                Param::new("a", TypeExpr::any()),
                Param::new("b", TypeExpr::any()).optional(),
                Param::new("c", TypeExpr::any()).default(3),
            ],
        );
        let mut bound = binder.bind(CallArgs::new().arg(1)).unwrap();
        bound.apply_defaults();
        assert_eq!(bound.args(), vec![json!(1)]);
        assert_eq!(bound.value("c"), Some(json!(3)));
    }

    #[test]
    fn test_lazy_default_is_not_called_while_binding() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let binder = ArgumentBinder::new(
            "now",
            &[Param::new("at", TypeExpr::any()).lazy_default(move || {
                json!(counter.fetch_add(1, Ordering::SeqCst))
            })],
        );

        let mut bound = binder.bind(CallArgs::new()).unwrap();
        bound.apply_defaults();
        assert!(bound.get("at").unwrap().is_lazy());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        bound.resolve_lazy();
        assert_eq!(bound.get("at").unwrap().as_value(), Some(&json!(0)));
        assert_eq!(bound.value("at"), Some(json!(0)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(bound.value("at"), Some(json!(0)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
