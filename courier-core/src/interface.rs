//! Interface declarations.
//!
//! An interface is described once through an [`InterfaceBuilder`]; the result
//! is cached per interface type for the process lifetime.

use std::any::{type_name, TypeId};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use serde_json::Value;

use crate::args::{Param, ParamKind};
use crate::markers::{MarkerTable, MethodMarker};
use crate::types::{TypeExpr, TypeScope};

/// A service interface that can be bound to a backend.
///
/// Usually implemented for `dyn Trait`, where `Trait` is the user-facing
/// async trait:
///
/// ```ignore
/// impl Interface for dyn Catalog {
///     fn declare(api: &mut InterfaceBuilder) {
///         api.method("get", |m| {
///             m.param("id", TypeExpr::of::<u64>().annotate(QueryParam::new("id")))
///                 .returns(TypeExpr::of::<Item>().annotate(Extract::new("body")));
///         });
///     }
/// }
/// ```
pub trait Interface: 'static {
    fn declare(api: &mut InterfaceBuilder);
}

/// One declared member of an interface.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<Param>,
    /// `None` when the method declares no return type.
    pub returns: Option<TypeExpr>,
    /// `false` for associated functions, which are never bound.
    pub receiver: bool,
}

impl MethodDecl {
    /// Whether the binder exposes this member.
    pub fn is_public(&self) -> bool {
        self.receiver && (!self.name.starts_with('_') || self.name == "__call__")
    }
}

/// The full description of an interface.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub type_id: TypeId,
    pub name: String,
    pub doc: Option<String>,
    pub scope: TypeScope,
    pub methods: Vec<MethodDecl>,
    pub markers: MarkerTable,
}

impl Declaration {
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|method| method.name == name)
    }
}

static DECLARATIONS: LazyLock<DashMap<TypeId, Arc<Declaration>>> = LazyLock::new(DashMap::new);

/// The cached declaration of `I`, built on first access.
pub fn declaration<I: Interface + ?Sized>() -> Arc<Declaration> {
    let type_id = TypeId::of::<I>();
    if let Some(found) = DECLARATIONS.get(&type_id) {
        return Arc::clone(found.value());
    }
    // `declare` may look up other declarations; no shard lock is held here.
    let mut api = InterfaceBuilder::new(type_id, short_type_name::<I>());
    I::declare(&mut api);
    let declared = Arc::new(api.finish());
    let entry = DECLARATIONS.entry(type_id).or_insert(declared);
    Arc::clone(entry.value())
}

/// `dyn my_crate::api::Catalog` becomes `Catalog`.
fn short_type_name<I: ?Sized>() -> String {
    let full = type_name::<I>();
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).trim().to_owned()
}

#[derive(Debug)]
pub struct InterfaceBuilder {
    type_id: TypeId,
    name: String,
    doc: Option<String>,
    scope: TypeScope,
    methods: Vec<MethodDecl>,
    markers: MarkerTable,
}

impl InterfaceBuilder {
    fn new(type_id: TypeId, name: String) -> Self {
        Self {
            type_id,
            name,
            doc: None,
            scope: TypeScope::new(),
            methods: Vec::new(),
            markers: MarkerTable::new(),
        }
    }

    /// Override the name derived from the Rust type.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn doc(&mut self, doc: impl Into<String>) -> &mut Self {
        self.doc = Some(doc.into());
        self
    }

    /// Make `name` available to [`TypeExpr::forward`] references.
    pub fn define_type(&mut self, name: impl Into<String>, ty: TypeExpr) -> &mut Self {
        self.scope.define(name, ty);
        self
    }

    pub fn method<F>(&mut self, name: impl Into<String>, declare: F) -> &mut Self
    where
        F: FnOnce(&mut MethodBuilder<'_>),
    {
        let mut method = MethodDecl {
            name: name.into(),
            doc: None,
            params: Vec::new(),
            returns: None,
            receiver: true,
        };
        let mut builder = MethodBuilder {
            method: &mut method,
            markers: &mut self.markers,
        };
        declare(&mut builder);
        self.methods.push(method);
        self
    }

    fn finish(self) -> Declaration {
        Declaration {
            type_id: self.type_id,
            name: self.name,
            doc: self.doc,
            scope: self.scope,
            methods: self.methods,
            markers: self.markers,
        }
    }
}

#[derive(Debug)]
pub struct MethodBuilder<'a> {
    method: &'a mut MethodDecl,
    markers: &'a mut MarkerTable,
}

impl MethodBuilder<'_> {
    pub fn param(&mut self, name: impl Into<String>, ty: TypeExpr) -> &mut Self {
        self.push(Param::new(name, ty))
    }

    pub fn param_with_default(
        &mut self,
        name: impl Into<String>,
        ty: TypeExpr,
        default: impl Into<Value>,
    ) -> &mut Self {
        self.push(Param::new(name, ty).default(default))
    }

    /// The default is produced by `f` on every call that omits the parameter.
    pub fn param_lazy_default<F>(&mut self, name: impl Into<String>, ty: TypeExpr, f: F) -> &mut Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.push(Param::new(name, ty).lazy_default(f))
    }

    /// A parameter that may be left out without a default.
    pub fn optional_param(&mut self, name: impl Into<String>, ty: TypeExpr) -> &mut Self {
        self.push(Param::new(name, ty).optional())
    }

    pub fn keyword_only(&mut self, param: Param) -> &mut Self {
        self.push(Param {
            kind: ParamKind::KeywordOnly,
            ..param
        })
    }

    pub fn push(&mut self, param: Param) -> &mut Self {
        self.method.params.push(param);
        self
    }

    pub fn returns(&mut self, ty: TypeExpr) -> &mut Self {
        self.method.returns = Some(ty);
        self
    }

    /// Attach a method marker; markers apply in the order they are attached.
    pub fn mark(&mut self, marker: impl MethodMarker) -> &mut Self {
        self.markers.mark(&self.method.name, Arc::new(marker));
        self
    }

    pub fn doc(&mut self, doc: impl Into<String>) -> &mut Self {
        self.method.doc = Some(doc.into());
        self
    }

    /// Declare the member without a receiver; the binder skips it.
    pub fn associated_fn(&mut self) -> &mut Self {
        self.method.receiver = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::wrap_with;

    trait Inventory {}

    impl Interface for dyn Inventory {
        fn declare(api: &mut InterfaceBuilder) {
            api.doc("Stock levels.")
                .define_type("Count", TypeExpr::of::<u32>())
                .method("count", |m| {
                    m.param("sku", TypeExpr::of::<String>())
                        .returns(TypeExpr::forward("Count"))
                        .mark(wrap_with(|method| method));
                })
                .method("_internal", |_| {})
                .method("__call__", |_| {})
                .method("create", |m| {
                    m.associated_fn();
                });
        }
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<dyn Inventory>(), "Inventory");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
    }

    #[test]
    fn test_declaration_is_cached() {
        let first = declaration::<dyn Inventory>();
        let second = declaration::<dyn Inventory>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "Inventory");
        assert_eq!(first.doc.as_deref(), Some("Stock levels."));
        assert!(first.scope.contains("Count"));
        assert_eq!(first.markers.markers("count").len(), 1);
    }

    #[test]
    fn test_public_members() {
        let declaration = declaration::<dyn Inventory>();
        let public: Vec<_> = declaration
            .methods
            .iter()
            .filter(|method| method.is_public())
            .map(|method| method.name.as_str())
            .collect();
        assert_eq!(public, vec!["count", "__call__"]);
    }
}
