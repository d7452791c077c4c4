//! Type expressions: the declared types of parameters and results, together
//! with the markers attached to them.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

use crate::error::{AnnotationSite, BindError};
use crate::markers::Annotation;

/// How a named type takes part in a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRole {
    /// An ordinary value or model.
    Value,
    /// A declared fault or error response.
    Fault,
    /// The "successful, empty" result of methods that declare no return type.
    Unit,
}

/// A declared model attribute, possibly carrying response markers.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub ty: TypeExpr,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: Cow<'static, str>,
    /// JSON schema of the type; `None` accepts any payload.
    pub schema: Option<Arc<Value>>,
    pub role: TypeRole,
    pub attributes: Vec<Attribute>,
}

impl TypeInfo {
    fn of<T: JsonSchema>(role: TypeRole) -> Self {
        Self {
            name: T::schema_name(),
            schema: Some(Arc::new(schema_for!(T).to_value())),
            role,
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Named(TypeInfo),
    /// A type wrapped with markers.
    Annotated(Box<TypeExpr>, Vec<Annotation>),
    Union(Vec<TypeExpr>),
    /// A named alias of another type expression.
    Alias(String, Box<TypeExpr>),
    /// A string-form reference resolved through the interface's [`TypeScope`].
    Forward(String),
}

impl TypeExpr {
    pub fn of<T: JsonSchema>() -> Self {
        TypeExpr::Named(TypeInfo::of::<T>(TypeRole::Value))
    }

    /// A model whose attributes may carry response markers.
    pub fn model<T: JsonSchema>(attributes: impl IntoIterator<Item = Attribute>) -> Self {
        let mut info = TypeInfo::of::<T>(TypeRole::Value);
        info.attributes = attributes.into_iter().collect();
        TypeExpr::Named(info)
    }

    /// A declared fault type, see the SOAP backend.
    pub fn fault<T: JsonSchema>() -> Self {
        TypeExpr::Named(TypeInfo::of::<T>(TypeRole::Fault))
    }

    /// Accepts any value.
    pub fn any() -> Self {
        TypeExpr::Named(TypeInfo {
            name: Cow::Borrowed("Any"),
            schema: None,
            role: TypeRole::Value,
            attributes: Vec::new(),
        })
    }

    /// The successful empty result.
    pub fn unit() -> Self {
        TypeExpr::Named(TypeInfo {
            name: Cow::Borrowed("SuccessfulEmpty"),
            schema: None,
            role: TypeRole::Unit,
            attributes: Vec::new(),
        })
    }

    /// Like [`unit`](Self::unit), but only `null` or an empty object is
    /// accepted as the body.
    pub fn empty() -> Self {
        TypeExpr::Named(TypeInfo {
            name: Cow::Borrowed("Empty"),
            schema: Some(Arc::new(serde_json::json!({
                "title": "Empty",
                "anyOf": [
                    { "type": "null" },
                    { "type": "object", "maxProperties": 0 }
                ]
            }))),
            role: TypeRole::Unit,
            attributes: Vec::new(),
        })
    }

    pub fn union(arms: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Union(arms.into_iter().collect())
    }

    pub fn alias(name: impl Into<String>, target: TypeExpr) -> Self {
        TypeExpr::Alias(name.into(), Box::new(target))
    }

    pub fn forward(name: impl Into<String>) -> Self {
        TypeExpr::Forward(name.into())
    }

    /// Attach a marker, flattening into an existing annotated wrapper.
    pub fn annotate(self, annotation: impl Into<Annotation>) -> Self {
        match self {
            TypeExpr::Annotated(inner, mut annotations) => {
                annotations.push(annotation.into());
                TypeExpr::Annotated(inner, annotations)
            }
            other => TypeExpr::Annotated(Box::new(other), vec![annotation.into()]),
        }
    }

    pub fn annotated(self, annotations: impl IntoIterator<Item = Annotation>) -> Self {
        annotations
            .into_iter()
            .fold(self, |ty, annotation| ty.annotate(annotation))
    }

    /// Display name for diagnostics.
    pub fn name(&self) -> String {
        match self {
            TypeExpr::Named(info) => info.name.to_string(),
            TypeExpr::Annotated(inner, _) => inner.name(),
            TypeExpr::Union(arms) => arms
                .iter()
                .map(TypeExpr::name)
                .collect::<Vec<_>>()
                .join(" | "),
            TypeExpr::Alias(name, _) | TypeExpr::Forward(name) => name.clone(),
        }
    }

    /// Replace every forward reference using `scope`.
    pub fn resolve(&self, scope: &TypeScope, site: &AnnotationSite) -> Result<TypeExpr, BindError> {
        self.resolve_at(scope, site, 0)
    }

    fn resolve_at(
        &self,
        scope: &TypeScope,
        site: &AnnotationSite,
        depth: usize,
    ) -> Result<TypeExpr, BindError> {
        if depth > TypeScope::MAX_DEPTH {
            return Err(BindError::InvalidAnnotation {
                site: site.clone(),
                reason: format!("`{}` expands recursively", self.name()),
            });
        }
        Ok(match self {
            TypeExpr::Named(info) => {
                let mut info = info.clone();
                for attribute in &mut info.attributes {
                    attribute.ty = attribute.ty.resolve_at(scope, site, depth + 1)?;
                }
                TypeExpr::Named(info)
            }
            TypeExpr::Annotated(inner, annotations) => TypeExpr::Annotated(
                Box::new(inner.resolve_at(scope, site, depth + 1)?),
                annotations.clone(),
            ),
            TypeExpr::Union(arms) => TypeExpr::Union(
                arms.iter()
                    .map(|arm| arm.resolve_at(scope, site, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            TypeExpr::Alias(name, target) => {
                TypeExpr::Alias(name.clone(), Box::new(target.resolve_at(scope, site, depth + 1)?))
            }
            TypeExpr::Forward(name) => scope
                .get(name)
                .ok_or_else(|| BindError::UnresolvedType {
                    site: site.clone(),
                    name: name.clone(),
                })?
                .resolve_at(scope, site, depth + 1)?,
        })
    }

    /// Strip alias and annotated wrappers, recursing into union arms and
    /// flattening nested unions.
    pub fn strip(&self) -> TypeExpr {
        match self {
            TypeExpr::Annotated(inner, _) | TypeExpr::Alias(_, inner) => inner.strip(),
            TypeExpr::Union(arms) => {
                let mut flat = Vec::with_capacity(arms.len());
                for arm in arms {
                    match arm.strip() {
                        TypeExpr::Union(nested) => flat.extend(nested),
                        other => flat.push(other),
                    }
                }
                TypeExpr::Union(flat)
            }
            other => other.clone(),
        }
    }

    /// The named arms of a stripped expression, in declaration order.
    pub fn arms(&self) -> Vec<&TypeInfo> {
        let mut arms = Vec::new();
        self.collect_arms(&mut arms);
        arms
    }

    fn collect_arms<'a>(&'a self, out: &mut Vec<&'a TypeInfo>) {
        match self {
            TypeExpr::Named(info) => out.push(info),
            TypeExpr::Annotated(inner, _) | TypeExpr::Alias(_, inner) => inner.collect_arms(out),
            TypeExpr::Union(arms) => arms.iter().for_each(|arm| arm.collect_arms(out)),
            TypeExpr::Forward(_) => {}
        }
    }

    /// Every annotation nested anywhere in the expression, depth first.
    ///
    /// An annotated wrapper yields the annotations of its inner type before
    /// its own; union arms are visited in order. Model attributes are not
    /// visited.
    pub fn annotations(&self) -> Vec<&Annotation> {
        let mut found = Vec::new();
        self.collect_annotations(&mut found);
        found
    }

    fn collect_annotations<'a>(&'a self, out: &mut Vec<&'a Annotation>) {
        match self {
            TypeExpr::Annotated(inner, annotations) => {
                inner.collect_annotations(out);
                out.extend(annotations.iter());
            }
            TypeExpr::Alias(_, inner) => inner.collect_annotations(out),
            TypeExpr::Union(arms) => arms.iter().for_each(|arm| arm.collect_annotations(out)),
            TypeExpr::Named(_) | TypeExpr::Forward(_) => {}
        }
    }
}

impl From<TypeInfo> for TypeExpr {
    fn from(info: TypeInfo) -> Self {
        TypeExpr::Named(info)
    }
}

/// Names available to forward references of one interface.
#[derive(Debug, Clone, Default)]
pub struct TypeScope {
    names: HashMap<String, TypeExpr>,
}

impl TypeScope {
    const MAX_DEPTH: usize = 64;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, ty: TypeExpr) -> &mut Self {
        self.names.insert(name.into(), ty);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypeExpr> {
        self.names.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::{Extract, Map};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Item {
        name: String,
    }

    fn site() -> AnnotationSite {
        AnnotationSite::return_type("Catalog", "get")
    }

    fn keys(annotations: &[&Annotation]) -> Vec<String> {
        annotations
            .iter()
            .map(|annotation| match annotation {
                Annotation::Response(marker) => {
                    if let Some(map) = marker.downcast_ref::<Map>() {
                        format!("map:{}", map.key())
                    } else if let Some(extract) = marker.downcast_ref::<Extract>() {
                        format!("extract:{}", extract.key())
                    } else {
                        "other".into()
                    }
                }
                Annotation::Parameter(_) => "parameter".into(),
            })
            .collect()
    }

    #[test]
    fn test_of_uses_schema_name() {
        let ty = TypeExpr::of::<Item>();
        assert_eq!(ty.name(), "Item");
        match ty {
            TypeExpr::Named(info) => {
                assert!(info.schema.is_some());
                assert_eq!(info.role, TypeRole::Value);
            }
            other => panic!("unexpected expression: {other:?}"),
        }
    }

    #[test]
    fn test_annotate_flattens() {
        let ty = TypeExpr::of::<Item>()
            .annotate(Extract::new("body"))
            .annotate(Map::new("data"));
        match &ty {
            TypeExpr::Annotated(inner, annotations) => {
                assert!(matches!(**inner, TypeExpr::Named(_)));
                assert_eq!(annotations.len(), 2);
            }
            other => panic!("unexpected expression: {other:?}"),
        }
    }

    #[test]
    fn test_annotations_depth_first() {
        let inner = TypeExpr::Annotated(
            Box::new(TypeExpr::of::<Item>()),
            vec![Extract::new("inner").into()],
        );
        let ty = TypeExpr::Annotated(
            Box::new(TypeExpr::alias("ItemAlias", inner)),
            vec![Map::new("outer").into()],
        );
        assert_eq!(keys(&ty.annotations()), vec!["extract:inner", "map:outer"]);
    }

    #[test]
    fn test_annotations_in_every_union_arm() {
        let ty = TypeExpr::union([
            TypeExpr::of::<Item>().annotate(Extract::new("first")),
            TypeExpr::any(),
            TypeExpr::of::<String>().annotate(Map::new("second")),
        ]);
        assert_eq!(keys(&ty.annotations()), vec!["extract:first", "map:second"]);
    }

    #[test]
    fn test_strip() {
        let ty = TypeExpr::alias(
            "Result",
            TypeExpr::union([
                TypeExpr::of::<Item>().annotate(Extract::new("body")),
                TypeExpr::union([TypeExpr::of::<String>(), TypeExpr::unit()]),
            ]),
        );
        let stripped = ty.strip();
        let names: Vec<_> = stripped.arms().iter().map(|arm| arm.name.to_string()).collect();
        assert_eq!(names, vec!["Item", "string", "SuccessfulEmpty"]);
        assert!(stripped.annotations().is_empty());
    }

    #[test]
    fn test_resolve_forward() {
        let mut scope = TypeScope::new();
        scope.define("Item", TypeExpr::of::<Item>());
        let ty = TypeExpr::forward("Item").annotate(Extract::new("body"));
        let resolved = ty.resolve(&scope, &site()).unwrap();
        assert_eq!(resolved.strip().name(), "Item");
        assert_eq!(resolved.annotations().len(), 1);
    }

    #[test]
    fn test_resolve_unknown_forward() {
        let err = TypeExpr::union([TypeExpr::any(), TypeExpr::forward("Missing")])
            .resolve(&TypeScope::new(), &site())
            .unwrap_err();
        assert_eq!(
            err,
            BindError::UnresolvedType {
                site: site(),
                name: "Missing".into()
            }
        );
    }

    #[test]
    fn test_resolve_recursive_forward() {
        let mut scope = TypeScope::new();
        scope.define("Loop", TypeExpr::forward("Loop"));
        let err = TypeExpr::forward("Loop").resolve(&scope, &site()).unwrap_err();
        assert!(matches!(err, BindError::InvalidAnnotation { .. }));
    }
}
