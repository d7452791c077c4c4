//! Per-method signatures, extracted once and shared by every backend.

use std::any::TypeId;
use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use tracing::debug;

use crate::args::ArgumentBinder;
use crate::error::{AnnotationSite, BindError};
use crate::interface::{declaration, Declaration, Interface, MethodDecl};
use crate::markers::{Annotation, MethodMarker, ParameterMarker, ResponseMarker};
use crate::types::TypeExpr;
use crate::validate::ResultValidator;

/// Identity of a declared method: its interface type and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodId {
    pub interface: TypeId,
    pub method: Cow<'static, str>,
}

impl MethodId {
    pub fn new(interface: TypeId, method: impl Into<Cow<'static, str>>) -> Self {
        Self {
            interface,
            method: method.into(),
        }
    }
}

/// A parameter marker together with the parameter it reads.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub marker: Arc<dyn ParameterMarker>,
}

/// A response marker, found either on the return annotation or on a model
/// attribute.
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    /// The model attribute carrying the marker; `None` for the return annotation.
    pub attribute: Option<String>,
    pub marker: Arc<dyn ResponseMarker>,
}

/// Extracted information about one service method.
#[derive(Debug)]
pub struct Signature {
    pub id: MethodId,
    pub interface_name: String,
    pub method_name: String,
    pub doc: Option<String>,
    pub binder: ArgumentBinder,
    /// Method markers in declaration order.
    pub method_markers: Vec<Arc<dyn MethodMarker>>,
    /// One entry per parameter and marker, in annotation order.
    pub parameter_descriptors: Vec<ParameterDescriptor>,
    /// The return type, clear of aliases and annotations.
    pub return_type: TypeExpr,
    pub response_descriptors: Vec<ResponseDescriptor>,
    pub result: ResultValidator,
}

static SIGNATURES: LazyLock<DashMap<MethodId, Arc<Signature>>> = LazyLock::new(DashMap::new);

impl Signature {
    /// The cached signature of `I::method`.
    pub fn of<I: Interface + ?Sized>(method: &str) -> Result<Arc<Signature>, BindError> {
        let declaration = declaration::<I>();
        let decl = declaration
            .method(method)
            .ok_or_else(|| BindError::UnknownMethod {
                interface: declaration.name.clone(),
                method: method.to_owned(),
            })?;
        Self::cached(&declaration, decl)
    }

    /// The cached signature of a declared method, extracting it on first use.
    ///
    /// Concurrent first calls may both extract; all of them get the first
    /// signature stored.
    pub fn cached(declaration: &Declaration, method: &MethodDecl) -> Result<Arc<Signature>, BindError> {
        let id = MethodId::new(declaration.type_id, method.name.clone());
        if let Some(found) = SIGNATURES.get(&id) {
            return Ok(Arc::clone(found.value()));
        }
        let extracted = Arc::new(Self::extract(declaration, method)?);
        let entry = SIGNATURES.entry(id).or_insert(extracted);
        Ok(Arc::clone(entry.value()))
    }

    /// Extract a signature without caching it.
    pub fn extract(declaration: &Declaration, method: &MethodDecl) -> Result<Signature, BindError> {
        let interface = declaration.name.as_str();
        let method_name = method.name.as_str();

        let mut parameter_descriptors = Vec::new();
        for param in &method.params {
            let site = AnnotationSite::parameter(interface, method_name, &param.name);
            let ty = param.ty.resolve(&declaration.scope, &site)?;
            for annotation in ty.annotations() {
                match annotation {
                    Annotation::Parameter(marker) => parameter_descriptors.push(ParameterDescriptor {
                        name: param.name.clone(),
                        marker: Arc::clone(marker),
                    }),
                    Annotation::Response(marker) => {
                        return Err(BindError::InvalidAnnotation {
                            site,
                            reason: format!("response marker {marker:?} cannot annotate a parameter"),
                        })
                    }
                }
            }
        }

        let site = AnnotationSite::return_type(interface, method_name);
        let declared = method.returns.clone().unwrap_or_else(TypeExpr::unit);
        let declared = declared.resolve(&declaration.scope, &site)?;
        let return_type = declared.strip();

        let mut response_descriptors = response_markers(&declared, &site, None)?;
        for arm in return_type.arms() {
            for attribute in &arm.attributes {
                response_descriptors.extend(response_markers(
                    &attribute.ty,
                    &site,
                    Some(&attribute.name),
                )?);
            }
        }

        let result = ResultValidator::new(&declared)?;
        let method_markers = declaration.markers.markers(method_name).to_vec();

        debug!(
            interface,
            method = method_name,
            parameter_markers = parameter_descriptors.len(),
            method_markers = method_markers.len(),
            response_markers = response_descriptors.len(),
            "Extracted signature"
        );

        Ok(Signature {
            id: MethodId::new(declaration.type_id, method.name.clone()),
            interface_name: interface.to_owned(),
            method_name: method_name.to_owned(),
            doc: method.doc.clone(),
            binder: ArgumentBinder::new(method_name, &method.params),
            method_markers,
            parameter_descriptors,
            return_type,
            response_descriptors,
            result,
        })
    }

    /// The first method marker of type `M`.
    pub fn method_marker<M: MethodMarker>(&self) -> Option<&M> {
        self.method_markers
            .iter()
            .find_map(|marker| marker.downcast_ref::<M>())
    }

    pub fn missing_metadata(&self, what: &str) -> BindError {
        BindError::MissingMetadata {
            interface: self.interface_name.clone(),
            method: self.method_name.clone(),
            what: what.to_owned(),
        }
    }
}

fn response_markers(
    ty: &TypeExpr,
    site: &AnnotationSite,
    attribute: Option<&str>,
) -> Result<Vec<ResponseDescriptor>, BindError> {
    ty.annotations()
        .into_iter()
        .map(|annotation| match annotation {
            Annotation::Response(marker) => Ok(ResponseDescriptor {
                attribute: attribute.map(str::to_owned),
                marker: Arc::clone(marker),
            }),
            Annotation::Parameter(marker) => Err(BindError::InvalidAnnotation {
                site: site.clone(),
                reason: match attribute {
                    Some(attribute) => format!(
                        "parameter marker {marker:?} cannot annotate attribute `{attribute}`"
                    ),
                    None => format!("parameter marker {marker:?} cannot annotate a return type"),
                },
            }),
        })
        .collect()
}
