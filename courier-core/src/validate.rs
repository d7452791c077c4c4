//! JSON-schema validation of finalized payloads.

use std::fmt;

use serde_json::Value;

use crate::error::{BindError, ValidationError, ValidationIssue};
use crate::types::{TypeExpr, TypeInfo, TypeRole};

#[cfg(feature = "validation")]
pub struct Validator {
    schema: jsonschema::Validator,
}

#[cfg(feature = "validation")]
impl Validator {
    pub fn new(schema: &Value) -> Result<Self, BindError> {
        let compiled = jsonschema::validator_for(schema).map_err(|e| BindError::InvalidSchema {
            type_name: schema_title(schema),
            reason: e.to_string(),
        })?;
        Ok(Validator { schema: compiled })
    }

    pub fn validate(&self, value: &Value) -> Result<(), Vec<ValidationIssue>> {
        let issues: Vec<_> = self
            .schema
            .iter_errors(value)
            .map(|error| ValidationIssue {
                path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.schema.is_valid(value)
    }
}

#[cfg(not(feature = "validation"))]
pub struct Validator;

#[cfg(not(feature = "validation"))]
impl Validator {
    pub fn new(_schema: &Value) -> Result<Self, BindError> {
        Ok(Validator)
    }

    pub fn validate(&self, _value: &Value) -> Result<(), Vec<ValidationIssue>> {
        Ok(())
    }

    pub fn is_valid(&self, _value: &Value) -> bool {
        true
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

#[cfg(feature = "validation")]
fn schema_title(schema: &Value) -> String {
    schema
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("<anonymous>")
        .to_owned()
}

#[derive(Debug)]
struct Arm {
    name: String,
    role: TypeRole,
    validator: Option<Validator>,
}

impl Arm {
    fn new(info: &TypeInfo) -> Result<Self, BindError> {
        let validator = info.schema.as_deref().map(Validator::new).transpose()?;
        Ok(Self {
            name: info.name.to_string(),
            role: info.role,
            validator,
        })
    }
}

/// Validates a finalized payload against every arm of a result type.
///
/// The payload is accepted by the first arm it matches, empty-result arms
/// being tried after every other arm; when no arm matches the issues of all
/// arms are reported together.
#[derive(Debug)]
pub struct ResultValidator {
    type_name: String,
    arms: Vec<Arm>,
}

impl ResultValidator {
    pub fn new(ty: &TypeExpr) -> Result<Self, BindError> {
        Self::from_arms(ty.name(), ty.strip().arms())
    }

    pub fn from_arms<'a>(
        type_name: impl Into<String>,
        arms: impl IntoIterator<Item = &'a TypeInfo>,
    ) -> Result<Self, BindError> {
        let mut arms: Vec<Arm> = arms.into_iter().map(Arm::new).collect::<Result<_, _>>()?;
        // Empty-result arms go last so they never shadow a model arm.
        arms.sort_by_key(|arm| arm.role == TypeRole::Unit);
        Ok(Self {
            type_name: type_name.into(),
            arms,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Check `payload`; a match on the empty-result arm yields `null`.
    pub fn validate(&self, payload: Value) -> Result<Value, ValidationError> {
        if self.arms.is_empty() {
            return Ok(payload);
        }

        let mut issues = Vec::new();
        for arm in &self.arms {
            let outcome = match &arm.validator {
                Some(validator) => validator.validate(&payload),
                None => Ok(()),
            };
            match outcome {
                Ok(()) if arm.role == TypeRole::Unit => return Ok(Value::Null),
                Ok(()) => return Ok(payload),
                Err(arm_issues) if self.arms.len() == 1 => issues.extend(arm_issues),
                Err(arm_issues) => issues.extend(arm_issues.into_iter().map(|issue| {
                    ValidationIssue {
                        path: issue.path,
                        message: format!("{}: {}", arm.name, issue.message),
                    }
                })),
            }
        }
        Err(ValidationError::new(self.type_name.clone(), issues))
    }
}
