//! Literal/type compatibility for [`TypeRegistry`].

use super::CoercionError;
use super::registry::{Type, TypeRegistry};
use crate::ir::Literal;

fn mismatch(ty: &Type, value: &Literal) -> CoercionError {
    CoercionError(format!(
        "expected a value of type {}, got {} {}",
        ty,
        value.type_name(),
        value
    ))
}

fn within(n: i64, min: Option<i64>, max: Option<i64>) -> bool {
    min.is_none_or(|min| n >= min) && max.is_none_or(|max| n <= max)
}

fn check_size(ty: &Type, len: usize, min: Option<i64>, max: Option<i64>) -> Result<(), CoercionError> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    if within(len, min, max) {
        Ok(())
    } else {
        Err(CoercionError(format!(
            "expected {} to have between {} and {} entries, got {}",
            ty,
            min.unwrap_or(0),
            max.map_or_else(|| "unlimited".to_string(), |m| m.to_string()),
            len
        )))
    }
}

fn nested(context: String, err: CoercionError) -> CoercionError {
    CoercionError(format!("{}: {}", context, err.0))
}

/// Check that `value` is an instance of `ty`.
pub(super) fn coerce(registry: &TypeRegistry, value: &Literal, ty: &Type) -> Result<(), CoercionError> {
    let ok = match (ty, value) {
        (Type::Any, _) => true,
        (Type::Undef, Literal::Undef) => true,
        (Type::Boolean, Literal::Boolean(_)) => true,
        (Type::Integer { min, max }, Literal::Integer(n)) => {
            if !within(*n, *min, *max) {
                return Err(CoercionError(format!(
                    "expected a value of type {}, got {} which is out of range",
                    ty, n
                )));
            }
            true
        }
        (Type::Float, Literal::Float(_)) => true,
        (Type::Numeric, Literal::Integer(_) | Literal::Float(_)) => true,
        (Type::String, Literal::String(_)) => true,
        (
            Type::Scalar,
            Literal::Boolean(_) | Literal::Integer(_) | Literal::Float(_) | Literal::String(_),
        ) => true,
        // Every literal is plain data: hash keys are always strings.
        (Type::Data | Type::RichData, _) => true,
        (Type::Optional(_), Literal::Undef) => true,
        (Type::Optional(inner), _) => return coerce(registry, value, inner),
        (Type::NotUndef(_), Literal::Undef) => false,
        (Type::NotUndef(inner), _) => return coerce(registry, value, inner),
        (Type::Array { element, min, max }, Literal::Array(items)) => {
            check_size(ty, items.len(), *min, *max)?;
            for (i, item) in items.iter().enumerate() {
                coerce(registry, item, element).map_err(|e| nested(format!("index {}", i), e))?;
            }
            true
        }
        (
            Type::Hash {
                key,
                value: value_ty,
                min,
                max,
            },
            Literal::Hash(entries),
        ) => {
            check_size(ty, entries.len(), *min, *max)?;
            for (k, v) in entries {
                coerce(registry, &Literal::String(k.clone()), key)
                    .map_err(|e| nested(format!("key '{}'", k), e))?;
                coerce(registry, v, value_ty).map_err(|e| nested(format!("key '{}'", k), e))?;
            }
            true
        }
        (Type::Enum(values), Literal::String(s)) => values.contains(s),
        (Type::Variant(types), _) => types.iter().any(|t| coerce(registry, value, t).is_ok()),
        (Type::Object(name), Literal::Hash(entries)) => {
            let Some(object) = registry.object(name) else {
                return Err(mismatch(ty, value));
            };
            for (k, v) in entries {
                let attr = object.attributes.get(k).ok_or_else(|| {
                    CoercionError(format!("A {} has no attribute named {}", name, k))
                })?;
                coerce(registry, v, attr).map_err(|e| nested(format!("attribute '{}'", k), e))?;
            }
            true
        }
        _ => false,
    };

    if ok { Ok(()) } else { Err(mismatch(ty, value)) }
}
