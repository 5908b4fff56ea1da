//! The erased value passed into and out of bridge operations.

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A type-erased, possibly empty value.
///
/// An empty `MetaAny` is the "unresolved" result: the type or operation was
/// never registered, or the operation had nothing to return. Callers treat it
/// like `false` / absent.
#[derive(Default)]
pub struct MetaAny {
    value: Option<Box<dyn Any>>,
    type_name: &'static str,
}

impl MetaAny {
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            value: Some(Box::new(value)),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap an `Option`, mapping `None` to the empty value.
    pub fn from_option<T: 'static>(value: Option<T>) -> Self {
        value.map_or_else(Self::empty, Self::new)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.is::<T>())
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.as_ref()?.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.value.as_mut()?.downcast_mut::<T>()
    }

    /// Take the value out as `T`. Returns `Err(self)` if it holds something
    /// else, so the caller can try another type.
    pub fn take<T: 'static>(self) -> Result<T, Self> {
        match self.value {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(boxed) => Err(Self {
                    value: Some(boxed),
                    type_name: self.type_name,
                }),
            },
            None => Err(self),
        }
    }

    /// Read a payload that is either a `T` or a JSON document describing one.
    ///
    /// Missing JSON fields take the type's serde defaults; `null` and `[]`
    /// (how an empty script table arrives) mean "all defaults".
    pub fn into_payload<T: DeserializeOwned + 'static>(self) -> Option<T> {
        let json = match self.take::<T>() {
            Ok(value) => return Some(value),
            Err(other) => other.take::<Value>().ok()?,
        };
        let empty = matches!(&json, Value::Null) || matches!(&json, Value::Array(items) if items.is_empty());
        let parsed = serde_json::from_value::<T>(json).or_else(|err| {
            if empty {
                serde_json::from_value::<T>(Value::Object(Default::default()))
            } else {
                Err(err)
            }
        });
        parsed
            .map_err(|err| {
                log::warn!(
                    "bridge: payload is not a valid `{}`: {err}",
                    std::any::type_name::<T>()
                )
            })
            .ok()
    }

    /// Convenience for boolean results; empty and non-bool count as `false`.
    pub fn as_bool(&self) -> bool {
        self.downcast_ref::<bool>().copied().unwrap_or(false)
    }

    /// Name of the held type, or `""` when empty.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for MetaAny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("MetaAny(<empty>)")
        } else {
            write!(f, "MetaAny({})", self.type_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_unresolved() {
        let any = MetaAny::empty();
        assert!(any.is_empty());
        assert!(!any.as_bool());
        assert!(any.take::<u32>().is_err());
    }

    #[test]
    fn take_wrong_type_gives_it_back() {
        let any = MetaAny::new(5u32);
        let any = any.take::<String>().unwrap_err();
        assert!(any.is::<u32>());
        assert_eq!(any.take::<u32>().unwrap(), 5);
    }

    #[test]
    fn payload_from_json_fills_defaults() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        #[serde(default)]
        struct Size {
            w: f32,
            h: f32,
        }
        impl Default for Size {
            fn default() -> Self {
                Size { w: 1.0, h: 1.0 }
            }
        }

        let size: Size = MetaAny::new(serde_json::json!({ "w": 4.0 })).into_payload().unwrap();
        assert_eq!(size, Size { w: 4.0, h: 1.0 });
        let size: Size = MetaAny::new(serde_json::json!([])).into_payload().unwrap();
        assert_eq!(size, Size::default());
        let direct: Size = MetaAny::new(Size { w: 2.0, h: 2.0 }).into_payload().unwrap();
        assert_eq!(direct.w, 2.0);
        assert!(MetaAny::new(serde_json::json!({ "w": "wide" })).into_payload::<Size>().is_none());
        assert!(MetaAny::empty().into_payload::<Size>().is_none());
    }

    #[test]
    fn from_option() {
        assert!(MetaAny::from_option::<u8>(None).is_empty());
        assert_eq!(MetaAny::from_option(Some(3u8)).downcast_ref::<u8>(), Some(&3));
    }
}
