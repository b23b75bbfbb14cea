//! Best-effort values that carry their warnings.

use crate::error::Warning;

/// A converted value together with the non-fatal problems met while producing it.
///
/// Soft failures (an oversized image, malformed tool arguments) never abort a conversion;
/// they are pushed here and the best-effort value is still returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Converted<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Transform the value, keeping the warnings.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Converted<U> {
        Converted {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    /// Move this value's warnings into `sink` and return the bare value.
    pub fn drain_into(self, sink: &mut Vec<Warning>) -> T {
        sink.extend(self.warnings);
        self.value
    }

    pub fn into_parts(self) -> (T, Vec<Warning>) {
        (self.value, self.warnings)
    }
}
