// 🚧 Template Safety Ceilings
// The engine never fails on missing data (a blank cell beats a crashed
// export); the only hard failures are pathological templates.

use thiserror::Error;

/// Hard failure modes of the template engine.
///
/// Missing fields, absent lookup entries, and malformed calls all degrade
/// to an empty substitution. These variants exist only as a safety net
/// against templates that would otherwise cause unbounded work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Nested function calls exceeded the recursion ceiling
    #[error("template nesting exceeded the recursion ceiling")]
    TooComplex,

    /// Template string exceeded the length ceiling
    #[error("template of {0} bytes exceeds the length ceiling")]
    TooLarge(usize),
}
