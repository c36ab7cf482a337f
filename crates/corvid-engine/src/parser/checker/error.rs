//! Error types for binding and semantic analysis
//!
//! Provides structured diagnostics with source locations. Types are carried
//! as display strings so a diagnostic can be rendered without the symbol
//! table that produced it.

use crate::parser::token::Span;
use thiserror::Error;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Non-blocking suggestion
    Hint,
    /// Reserved; no current rule produces warnings
    Warning,
    /// Blocks lowering
    Error,
}

/// Diagnostics produced while binding and analysing a file.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CheckError {
    /// Name could not be resolved
    #[error("Cannot find '{name}'")]
    NotFound {
        /// Name that was looked up
        name: String,
        /// Location of the reference
        span: Span,
    },

    /// Call with the wrong number of arguments
    #[error("Expected {expected} argument(s), got {actual}")]
    WrongArgumentCount {
        expected: usize,
        actual: usize,
        span: Span,
    },

    /// Generic reference with the wrong number of type arguments
    #[error("'{name}' expects {expected} type argument(s), got {actual}")]
    WrongTypeArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
        span: Span,
    },

    /// Generic call whose type arguments cannot be inferred from its arguments
    #[error("Cannot infer type arguments for '{name}'")]
    CannotInferTypeArguments { name: String, span: Span },

    /// Value of one type used where another is expected
    #[error("Type '{actual}' is not compatible with '{expected}'")]
    IncompatibleType {
        expected: String,
        actual: String,
        span: Span,
    },

    /// Value of the wrong category (for example a non-numeric operand)
    #[error("Unexpected type '{actual}': {reason}")]
    UnexpectedType {
        actual: String,
        reason: String,
        span: Span,
    },

    /// `as` between unrelated categories
    #[error("Cannot cast '{from}' to '{to}'")]
    InvalidCast { from: String, to: String, span: Span },

    /// `self` outside an instance context
    #[error("'self' is only available in instance members")]
    MisplacedSelf { span: Span },

    /// `base` outside a derived class, or `base(..)` outside a constructor
    #[error("'base' is not valid here")]
    MisplacedBase { span: Span },

    /// Name declared twice in one scope
    #[error("Duplicate symbol '{name}'")]
    DuplicateSymbol {
        name: String,
        /// Location of the second declaration
        span: Span,
        /// Location of the original declaration
        original: Span,
    },

    /// Assignment to a `let` binding or immutable field
    #[error("Cannot assign to immutable '{name}'")]
    ImmutableAssignment { name: String, span: Span },

    /// Static member used through an instance or the other way around
    #[error("'{name}' {reason}")]
    StaticMismatch {
        name: String,
        reason: String,
        span: Span,
    },

    /// More than one ancestor class
    #[error("A class can inherit from only one class")]
    MultipleInheritance { span: Span },

    /// Ancestor class not declared `open`
    #[error("'{name}' is not open for inheritance")]
    NotInheritable { name: String, span: Span },

    /// Class inherits from itself
    #[error("Inheritance cycle through '{name}'")]
    InheritanceCycle { name: String, span: Span },

    /// `override` without a matching ancestor function
    #[error("'{name}' overrides nothing")]
    NothingToOverride { name: String, span: Span },

    /// Class does not implement a protocol function
    #[error("'{class}' does not implement '{function}' of '{protocol}'")]
    MissingImplementation {
        class: String,
        protocol: String,
        function: String,
        span: Span,
    },

    /// Ancestor constructor takes arguments but no `base(..)` call is present
    #[error("Constructor must call 'base(..)'")]
    MissingBaseCall { span: Span },

    /// `base(..)` is not the first statement of the constructor
    #[error("'base(..)' must be the first statement of the constructor")]
    BaseCallNotFirst { span: Span },

    /// Field with a setter but no getter
    #[error("Field '{name}' has a setter but no getter")]
    SetterWithoutGetter { name: String, span: Span },

    /// Setter declared on a `let` field
    #[error("Field '{name}' is immutable and cannot have a setter")]
    SetterOnImmutableField { name: String, span: Span },

    /// `pub static var` without accessors
    #[error("Public static field '{name}' cannot be mutable")]
    MutablePublicStaticField { name: String, span: Span },

    /// Generic function that is virtual
    #[error("Generic function '{name}' cannot be virtual")]
    GenericVirtualFunction { name: String, span: Span },

    /// `==`/`!=` on a structure without `IsEqual`
    #[error("'{ty}' has no 'IsEqual' function for '{op}'")]
    MissingIsEqual { ty: String, op: String, span: Span },

    /// Field or parameter without a type that cannot be inferred
    #[error("'{name}' needs a type annotation")]
    MissingTypeAnnotation { name: String, span: Span },

    /// Function with a non-void return type and no body that returns
    #[error("Function '{name}' must return a value of type '{ty}'")]
    MissingReturn { name: String, ty: String, span: Span },

    /// Hint: cast to the type the value already has
    #[error("Redundant cast to '{ty}'")]
    RedundantCast { ty: String, span: Span },
}

impl CheckError {
    pub fn severity(&self) -> Severity {
        match self {
            CheckError::RedundantCast { .. } => Severity::Hint,
            _ => Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    /// Primary location of the diagnostic.
    pub fn span(&self) -> Span {
        use CheckError::*;
        match self {
            NotFound { span, .. }
            | WrongArgumentCount { span, .. }
            | WrongTypeArgumentCount { span, .. }
            | CannotInferTypeArguments { span, .. }
            | IncompatibleType { span, .. }
            | UnexpectedType { span, .. }
            | InvalidCast { span, .. }
            | MisplacedSelf { span }
            | MisplacedBase { span }
            | DuplicateSymbol { span, .. }
            | ImmutableAssignment { span, .. }
            | StaticMismatch { span, .. }
            | MultipleInheritance { span }
            | NotInheritable { span, .. }
            | InheritanceCycle { span, .. }
            | NothingToOverride { span, .. }
            | MissingImplementation { span, .. }
            | MissingBaseCall { span }
            | BaseCallNotFirst { span }
            | SetterWithoutGetter { span, .. }
            | SetterOnImmutableField { span, .. }
            | MutablePublicStaticField { span, .. }
            | GenericVirtualFunction { span, .. }
            | MissingIsEqual { span, .. }
            | MissingTypeAnnotation { span, .. }
            | MissingReturn { span, .. }
            | RedundantCast { span, .. } => *span,
        }
    }

    /// Secondary "defined here" location, if any.
    pub fn related(&self) -> Option<Span> {
        match self {
            CheckError::DuplicateSymbol { original, .. } => Some(*original),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        let hint = CheckError::RedundantCast {
            ty: "i32".to_string(),
            span: Span::default(),
        };
        assert_eq!(hint.severity(), Severity::Hint);
        assert!(!hint.is_error());

        let error = CheckError::MisplacedSelf {
            span: Span::default(),
        };
        assert!(error.is_error());
    }

    #[test]
    fn test_related_span() {
        let err = CheckError::DuplicateSymbol {
            name: "Box".to_string(),
            span: Span::new(20, 23, 2, 7),
            original: Span::new(6, 9, 1, 7),
        };
        assert_eq!(err.related(), Some(Span::new(6, 9, 1, 7)));
        assert_eq!(err.to_string(), "Duplicate symbol 'Box'");
    }
}
