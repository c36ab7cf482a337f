//! Diagnostic collection and rendering
//!
//! Analysers report into a [`Diagnostics`] sink; rendering to text goes
//! through `codespan-reporting`.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, Severity as CsSeverity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use termcolor::NoColor;

use super::error::{CheckError, Severity};
use super::symbols::FileId;
use crate::parser::token::Span;

/// Sink for diagnostics of one or more files.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<(FileId, CheckError)>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, file: FileId, error: CheckError) {
        self.entries.push((file, error));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|(_, e)| e.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|(_, e)| e.is_error()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(FileId, CheckError)> {
        self.entries.iter()
    }

    /// Diagnostics of one file.
    pub fn for_file(&self, file: FileId) -> impl Iterator<Item = &CheckError> {
        self.entries
            .iter()
            .filter(move |(f, _)| *f == file)
            .map(|(_, e)| e)
    }

    /// Sort by file and position so output does not depend on thread scheduling.
    pub fn sort(&mut self) {
        self.entries
            .sort_by_key(|(file, e)| (*file, e.span().start, e.span().end));
    }
}

/// A renderable diagnostic.
pub struct Diagnostic {
    inner: CsDiagnostic<usize>,
}

impl Diagnostic {
    /// Create diagnostic from a CheckError
    pub fn from_check_error(error: &CheckError, file_id: usize) -> Self {
        let severity = match error.severity() {
            Severity::Hint => CsSeverity::Help,
            Severity::Warning => CsSeverity::Warning,
            Severity::Error => CsSeverity::Error,
        };

        let mut labels = vec![primary(file_id, error.span()).with_message(label_for(error))];
        if let Some(original) = error.related() {
            labels.push(
                Label::secondary(file_id, original.start..original.end)
                    .with_message("first defined here"),
            );
        }

        let mut inner = CsDiagnostic::new(severity)
            .with_message(error.to_string())
            .with_code(error_code(error))
            .with_labels(labels);

        if let CheckError::MissingBaseCall { .. } = error {
            inner = inner.with_notes(vec![
                "help: the ancestor constructor takes arguments".to_string()
            ]);
        }

        Diagnostic { inner }
    }

    pub fn inner(&self) -> &CsDiagnostic<usize> {
        &self.inner
    }

    pub fn severity(&self) -> CsSeverity {
        self.inner.severity
    }
}

fn primary(file_id: usize, span: Span) -> Label<usize> {
    Label::primary(file_id, span.start..span.end)
}

fn label_for(error: &CheckError) -> String {
    match error {
        CheckError::NotFound { .. } => "not found in this scope".to_string(),
        CheckError::IncompatibleType { expected, .. } => format!("expected '{}'", expected),
        CheckError::WrongArgumentCount { expected, .. } => {
            format!("expected {} argument(s)", expected)
        }
        CheckError::DuplicateSymbol { .. } => "redefined here".to_string(),
        CheckError::RedundantCast { .. } => "value already has this type".to_string(),
        _ => String::new(),
    }
}

/// Stable code for a diagnostic kind (e.g. "E0001").
pub fn error_code(error: &CheckError) -> &'static str {
    use CheckError::*;
    match error {
        NotFound { .. } => "E0001",
        WrongArgumentCount { .. } => "E0002",
        WrongTypeArgumentCount { .. } => "E0003",
        CannotInferTypeArguments { .. } => "E0004",
        IncompatibleType { .. } => "E0005",
        UnexpectedType { .. } => "E0006",
        InvalidCast { .. } => "E0007",
        MisplacedSelf { .. } => "E0008",
        MisplacedBase { .. } => "E0009",
        DuplicateSymbol { .. } => "E0010",
        ImmutableAssignment { .. } => "E0011",
        StaticMismatch { .. } => "E0012",
        MultipleInheritance { .. } => "E0013",
        NotInheritable { .. } => "E0014",
        InheritanceCycle { .. } => "E0015",
        NothingToOverride { .. } => "E0016",
        MissingImplementation { .. } => "E0017",
        MissingBaseCall { .. } => "E0018",
        BaseCallNotFirst { .. } => "E0019",
        SetterWithoutGetter { .. } => "E0020",
        SetterOnImmutableField { .. } => "E0021",
        MutablePublicStaticField { .. } => "E0022",
        GenericVirtualFunction { .. } => "E0023",
        MissingIsEqual { .. } => "E0024",
        MissingTypeAnnotation { .. } => "E0025",
        MissingReturn { .. } => "E0026",
        RedundantCast { .. } => "H0001",
    }
}

/// Render diagnostics as plain text.
///
/// `files` must contain one entry per [`FileId`], in file order.
pub fn emit_to_string(
    files: &SimpleFiles<String, String>,
    diagnostics: &Diagnostics,
) -> Result<String, codespan_reporting::files::Error> {
    let mut writer = NoColor::new(Vec::new());
    let config = term::Config::default();
    for (file, error) in diagnostics.iter() {
        let diagnostic = Diagnostic::from_check_error(error, file.index());
        term::emit(&mut writer, &config, files, diagnostic.inner())?;
    }
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_not_found() {
        let mut files = SimpleFiles::new();
        files.add("main.cv".to_string(), "fn main() { foo(); }".to_string());

        let mut diagnostics = Diagnostics::new();
        diagnostics.report(
            FileId(0),
            CheckError::NotFound {
                name: "foo".to_string(),
                span: Span::new(12, 15, 1, 13),
            },
        );

        let text = emit_to_string(&files, &diagnostics).unwrap();
        assert!(text.contains("E0001"));
        assert!(text.contains("Cannot find 'foo'"));
        assert!(text.contains("main.cv"));
    }

    #[test]
    fn test_hint_is_not_error() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(
            FileId(0),
            CheckError::RedundantCast {
                ty: "i32".to_string(),
                span: Span::default(),
            },
        );
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 1);

        let diag = Diagnostic::from_check_error(diagnostics.iter().next().map(|(_, e)| e).unwrap(), 0);
        assert_eq!(diag.severity(), CsSeverity::Help);
    }
}
