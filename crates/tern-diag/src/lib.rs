//! Error reporting and diagnostics for Tern's concept subsystem.
//!
//! Diagnostics are created by the binder and the witness resolver and
//! collected through a [`DiagnosticSink`]. The sink is thread-safe because
//! declaration completion runs on parallel workers: when two threads race
//! to compute the same lazy value, both sides' diagnostics are recorded
//! (a discarded duplicate's diagnostics are equivalent, so keeping them is
//! harmless).
//!
//! Unification failures are never reported here — they are control-flow
//! signals inside the resolver, surfaced only indirectly as an eventual
//! "no instance found".

use std::fmt;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Broad category for diagnostics. Used for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// No instance found for a required concept instantiation.
    NoInstanceFound,
    /// Multiple applicable instances with no strict specificity ordering.
    AmbiguousInstances,
    /// Witness resolution exceeded the recursion depth bound.
    RecursionLimitExceeded,
    /// An implicit parameter was declared without a concept constraint.
    ImplicitParameterMissingConstraint,
    /// A concept constraint appeared on a non-implicit parameter.
    ConceptConstraintOnNonImplicitParameter,
    /// A non-concept constraint appeared on an implicit parameter.
    NonConceptConstraintOnImplicitParameter,
    /// A concept, instance, or container name is declared twice.
    DuplicateDeclaration,
    /// A referenced concept or type name is not defined.
    UndefinedName,
    /// A concept or instance instantiation has the wrong argument count.
    ArityMismatch,
    /// An instance omits a concept member that has no default body.
    MissingMember,
    /// A declaration violates a structural rule not covered above.
    InvalidDeclaration,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::NoInstanceFound,
        Category::AmbiguousInstances,
        Category::RecursionLimitExceeded,
        Category::ImplicitParameterMissingConstraint,
        Category::ConceptConstraintOnNonImplicitParameter,
        Category::NonConceptConstraintOnImplicitParameter,
        Category::DuplicateDeclaration,
        Category::UndefinedName,
        Category::ArityMismatch,
        Category::MissingMember,
        Category::InvalidDeclaration,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::NoInstanceFound => "no_instance_found",
            Category::AmbiguousInstances => "ambiguous_instances",
            Category::RecursionLimitExceeded => "recursion_limit_exceeded",
            Category::ImplicitParameterMissingConstraint => {
                "implicit_parameter_missing_constraint"
            }
            Category::ConceptConstraintOnNonImplicitParameter => {
                "concept_constraint_on_non_implicit_parameter"
            }
            Category::NonConceptConstraintOnImplicitParameter => {
                "non_concept_constraint_on_implicit_parameter"
            }
            Category::DuplicateDeclaration => "duplicate_declaration",
            Category::UndefinedName => "undefined_name",
            Category::ArityMismatch => "arity_mismatch",
            Category::MissingMember => "missing_member",
            Category::InvalidDeclaration => "invalid_declaration",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::NoInstanceFound => "C0001",
            Category::AmbiguousInstances => "C0002",
            Category::RecursionLimitExceeded => "C0003",
            Category::ImplicitParameterMissingConstraint => "C0004",
            Category::ConceptConstraintOnNonImplicitParameter => "C0005",
            Category::NonConceptConstraintOnImplicitParameter => "C0006",
            Category::DuplicateDeclaration => "C0007",
            Category::UndefinedName => "C0008",
            Category::ArityMismatch => "C0009",
            Category::MissingMember => "C0010",
            Category::InvalidDeclaration => "C0011",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::NoInstanceFound => {
                "No visible instance satisfies the required concept instantiation."
            }
            Category::AmbiguousInstances => {
                "Two or more applicable instances tie with no strict specificity order."
            }
            Category::RecursionLimitExceeded => {
                "Conditional instance requirements recursed past the depth bound."
            }
            Category::ImplicitParameterMissingConstraint => {
                "An implicit parameter must carry at least one concept constraint."
            }
            Category::ConceptConstraintOnNonImplicitParameter => {
                "Only implicit parameters may carry concept constraints."
            }
            Category::NonConceptConstraintOnImplicitParameter => {
                "Implicit parameter constraints must be concept types."
            }
            Category::DuplicateDeclaration => "A name or instance head is declared twice.",
            Category::UndefinedName => "A referenced concept or type name is undefined.",
            Category::ArityMismatch => {
                "An instantiation supplies the wrong number of type arguments."
            }
            Category::MissingMember => {
                "An instance omits a required concept member that has no default."
            }
            Category::InvalidDeclaration => "A declaration violates a structural rule.",
        }
    }

    pub fn example_fix(self) -> &'static str {
        match self {
            Category::NoInstanceFound => {
                "Declare an instance for the goal type, or import the container that has one."
            }
            Category::AmbiguousInstances => {
                "Remove one candidate or make one instance strictly more specific."
            }
            Category::RecursionLimitExceeded => {
                "Add a non-conditional base-case instance to terminate the recursion."
            }
            Category::ImplicitParameterMissingConstraint => {
                "Add a concept constraint, or drop the implicit marker."
            }
            Category::ConceptConstraintOnNonImplicitParameter => {
                "Mark the parameter implicit, or constrain it with an ordinary type."
            }
            Category::NonConceptConstraintOnImplicitParameter => {
                "Constrain the implicit parameter with a concept instantiation."
            }
            Category::DuplicateDeclaration => "Rename or remove one of the declarations.",
            Category::UndefinedName => "Define the name first, or fix the spelling.",
            Category::ArityMismatch => "Supply exactly the declared number of type arguments.",
            Category::MissingMember => "Implement the member or give the concept a default body.",
            Category::InvalidDeclaration => "Follow the help text for the violated rule.",
        }
    }
}

// ---------------------------------------------------------------------------
// Source locations (independent of tern-ast's Span)
// ---------------------------------------------------------------------------

/// A source location for diagnostics.
///
/// Uses byte offsets. Callers convert from `tern-ast` spans to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file_id: u32,
    pub start: u32,
    pub end: u32,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
///
/// Every diagnostic carries enough context to produce an actionable error
/// message without exposing internal resolver state.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. C0001).
    pub code: Option<String>,
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub location: Option<SourceLocation>,
    /// Additional labeled spans (e.g. "a tied candidate is declared here").
    pub labels: Vec<DiagLabel>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

/// A labeled source span within a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagLabel {
    pub location: SourceLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Warning,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_label(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.labels.push(DiagLabel {
            location,
            message: message.into(),
        });
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        if let Some(code) = &self.code {
            write!(f, "{prefix}[{code}]: {}", self.message)?;
        } else {
            write!(f, "{prefix}: {}", self.message)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Diagnostic sink
// ---------------------------------------------------------------------------

/// A thread-safe collector for diagnostics.
///
/// Binding runs across parallel workers, so the sink must accept pushes
/// from any thread. Order within one thread is preserved; cross-thread
/// interleaving is unspecified.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diags: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diag: Diagnostic) {
        self.diags.lock().expect("diagnostic sink poisoned").push(diag);
    }

    pub fn extend(&self, diags: impl IntoIterator<Item = Diagnostic>) {
        self.diags
            .lock()
            .expect("diagnostic sink poisoned")
            .extend(diags);
    }

    pub fn is_empty(&self) -> bool {
        self.diags.lock().expect("diagnostic sink poisoned").is_empty()
    }

    pub fn len(&self) -> usize {
        self.diags.lock().expect("diagnostic sink poisoned").len()
    }

    /// Whether any error-severity diagnostic has been recorded.
    pub fn has_errors(&self) -> bool {
        self.diags
            .lock()
            .expect("diagnostic sink poisoned")
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Take all recorded diagnostics, leaving the sink empty.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diags.lock().expect("diagnostic sink poisoned"))
    }

    /// Clone the recorded diagnostics without draining.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.diags.lock().expect("diagnostic sink poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_builder() {
        let loc = SourceLocation {
            file_id: 0,
            start: 10,
            end: 20,
        };
        let diag = Diagnostic::error(Category::NoInstanceFound, "no instance for `Eq(String)`")
            .at(loc)
            .with_help("declare an instance of `Eq` for `String`");

        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some("C0001"));
        assert_eq!(diag.category, Category::NoInstanceFound);
        assert!(diag.message.contains("Eq(String)"));
        assert!(diag.help.unwrap().contains("declare an instance"));
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::error(Category::AmbiguousInstances, "ambiguous instances");
        let s = format!("{diag}");
        assert!(s.starts_with("error[C0002]: ambiguous instances"));
    }

    #[test]
    fn category_metadata_is_stable_and_unique() {
        let mut codes = std::collections::BTreeSet::new();
        for cat in Category::all() {
            assert!(!cat.as_str().is_empty());
            assert!(!cat.description().is_empty());
            assert!(!cat.example_fix().is_empty());
            assert!(
                codes.insert(cat.code()),
                "duplicate diagnostic code detected: {}",
                cat.code()
            );
        }
    }

    #[test]
    fn sink_collects_from_multiple_threads() {
        let sink = DiagnosticSink::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    sink.push(Diagnostic::warning(
                        Category::MissingMember,
                        "racy completion diagnostic",
                    ));
                });
            }
        });
        assert_eq!(sink.len(), 4);
        assert!(!sink.has_errors());
        assert_eq!(sink.drain().len(), 4);
        assert!(sink.is_empty());
    }
}
