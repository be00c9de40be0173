//! Declaration syntax for Tern's concept subsystem.
//!
//! This crate defines the syntactic shapes the binder queries when it
//! registers concepts and instances: type annotations as written, type
//! parameter lists with their implicit markers, and member signatures.
//! These are distinct from the semantic types in `tern-types`, which only
//! exist after binding resolves names.
//!
//! The binder inspects this syntax exactly once per declaration (to decide
//! whether a parameter was marked implicit and whether its constraints are
//! concept types); steady-state resolution never touches it.

/// Identifies a source file in the compilation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A byte offset range within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Create a span that covers both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(
            self.file, other.file,
            "cannot merge spans from different files"
        );
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// A synthetic span for compiler-generated declarations.
    pub fn synthetic() -> Self {
        Self {
            file: FileId(u32::MAX),
            start: 0,
            end: 0,
        }
    }
}

/// A value paired with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

// ---------------------------------------------------------------------------
// Type annotations
// ---------------------------------------------------------------------------

/// A type as written in source, before name resolution.
///
/// Annotation heads are plain strings; the binder decides whether a name
/// refers to a primitive, a type parameter in scope, a nominal type, or
/// (in constraint position only) a concept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeAnnotation {
    /// A bare name: `Int`, `T`, `Counter`.
    Name(String),
    /// An applied head: `List(T)`, `Eq(Int)`, `Map(K, V)`.
    Applied(String, Vec<TypeAnnotation>),
    /// A tuple: `#(A, B)`.
    Tuple(Vec<TypeAnnotation>),
    /// A function shape: `(A, B) -> C`.
    Function {
        params: Vec<TypeAnnotation>,
        ret: Box<TypeAnnotation>,
    },
}

impl TypeAnnotation {
    /// The head name of this annotation, if it has one.
    ///
    /// Constraint annotations must be headed (a concept applied to
    /// arguments); tuples and functions have no head.
    pub fn head(&self) -> Option<&str> {
        match self {
            TypeAnnotation::Name(name) | TypeAnnotation::Applied(name, _) => Some(name),
            TypeAnnotation::Tuple(_) | TypeAnnotation::Function { .. } => None,
        }
    }

    /// The argument annotations of an applied head (empty for a bare name).
    pub fn head_args(&self) -> &[TypeAnnotation] {
        match self {
            TypeAnnotation::Applied(_, args) => args,
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Declared accessibility of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessibility {
    Public,
    /// Visible anywhere within the declaring compilation.
    Internal,
    /// Visible only within the declaring container and its children.
    Private,
}

/// A declared type parameter, possibly marked implicit.
///
/// An implicit parameter is a witness parameter: it carries no runtime
/// value and is resolved by the concept engine. The binder validates, once
/// per declaration, that implicit parameters carry at least one concept
/// constraint and that only implicit parameters carry concept constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParamDecl {
    pub name: Spanned<String>,
    pub implicit: bool,
    /// Declared constraint annotations, as written.
    pub constraints: Vec<Spanned<TypeAnnotation>>,
}

impl TypeParamDecl {
    /// An ordinary (non-implicit, unconstrained) type parameter.
    pub fn plain(name: Spanned<String>) -> Self {
        Self {
            name,
            implicit: false,
            constraints: Vec::new(),
        }
    }

    /// An implicit (witness) parameter with the given constraints.
    pub fn implicit(name: Spanned<String>, constraints: Vec<Spanned<TypeAnnotation>>) -> Self {
        Self {
            name,
            implicit: true,
            constraints,
        }
    }
}

/// A member signature within a concept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSig {
    pub name: Spanned<String>,
    pub params: Vec<Spanned<TypeAnnotation>>,
    /// `None` means the member returns unit.
    pub return_type: Option<Spanned<TypeAnnotation>>,
    /// Whether the concept supplies a default body for this member.
    ///
    /// Bodies themselves belong to the host language; the concept engine
    /// only needs to know which members can fall back to the synthesized
    /// default carrier.
    pub has_default: bool,
    pub doc: Option<String>,
}

/// A concept declaration: a named capability interface over one or more
/// type parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptDef {
    pub name: Spanned<String>,
    /// The concept's own type parameters, which are exactly its
    /// instantiation signature.
    pub type_params: Vec<Spanned<String>>,
    /// Superconcept instantiations this concept extends, written in terms
    /// of the concept's own parameters (`concept Ord(A) extends Eq(A)`).
    pub extends: Vec<Spanned<TypeAnnotation>>,
    pub members: Vec<MemberSig>,
    pub doc: Option<String>,
}

/// An instance (witness) declaration: an implementation of exactly one
/// concept instantiation, possibly generic, possibly conditional on
/// further witnesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDef {
    pub name: Spanned<String>,
    /// Own type parameters; implicit entries are conditional witness
    /// requirements (`instance EqList(T) : Eq(List(T)) where implicit W : Eq(T)`).
    pub type_params: Vec<TypeParamDecl>,
    /// The implemented concept instantiation. Must reference only the
    /// instance's own type parameters.
    pub concept: Spanned<TypeAnnotation>,
    /// Names of the concept members this instance implements or overrides.
    pub members: Vec<Spanned<String>>,
    pub accessibility: Accessibility,
}
