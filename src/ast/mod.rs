//! The generic syntax-tree node model the Base/IWYU collectors traverse
//! (spec §9: "polymorphism on syntax-tree node kinds ... tagged variants
//! over a closed set of kinds ... dispatch is a match on the tag, not
//! virtual functions"). This stands in for the real Clang AST the
//! out-of-scope front end would hand the core; the `frontend` module
//! builds these nodes by walking a tree-sitter parse tree.

pub mod context_stack;
pub mod flattener;

use crate::ledger::{DeclHandle, SourceLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// A resolved type reference: either a known declaration, or a builtin
/// with no declaration (`int`, `void*`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub decl: Option<DeclHandle>,
    pub name: String,
    pub is_pointer: bool,
    pub is_reference: bool,
    /// True if this is a template parameter whose concrete type depends on
    /// instantiation (spec §4.7's "dependent template parameter" carve-out
    /// for typedef-target classification).
    pub is_dependent_template_param: bool,
}

impl TypeRef {
    pub fn builtin(name: impl Into<String>) -> Self {
        Self { decl: None, name: name.into(), is_pointer: false, is_reference: false, is_dependent_template_param: false }
    }

    pub fn of(decl: DeclHandle, name: impl Into<String>) -> Self {
        Self { decl: Some(decl), name: name.into(), is_pointer: false, is_reference: false, is_dependent_template_param: false }
    }

    pub fn pointer_to(mut self) -> Self {
        self.is_pointer = true;
        self
    }

    pub fn reference_to(mut self) -> Self {
        self.is_reference = true;
        self
    }

    /// Type with all ref/ptr indirection stripped (spec §4.7: member
    /// expression base type "after ref/ptr removal").
    pub fn stripped(&self) -> TypeRef {
        TypeRef { is_pointer: false, is_reference: false, ..self.clone() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// static/dynamic/implicit, or C-style, pointer-to-pointer casts
    /// between class types (up- or down-casts).
    ClassPointerConversion,
    /// A converting constructor: full use of the to-type.
    Constructor,
    /// A user-defined conversion operator: full use of the from-type.
    UserDefined,
    /// reinterpret_cast, const_cast, or another no-op cast.
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Ordinary,
    Member,
    Operator,
    New,
    Delete,
    /// A decl-ref to a function not already inside a call (e.g. taking its
    /// address); `calling_expr` is absent for these.
    DeclRefToFunction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArgument {
    Type(TypeRef),
    NonType,
}

/// One node of the generic syntax tree the collectors traverse.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A declaration of a class/struct/union/enum/typedef/function/
    /// variable/field/parameter/friend.
    Declaration(Declaration),
    /// A statement or expression that is not itself a declaration.
    Statement(Statement),
    /// A resolved type appearing somewhere other than as a literal
    /// written type (e.g. the static type of an expression).
    Type(TypeRef),
    /// A type exactly as written in the source (distinguished from `Type`
    /// because forward-declarability and typedef-target rules look at the
    /// *written* form, spec §4.7).
    TypeLocation(TypeRef),
    /// `Foo::` preceding a nested name -- always requires the full type of
    /// `Foo` (spec §4.7).
    NestedNameSpecifier(TypeRef),
    TemplateName(DeclHandle),
    TemplateArgument(TemplateArgument),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Enum(DeclHandle),
    Function { decl: DeclHandle, is_definition: bool, params: Vec<TypeRef>, return_type: TypeRef },
    Typedef { decl: DeclHandle, target: TypeRef },
    Variable { ty: TypeRef, is_local: bool },
    Field { ty: TypeRef },
    Parameter { ty: TypeRef, has_autocast_ctor: bool },
    Friend(TypeRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    MemberExpr { base: TypeRef },
    Subscript { element: TypeRef },
    SizeOfType { operand: TypeRef, operand_is_reference: bool },
    SizeOfExpr { operand: TypeRef },
    Cast { kind: CastKind, from: TypeRef, to: TypeRef },
    Delete { deleted: TypeRef },
    VariadicArg { ty: TypeRef },
    Call { callee: Option<DeclHandle>, parent_type: Option<TypeRef>, kind: CallKind },
    /// Synthesized by the Base Use Collector when leaving scope of a local
    /// variable, constructing a temporary, or a class implicitly
    /// destroying a field/base (spec §4.6).
    ImplicitDestructor { ty: TypeRef },
    Other,
}

/// One node in the tree, with its source location for attribution.
/// `loc` is `None` for synthetic nodes with no direct source
/// representation (e.g. an implicitly synthesized special member); the
/// Node Context Stack walks up past these when looking for a usable
/// location (spec §4.3).
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub loc: Option<SourceLocation>,
}
