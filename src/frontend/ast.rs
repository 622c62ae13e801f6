//! Abstract syntax tree handed over by the external parser.
//!
//! A [`Node`] has an immutable structural part (kind, token, ordered children, optional type
//! expression) and a resolution part filled by the validator: the type slot, the coercions applied to
//! the node, the bound callee of calls, a computed value and a [`Lowering`] hint for the C backend.
//! The structural part is deserialized from JSON; the resolution part never is.
//!
//! ## Child layout per kind
//!
//! | kind | token text | children |
//! |------|------------|----------|
//! | `identifier` | name | – (a declaration if `flags.declaration`) |
//! | literals | literal text | – |
//! | `call` | callee name | arguments (`named_argument` wraps named ones) |
//! | `named_argument` | argument name | value |
//! | `member_access` | – | object, member (`identifier` or `call`) |
//! | `index` | – | object, index |
//! | `binary` / `unary` | operator | operands |
//! | `cast` / `size_of` / `type_info_of` | – | operand for `cast`; target in `type_expr` |
//! | `range` | – | start, end (inclusive) |
//! | `array_literal` / `expr_list` / `block` | – | elements / statements |
//! | `assignment` | – | target (`expr_list` for destructuring), value |
//! | `return` / `yield` | – | nothing, one value or an `expr_list` |
//! | `if` | – | condition, then-block, optional else (block or `if`) |
//! | `while` | – | condition, body |
//! | `for` | – | binding (`identifier` or `expr_list`), iterable, body |
//! | `loop` / `defer` / `unsafe` | – | body |
//! | `break` / `continue` | – | optional label `identifier` |

use serde::{Deserialize, Deserializer};

use kuri_core::lang::operators::{self, BinaryOpId, UnaryOpId};

use super::module::{FunctionId, GlobalId, ModuleId};
use super::types::{CoercionSet, TypeIndex};

/// Source position: 1-based line and column, plus the underlined length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default)]
    pub len: u32,
}

impl Span {
    pub fn new(line: u32, column: u32, len: u32) -> Self {
        Self { line, column, len }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub span: Span,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Identifier,
    IntegerLiteral,
    RealLiteral,
    BoolLiteral,
    StringLiteral,
    CharLiteral,
    NullLiteral,
    Call,
    NamedArgument,
    MemberAccess,
    Index,
    Binary(#[serde(deserialize_with = "binary_op")] BinaryOpId),
    Unary(#[serde(deserialize_with = "unary_op")] UnaryOpId),
    Cast,
    SizeOf,
    TypeInfoOf,
    Range,
    ArrayLiteral,
    ExprList,
    Block,
    Assignment,
    Return,
    If,
    While,
    For,
    Loop,
    Break,
    Continue,
    Defer,
    Unsafe,
    Yield,
}

fn binary_op<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BinaryOpId, D::Error> {
    let spelling = String::deserialize(deserializer)?;
    operators::binary_from_str(&spelling)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown binary operator `{spelling}`")))
}

fn unary_op<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UnaryOpId, D::Error> {
    let spelling = String::deserialize(deserializer)?;
    operators::unary_from_str(&spelling)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown unary operator `{spelling}`")))
}

/// Binding flags of declaration identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct NodeFlags {
    #[serde(default)]
    pub declaration: bool,
    #[serde(default)]
    pub mutable: bool,
}

/// Computed value attached by the validator.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeValue {
    #[default]
    None,
    /// Integer literal or enum variant. Wide enough for every `n64` and `z64` value.
    Integer(i128),
    Real(f64),
    Bool(bool),
    /// Decoded bytes of a string literal.
    Str(Vec<u8>),
    /// Loop number, on loops and on the `break`/`continue` that target them.
    Label(usize),
    /// Operand type of `taille_de` / `info_de`.
    Type(TypeIndex),
}

/// How a resolved identifier is reached.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Access {
    #[default]
    Local,
    /// Parameter bound by reference; reads go through the pointer.
    ReferenceParam,
    /// Field of an employed parameter.
    Employed { base: String, through_pointer: bool },
    Global(GlobalId),
    Function(FunctionId),
}

/// How a member access is lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberLowering {
    Field,
    FieldThroughPointer,
    /// `taille` of a fixed-size array.
    ArrayLength(u64),
    /// `pointeur` of a fixed-size array.
    ArrayPointer,
    /// `taille` / `pointeur` / `info` of strings, slices and boxed values.
    Builtin,
    EnumVariant(i64),
    /// `module.symbol`: the member is lowered on its own.
    Module(ModuleId),
}

/// Iteration strategy of a `for` loop, chosen from the iterated type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForStrategy {
    Range,
    FixedArray(u64),
    Slice,
    String,
    Coroutine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnLowering {
    Bare,
    Single,
    /// One value per output slot.
    Multi,
    /// `retourne f()` where `f` fills the same output slots.
    Forward,
}

/// Lowering hint recorded by the validator for the backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Lowering {
    #[default]
    None,
    Access(Access),
    Member(MemberLowering),
    Call {
        /// Index of the first argument packed into the variadic slice.
        variadic_from: Option<usize>,
        /// Arguments past the declared parameters of an external C-variadic function.
        c_variadic_from: Option<usize>,
    },
    For(ForStrategy),
    Return(ReturnLowering),
    /// `a, b = f()`: targets receive the output slots of the call.
    MultiAssign,
}

/// Parsed type expression, resolved against primitives and module compounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeExpr {
    Named(String),
    Pointer(Box<TypeExpr>),
    Reference(Box<TypeExpr>),
    /// `[N]T` with a length, `[]T` without.
    Array { len: Option<u64>, element: Box<TypeExpr> },
    Function { params: Vec<TypeExpr>, returns: Vec<TypeExpr> },
    Coroutine { params: Vec<TypeExpr>, returns: Vec<TypeExpr> },
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    pub fn pointer(inner: TypeExpr) -> Self {
        TypeExpr::Pointer(Box::new(inner))
    }

    pub fn reference(inner: TypeExpr) -> Self {
        TypeExpr::Reference(Box::new(inner))
    }

    pub fn array(len: u64, element: TypeExpr) -> Self {
        TypeExpr::Array {
            len: Some(len),
            element: Box::new(element),
        }
    }

    pub fn slice(element: TypeExpr) -> Self {
        TypeExpr::Array {
            len: None,
            element: Box::new(element),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    #[serde(default)]
    pub token: Token,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default)]
    pub type_expr: Option<TypeExpr>,
    #[serde(default)]
    pub flags: NodeFlags,

    #[serde(skip)]
    pub ty: TypeIndex,
    #[serde(skip)]
    pub coercions: CoercionSet,
    #[serde(skip)]
    pub callee: Option<FunctionId>,
    #[serde(skip)]
    pub value: NodeValue,
    #[serde(skip)]
    pub lowering: Lowering,
}

impl Node {
    pub fn new(kind: NodeKind, text: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            kind,
            token: Token::new(text),
            children,
            type_expr: None,
            flags: NodeFlags::default(),
            ty: TypeIndex::UNRESOLVED,
            coercions: CoercionSet::NONE,
            callee: None,
            value: NodeValue::None,
            lowering: Lowering::None,
        }
    }

    /// Anchor the node at `line:column`, underlining its token text.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        let len = self.token.text.chars().count().max(1) as u32;
        self.token.span = Span::new(line, column, len);
        self
    }

    pub fn with_type(mut self, ty: TypeExpr) -> Self {
        self.type_expr = Some(ty);
        self
    }

    pub fn span(&self) -> Span {
        self.token.span
    }

    pub fn name(&self) -> &str {
        &self.token.text
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    /// Label number recorded on loops and loop jumps.
    pub fn label(&self) -> Option<usize> {
        match self.value {
            NodeValue::Label(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::IntegerLiteral
                | NodeKind::RealLiteral
                | NodeKind::BoolLiteral
                | NodeKind::StringLiteral
                | NodeKind::CharLiteral
                | NodeKind::NullLiteral
        )
    }
}

/// Parameter of a function declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParamDecl {
    pub name: Token,
    pub ty: TypeExpr,
    /// `...T`: trailing arguments are packed into a `[]T`.
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub mutable: bool,
    /// Fields of the (pointed-to) struct are in scope as locals.
    #[serde(default)]
    pub employed: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionDecl {
    pub name: Token,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    /// Empty means `rien`.
    #[serde(default)]
    pub returns: Vec<TypeExpr>,
    /// Implemented outside of Kuri; keeps its source name and has no body.
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub coroutine: bool,
    /// External C function accepting untyped trailing arguments.
    #[serde(default)]
    pub c_variadic: bool,
    #[serde(default)]
    pub body: Option<Node>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldDecl {
    pub name: Token,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StructDecl {
    pub name: Token,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    /// Opaque struct provided by external code.
    #[serde(default)]
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VariantDecl {
    pub name: Token,
    #[serde(default)]
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnumDecl {
    pub name: Token,
    #[serde(default)]
    pub backing: Option<TypeExpr>,
    pub variants: Vec<VariantDecl>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "declaration", rename_all = "snake_case")]
pub enum Declaration {
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    /// Declaration identifier or declaring assignment at module level.
    Global(Node),
}

impl Declaration {
    /// Name token of the declared entity.
    pub fn name(&self) -> &Token {
        match self {
            Declaration::Function(f) => &f.name,
            Declaration::Struct(s) => &s.name,
            Declaration::Enum(e) => &e.name,
            Declaration::Global(node) => match node.kind {
                NodeKind::Assignment => node.child(0).map(|n| &n.token).unwrap_or(&node.token),
                _ => &node.token,
            },
        }
    }
}

/// One parsed file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceFile {
    pub module: String,
    #[serde(default)]
    pub path: String,
    /// Source text, used to quote lines in diagnostics.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

impl SourceFile {
    pub fn new(module: impl Into<String>) -> Self {
        let module = module.into();
        Self {
            path: format!("{module}.kuri"),
            module,
            source: String::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            declarations: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn import(mut self, module: impl Into<String>) -> Self {
        self.imports.push(module.into());
        self
    }

    pub fn export(mut self, name: impl Into<String>) -> Self {
        self.exports.push(name.into());
        self
    }

    pub fn declare(mut self, declaration: Declaration) -> Self {
        self.declarations.push(declaration);
        self
    }
}

/// Constructors for building trees by hand (tooling and tests).
pub mod build {
    use super::*;

    pub fn ident(name: &str) -> Node {
        Node::new(NodeKind::Identifier, name, Vec::new())
    }

    pub fn int(value: i64) -> Node {
        Node::new(NodeKind::IntegerLiteral, value.to_string(), Vec::new())
    }

    pub fn real(text: &str) -> Node {
        Node::new(NodeKind::RealLiteral, text, Vec::new())
    }

    pub fn boolean(value: bool) -> Node {
        Node::new(NodeKind::BoolLiteral, if value { "vrai" } else { "faux" }, Vec::new())
    }

    pub fn string(text: &str) -> Node {
        Node::new(NodeKind::StringLiteral, text, Vec::new())
    }

    pub fn null() -> Node {
        Node::new(NodeKind::NullLiteral, "nul", Vec::new())
    }

    pub fn call(name: &str, args: Vec<Node>) -> Node {
        Node::new(NodeKind::Call, name, args)
    }

    pub fn named(name: &str, value: Node) -> Node {
        Node::new(NodeKind::NamedArgument, name, vec![value])
    }

    pub fn member(object: Node, member: Node) -> Node {
        Node::new(NodeKind::MemberAccess, ".", vec![object, member])
    }

    pub fn index(object: Node, index: Node) -> Node {
        Node::new(NodeKind::Index, "[", vec![object, index])
    }

    pub fn binary(op: BinaryOpId, lhs: Node, rhs: Node) -> Node {
        let spelling = operators::binary_info(op).spelling;
        Node::new(NodeKind::Binary(op), spelling, vec![lhs, rhs])
    }

    pub fn unary(op: UnaryOpId, operand: Node) -> Node {
        let spelling = operators::unary_info(op).spelling;
        Node::new(NodeKind::Unary(op), spelling, vec![operand])
    }

    pub fn cast(operand: Node, ty: TypeExpr) -> Node {
        Node::new(NodeKind::Cast, "transtype", vec![operand]).with_type(ty)
    }

    pub fn range(start: Node, end: Node) -> Node {
        Node::new(NodeKind::Range, "...", vec![start, end])
    }

    pub fn array(elements: Vec<Node>) -> Node {
        Node::new(NodeKind::ArrayLiteral, "[", elements)
    }

    pub fn list(items: Vec<Node>) -> Node {
        Node::new(NodeKind::ExprList, ",", items)
    }

    pub fn block(statements: Vec<Node>) -> Node {
        Node::new(NodeKind::Block, "{", statements)
    }

    /// `soit name = value` (immutable) declaration.
    pub fn declare(name: &str, value: Node) -> Node {
        assign(declaration(name, false), value)
    }

    /// `dyn name = value` (mutable) declaration.
    pub fn declare_mut(name: &str, value: Node) -> Node {
        assign(declaration(name, true), value)
    }

    /// Bare declaration target, to be used alone (with a type) or as an assignment target.
    pub fn declaration(name: &str, mutable: bool) -> Node {
        let mut node = ident(name);
        node.flags = NodeFlags {
            declaration: true,
            mutable,
        };
        node
    }

    pub fn assign(target: Node, value: Node) -> Node {
        Node::new(NodeKind::Assignment, "=", vec![target, value])
    }

    pub fn ret(values: Vec<Node>) -> Node {
        Node::new(NodeKind::Return, "retourne", wrap_values(values))
    }

    pub fn yield_(values: Vec<Node>) -> Node {
        Node::new(NodeKind::Yield, "retiens", wrap_values(values))
    }

    fn wrap_values(mut values: Vec<Node>) -> Vec<Node> {
        if values.len() > 1 {
            vec![list(values)]
        } else {
            values.truncate(1);
            values
        }
    }

    pub fn if_(condition: Node, then: Node, otherwise: Option<Node>) -> Node {
        let mut children = vec![condition, then];
        children.extend(otherwise);
        Node::new(NodeKind::If, "si", children)
    }

    pub fn while_(condition: Node, body: Node) -> Node {
        Node::new(NodeKind::While, "tantque", vec![condition, body])
    }

    pub fn for_(binding: Node, iterable: Node, body: Node) -> Node {
        Node::new(NodeKind::For, "pour", vec![binding, iterable, body])
    }

    pub fn loop_(body: Node) -> Node {
        Node::new(NodeKind::Loop, "boucle", vec![body])
    }

    pub fn break_(label: Option<&str>) -> Node {
        Node::new(NodeKind::Break, "arrête", label.map(ident).into_iter().collect())
    }

    pub fn continue_(label: Option<&str>) -> Node {
        Node::new(NodeKind::Continue, "continue", label.map(ident).into_iter().collect())
    }

    pub fn defer(body: Node) -> Node {
        Node::new(NodeKind::Defer, "diffère", vec![body])
    }

    pub fn unsafe_(body: Node) -> Node {
        Node::new(NodeKind::Unsafe, "nonsûr", vec![body])
    }

    pub fn param(name: &str, ty: TypeExpr) -> ParamDecl {
        ParamDecl {
            name: Token::new(name),
            ty,
            variadic: false,
            mutable: false,
            employed: false,
        }
    }

    pub fn function(name: &str, params: Vec<ParamDecl>, returns: Vec<TypeExpr>, body: Vec<Node>) -> FunctionDecl {
        FunctionDecl {
            name: Token::new(name),
            params,
            returns,
            external: false,
            coroutine: false,
            c_variadic: false,
            body: Some(block(body)),
        }
    }

    pub fn coroutine(name: &str, params: Vec<ParamDecl>, returns: Vec<TypeExpr>, body: Vec<Node>) -> FunctionDecl {
        FunctionDecl {
            coroutine: true,
            ..function(name, params, returns, body)
        }
    }

    pub fn external(name: &str, params: Vec<ParamDecl>, returns: Vec<TypeExpr>) -> FunctionDecl {
        FunctionDecl {
            name: Token::new(name),
            params,
            returns,
            external: true,
            coroutine: false,
            c_variadic: false,
            body: None,
        }
    }

    pub fn structure(name: &str, fields: Vec<(&str, TypeExpr)>) -> StructDecl {
        StructDecl {
            name: Token::new(name),
            fields: fields
                .into_iter()
                .map(|(name, ty)| FieldDecl {
                    name: Token::new(name),
                    ty,
                })
                .collect(),
            external: false,
        }
    }

    pub fn enumeration(name: &str, backing: Option<TypeExpr>, variants: Vec<&str>) -> EnumDecl {
        EnumDecl {
            name: Token::new(name),
            backing,
            variants: variants
                .into_iter()
                .map(|name| VariantDecl {
                    name: Token::new(name),
                    value: None,
                })
                .collect(),
        }
    }
}
