//! Dang abstract syntax tree
//!
//! The parser is an external collaborator; it (or the [`build`] helpers)
//! produces these nodes. Every node owns a unique [`NodeId`] that the checker
//! uses to key inferred types and declared modules, and an optional source
//! location for diagnostics.
//!
//! Function and class bodies are reference-counted so runtime function
//! values can keep them without copying the tree.

pub mod build;

use crate::env::Visibility;
use source_map::SourceLocation;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub loc: Option<SourceLocation>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    /// `a ?? b`
    Default,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Default => "??",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod)
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Add,
}

/// A call argument, positional or named
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Node,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub forms: Vec<Node>,
    /// Inline blocks share their enclosing scope instead of cloning it
    pub inline: bool,
}

/// `pub name: Type = value` / `let name = value`, also used for arguments
#[derive(Debug, Clone)]
pub struct SlotDecl {
    pub name: String,
    pub ty: Option<TypeNode>,
    pub value: Option<Box<Node>>,
    pub visibility: Visibility,
    pub docstring: Option<String>,
    pub directives: Vec<DirectiveApplication>,
    pub loc: Option<SourceLocation>,
}

/// Shared shape of named functions, lambdas and `new()` constructors
#[derive(Debug, Clone)]
pub struct FunctionBase {
    pub args: Vec<SlotDecl>,
    /// `&name: (args) -> Ret`, a callback parameter
    pub block_param: Option<SlotDecl>,
    pub ret: Option<TypeNode>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct FunDecl {
    pub name: String,
    pub visibility: Visibility,
    pub docstring: Option<String>,
    pub directives: Vec<DirectiveApplication>,
    pub function: Rc<FunctionBase>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub visibility: Visibility,
    pub docstring: Option<String>,
    pub directives: Vec<DirectiveApplication>,
    pub implements: Vec<String>,
    pub body: Block,
}

impl ClassDecl {
    /// The explicit `new(...)` constructor, if any
    pub fn constructor(&self) -> Option<(&Node, &Rc<FunctionBase>)> {
        self.body.forms.iter().find_map(|form| match &form.kind {
            NodeKind::NewConstructor(fun) => Some((form, fun)),
            _ => None,
        })
    }

    pub fn forms_without_new(&self) -> impl Iterator<Item = &Node> {
        self.body
            .forms
            .iter()
            .filter(|form| !matches!(form.kind, NodeKind::NewConstructor(_)))
    }

    /// Parameters of the implicit constructor: every public field plus
    /// every private field without a default
    pub fn implicit_constructor_params(&self) -> Vec<&SlotDecl> {
        self.forms_without_new()
            .filter_map(|form| match &form.kind {
                NodeKind::Slot(slot) => Some(slot),
                _ => None,
            })
            .filter(|slot| slot.visibility == Visibility::Public || slot.value.is_none())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub docstring: Option<String>,
    pub values: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScalarDecl {
    pub name: String,
    pub docstring: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub docstring: Option<String>,
    pub implements: Vec<String>,
    pub body: Block,
}

/// `directive @name(args) on LOCATIONS`
#[derive(Debug, Clone)]
pub struct DirectiveDecl {
    pub name: String,
    pub docstring: Option<String>,
    pub args: Vec<SlotDecl>,
    pub locations: Vec<String>,
}

/// `@name(args)` attached to a declaration
#[derive(Debug, Clone)]
pub struct DirectiveApplication {
    pub name: String,
    pub args: Vec<Arg>,
    pub loc: Option<SourceLocation>,
}

/// `import source as alias(config...)`
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub source: String,
    pub alias: Option<String>,
    pub config: Vec<Arg>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    // --- Literals ---
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    List(Vec<Node>),
    /// `{a: 1, b: "x"}`, an anonymous module of slots
    Object(Vec<Node>),

    // --- References and calls ---
    Symbol { name: String, auto_call: bool },
    SelfRef,
    Select { receiver: Box<Node>, field: String, auto_call: bool },
    /// `xs[i]`
    Index { receiver: Box<Node>, index: Box<Node> },
    FunCall { fun: Box<Node>, args: Vec<Arg>, block: Option<Box<Node>> },
    Lambda(Rc<FunctionBase>),

    // --- Operators and control ---
    Binary { op: BinaryOp, left: Box<Node>, right: Box<Node> },
    Not(Box<Node>),
    Conditional { cond: Box<Node>, then: Block, otherwise: Option<Block> },
    Let { name: String, value: Box<Node>, body: Box<Node> },
    Block(Block),
    ForLoop { head: LoopHead, body: Block },
    Break,
    Continue,

    // --- Declarations ---
    Slot(SlotDecl),
    FunDecl(FunDecl),
    ClassDecl(Rc<ClassDecl>),
    NewConstructor(Rc<FunctionBase>),
    EnumDecl(EnumDecl),
    ScalarDecl(ScalarDecl),
    InterfaceDecl(InterfaceDecl),
    DirectiveDecl(DirectiveDecl),
    ImportDecl(ImportDecl),

    // --- Statements ---
    Reassignment { target: Box<Node>, op: AssignOp, value: Box<Node> },
    Reopen { name: String, block: Block },
    Assert { message: Option<Box<Node>>, block: Block },
}

/// What drives a `for` loop
#[derive(Debug, Clone)]
pub enum LoopHead {
    /// `for x in xs`, or `for i, x in xs` with the element's position
    Each {
        index: Option<String>,
        name: String,
        iterable: Box<Node>,
    },
    /// `for cond`, repeated while the condition holds
    While(Box<Node>),
}

/// Syntax of a type annotation
#[derive(Debug, Clone)]
pub enum TypeNode {
    /// `Name` or `Base.Name`
    Named { base: Option<String>, name: String, loc: Option<SourceLocation> },
    List(Box<TypeNode>),
    NonNull(Box<TypeNode>),
    Variable(String),
    /// `{a: Int!, b: String}`
    Object(Vec<(String, TypeNode)>),
    /// `(a: Int!) -> String`
    Fun { args: Vec<(String, TypeNode)>, block: Option<Box<TypeNode>>, ret: Box<TypeNode> },
}

impl TypeNode {
    pub fn referenced_symbols(&self, out: &mut Vec<String>) {
        match self {
            TypeNode::Named { base: Some(base), .. } => out.push(base.clone()),
            TypeNode::Named { name, .. } => out.push(name.clone()),
            TypeNode::List(inner) | TypeNode::NonNull(inner) => inner.referenced_symbols(out),
            TypeNode::Variable(_) => {}
            TypeNode::Object(fields) => fields.iter().for_each(|(_, t)| t.referenced_symbols(out)),
            TypeNode::Fun { args, block, ret } => {
                args.iter().for_each(|(_, t)| t.referenced_symbols(out));
                if let Some(block) = block {
                    block.referenced_symbols(out);
                }
                ret.referenced_symbols(out);
            }
        }
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNode::Named { base: Some(base), name, .. } => write!(f, "{}.{}", base, name),
            TypeNode::Named { name, .. } => write!(f, "{}", name),
            TypeNode::List(inner) => write!(f, "[{}]", inner),
            TypeNode::NonNull(inner) => write!(f, "{}!", inner),
            TypeNode::Variable(name) => write!(f, "{}", name),
            TypeNode::Object(fields) => {
                let parts: Vec<String> = fields.iter().map(|(k, t)| format!("{}: {}", k, t)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            TypeNode::Fun { args, ret, .. } => {
                let parts: Vec<String> = args.iter().map(|(k, t)| format!("{}: {}", k, t)).collect();
                write!(f, "({}) -> {}", parts.join(", "), ret)
            }
        }
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            id: NodeId::next(),
            loc: None,
            kind,
        }
    }

    pub fn at(mut self, loc: SourceLocation) -> Self {
        self.loc = Some(loc);
        self
    }

    /// Whether this form introduces names into its scope
    pub fn is_declaration(&self) -> bool {
        !self.declared_symbols().is_empty()
    }

    /// Names this form declares in its enclosing scope
    pub fn declared_symbols(&self) -> Vec<String> {
        match &self.kind {
            NodeKind::Slot(slot) => vec![slot.name.clone()],
            NodeKind::FunDecl(f) => vec![f.name.clone()],
            NodeKind::ClassDecl(c) => vec![c.name.clone()],
            NodeKind::EnumDecl(e) => vec![e.name.clone()],
            NodeKind::ScalarDecl(s) => vec![s.name.clone()],
            NodeKind::InterfaceDecl(i) => vec![i.name.clone()],
            NodeKind::ImportDecl(ImportDecl { alias: Some(alias), .. }) => vec![alias.clone()],
            _ => Vec::new(),
        }
    }

    /// Every name this node (and its children) refers to, in order, with
    /// duplicates
    pub fn referenced_symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<String>) {
        match &self.kind {
            NodeKind::Int(_)
            | NodeKind::Float(_)
            | NodeKind::String(_)
            | NodeKind::Boolean(_)
            | NodeKind::Null
            | NodeKind::SelfRef
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::EnumDecl(_)
            | NodeKind::ScalarDecl(_)
            | NodeKind::ImportDecl(_) => {}
            NodeKind::List(items) | NodeKind::Object(items) => {
                items.iter().for_each(|n| n.collect_references(out));
            }
            NodeKind::Symbol { name, .. } => out.push(name.clone()),
            NodeKind::Select { receiver, .. } => receiver.collect_references(out),
            NodeKind::Index { receiver, index } => {
                receiver.collect_references(out);
                index.collect_references(out);
            }
            NodeKind::FunCall { fun, args, block } => {
                fun.collect_references(out);
                args.iter().for_each(|a| a.value.collect_references(out));
                if let Some(block) = block {
                    block.collect_references(out);
                }
            }
            NodeKind::Lambda(fun) | NodeKind::NewConstructor(fun) => fun.collect_references(out),
            NodeKind::Binary { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            NodeKind::Not(inner) => inner.collect_references(out),
            NodeKind::Conditional { cond, then, otherwise } => {
                cond.collect_references(out);
                then.collect_references(out);
                if let Some(otherwise) = otherwise {
                    otherwise.collect_references(out);
                }
            }
            NodeKind::Let { value, body, .. } => {
                value.collect_references(out);
                body.collect_references(out);
            }
            NodeKind::Block(block) => block.collect_references(out),
            NodeKind::ForLoop { head, body } => {
                match head {
                    LoopHead::Each { iterable, .. } => iterable.collect_references(out),
                    LoopHead::While(cond) => cond.collect_references(out),
                }
                body.collect_references(out);
            }
            NodeKind::Slot(slot) => slot.collect_references(out),
            NodeKind::FunDecl(f) => {
                f.directives.iter().for_each(|d| d.collect_references(out));
                f.function.collect_references(out);
            }
            NodeKind::ClassDecl(c) => {
                out.extend(c.implements.iter().cloned());
                c.body.collect_references(out);
            }
            NodeKind::InterfaceDecl(i) => {
                out.extend(i.implements.iter().cloned());
                i.body.collect_references(out);
            }
            NodeKind::DirectiveDecl(d) => d.args.iter().for_each(|a| a.collect_references(out)),
            NodeKind::Reassignment { target, value, .. } => {
                target.collect_references(out);
                value.collect_references(out);
            }
            NodeKind::Reopen { name, block } => {
                out.push(name.clone());
                block.collect_references(out);
            }
            NodeKind::Assert { message, block } => {
                if let Some(message) = message {
                    message.collect_references(out);
                }
                block.collect_references(out);
            }
        }
    }

    /// Immediate child expressions, as shown in assertion failures
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::FunCall { fun, args, .. } => {
                let mut out = Vec::new();
                if let NodeKind::Select { receiver, .. } = &fun.kind {
                    out.push(receiver.as_ref());
                }
                out.extend(args.iter().map(|a| &a.value));
                out
            }
            NodeKind::Select { receiver, .. } => vec![receiver.as_ref()],
            NodeKind::Index { receiver, index } => vec![receiver.as_ref(), index.as_ref()],
            NodeKind::List(items) => items.iter().collect(),
            NodeKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            NodeKind::Not(inner) => vec![inner.as_ref()],
            NodeKind::Conditional { cond, .. } => vec![cond.as_ref()],
            NodeKind::Let { value, .. } => vec![value.as_ref()],
            _ => Vec::new(),
        }
    }
}

impl Block {
    fn collect_references(&self, out: &mut Vec<String>) {
        self.forms.iter().for_each(|n| n.collect_references(out));
    }
}

impl SlotDecl {
    fn collect_references(&self, out: &mut Vec<String>) {
        if let Some(ty) = &self.ty {
            ty.referenced_symbols(out);
        }
        if let Some(value) = &self.value {
            value.collect_references(out);
        }
        self.directives.iter().for_each(|d| d.collect_references(out));
    }
}

impl FunctionBase {
    fn collect_references(&self, out: &mut Vec<String>) {
        self.args.iter().for_each(|a| a.collect_references(out));
        if let Some(block) = &self.block_param {
            block.collect_references(out);
        }
        if let Some(ret) = &self.ret {
            ret.referenced_symbols(out);
        }
        self.body.collect_references(out);
    }
}

impl DirectiveApplication {
    fn collect_references(&self, out: &mut Vec<String>) {
        self.args.iter().for_each(|a| a.value.collect_references(out));
    }
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let a = int(1);
        let b = int(1);
        assert_ne!(a.id, b.id);
        assert_eq!(a.clone().id, a.id);
    }

    #[test]
    fn test_declared_symbols() {
        assert_eq!(pub_slot("x", None, Some(int(1))).declared_symbols(), vec!["x"]);
        assert_eq!(fun_decl("f", func(vec![], None, vec![int(1)])).declared_symbols(), vec!["f"]);
        assert!(add(sym("a"), sym("b")).declared_symbols().is_empty());
    }

    #[test]
    fn test_referenced_symbols() {
        let call_node = call(select(sym("obj"), "method"), vec![arg(sym("x"))]);
        assert_eq!(call_node.referenced_symbols(), vec!["obj", "x"]);

        let slot = pub_slot("y", Some(ty_nn("Int")), Some(add(sym("a"), int(1))));
        assert_eq!(slot.referenced_symbols(), vec!["Int", "a"]);

        let each = for_each("x", sym("xs"), vec![index(sym("ys"), sym("x"))]);
        assert_eq!(each.referenced_symbols(), vec!["xs", "ys", "x"]);
    }

    #[test]
    fn test_implicit_constructor_params() {
        let class = ClassDecl {
            name: "Foo".to_string(),
            visibility: Visibility::Public,
            docstring: None,
            directives: vec![],
            implements: vec![],
            body: Block {
                forms: vec![
                    pub_slot("a", Some(ty("Int")), None),
                    let_slot("b", Some(ty("Int")), Some(int(1))),
                    let_slot("c", Some(ty("Int")), None),
                    fun_decl("m", func(vec![], None, vec![int(1)])),
                ],
                inline: false,
            },
        };
        let names: Vec<&str> = class.implicit_constructor_params().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_type_node_display() {
        assert_eq!(list_ty(ty_nn("String")).to_string(), "[String!]");
        assert_eq!(TypeNode::NonNull(Box::new(list_ty(ty("Int")))).to_string(), "[Int]!");
    }
}
