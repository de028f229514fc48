//! Helpers for constructing ASTs by hand
//!
//! Used by embedders that bring their own front end, and heavily by tests.

use super::*;

pub fn int(value: i64) -> Node {
    Node::new(NodeKind::Int(value))
}

pub fn float(value: f64) -> Node {
    Node::new(NodeKind::Float(value))
}

pub fn string(value: &str) -> Node {
    Node::new(NodeKind::String(value.to_string()))
}

pub fn boolean(value: bool) -> Node {
    Node::new(NodeKind::Boolean(value))
}

pub fn null() -> Node {
    Node::new(NodeKind::Null)
}

pub fn list(items: Vec<Node>) -> Node {
    Node::new(NodeKind::List(items))
}

/// `{name: value, ...}` with every field public
pub fn object(fields: Vec<(&str, Node)>) -> Node {
    let slots = fields
        .into_iter()
        .map(|(name, value)| pub_slot(name, None, Some(value)))
        .collect();
    Node::new(NodeKind::Object(slots))
}

/// A bare reference, not auto-called
pub fn sym(name: &str) -> Node {
    Node::new(NodeKind::Symbol {
        name: name.to_string(),
        auto_call: false,
    })
}

/// A reference that calls zero-argument functions implicitly
pub fn auto(name: &str) -> Node {
    Node::new(NodeKind::Symbol {
        name: name.to_string(),
        auto_call: true,
    })
}

pub fn self_ref() -> Node {
    Node::new(NodeKind::SelfRef)
}

pub fn select(receiver: Node, field: &str) -> Node {
    Node::new(NodeKind::Select {
        receiver: Box::new(receiver),
        field: field.to_string(),
        auto_call: false,
    })
}

/// `receiver.field`, calling zero-argument methods implicitly
pub fn get(receiver: Node, field: &str) -> Node {
    Node::new(NodeKind::Select {
        receiver: Box::new(receiver),
        field: field.to_string(),
        auto_call: true,
    })
}

/// `receiver[index]`
pub fn index(receiver: Node, index: Node) -> Node {
    Node::new(NodeKind::Index {
        receiver: Box::new(receiver),
        index: Box::new(index),
    })
}

pub fn call(fun: Node, args: Vec<Arg>) -> Node {
    Node::new(NodeKind::FunCall {
        fun: Box::new(fun),
        args,
        block: None,
    })
}

pub fn call_with_block(fun: Node, args: Vec<Arg>, block: Node) -> Node {
    Node::new(NodeKind::FunCall {
        fun: Box::new(fun),
        args,
        block: Some(Box::new(block)),
    })
}

/// `receiver.method(args...)`
pub fn method(receiver: Node, name: &str, args: Vec<Arg>) -> Node {
    call(select(receiver, name), args)
}

pub fn arg(value: Node) -> Arg {
    Arg { name: None, value }
}

pub fn named(name: &str, value: Node) -> Arg {
    Arg {
        name: Some(name.to_string()),
        value,
    }
}

pub fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
    Node::new(NodeKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn add(left: Node, right: Node) -> Node {
    binary(BinaryOp::Add, left, right)
}

pub fn sub(left: Node, right: Node) -> Node {
    binary(BinaryOp::Sub, left, right)
}

pub fn mul(left: Node, right: Node) -> Node {
    binary(BinaryOp::Mul, left, right)
}

pub fn div(left: Node, right: Node) -> Node {
    binary(BinaryOp::Div, left, right)
}

pub fn modulo(left: Node, right: Node) -> Node {
    binary(BinaryOp::Mod, left, right)
}

pub fn lt(left: Node, right: Node) -> Node {
    binary(BinaryOp::Lt, left, right)
}

pub fn gt(left: Node, right: Node) -> Node {
    binary(BinaryOp::Gt, left, right)
}

pub fn eq(left: Node, right: Node) -> Node {
    binary(BinaryOp::Eq, left, right)
}

pub fn not_eq(left: Node, right: Node) -> Node {
    binary(BinaryOp::NotEq, left, right)
}

/// `left ?? right`
pub fn or_default(left: Node, right: Node) -> Node {
    binary(BinaryOp::Default, left, right)
}

pub fn not(inner: Node) -> Node {
    Node::new(NodeKind::Not(Box::new(inner)))
}

pub fn if_else(cond: Node, then: Vec<Node>, otherwise: Option<Vec<Node>>) -> Node {
    Node::new(NodeKind::Conditional {
        cond: Box::new(cond),
        then: Block { forms: then, inline: false },
        otherwise: otherwise.map(|forms| Block { forms, inline: false }),
    })
}

pub fn let_in(name: &str, value: Node, body: Node) -> Node {
    Node::new(NodeKind::Let {
        name: name.to_string(),
        value: Box::new(value),
        body: Box::new(body),
    })
}

pub fn block(forms: Vec<Node>) -> Node {
    Node::new(NodeKind::Block(Block { forms, inline: false }))
}

/// `for name in iterable { body }`
pub fn for_each(name: &str, iterable: Node, body: Vec<Node>) -> Node {
    for_loop(
        LoopHead::Each {
            index: None,
            name: name.to_string(),
            iterable: Box::new(iterable),
        },
        body,
    )
}

/// `for i, name in iterable { body }`
pub fn for_indexed(index: &str, name: &str, iterable: Node, body: Vec<Node>) -> Node {
    for_loop(
        LoopHead::Each {
            index: Some(index.to_string()),
            name: name.to_string(),
            iterable: Box::new(iterable),
        },
        body,
    )
}

/// `for cond { body }`
pub fn while_loop(cond: Node, body: Vec<Node>) -> Node {
    for_loop(LoopHead::While(Box::new(cond)), body)
}

fn for_loop(head: LoopHead, body: Vec<Node>) -> Node {
    Node::new(NodeKind::ForLoop {
        head,
        body: Block { forms: body, inline: false },
    })
}

pub fn break_loop() -> Node {
    Node::new(NodeKind::Break)
}

pub fn continue_loop() -> Node {
    Node::new(NodeKind::Continue)
}

// --- Slots and arguments ---

impl SlotDecl {
    pub fn named(name: &str) -> Self {
        SlotDecl {
            name: name.to_string(),
            ty: None,
            value: None,
            visibility: Visibility::Private,
            docstring: None,
            directives: Vec::new(),
            loc: None,
        }
    }

    pub fn typed(mut self, ty: TypeNode) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn with_value(mut self, value: Node) -> Self {
        self.value = Some(Box::new(value));
        self
    }

    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.docstring = Some(doc.to_string());
        self
    }

    pub fn directive(mut self, application: DirectiveApplication) -> Self {
        self.directives.push(application);
        self
    }

    pub fn into_node(self) -> Node {
        let loc = self.loc.clone();
        let mut node = Node::new(NodeKind::Slot(self));
        node.loc = loc;
        node
    }
}

fn slot(name: &str, ty: Option<TypeNode>, value: Option<Node>) -> SlotDecl {
    let mut decl = SlotDecl::named(name);
    decl.ty = ty;
    decl.value = value.map(Box::new);
    decl
}

/// `pub name: ty = value`
pub fn pub_slot(name: &str, ty: Option<TypeNode>, value: Option<Node>) -> Node {
    slot(name, ty, value).public().into_node()
}

/// `let name: ty = value`
pub fn let_slot(name: &str, ty: Option<TypeNode>, value: Option<Node>) -> Node {
    slot(name, ty, value).into_node()
}

/// A required, typed parameter
pub fn param(name: &str, ty: TypeNode) -> SlotDecl {
    SlotDecl::named(name).typed(ty)
}

/// A parameter with a default value
pub fn param_default(name: &str, ty: Option<TypeNode>, default: Node) -> SlotDecl {
    slot(name, ty, Some(default))
}

/// An untyped lambda parameter
pub fn untyped(name: &str) -> SlotDecl {
    SlotDecl::named(name)
}

// --- Functions ---

pub fn func(args: Vec<SlotDecl>, ret: Option<TypeNode>, body: Vec<Node>) -> FunctionBase {
    FunctionBase {
        args,
        block_param: None,
        ret,
        body: Block { forms: body, inline: false },
    }
}

impl FunctionBase {
    /// Add a `&name: ty` block parameter
    pub fn with_block_param(mut self, name: &str, ty: TypeNode) -> Self {
        self.block_param = Some(SlotDecl::named(name).typed(ty));
        self
    }
}

/// `pub name(args): ret { body }`
pub fn fun_decl(name: &str, function: FunctionBase) -> Node {
    Node::new(NodeKind::FunDecl(FunDecl {
        name: name.to_string(),
        visibility: Visibility::Public,
        docstring: None,
        directives: Vec::new(),
        function: Rc::new(function),
    }))
}

/// `let name(args): ret { body }`
pub fn private_fun(name: &str, function: FunctionBase) -> Node {
    let mut node = fun_decl(name, function);
    if let NodeKind::FunDecl(decl) = &mut node.kind {
        decl.visibility = Visibility::Private;
    }
    node
}

pub fn lambda(args: Vec<SlotDecl>, body: Vec<Node>) -> Node {
    Node::new(NodeKind::Lambda(Rc::new(func(args, None, body))))
}

// --- Type declarations ---

pub fn class(name: &str, forms: Vec<Node>) -> Node {
    class_implementing(name, &[], forms)
}

pub fn class_implementing(name: &str, interfaces: &[&str], forms: Vec<Node>) -> Node {
    Node::new(NodeKind::ClassDecl(Rc::new(ClassDecl {
        name: name.to_string(),
        visibility: Visibility::Public,
        docstring: None,
        directives: Vec::new(),
        implements: interfaces.iter().map(|s| s.to_string()).collect(),
        body: Block { forms, inline: false },
    })))
}

/// `new(args) { body }` inside a class body
pub fn new_ctor(args: Vec<SlotDecl>, body: Vec<Node>) -> Node {
    Node::new(NodeKind::NewConstructor(Rc::new(func(args, None, body))))
}

pub fn enum_decl(name: &str, values: &[&str]) -> Node {
    Node::new(NodeKind::EnumDecl(EnumDecl {
        name: name.to_string(),
        docstring: None,
        values: values.iter().map(|s| s.to_string()).collect(),
    }))
}

pub fn scalar_decl(name: &str) -> Node {
    Node::new(NodeKind::ScalarDecl(ScalarDecl {
        name: name.to_string(),
        docstring: None,
    }))
}

pub fn interface_decl(name: &str, forms: Vec<Node>) -> Node {
    interface_extending(name, &[], forms)
}

pub fn interface_extending(name: &str, interfaces: &[&str], forms: Vec<Node>) -> Node {
    Node::new(NodeKind::InterfaceDecl(InterfaceDecl {
        name: name.to_string(),
        docstring: None,
        implements: interfaces.iter().map(|s| s.to_string()).collect(),
        body: Block { forms, inline: false },
    }))
}

pub fn directive_decl(name: &str, args: Vec<SlotDecl>, locations: &[&str]) -> Node {
    Node::new(NodeKind::DirectiveDecl(DirectiveDecl {
        name: name.to_string(),
        docstring: None,
        args,
        locations: locations.iter().map(|s| s.to_string()).collect(),
    }))
}

pub fn apply_directive(name: &str, args: Vec<Arg>) -> DirectiveApplication {
    DirectiveApplication {
        name: name.to_string(),
        args,
        loc: None,
    }
}

/// Attach directive applications to a declaration node
pub fn with_directives(mut node: Node, applications: Vec<DirectiveApplication>) -> Node {
    match &mut node.kind {
        NodeKind::Slot(slot) => slot.directives.extend(applications),
        NodeKind::FunDecl(decl) => decl.directives.extend(applications),
        NodeKind::ClassDecl(decl) => Rc::make_mut(decl).directives.extend(applications),
        _ => {}
    }
    node
}

/// Attach a docstring to a declaration node
pub fn documented(mut node: Node, doc: &str) -> Node {
    let doc = Some(doc.to_string());
    match &mut node.kind {
        NodeKind::Slot(slot) => slot.docstring = doc,
        NodeKind::FunDecl(decl) => decl.docstring = doc,
        NodeKind::ClassDecl(decl) => Rc::make_mut(decl).docstring = doc,
        NodeKind::EnumDecl(decl) => decl.docstring = doc,
        NodeKind::ScalarDecl(decl) => decl.docstring = doc,
        NodeKind::InterfaceDecl(decl) => decl.docstring = doc,
        NodeKind::DirectiveDecl(decl) => decl.docstring = doc,
        _ => {}
    }
    node
}

pub fn import(source: &str, alias: Option<&str>) -> Node {
    Node::new(NodeKind::ImportDecl(ImportDecl {
        source: source.to_string(),
        alias: alias.map(str::to_string),
        config: Vec::new(),
    }))
}

// --- Statements ---

pub fn assign(target: Node, value: Node) -> Node {
    Node::new(NodeKind::Reassignment {
        target: Box::new(target),
        op: AssignOp::Set,
        value: Box::new(value),
    })
}

pub fn add_assign(target: Node, value: Node) -> Node {
    Node::new(NodeKind::Reassignment {
        target: Box::new(target),
        op: AssignOp::Add,
        value: Box::new(value),
    })
}

pub fn reopen(name: &str, forms: Vec<Node>) -> Node {
    Node::new(NodeKind::Reopen {
        name: name.to_string(),
        block: Block { forms, inline: false },
    })
}

pub fn assert_that(forms: Vec<Node>) -> Node {
    Node::new(NodeKind::Assert {
        message: None,
        block: Block { forms, inline: false },
    })
}

pub fn assert_with_message(message: Node, forms: Vec<Node>) -> Node {
    Node::new(NodeKind::Assert {
        message: Some(Box::new(message)),
        block: Block { forms, inline: false },
    })
}

// --- Type annotations ---

/// A nullable named type
pub fn ty(name: &str) -> TypeNode {
    TypeNode::Named {
        base: None,
        name: name.to_string(),
        loc: None,
    }
}

/// A non-null named type
pub fn ty_nn(name: &str) -> TypeNode {
    non_null(ty(name))
}

/// `Base.Name`
pub fn qualified_ty(base: &str, name: &str) -> TypeNode {
    TypeNode::Named {
        base: Some(base.to_string()),
        name: name.to_string(),
        loc: None,
    }
}

pub fn non_null(inner: TypeNode) -> TypeNode {
    TypeNode::NonNull(Box::new(inner))
}

pub fn list_ty(elem: TypeNode) -> TypeNode {
    TypeNode::List(Box::new(elem))
}

pub fn var_ty(name: &str) -> TypeNode {
    TypeNode::Variable(name.to_string())
}

pub fn object_ty(fields: Vec<(&str, TypeNode)>) -> TypeNode {
    TypeNode::Object(fields.into_iter().map(|(k, t)| (k.to_string(), t)).collect())
}

pub fn fn_ty(args: Vec<(&str, TypeNode)>, ret: TypeNode) -> TypeNode {
    TypeNode::Fun {
        args: args.into_iter().map(|(k, t)| (k.to_string(), t)).collect(),
        block: None,
        ret: Box::new(ret),
    }
}
