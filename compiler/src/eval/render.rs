//! Render expressions back to source-like text for assertion messages

use crate::ast::{Arg, AssignOp, Block, LoopHead, Node, NodeKind};

pub fn render(node: &Node) -> String {
    match &node.kind {
        NodeKind::Int(n) => n.to_string(),
        NodeKind::Float(f) => format!("{:?}", f),
        NodeKind::String(s) => format!("{:?}", s),
        NodeKind::Boolean(b) => b.to_string(),
        NodeKind::Null => "null".to_string(),
        NodeKind::List(items) => format!("[{}]", join(items.iter().map(render))),
        NodeKind::Object(slots) => format!("{{{}}}", join(slots.iter().map(render_field))),

        NodeKind::Symbol { name, .. } => name.clone(),
        NodeKind::SelfRef => "self".to_string(),
        NodeKind::Select { receiver, field, .. } => format!("{}.{}", render(receiver), field),
        NodeKind::Index { receiver, index } => format!("{}[{}]", render(receiver), render(index)),
        NodeKind::FunCall { fun, args, block } => {
            let mut out = format!("{}({})", render(fun), join(args.iter().map(render_arg)));
            if let Some(block) = block {
                out.push(' ');
                out.push_str(&render(block));
            }
            out
        }
        NodeKind::Lambda(fun) => {
            let params = join(fun.args.iter().map(|a| a.name.clone()));
            format!("{{ {} -> {} }}", params, render_block_body(&fun.body))
        }

        NodeKind::Binary { op, left, right } => format!("{} {} {}", render(left), op.symbol(), render(right)),
        NodeKind::Not(inner) => format!("!{}", render(inner)),
        NodeKind::Conditional { cond, then, otherwise } => {
            let mut out = format!("if {} {}", render(cond), render_block(then));
            if let Some(otherwise) = otherwise {
                out.push_str(" else ");
                out.push_str(&render_block(otherwise));
            }
            out
        }
        NodeKind::Let { name, value, body } => format!("let {} = {} in {}", name, render(value), render(body)),
        NodeKind::Block(block) => render_block(block),
        NodeKind::ForLoop { head, body } => match head {
            LoopHead::Each { index: Some(index), name, iterable } => {
                format!("for {}, {} in {} {}", index, name, render(iterable), render_block(body))
            }
            LoopHead::Each { index: None, name, iterable } => {
                format!("for {} in {} {}", name, render(iterable), render_block(body))
            }
            LoopHead::While(cond) => format!("for {} {}", render(cond), render_block(body)),
        },
        NodeKind::Break => "break".to_string(),
        NodeKind::Continue => "continue".to_string(),

        NodeKind::Slot(slot) => match &slot.value {
            Some(value) => format!("{} = {}", slot.name, render(value)),
            None => slot.name.clone(),
        },
        NodeKind::FunDecl(decl) => format!("{}(...)", decl.name),
        NodeKind::ClassDecl(decl) => format!("type {}", decl.name),
        NodeKind::NewConstructor(_) => "new(...)".to_string(),
        NodeKind::EnumDecl(decl) => format!("enum {}", decl.name),
        NodeKind::ScalarDecl(decl) => format!("scalar {}", decl.name),
        NodeKind::InterfaceDecl(decl) => format!("interface {}", decl.name),
        NodeKind::DirectiveDecl(decl) => format!("directive @{}", decl.name),
        NodeKind::ImportDecl(decl) => match &decl.alias {
            Some(alias) => format!("import {} as {}", decl.source, alias),
            None => format!("import {}", decl.source),
        },

        NodeKind::Reassignment { target, op, value } => {
            let op = match op {
                AssignOp::Set => "=",
                AssignOp::Add => "+=",
            };
            format!("{} {} {}", render(target), op, render(value))
        }
        NodeKind::Reopen { name, .. } => format!("reopen {}", name),
        NodeKind::Assert { .. } => "assert { ... }".to_string(),
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(", ")
}

fn render_arg(arg: &Arg) -> String {
    match &arg.name {
        Some(name) => format!("{}: {}", name, render(&arg.value)),
        None => render(&arg.value),
    }
}

fn render_field(node: &Node) -> String {
    match &node.kind {
        NodeKind::Slot(slot) => match &slot.value {
            Some(value) => format!("{}: {}", slot.name, render(value)),
            None => slot.name.clone(),
        },
        _ => render(node),
    }
}

fn render_block_body(block: &Block) -> String {
    block.forms.iter().map(render).collect::<Vec<_>>().join("; ")
}

fn render_block(block: &Block) -> String {
    format!("{{ {} }}", render_block_body(block))
}
