use super::*;
use crate::builder::FunctionBuilder;
use crate::class::ValueClass;
use ember_ir::ast::ExceptionClass;
use ember_ir::{Name, Span};
use pretty_assertions::assert_eq;

fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

/// bb0 -> bb1, bb2; bb1 -> bb3; bb2 -> bb3
fn diamond() -> Function {
    let mut fb = FunctionBuilder::new(Name::from_raw(1), 1, Span::DUMMY);
    let x = fb.add_param(ValueClass::Term);
    let then_b = fb.new_block();
    let else_b = fb.new_block();
    let join = fb.new_block();
    let cond = fb.term_to_bool(x);
    fb.branch(cond, then_b, else_b);
    fb.position_at(then_b);
    fb.jump(join, vec![]);
    fb.position_at(else_b);
    fb.jump(join, vec![]);
    fb.position_at(join);
    fb.ret(x);
    fb.finish()
}

#[test]
fn diamond_predecessors() {
    let func = diamond();
    let preds = predecessors(&func);
    assert_eq!(preds[0], vec![]);
    assert_eq!(preds[3], vec![b(1), b(2)]);
}

#[test]
fn rpo_starts_at_entry_and_ends_at_join() {
    let func = diamond();
    let rpo = reverse_postorder(&func);
    assert_eq!(rpo.first(), Some(&b(0)));
    assert_eq!(rpo.last(), Some(&b(3)));
    assert_eq!(rpo.len(), 4);
}

#[test]
fn diamond_dominance() {
    let func = diamond();
    let dom = DominatorTree::build(&func);
    assert!(dom.dominates(b(0), b(3)));
    assert!(!dom.dominates(b(1), b(3)));
    assert!(dom.dominates(b(3), b(3)));
    assert_eq!(dom.idom(b(3)), Some(b(0)));
    assert_eq!(dom.idom(b(0)), None);
}

#[test]
fn loop_dominance() {
    // bb0 -> bb1; bb1 -> bb2, bb3; bb2 -> bb1
    let mut fb = FunctionBuilder::new(Name::from_raw(1), 1, Span::DUMMY);
    let x = fb.add_param(ValueClass::Term);
    let head = fb.new_block();
    let body = fb.new_block();
    let exit = fb.new_block();
    fb.jump(head, vec![]);
    fb.position_at(head);
    let c = fb.term_to_bool(x);
    fb.branch(c, body, exit);
    fb.position_at(body);
    fb.jump(head, vec![]);
    fb.position_at(exit);
    fb.ret(x);
    let func = fb.finish();

    let dom = DominatorTree::build(&func);
    assert!(dom.dominates(b(1), b(2)));
    assert!(dom.dominates(b(1), b(3)));
    assert!(!dom.dominates(b(2), b(3)));
    assert_eq!(predecessors(&func)[1], vec![b(0), b(2)]);
}

#[test]
fn handler_edges_count_as_successors() {
    let mut fb = FunctionBuilder::new(Name::from_raw(1), 1, Span::DUMMY);
    let x = fb.add_param(ValueClass::Term);
    let handler = fb.new_block();
    let exc = fb.add_block_param(handler, ValueClass::Term);
    fb.try_enter(handler);
    let outer = fb.set_handler(Some(handler));
    fb.raise(ExceptionClass::Throw, x);
    fb.set_handler(outer);
    fb.position_at(handler);
    fb.ret(exc);
    let func = fb.finish();

    let entry = &func.blocks[0];
    assert_eq!(exceptional_successors(entry).as_slice(), &[b(1)]);
    assert_eq!(successors(entry).as_slice(), &[b(1)]);
    assert!(reachable(&func).iter().all(|r| *r));
    let dom = DominatorTree::build(&func);
    assert!(dom.dominates(b(0), b(1)));
}
