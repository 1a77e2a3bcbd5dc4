//! Data construction: tuples, lists, maps and binaries.

use ember_ir::ast::{BinSegment, Expr, SegmentSize};
use ember_ir::Span;
use ember_mir::ValueId;

use crate::expr::Lowerer;
use crate::SourceError;

impl<'a> Lowerer<'_, 'a> {
    pub(crate) fn lower_tuple(&mut self, elements: &'a [Expr]) -> Result<ValueId, SourceError> {
        let elements = self.lower_all(elements)?;
        Ok(self.builder.make_tuple(elements))
    }

    pub(crate) fn lower_cons(&mut self, head: &'a Expr, tail: &'a Expr) -> Result<ValueId, SourceError> {
        let head = self.lower_expr(head)?;
        let tail = self.lower_expr(tail)?;
        Ok(self.builder.make_cons(head, tail))
    }

    /// `[E1, ..., En | Tail]`, elements first, left to right.
    pub(crate) fn lower_list(
        &mut self,
        elements: &'a [Expr],
        tail: Option<&'a Expr>,
    ) -> Result<ValueId, SourceError> {
        let elements = self.lower_all(elements)?;
        let tail = match tail {
            Some(tail) => self.lower_expr(tail)?,
            None => self.nil(),
        };
        Ok(self.cons_chain(&elements, tail))
    }

    /// A proper list of already lowered values.
    pub(crate) fn list_of(&mut self, values: &[ValueId]) -> ValueId {
        let nil = self.nil();
        self.cons_chain(values, nil)
    }

    fn cons_chain(&mut self, heads: &[ValueId], tail: ValueId) -> ValueId {
        heads
            .iter()
            .rev()
            .fold(tail, |tail, &head| self.builder.make_cons(head, tail))
    }

    pub(crate) fn lower_map(&mut self, entries: &'a [(Expr, Expr)]) -> Result<ValueId, SourceError> {
        let mut pairs = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = self.lower_expr(key)?;
            let value = self.lower_expr(value)?;
            pairs.push((key, value));
        }
        Ok(self.builder.make_map(pairs))
    }

    /// `<<Segments>>`. Every value and size is evaluated before the builder
    /// is opened, so nothing between `BinaryInit` and `BinaryFinish` but the
    /// puts themselves can raise.
    pub(crate) fn lower_binary(
        &mut self,
        segments: &'a [BinSegment<Expr>],
        span: Span,
    ) -> Result<ValueId, SourceError> {
        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            let value = self.lower_expr(&segment.value)?;
            let size = match &segment.size {
                SegmentSize::Default => None,
                SegmentSize::Literal(units) => Some(self.small_int(i64::from(*units))),
                SegmentSize::Var(name) => Some(self.scope.lookup(*name).ok_or(SourceError::UnboundSize {
                    name: *name,
                    span: segment.span.or(span),
                })?),
            };
            parts.push((value, size, segment.spec));
        }

        let builder = self.builder.binary_init();
        for (value, size, spec) in parts {
            self.builder.binary_put(builder, value, size, spec);
        }
        Ok(self.builder.binary_finish(builder))
    }
}
