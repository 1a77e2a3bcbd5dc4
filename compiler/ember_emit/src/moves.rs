//! Sequentializing the parallel copy of jump arguments into block parameters.

use crate::mach::Slot;

/// Order `moves` (`(dst, src)`, all performed at once) into sequential
/// copies. Destinations must be distinct. Cycles go through
/// [`Slot::SCRATCH`].
pub(crate) fn sequentialize(moves: &[(Slot, Slot)]) -> Vec<(Slot, Slot)> {
    let mut pending: Vec<(Slot, Slot)> = moves.iter().copied().filter(|(d, s)| d != s).collect();
    let mut out = Vec::with_capacity(pending.len() + 1);

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|&(dst, _)| !pending.iter().any(|&(_, src)| src == dst));
        if let Some(i) = ready {
            out.push(pending.remove(i));
            continue;
        }
        // Every destination is still read: save one and redirect its readers.
        let (dst, _) = pending[0];
        out.push((Slot::SCRATCH, dst));
        for m in &mut pending {
            if m.1 == dst {
                m.1 = Slot::SCRATCH;
            }
        }
    }
    out
}
