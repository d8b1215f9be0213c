
use crate::{BlockId, Cfg, Instruction, IrError, IrResult, Value};
use std::collections::{hash_map::Entry, HashMap, HashSet, VecDeque};

/// Slots must stay addressable with a 32 bit displacement from `rbp`.
const MAX_FRAME_SIZE: u32 = i32::MAX as u32;

/// Replaces `stack_alloc` and `stack_free` by static slots in the stack frame and returns the
/// number of bytes the frame needs.
///
/// Offsets are propagated breadth-first from the start of the function. Every slot is rounded up
/// to a multiple of 8 bytes. `x = stack_alloc(n)` becomes `x = [rbp - offset]`, where `offset`
/// includes the new slot. Blocks that can't be reached are laid out on their own as if entered
/// with an empty frame. The end of the function may be entered with any offset, the epilogue
/// restores `rsp` from `rbp`.
pub fn layout_stack_frame(cfg: &mut Cfg) -> IrResult<u32> {
    let mut entry_offsets = HashMap::from([(cfg.start_id(), 0)]);
    let mut queue = VecDeque::from([cfg.start_id()]);
    let mut visited = HashSet::new();
    let mut unvisited = cfg.block_ids().into_iter();
    let mut frame_size = 0;

    loop {
        let (id, reachable) = match queue.pop_front() {
            Some(id) => (id, true),
            None => match unvisited.by_ref().find(|id| !visited.contains(id)) {
                Some(id) => {
                    entry_offsets.entry(id).or_insert(0);
                    (id, false)
                }
                None => break,
            },
        };
        if !visited.insert(id) {
            continue;
        }

        let mut offset: u32 = entry_offsets[&id];
        let label = cfg[id].label.clone();
        let mut instructions = Vec::with_capacity(cfg[id].instructions.len());
        for instr in std::mem::take(&mut cfg[id].instructions) {
            match instr {
                Instruction::StackAlloc { lhs, size } => {
                    offset = slot_size(size)
                        .and_then(|slot| offset.checked_add(slot))
                        .filter(|&offset| offset <= MAX_FRAME_SIZE)
                        .ok_or_else(|| IrError::FrameTooLarge(label.clone()))?;
                    frame_size = frame_size.max(offset);
                    instructions.push(Instruction::Assign {
                        lhs,
                        rhs: Value::StackAddr(offset.into()),
                    });
                }
                Instruction::StackFree { size } => {
                    offset = slot_size(size)
                        .and_then(|slot| offset.checked_sub(slot))
                        .ok_or_else(|| IrError::UnbalancedStackFree(label.clone()))?;
                }
                instr => instructions.push(instr),
            }
        }
        cfg[id].instructions = instructions;
        if !reachable {
            continue;
        }

        let successors: Vec<BlockId> = cfg.successor_ids(id).collect();
        for succ in successors {
            if succ == cfg.end_id() {
                continue;
            }
            match entry_offsets.entry(succ) {
                Entry::Occupied(entry) if *entry.get() != offset => {
                    return Err(IrError::InconsistentStackOffset {
                        block: cfg[succ].label.clone(),
                        first: *entry.get(),
                        second: offset,
                    });
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(entry) => {
                    entry.insert(offset);
                    queue.push_back(succ);
                }
            }
        }
    }

    log::trace!("stack frame needs {frame_size} bytes");
    Ok(frame_size)
}

fn slot_size(size: u32) -> Option<u32> {
    size.checked_next_multiple_of(8)
}
