use super::{Boundary, Error, LocalSlot, MethodBody};
use crate::il::{
    FlowControl, Instruction, LabelId, MemberQuery, MemberRef, MemberResolver, Opcode, Operand,
    TypeId,
};
use log::{debug, trace};

/// Cursor over the instructions of a [`MethodBody`]
///
/// The cursor always points at an instruction. Searches move the cursor and leave it on the
/// match, or leave it where it was if there is no match. Edits made through the navigator keep
/// the cursor on a well-defined instruction (see each edit for which).
pub struct Navigator<'b, 'g> {
    pub(crate) body: &'b mut MethodBody<'g>,
    pub(crate) position: usize,

    /// Set while an edit is running, so that the edits it is made of don't snapshot the body
    pub(crate) in_transaction: bool,
}

impl<'b, 'g> Navigator<'b, 'g> {
    pub(crate) fn new(body: &'b mut MethodBody<'g>, position: usize) -> Navigator<'b, 'g> {
        let position = position.min(body.code.len().saturating_sub(1));
        Navigator {
            body,
            position,
            in_transaction: false,
        }
    }

    pub fn body(&self) -> &MethodBody<'g> {
        &*self.body
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.body.code.len()
    }

    /// Move the cursor, clamping it to the instructions. Returns the new position.
    pub fn set_position(&mut self, position: usize) -> usize {
        self.position = position.min(self.len() - 1);
        self.position
    }

    pub fn first(&mut self) {
        self.position = 0;
    }

    pub fn last(&mut self) {
        self.position = self.len() - 1;
    }

    /// Move the cursor by `delta` instructions, clamping it to the instructions
    pub fn offset(&mut self, delta: isize) -> usize {
        let target = if delta < 0 {
            self.position.saturating_sub(delta.unsigned_abs())
        } else {
            self.position.saturating_add(delta as usize)
        };
        self.set_position(target)
    }

    pub fn is_first(&self) -> bool {
        self.position == 0
    }

    pub fn is_last(&self) -> bool {
        self.position + 1 == self.len()
    }

    /// Instruction under the cursor
    pub fn current(&self) -> &Instruction<'g> {
        &self.body.code.as_slice()[self.position]
    }

    pub fn next(&self) -> Option<&Instruction<'g>> {
        self.body.code.get(self.position + 1)
    }

    pub fn previous(&self) -> Option<&Instruction<'g>> {
        self.position
            .checked_sub(1)
            .and_then(|position| self.body.code.get(position))
    }

    pub fn instruction_at(&self, position: usize) -> Option<&Instruction<'g>> {
        self.body.code.get(position)
    }

    /// Move forward one instruction at a time until the predicate holds
    ///
    /// The current instruction is never considered: the cursor always moves first.
    pub fn seek(&mut self, predicate: impl Fn(&Self) -> bool) -> Result<usize, Error> {
        let from = self.position;
        while self.position + 1 < self.len() {
            self.position += 1;
            if predicate(self) {
                trace!("seek from {} matched at {}", from, self.position);
                return Ok(self.position);
            }
        }
        self.position = from;
        Err(Error::NavigationExhausted {
            from,
            boundary: Boundary::End,
        })
    }

    /// Move backward one instruction at a time until the predicate holds
    ///
    /// The current instruction is never considered: the cursor always moves first.
    pub fn rewind(&mut self, predicate: impl Fn(&Self) -> bool) -> Result<usize, Error> {
        let from = self.position;
        while self.position > 0 {
            self.position -= 1;
            if predicate(self) {
                trace!("rewind from {} matched at {}", from, self.position);
                return Ok(self.position);
            }
        }
        self.position = from;
        Err(Error::NavigationExhausted {
            from,
            boundary: Boundary::Start,
        })
    }

    /// Seek an opcode (and, if given, an operand)
    pub fn seek_op(&mut self, opcode: Opcode, operand: Option<&Operand<'g>>) -> Result<usize, Error> {
        self.seek(|nav| nav.matches_op(opcode, operand))
    }

    pub fn rewind_op(
        &mut self,
        opcode: Opcode,
        operand: Option<&Operand<'g>>,
    ) -> Result<usize, Error> {
        self.rewind(|nav| nav.matches_op(opcode, operand))
    }

    /// Seek a call or field load of a member
    pub fn seek_member(&mut self, member: MemberRef<'g>) -> Result<usize, Error> {
        self.seek(|nav| nav.calls(member))
    }

    pub fn rewind_member(&mut self, member: MemberRef<'g>) -> Result<usize, Error> {
        self.rewind(|nav| nav.calls(member))
    }

    /// Seek a call or field load of the member `query` resolves to
    ///
    /// A query naming a property finds its getter. Resolution failures are reported before the
    /// cursor moves.
    pub fn seek_query(
        &mut self,
        members: &MemberResolver<'_, 'g>,
        query: &MemberQuery<'g>,
    ) -> Result<usize, Error> {
        let member = members.resolve(query)?;
        self.seek_member(member)
    }

    pub fn rewind_query(
        &mut self,
        members: &MemberResolver<'_, 'g>,
        query: &MemberQuery<'g>,
    ) -> Result<usize, Error> {
        let member = members.resolve(query)?;
        self.rewind_member(member)
    }

    /// Seek a call to the setter of the property `query` names
    pub fn seek_setter(
        &mut self,
        members: &MemberResolver<'_, 'g>,
        query: &MemberQuery<'g>,
    ) -> Result<usize, Error> {
        let setter = members.resolve_setter(query)?;
        self.seek_member(MemberRef::Method(setter))
    }

    pub fn rewind_setter(
        &mut self,
        members: &MemberResolver<'_, 'g>,
        query: &MemberQuery<'g>,
    ) -> Result<usize, Error> {
        let setter = members.resolve_setter(query)?;
        self.rewind_member(MemberRef::Method(setter))
    }

    /// Seek a load (`is_load`) or a store of a local
    pub fn seek_local(&mut self, index: u16, is_load: bool) -> Result<usize, Error> {
        self.seek(|nav| nav.matches_local(index, is_load))
    }

    pub fn rewind_local(&mut self, index: u16, is_load: bool) -> Result<usize, Error> {
        self.rewind(|nav| nav.matches_local(index, is_load))
    }

    /// Seek a run of consecutive instructions matching the predicates in order
    ///
    /// The first predicate is searched for like [`Navigator::seek`]. Each of the following
    /// predicates must then hold at the instruction right after the previous match. If one
    /// doesn't, the search restarts from the instruction after the failed first match. On success
    /// the cursor is left on the first instruction of the run if `anchor_at_start`, otherwise on
    /// the last one.
    pub fn seek_chain(
        &mut self,
        anchor_at_start: bool,
        predicates: &[&dyn Fn(&Self) -> bool],
    ) -> Result<usize, Error> {
        let (first, rest) = predicates
            .split_first()
            .ok_or(Error::EmptyPredicateChain)?;
        let from = self.position;

        loop {
            let anchor = match self.seek(first) {
                Ok(anchor) => anchor,
                Err(err) => {
                    self.position = from;
                    return Err(match err {
                        Error::NavigationExhausted { boundary, .. } => {
                            Error::NavigationExhausted { from, boundary }
                        }
                        err => err,
                    });
                }
            };

            let mut matched = true;
            for (offset, predicate) in rest.iter().enumerate() {
                let position = anchor + offset + 1;
                if position >= self.len() {
                    matched = false;
                    break;
                }
                self.position = position;
                if !predicate(self) {
                    matched = false;
                    break;
                }
            }

            if matched {
                self.position = if anchor_at_start {
                    anchor
                } else {
                    anchor + rest.len()
                };
                trace!("chain from {} matched at {}", from, anchor);
                return Ok(self.position);
            }
            trace!("chain anchored at {} failed, restarting", anchor);
            self.position = anchor;
        }
    }

    fn matches_op(&self, opcode: Opcode, operand: Option<&Operand<'g>>) -> bool {
        match operand {
            Some(operand) => self.is_with(opcode, operand),
            None => self.is(opcode),
        }
    }

    fn matches_local(&self, index: u16, is_load: bool) -> bool {
        if is_load {
            self.is_load_local(index)
        } else {
            self.is_store_local(index)
        }
    }

    pub fn is(&self, opcode: Opcode) -> bool {
        self.current().opcode == opcode
    }

    pub fn is_with(&self, opcode: Opcode, operand: &Operand<'g>) -> bool {
        let current = self.current();
        current.opcode == opcode && current.operand == *operand
    }

    /// Is the current instruction a call or field load of the member?
    pub fn calls(&self, member: MemberRef<'g>) -> bool {
        let current = self.current();
        current.opcode.is_member_access() && current.member() == Some(member)
    }

    /// Is the current instruction a call or field load of the member `query` resolves to?
    pub fn calls_query(
        &self,
        members: &MemberResolver<'_, 'g>,
        query: &MemberQuery<'g>,
    ) -> Result<bool, Error> {
        Ok(self.calls(members.resolve(query)?))
    }

    /// Is the current instruction a branch (conditional or not)?
    pub fn is_branch(&self) -> bool {
        matches!(
            self.current().opcode.flow_control(),
            FlowControl::Branch | FlowControl::CondBranch
        )
    }

    pub fn is_load_local(&self, index: u16) -> bool {
        let current = self.current();
        current.is_load_local() && current.local_index() == Some(index)
    }

    pub fn is_store_local(&self, index: u16) -> bool {
        let current = self.current();
        current.is_store_local() && current.local_index() == Some(index)
    }

    pub fn is_load_local_named(&self, name: &str) -> bool {
        self.body
            .symbols
            .local_named(name)
            .map_or(false, |slot| self.is_load_local(slot.index))
    }

    pub fn is_store_local_named(&self, name: &str) -> bool {
        self.body
            .symbols
            .local_named(name)
            .map_or(false, |slot| self.is_store_local(slot.index))
    }

    pub fn is_load_local_of_type(&self, local_type: TypeId<'g>) -> bool {
        self.current().is_load_local()
            && self
                .local_at_cursor()
                .map_or(false, |slot| slot.local_type == local_type)
    }

    pub fn is_store_local_of_type(&self, local_type: TypeId<'g>) -> bool {
        self.current().is_store_local()
            && self
                .local_at_cursor()
                .map_or(false, |slot| slot.local_type == local_type)
    }

    pub fn is_load_integer(&self, value: i64) -> bool {
        self.current().loads_integer(value)
    }

    pub fn is_load_float(&self, value: f64) -> bool {
        self.current().loads_float(value)
    }

    /// Label attached to the instruction at `position`
    ///
    /// With a name, the label of that name must already be attached there, unless `can_make` and
    /// no label has that name yet. Without a name, the first label attached there is used. If
    /// `can_make`, a missing label is created and attached.
    pub fn label_for(
        &mut self,
        position: usize,
        name: Option<&str>,
        can_make: bool,
    ) -> Result<LabelId, Error> {
        self.body.label_at(position, name, can_make)
    }

    pub fn current_label(&mut self, can_make: bool) -> Result<LabelId, Error> {
        self.body.label_at(self.position, None, can_make)
    }

    /// Label the current (single-target) branch jumps to
    pub fn target_label(&self) -> Result<LabelId, Error> {
        match self.current().operand {
            Operand::Label(label) => Ok(label),
            _ => Err(self.invalid_current("branch with a single target")),
        }
    }

    /// Attach a synthetic label to the current instruction
    pub fn attach_label(&mut self, label: LabelId) -> Result<(), Error> {
        self.body.attach_label(self.position, label)
    }

    /// Local loaded or stored by the current instruction
    pub fn local_at_cursor(&self) -> Option<&LocalSlot<'g>> {
        self.body.local_at(self.position)
    }

    /// Name the local loaded or stored by the current instruction
    pub fn name_local_at_cursor(&mut self, name: &str) -> Result<LocalSlot<'g>, Error> {
        let index = self
            .local_at_cursor()
            .map(|slot| slot.index)
            .ok_or_else(|| self.invalid_current("local load or store"))?;
        self.body.symbols.name_local(index, name)
    }

    /// Rewrite the current instruction, keeping its labels
    pub fn set(&mut self, opcode: Opcode, operand: Operand<'g>) -> Result<(), Error> {
        self.body.replace(self.position, opcode, operand)
    }

    /// Insert in front of the current instruction
    ///
    /// The cursor stays on the current instruction (which moves forward by one) and so do its
    /// labels.
    pub fn insert_before(&mut self, instruction: Instruction<'g>) -> Result<(), Error> {
        self.body.insert(self.position, instruction)?;
        self.position += 1;
        Ok(())
    }

    /// Insert following the current instruction and move the cursor onto the new instruction
    pub fn insert_after(&mut self, instruction: Instruction<'g>) -> Result<(), Error> {
        self.body.insert(self.position + 1, instruction)?;
        self.position += 1;
        Ok(())
    }

    /// Remove the current instruction
    ///
    /// The cursor moves onto the instruction that followed (or the new last instruction), which
    /// also inherits the labels of the removed instruction.
    pub fn remove_current(&mut self) -> Result<Instruction<'g>, Error> {
        if self.len() == 1 {
            return Err(Error::EmptyMethodBody);
        }
        let removed = self.body.code.remove(self.position)?;
        self.position = self.position.min(self.len() - 1);
        Ok(removed)
    }

    /// Turn the current instruction into a `nop`, keeping its labels
    pub fn replace_nop(&mut self) -> Result<(), Error> {
        debug!("nop out {:?} at {}", self.current(), self.position);
        self.body.code.to_nop(self.position)
    }

    pub(crate) fn invalid_current(&self, expected: &'static str) -> Error {
        Error::InvalidCurrentInstruction {
            position: self.position,
            expected,
            found: format!("{:?}", self.current()),
        }
    }
}
