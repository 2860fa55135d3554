use super::Error;
use crate::il::{Instruction, LabelId, Opcode, Operand};
use log::debug;

/// Ordered, editable sequence of instructions
///
/// Positions are plain indices: inserting or removing shifts every later position by one, and
/// it is up to the caller to move its cursor accordingly. Labels belong to positions, so
/// rewriting an instruction in place keeps the labels attached to it.
#[derive(Clone, Debug)]
pub struct InstructionStream<'g> {
    instructions: Vec<Instruction<'g>>,
}

impl<'g> InstructionStream<'g> {
    /// Wrap a sequence of instructions, checking every operand
    pub fn new(instructions: Vec<Instruction<'g>>) -> Result<InstructionStream<'g>, Error> {
        for instruction in &instructions {
            instruction.validate()?;
        }
        Ok(InstructionStream { instructions })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Instruction<'g>> {
        self.instructions.get(position)
    }

    pub fn as_slice(&self) -> &[Instruction<'g>] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction<'g>> {
        self.instructions.iter()
    }

    pub fn into_vec(self) -> Vec<Instruction<'g>> {
        self.instructions
    }

    fn check_position(&self, position: usize) -> Result<(), Error> {
        if position < self.instructions.len() {
            Ok(())
        } else {
            Err(Error::InvalidPosition {
                position,
                len: self.instructions.len(),
            })
        }
    }

    /// Insert an instruction so that it ends up at `position` (which may be the length)
    pub fn insert(&mut self, position: usize, instruction: Instruction<'g>) -> Result<(), Error> {
        if position > self.instructions.len() {
            return Err(Error::InvalidPosition {
                position,
                len: self.instructions.len(),
            });
        }
        instruction.validate()?;
        debug!("insert at {}: {:?}", position, instruction);
        self.instructions.insert(position, instruction);
        Ok(())
    }

    /// Insert in front of the instruction at `position`
    ///
    /// Returns the new position of the instruction that was at `position`. Its labels stay with
    /// it, so jumps to it skip the inserted instruction.
    pub fn insert_before(
        &mut self,
        position: usize,
        instruction: Instruction<'g>,
    ) -> Result<usize, Error> {
        self.check_position(position)?;
        self.insert(position, instruction)?;
        Ok(position + 1)
    }

    /// Insert following the instruction at `position`
    ///
    /// Returns the position of the inserted instruction.
    pub fn insert_after(
        &mut self,
        position: usize,
        instruction: Instruction<'g>,
    ) -> Result<usize, Error> {
        self.check_position(position)?;
        self.insert(position + 1, instruction)?;
        Ok(position + 1)
    }

    /// Rewrite the opcode and operand at `position`, keeping its labels
    pub fn replace(
        &mut self,
        position: usize,
        opcode: Opcode,
        operand: Operand<'g>,
    ) -> Result<(), Error> {
        self.check_position(position)?;
        let labels = self.instructions[position].labels.clone();
        let replacement = Instruction::new(opcode, operand)?.with_labels(labels);
        debug!(
            "replace at {}: {:?} -> {:?}",
            position, self.instructions[position], replacement
        );
        self.instructions[position] = replacement;
        Ok(())
    }

    /// Remove the instruction at `position`
    ///
    /// Its labels move to the instruction that follows it (which now sits at `position`). Removing
    /// the last instruction while it still has labels would leave those labels dangling, so that
    /// is refused.
    pub fn remove(&mut self, position: usize) -> Result<Instruction<'g>, Error> {
        self.check_position(position)?;
        let labels = &self.instructions[position].labels;
        if !labels.is_empty() && position + 1 == self.instructions.len() {
            return Err(Error::UnplacedLabels(labels.clone()));
        }

        let mut removed = self.instructions.remove(position);
        debug!("remove at {}: {:?}", position, removed);
        let labels = std::mem::take(&mut removed.labels);
        if let Some(next) = self.instructions.get_mut(position) {
            for label in labels {
                if !next.labels.contains(&label) {
                    next.labels.push(label);
                }
            }
        }
        Ok(removed)
    }

    /// Turn the instruction at `position` into a `nop`, keeping its labels
    pub fn to_nop(&mut self, position: usize) -> Result<(), Error> {
        self.replace(position, Opcode::Nop, Operand::None)
    }

    /// Attach a label to the instruction at `position`
    ///
    /// A label resolves to exactly one instruction, so attaching a label that is already attached
    /// elsewhere is an error.
    pub fn attach_label(&mut self, position: usize, label: LabelId) -> Result<(), Error> {
        self.check_position(position)?;
        match self.position_of_label(label) {
            Some(existing) if existing == position => Ok(()),
            Some(_) => Err(Error::DuplicateLabel(label)),
            None => {
                debug!("attach {:?} at {}", label, position);
                self.instructions[position].labels.push(label);
                Ok(())
            }
        }
    }

    /// Move all labels from one instruction to another
    pub fn move_labels(&mut self, from: usize, to: usize) -> Result<(), Error> {
        self.check_position(from)?;
        self.check_position(to)?;
        if from == to {
            return Ok(());
        }
        let labels = std::mem::take(&mut self.instructions[from].labels);
        debug!("move labels {:?} from {} to {}", labels, from, to);
        let target = &mut self.instructions[to].labels;
        for label in labels {
            if !target.contains(&label) {
                target.push(label);
            }
        }
        Ok(())
    }

    /// Position of the instruction the label is attached to
    pub fn position_of_label(&self, label: LabelId) -> Option<usize> {
        self.instructions
            .iter()
            .position(|instruction| instruction.labels.contains(&label))
    }

    /// Labels referenced by some branch but attached to no instruction
    pub fn unplaced_labels(&self) -> Vec<LabelId> {
        let mut unplaced: Vec<LabelId> = self
            .instructions
            .iter()
            .flat_map(|instruction| instruction.branch_targets().iter().copied())
            .filter(|label| self.position_of_label(*label).is_none())
            .collect();
        unplaced.sort();
        unplaced.dedup();
        unplaced
    }

    /// Check that no label is attached to more than one instruction
    pub fn check_labels(&self) -> Result<(), Error> {
        let mut seen = std::collections::HashSet::new();
        for instruction in &self.instructions {
            for label in &instruction.labels {
                if !seen.insert(*label) {
                    return Err(Error::DuplicateLabel(*label));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::InstructionStream;
    use crate::il::{Instruction, LabelId, Opcode, Operand};
    use crate::patch::Error;

    fn sample<'g>() -> InstructionStream<'g> {
        InstructionStream::new(vec![
            Instruction::load_int32(1),
            Instruction::load_int32(2).with_labels(vec![LabelId(0)]),
            Instruction::new(Opcode::Add, Operand::None).unwrap(),
            Instruction::branch(Opcode::BrTrueS, LabelId(0)).unwrap(),
            Instruction::ret(),
        ])
        .unwrap()
    }

    #[test]
    fn insert_then_remove_is_identity() {
        let original = sample();
        for position in 0..original.len() {
            let mut stream = original.clone();
            let shifted = stream.insert_before(position, Instruction::nop()).unwrap();
            assert_eq!(shifted, position + 1);
            assert_eq!(stream.len(), original.len() + 1);
            stream.remove(position).unwrap();
            assert_eq!(stream.as_slice(), original.as_slice());
        }
    }

    #[test]
    fn insert_positions() {
        let mut stream = sample();
        assert_eq!(stream.insert_after(1, Instruction::nop()).unwrap(), 2);
        assert_eq!(stream.get(2).unwrap().opcode, Opcode::Nop);
        assert_eq!(stream.position_of_label(LabelId(0)), Some(1));

        assert_eq!(stream.insert_before(1, Instruction::nop()).unwrap(), 2);
        assert_eq!(stream.position_of_label(LabelId(0)), Some(2), "labels stay put");

        assert!(matches!(
            stream.insert_after(7, Instruction::nop()),
            Err(Error::InvalidPosition { position: 7, len: 7 })
        ));
    }

    #[test]
    fn replace_keeps_labels() {
        let mut stream = sample();
        stream.replace(1, Opcode::LdcI4, Operand::Integer(300)).unwrap();
        assert_eq!(stream.get(1).unwrap().labels, vec![LabelId(0)]);
        assert!(stream.get(1).unwrap().loads_integer(300));

        stream.to_nop(1).unwrap();
        assert_eq!(stream.get(1).unwrap().opcode, Opcode::Nop);
        assert_eq!(stream.get(1).unwrap().labels, vec![LabelId(0)]);

        assert!(matches!(
            stream.replace(1, Opcode::LdcI4S, Operand::Integer(300)),
            Err(Error::Il(_))
        ));
    }

    #[test]
    fn remove_moves_labels_forward() {
        let mut stream = sample();
        stream.remove(1).unwrap();
        assert_eq!(stream.position_of_label(LabelId(0)), Some(1));
        assert_eq!(stream.get(1).unwrap().opcode, Opcode::Add);

        let mut stream = sample();
        stream.attach_label(4, LabelId(9)).unwrap();
        assert!(matches!(stream.remove(4), Err(Error::UnplacedLabels(_))));
    }

    #[test]
    fn label_bookkeeping() {
        let mut stream = sample();
        assert!(stream.unplaced_labels().is_empty());
        assert!(matches!(
            stream.attach_label(3, LabelId(0)),
            Err(Error::DuplicateLabel(_))
        ));
        stream.attach_label(1, LabelId(0)).unwrap();

        stream.move_labels(1, 4).unwrap();
        assert_eq!(stream.position_of_label(LabelId(0)), Some(4));
        assert!(stream.get(1).unwrap().labels.is_empty());

        stream
            .replace(3, Opcode::BrFalse, Operand::Label(LabelId(5)))
            .unwrap();
        assert_eq!(stream.unplaced_labels(), vec![LabelId(5)]);
        assert!(stream.check_labels().is_ok());
    }
}
