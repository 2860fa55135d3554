use super::{Error, InstructionStream, LocalSlot, Navigator, Settings, SymbolTable};
use crate::il::{
    CoreTypes, Instruction, LabelGenerator, LabelId, LabelIdGenerator, MethodData, Opcode,
    Operand, TypeId,
};
use log::debug;

/// One editing session over the body of one method
///
/// The body owns the instructions and the symbols (locals and labels) of the method being
/// edited. Edits go through a [`Navigator`], which keeps a cursor into the instructions:
///
/// ```
/// use ilpatch::il::*;
/// use ilpatch::patch::{MethodBody, Settings};
///
/// let arenas = TypeGraphArenas::new();
/// let graph = TypeGraph::new(&arenas);
/// let core = graph.insert_core_types();
/// let method = graph.add_method(MethodData::new(
///     core.object,
///     MemberName::from_string(String::from("Answer")).unwrap(),
///     vec![],
///     core.int32,
///     MethodAccessFlags::public_static(),
/// ));
///
/// let mut body = MethodBody::new(
///     method,
///     core,
///     &[],
///     vec![Instruction::load_int32(41), Instruction::ret()],
///     Settings::new(),
/// )
/// .unwrap();
///
/// let mut navigator = body.navigator();
/// navigator.replace_integer_constant(42).unwrap();
///
/// let edited = body.result().unwrap();
/// assert!(edited.instructions[0].loads_integer(42));
/// ```
pub struct MethodBody<'g> {
    pub(crate) code: InstructionStream<'g>,
    pub(crate) symbols: SymbolTable<'g>,

    /// Method whose body this is
    method: &'g MethodData<'g>,

    core: CoreTypes<'g>,
    settings: Settings,
}

/// Instructions and symbols handed back to the host once editing is done
pub struct EditedBody<'g> {
    pub instructions: Vec<Instruction<'g>>,
    pub symbols: SymbolTable<'g>,
}

impl<'g> MethodBody<'g> {
    /// Start a session, generating fresh labels after the largest label in `instructions`
    pub fn new(
        method: &'g MethodData<'g>,
        core: CoreTypes<'g>,
        declared_locals: &[TypeId<'g>],
        instructions: Vec<Instruction<'g>>,
        settings: Settings,
    ) -> Result<MethodBody<'g>, Error> {
        let label_generator = LabelIdGenerator::after(
            instructions
                .iter()
                .flat_map(|instruction| instruction.labels.iter().chain(instruction.branch_targets())),
        );
        MethodBody::with_label_generator(
            method,
            core,
            declared_locals,
            instructions,
            settings,
            Box::new(label_generator),
        )
    }

    /// Start a session where fresh labels come from the host
    pub fn with_label_generator(
        method: &'g MethodData<'g>,
        core: CoreTypes<'g>,
        declared_locals: &[TypeId<'g>],
        instructions: Vec<Instruction<'g>>,
        settings: Settings,
        label_generator: Box<dyn LabelGenerator<LabelId>>,
    ) -> Result<MethodBody<'g>, Error> {
        if instructions.is_empty() {
            return Err(Error::EmptyMethodBody);
        }
        let code = InstructionStream::new(instructions)?;
        code.check_labels()?;

        // Index every label in order of first appearance
        let mut symbols = SymbolTable::new(declared_locals, label_generator, &settings);
        for instruction in code.iter() {
            for label in instruction.labels.iter().chain(instruction.branch_targets()) {
                symbols.register_label(*label, code.position_of_label(*label).is_some());
            }
        }
        debug!(
            "editing {:?}: {} instructions, {} locals, {} labels",
            method,
            code.len(),
            symbols.locals().len(),
            symbols.labels().len()
        );

        Ok(MethodBody {
            code,
            symbols,
            method,
            core,
            settings,
        })
    }

    /// Navigator with its cursor on the first instruction
    pub fn navigator(&mut self) -> Navigator<'_, 'g> {
        Navigator::new(self, 0)
    }

    pub fn code(&self) -> &InstructionStream<'g> {
        &self.code
    }

    pub fn symbols(&self) -> &SymbolTable<'g> {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable<'g> {
        &mut self.symbols
    }

    pub fn method(&self) -> &'g MethodData<'g> {
        self.method
    }

    pub fn core(&self) -> &CoreTypes<'g> {
        &self.core
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Argument index of a parameter of the edited method (accounting for the instance)
    pub fn argument_index(&self, parameter: usize) -> u16 {
        let offset = if self.method.is_static() { 0 } else { 1 };
        (parameter + offset) as u16
    }

    /// Local loaded or stored by the instruction at `position`
    pub fn local_at(&self, position: usize) -> Option<&LocalSlot<'g>> {
        self.code
            .get(position)
            .and_then(|instruction| self.symbols.local_for(instruction))
    }

    /// Labels referenced by some branch but attached to no instruction
    pub fn unplaced_labels(&self) -> Vec<LabelId> {
        self.code.unplaced_labels()
    }

    /// Finish the session
    pub fn result(self) -> Result<EditedBody<'g>, Error> {
        let unplaced_labels = self.unplaced_labels();
        if !unplaced_labels.is_empty() {
            return Err(Error::UnplacedLabels(unplaced_labels));
        }
        Ok(EditedBody {
            instructions: self.code.into_vec(),
            symbols: self.symbols,
        })
    }

    /// Insert an instruction, keeping the symbol table in sync with its labels
    pub(crate) fn insert(
        &mut self,
        position: usize,
        instruction: Instruction<'g>,
    ) -> Result<(), Error> {
        if let Some(label) = instruction
            .labels
            .iter()
            .find(|label| self.code.position_of_label(**label).is_some())
        {
            return Err(Error::DuplicateLabel(*label));
        }
        let attached = instruction.labels.clone();
        let targets = instruction.branch_targets().to_vec();
        self.code.insert(position, instruction)?;
        for label in attached {
            self.symbols.register_label(label, true);
        }
        for label in targets {
            self.symbols.register_label(label, false);
        }
        Ok(())
    }

    /// Rewrite an instruction in place, keeping the symbol table in sync with its branch targets
    pub(crate) fn replace(
        &mut self,
        position: usize,
        opcode: Opcode,
        operand: Operand<'g>,
    ) -> Result<(), Error> {
        self.code.replace(position, opcode, operand)?;
        if let Some(instruction) = self.code.get(position) {
            for label in instruction.branch_targets() {
                self.symbols.register_label(*label, false);
            }
        }
        Ok(())
    }

    /// Attach a label known to the symbol table to an instruction
    pub(crate) fn attach_label(&mut self, position: usize, label: LabelId) -> Result<(), Error> {
        if self.symbols.label(label).is_none() {
            return Err(Error::UnknownLabel(format!("{:?}", label)));
        }
        self.code.attach_label(position, label)?;
        self.symbols.mark_attached(label);
        Ok(())
    }

    /// Label attached to the instruction at `position`
    ///
    /// With a name, the label of that name must be attached there (or, if `can_make`, not exist
    /// yet). Without one, the first label attached there is used. If `can_make`, a missing label
    /// is created and attached.
    pub(crate) fn label_at(
        &mut self,
        position: usize,
        name: Option<&str>,
        can_make: bool,
    ) -> Result<LabelId, Error> {
        let attached = self
            .code
            .get(position)
            .map(|instruction| instruction.labels.clone())
            .ok_or(Error::InvalidPosition {
                position,
                len: self.code.len(),
            })?;

        if let Some(name) = name {
            return match self.symbols.label_named(name) {
                Some(label) if attached.contains(&label.id) => Ok(label.id),
                Some(_) => Err(Error::NameCollision(name.to_owned())),
                None if can_make => {
                    let label = self.symbols.create_label()?;
                    self.symbols.name_label(label, name)?;
                    self.attach_label(position, label)?;
                    Ok(label)
                }
                None => Err(Error::UnknownLabel(name.to_owned())),
            };
        }

        match attached.first() {
            Some(label) => Ok(*label),
            None if can_make => {
                let label = self.symbols.create_label()?;
                self.attach_label(position, label)?;
                Ok(label)
            }
            None => Err(Error::UnknownLabel(format!("at {}", position))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::MethodBody;
    use crate::il::*;
    use crate::patch::{Error, Settings};

    #[test]
    fn discovers_labels() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();
        let method = graph.add_method(MethodData::new(
            core.object,
            MemberName::from_string(String::from("Loop")).unwrap(),
            vec![],
            core.void,
            MethodAccessFlags::public_static(),
        ));

        let body = MethodBody::new(
            method,
            core,
            &[core.int32],
            vec![
                Instruction::nop().with_labels(vec![LabelId(4)]),
                Instruction::branch(Opcode::Br, LabelId(4)).unwrap(),
                Instruction::branch(Opcode::Br, LabelId(2)).unwrap(),
                Instruction::ret(),
            ],
            Settings::new(),
        )
        .unwrap();

        let labels = body.symbols().labels();
        assert_eq!(labels.len(), 2);
        assert_eq!((labels[0].id, labels[0].name.as_str()), (LabelId(4), "L_0"));
        assert!(labels[0].is_attached());
        assert_eq!((labels[1].id, labels[1].name.as_str()), (LabelId(2), "L_1"));
        assert!(!labels[1].is_attached());

        assert!(body.local_at(0).is_none());
        assert_eq!(body.unplaced_labels(), vec![LabelId(2)]);
        assert!(matches!(body.result(), Err(Error::UnplacedLabels(_))));
    }

    #[test]
    fn rejects_bad_bodies() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();
        let method = graph.add_method(MethodData::new(
            core.object,
            MemberName::from_string(String::from("Empty")).unwrap(),
            vec![],
            core.void,
            MethodAccessFlags::public_static(),
        ));

        assert!(matches!(
            MethodBody::new(method, core, &[], vec![], Settings::new()),
            Err(Error::EmptyMethodBody)
        ));
        assert!(matches!(
            MethodBody::new(
                method,
                core,
                &[],
                vec![
                    Instruction::nop().with_labels(vec![LabelId(0)]),
                    Instruction::ret().with_labels(vec![LabelId(0)]),
                ],
                Settings::new()
            ),
            Err(Error::DuplicateLabel(LabelId(0)))
        ));
        assert!(matches!(
            MethodBody::new(
                method,
                core,
                &[],
                vec![Instruction {
                    opcode: Opcode::Call,
                    operand: Operand::Integer(1),
                    labels: vec![],
                }],
                Settings::new()
            ),
            Err(Error::Il(_))
        ));
    }

    #[test]
    fn fresh_labels_follow_existing_ones() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();
        let method = graph.add_method(MethodData::new(
            core.object,
            MemberName::from_string(String::from("Jump")).unwrap(),
            vec![],
            core.void,
            MethodAccessFlags::public_static(),
        ));

        let mut body = MethodBody::new(
            method,
            core,
            &[],
            vec![
                Instruction::branch(Opcode::BrS, LabelId(11)).unwrap(),
                Instruction::ret().with_labels(vec![LabelId(11)]),
            ],
            Settings::new(),
        )
        .unwrap();

        let label = body.label_at(0, None, true).unwrap();
        assert_eq!(label, LabelId(12));
        assert_eq!(body.label_at(1, None, false).unwrap(), LabelId(11));
        assert_eq!(body.code().position_of_label(label), Some(0));
        assert!(body.symbols().label(label).unwrap().is_attached());

        let named = body.label_at(1, Some("exit"), true).unwrap();
        assert_eq!(body.label_at(1, Some("exit"), false).unwrap(), named);
        assert!(matches!(
            body.label_at(0, Some("exit"), true),
            Err(Error::NameCollision(_))
        ));
        assert!(matches!(
            body.label_at(0, Some("missing"), false),
            Err(Error::UnknownLabel(_))
        ));
    }
}
