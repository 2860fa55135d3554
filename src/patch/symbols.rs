use super::{Error, Settings};
use crate::il::{is_assignable, Instruction, LabelGenerator, LabelId, MemberName, Name, TypeId};
use log::debug;
use std::collections::HashMap;

/// Local variable slot of the edited method
#[derive(Clone, Debug)]
pub struct LocalSlot<'g> {
    pub index: u16,
    pub local_type: TypeId<'g>,

    /// Either a placeholder (`V_<index>`) or a caller-chosen name
    pub name: String,

    named: bool,
}

impl<'g> LocalSlot<'g> {
    /// Has the slot been given a caller-chosen name?
    pub fn is_named(&self) -> bool {
        self.named
    }
}

/// Jump target known to the edited method
#[derive(Clone, Debug)]
pub struct LabelInfo {
    pub id: LabelId,

    /// Either a placeholder (`L_<n>`) or a caller-chosen name
    pub name: String,

    attached: bool,
}

impl LabelInfo {
    /// Is the label in the label set of some instruction?
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

/// Locals and labels of one editing session
///
/// Slots and labels are never removed (short of rolling back a failed edit). Every slot and label
/// has a unique name: placeholders are handed out at creation and may be replaced once (for
/// locals) by a caller-chosen name.
pub struct SymbolTable<'g> {
    /// Slot `i` is at index `i`
    locals: Vec<LocalSlot<'g>>,

    /// In order of discovery or creation
    labels: Vec<LabelInfo>,

    /// Position of each label in `labels`
    label_index: HashMap<LabelId, usize>,

    label_generator: Box<dyn LabelGenerator<LabelId>>,

    local_name_prefix: String,
    label_name_prefix: String,
}

/// Snapshot of a symbol table, used to undo the locals and labels created by a failed edit
pub struct SymbolCheckpoint<'g> {
    locals: Vec<LocalSlot<'g>>,
    labels: Vec<LabelInfo>,
}

/// Placeholder name that doesn't collide with any name already taken
fn placeholder(prefix: &str, index: usize, taken: impl Fn(&str) -> bool) -> String {
    let name = format!("{}{}", prefix, index);
    if !taken(&name) {
        return name;
    }
    (1..)
        .map(|n| format!("{}_{}", name, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or(name)
}

impl<'g> SymbolTable<'g> {
    pub fn new(
        declared_locals: &[TypeId<'g>],
        label_generator: Box<dyn LabelGenerator<LabelId>>,
        settings: &Settings,
    ) -> SymbolTable<'g> {
        let mut symbols = SymbolTable {
            locals: vec![],
            labels: vec![],
            label_index: HashMap::new(),
            label_generator,
            local_name_prefix: settings.local_name_prefix.clone(),
            label_name_prefix: settings.label_name_prefix.clone(),
        };
        for local_type in declared_locals {
            symbols.declare_local(*local_type);
        }
        symbols
    }

    pub fn locals(&self) -> &[LocalSlot<'g>] {
        &self.locals
    }

    pub fn local(&self, index: u16) -> Option<&LocalSlot<'g>> {
        self.locals.get(index as usize)
    }

    pub fn local_named(&self, name: &str) -> Option<&LocalSlot<'g>> {
        self.locals.iter().find(|slot| slot.name == name)
    }

    /// Slot loaded or stored by an instruction (`None` for any other instruction)
    pub fn local_for(&self, instruction: &Instruction<'g>) -> Option<&LocalSlot<'g>> {
        if instruction.is_load_local() || instruction.is_store_local() {
            instruction.local_index().and_then(|index| self.local(index))
        } else {
            None
        }
    }

    /// Allocate a new slot at the next free index, with a placeholder name
    pub fn declare_local(&mut self, local_type: TypeId<'g>) -> LocalSlot<'g> {
        let index = self.locals.len();
        let name = placeholder(&self.local_name_prefix, index, |name| {
            self.locals.iter().any(|slot| slot.name == name)
        });
        let slot = LocalSlot {
            index: index as u16,
            local_type,
            name,
            named: false,
        };
        debug!("declared local {} of type {:?}", slot.name, local_type);
        self.locals.push(slot.clone());
        slot
    }

    /// Get the slot with the given name, or create one
    ///
    /// An existing slot must be compatible with `local_type` (if one is given): exactly the same
    /// type for value types, assignable for reference types. A new slot requires a type. Without
    /// a name, a fresh slot is always created.
    pub fn get_or_create_local(
        &mut self,
        local_type: Option<TypeId<'g>>,
        name: Option<&str>,
    ) -> Result<LocalSlot<'g>, Error> {
        match (name, local_type) {
            (Some(name), _) if self.local_named(name).is_some() => {
                let slot = self
                    .local_named(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownLocal(name.to_owned()))?;
                match local_type {
                    Some(wanted) if !is_assignable(wanted, slot.local_type) => {
                        Err(Error::TypeIncompatible {
                            binding: format!("local {}", name),
                            expected: format!("{:?}", wanted),
                            found: format!("{:?}", slot.local_type),
                        })
                    }
                    _ => Ok(slot),
                }
            }
            (Some(name), Some(local_type)) => {
                MemberName::check_valid(name).map_err(Error::InvalidName)?;
                let slot = self.declare_local(local_type);
                self.name_local(slot.index, name)
            }
            (None, Some(local_type)) => Ok(self.declare_local(local_type)),
            (Some(name), None) => Err(Error::UnknownLocal(name.to_owned())),
            (None, None) => Err(Error::UnknownLocal(String::from("<unnamed, untyped>"))),
        }
    }

    /// Give a slot its caller-chosen name
    ///
    /// This can only happen once per slot, and the name must not already belong to another slot.
    /// Renaming a slot to the name it already has is accepted.
    pub fn name_local(&mut self, index: u16, name: &str) -> Result<LocalSlot<'g>, Error> {
        MemberName::check_valid(name).map_err(Error::InvalidName)?;
        let slot = self
            .local(index)
            .ok_or_else(|| Error::UnknownLocal(format!("{}", index)))?;
        if slot.name == name {
            return Ok(slot.clone());
        }
        if slot.named {
            return Err(Error::LocalAlreadyNamed {
                index,
                name: slot.name.clone(),
            });
        }
        if self.local_named(name).is_some() {
            return Err(Error::NameCollision(name.to_owned()));
        }

        let slot = &mut self.locals[index as usize];
        debug!("named local {} as {}", slot.name, name);
        slot.name = name.to_owned();
        slot.named = true;
        Ok(slot.clone())
    }

    /// The `occurrence`-th slot (counting from 0) of exactly the given type
    ///
    /// If a name is given, the slot must either already have that name or still have its
    /// placeholder name (in which case it is renamed).
    pub fn find_local_by_type(
        &mut self,
        local_type: TypeId<'g>,
        name: Option<&str>,
        occurrence: usize,
    ) -> Result<LocalSlot<'g>, Error> {
        let index = self
            .locals
            .iter()
            .filter(|slot| slot.local_type == local_type)
            .nth(occurrence)
            .map(|slot| slot.index)
            .ok_or_else(|| {
                Error::UnknownLocal(format!("local #{} of type {:?}", occurrence, local_type))
            })?;
        match name {
            Some(name) => self.name_local(index, name),
            None => Ok(self.locals[index as usize].clone()),
        }
    }

    pub fn labels(&self) -> &[LabelInfo] {
        &self.labels
    }

    pub fn label(&self, id: LabelId) -> Option<&LabelInfo> {
        self.label_index.get(&id).map(|i| &self.labels[*i])
    }

    pub fn label_named(&self, name: &str) -> Option<&LabelInfo> {
        self.labels.iter().find(|label| label.name == name)
    }

    /// Index a label of the original body
    pub(crate) fn register_label(&mut self, id: LabelId, attached: bool) {
        if let Some(i) = self.label_index.get(&id) {
            self.labels[*i].attached |= attached;
            return;
        }
        let name = placeholder(&self.label_name_prefix, self.labels.len(), |name| {
            self.labels.iter().any(|label| label.name == name)
        });
        self.label_index.insert(id, self.labels.len());
        self.labels.push(LabelInfo { id, name, attached });
    }

    /// Create a fresh synthetic label (not attached to any instruction yet)
    pub fn create_label(&mut self) -> Result<LabelId, Error> {
        let id = self.label_generator.fresh_label();
        if self.label_index.contains_key(&id) {
            return Err(Error::DuplicateLabel(id));
        }
        self.register_label(id, false);
        debug!("created label {:?}", id);
        Ok(id)
    }

    /// Get the label with the given name, or create (and name) one
    pub fn get_or_create_label(&mut self, name: Option<&str>) -> Result<LabelId, Error> {
        if let Some(label) = name.and_then(|name| self.label_named(name)) {
            return Ok(label.id);
        }
        let id = self.create_label()?;
        if let Some(name) = name {
            self.name_label(id, name)?;
        }
        Ok(id)
    }

    /// Rename a label (names must stay unique among labels)
    pub fn name_label(&mut self, id: LabelId, name: &str) -> Result<(), Error> {
        MemberName::check_valid(name).map_err(Error::InvalidName)?;
        let i = *self
            .label_index
            .get(&id)
            .ok_or_else(|| Error::UnknownLabel(format!("{:?}", id)))?;
        if self.label_named(name).map_or(false, |other| other.id != id) {
            return Err(Error::NameCollision(name.to_owned()));
        }
        debug!("named label {:?} as {}", id, name);
        self.labels[i].name = name.to_owned();
        Ok(())
    }

    pub(crate) fn mark_attached(&mut self, id: LabelId) {
        if let Some(i) = self.label_index.get(&id) {
            self.labels[*i].attached = true;
        }
    }

    pub fn checkpoint(&self) -> SymbolCheckpoint<'g> {
        SymbolCheckpoint {
            locals: self.locals.clone(),
            labels: self.labels.clone(),
        }
    }

    /// Undo everything since the checkpoint (label ids handed out in between are not reused)
    pub fn rollback(&mut self, checkpoint: SymbolCheckpoint<'g>) {
        self.locals = checkpoint.locals;
        self.labels = checkpoint.labels;
        self.label_index = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.id, i))
            .collect();
    }
}
