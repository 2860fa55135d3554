use super::{Error, FieldData, LabelId, MemberRef, MethodData, Opcode, TypeId};
use std::fmt;

/// Operand of an instruction
#[derive(Clone, Debug)]
pub enum Operand<'g> {
    None,

    /// Integer constants of every width (the opcode determines the width)
    Integer(i64),

    /// Floating point constants of every width (the opcode determines the width)
    Float(f64),

    String(String),

    /// Argument index (including the instance argument `0` of non-static methods)
    Argument(u16),

    /// Local variable index
    Local(u16),

    /// Branch target
    Label(LabelId),

    /// Jump table of a `switch`
    Labels(Vec<LabelId>),

    Method(&'g MethodData<'g>),
    Field(&'g FieldData<'g>),
    Type(TypeId<'g>),
}

/// Members are compared by identity, everything else structurally
impl<'g> PartialEq for Operand<'g> {
    fn eq(&self, other: &Operand<'g>) -> bool {
        match (self, other) {
            (Operand::None, Operand::None) => true,
            (Operand::Integer(i1), Operand::Integer(i2)) => i1 == i2,
            (Operand::Float(f1), Operand::Float(f2)) => f1 == f2,
            (Operand::String(s1), Operand::String(s2)) => s1 == s2,
            (Operand::Argument(a1), Operand::Argument(a2)) => a1 == a2,
            (Operand::Local(l1), Operand::Local(l2)) => l1 == l2,
            (Operand::Label(l1), Operand::Label(l2)) => l1 == l2,
            (Operand::Labels(l1), Operand::Labels(l2)) => l1 == l2,
            (Operand::Method(m1), Operand::Method(m2)) => std::ptr::eq(*m1, *m2),
            (Operand::Field(f1), Operand::Field(f2)) => std::ptr::eq(*f1, *f2),
            (Operand::Type(t1), Operand::Type(t2)) => t1 == t2,
            _ => false,
        }
    }
}

impl<'g> From<MemberRef<'g>> for Operand<'g> {
    fn from(member: MemberRef<'g>) -> Operand<'g> {
        match member {
            MemberRef::Method(method) => Operand::Method(method),
            MemberRef::Field(field) => Operand::Field(field),
        }
    }
}

/// One instruction of a method body
///
/// `labels` are the jump targets resolving to this instruction. They belong to the position in
/// the stream: rewriting the opcode or operand keeps them.
#[derive(Clone, PartialEq)]
pub struct Instruction<'g> {
    pub opcode: Opcode,
    pub operand: Operand<'g>,
    pub labels: Vec<LabelId>,
}

impl<'g> Instruction<'g> {
    /// Make a new instruction, checking that the operand fits the opcode
    pub fn new(opcode: Opcode, operand: Operand<'g>) -> Result<Instruction<'g>, Error> {
        let instruction = Instruction {
            opcode,
            operand,
            labels: vec![],
        };
        instruction.validate()?;
        Ok(instruction)
    }

    fn unchecked(opcode: Opcode, operand: Operand<'g>) -> Instruction<'g> {
        Instruction {
            opcode,
            operand,
            labels: vec![],
        }
    }

    pub fn with_labels(self, labels: Vec<LabelId>) -> Instruction<'g> {
        Instruction { labels, ..self }
    }

    /// Check that the operand fits the opcode
    pub fn validate(&self) -> Result<(), Error> {
        if self.opcode.accepts(&self.operand) {
            Ok(())
        } else {
            Err(Error::InvalidOperand {
                opcode: self.opcode,
                operand: format!("{:?}", self.operand),
            })
        }
    }

    pub fn nop() -> Instruction<'g> {
        Instruction::unchecked(Opcode::Nop, Operand::None)
    }

    pub fn ret() -> Instruction<'g> {
        Instruction::unchecked(Opcode::Ret, Operand::None)
    }

    pub fn call(method: &'g MethodData<'g>) -> Instruction<'g> {
        Instruction::unchecked(Opcode::Call, Operand::Method(method))
    }

    /// Load an argument, using the compact encoding when there is one
    pub fn load_arg(index: u16) -> Instruction<'g> {
        match index {
            0 => Instruction::unchecked(Opcode::LdArg0, Operand::None),
            1 => Instruction::unchecked(Opcode::LdArg1, Operand::None),
            2 => Instruction::unchecked(Opcode::LdArg2, Operand::None),
            3 => Instruction::unchecked(Opcode::LdArg3, Operand::None),
            _ => Instruction::unchecked(Opcode::LdArg, Operand::Argument(index)),
        }
    }

    pub fn load_arg_address(index: u16) -> Instruction<'g> {
        Instruction::unchecked(Opcode::LdArgA, Operand::Argument(index))
    }

    /// Load a local, using the compact encoding when there is one
    pub fn load_local(index: u16) -> Instruction<'g> {
        match index {
            0 => Instruction::unchecked(Opcode::LdLoc0, Operand::None),
            1 => Instruction::unchecked(Opcode::LdLoc1, Operand::None),
            2 => Instruction::unchecked(Opcode::LdLoc2, Operand::None),
            3 => Instruction::unchecked(Opcode::LdLoc3, Operand::None),
            _ => Instruction::unchecked(Opcode::LdLoc, Operand::Local(index)),
        }
    }

    pub fn load_local_address(index: u16) -> Instruction<'g> {
        Instruction::unchecked(Opcode::LdLocA, Operand::Local(index))
    }

    /// Store to a local, using the compact encoding when there is one
    pub fn store_local(index: u16) -> Instruction<'g> {
        match index {
            0 => Instruction::unchecked(Opcode::StLoc0, Operand::None),
            1 => Instruction::unchecked(Opcode::StLoc1, Operand::None),
            2 => Instruction::unchecked(Opcode::StLoc2, Operand::None),
            3 => Instruction::unchecked(Opcode::StLoc3, Operand::None),
            _ => Instruction::unchecked(Opcode::StLoc, Operand::Local(index)),
        }
    }

    /// Push a 32-bit integer constant using the most compact encoding
    pub fn load_int32(value: i32) -> Instruction<'g> {
        match value {
            -1 => Instruction::unchecked(Opcode::LdcI4M1, Operand::None),
            0 => Instruction::unchecked(Opcode::LdcI4_0, Operand::None),
            1 => Instruction::unchecked(Opcode::LdcI4_1, Operand::None),
            2 => Instruction::unchecked(Opcode::LdcI4_2, Operand::None),
            3 => Instruction::unchecked(Opcode::LdcI4_3, Operand::None),
            4 => Instruction::unchecked(Opcode::LdcI4_4, Operand::None),
            5 => Instruction::unchecked(Opcode::LdcI4_5, Operand::None),
            6 => Instruction::unchecked(Opcode::LdcI4_6, Operand::None),
            7 => Instruction::unchecked(Opcode::LdcI4_7, Operand::None),
            8 => Instruction::unchecked(Opcode::LdcI4_8, Operand::None),
            -128..=127 => Instruction::unchecked(Opcode::LdcI4S, Operand::Integer(value as i64)),
            _ => Instruction::unchecked(Opcode::LdcI4, Operand::Integer(value as i64)),
        }
    }

    pub fn load_int64(value: i64) -> Instruction<'g> {
        Instruction::unchecked(Opcode::LdcI8, Operand::Integer(value))
    }

    /// Branch (conditional or not) to a label
    pub fn branch(opcode: Opcode, target: LabelId) -> Result<Instruction<'g>, Error> {
        Instruction::new(opcode, Operand::Label(target))
    }

    /// Index of the local loaded, addressed, or stored
    pub fn local_index(&self) -> Option<u16> {
        if let Some(index) = self.opcode.compact_local() {
            return Some(index);
        }
        match (self.opcode, &self.operand) {
            (Opcode::LdLoc | Opcode::LdLocA | Opcode::StLoc, Operand::Local(index)) => Some(*index),
            _ => None,
        }
    }

    /// Index of the argument loaded, addressed, or stored
    pub fn argument_index(&self) -> Option<u16> {
        if let Some(index) = self.opcode.compact_argument() {
            return Some(index);
        }
        match (self.opcode, &self.operand) {
            (Opcode::LdArg | Opcode::LdArgA | Opcode::StArg, Operand::Argument(index)) => {
                Some(*index)
            }
            _ => None,
        }
    }

    pub fn is_load_local(&self) -> bool {
        self.opcode.is_load_local()
    }

    pub fn is_store_local(&self) -> bool {
        self.opcode.is_store_local()
    }

    /// Member operand of the instruction
    pub fn member(&self) -> Option<MemberRef<'g>> {
        match self.operand {
            Operand::Method(method) => Some(MemberRef::Method(method)),
            Operand::Field(field) => Some(MemberRef::Field(field)),
            _ => None,
        }
    }

    /// Value pushed by an integer constant load
    pub fn integer_constant(&self) -> Option<i64> {
        if let Some(value) = self.opcode.compact_integer() {
            return Some(value);
        }
        match (self.opcode, &self.operand) {
            (Opcode::LdcI4S | Opcode::LdcI4 | Opcode::LdcI8, Operand::Integer(value)) => {
                Some(*value)
            }
            _ => None,
        }
    }

    /// Value pushed by a floating point constant load
    pub fn float_constant(&self) -> Option<f64> {
        match (self.opcode, &self.operand) {
            (Opcode::LdcR4 | Opcode::LdcR8, Operand::Float(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn loads_integer(&self, value: i64) -> bool {
        self.integer_constant() == Some(value)
    }

    pub fn loads_float(&self, value: f64) -> bool {
        self.float_constant() == Some(value)
    }

    /// Labels this instruction may jump to
    pub fn branch_targets(&self) -> &[LabelId] {
        match &self.operand {
            Operand::Label(label) => std::slice::from_ref(label),
            Operand::Labels(labels) => labels,
            _ => &[],
        }
    }
}

impl<'g> fmt::Debug for Instruction<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "{:?}: ", label)?;
        }
        f.write_str(self.opcode.mnemonic())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Integer(i) => write!(f, " {}", i),
            Operand::Float(x) => write!(f, " {}", x),
            Operand::String(s) => write!(f, " {:?}", s),
            Operand::Argument(a) => write!(f, " {}", a),
            Operand::Local(l) => write!(f, " {}", l),
            Operand::Label(l) => write!(f, " {:?}", l),
            Operand::Labels(ls) => write!(f, " {:?}", ls),
            Operand::Method(m) => write!(f, " {:?}", m),
            Operand::Field(fd) => write!(f, " {:?}", fd),
            Operand::Type(t) => write!(f, " {:?}", t),
        }
    }
}
