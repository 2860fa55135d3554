use super::Operand;
use std::fmt;

/// Opcodes of the stack machine
///
/// This is the subset of the common intermediate language that method patching actually runs
/// into. Compact encodings (eg. `ldloc.0`, `ldc.i4.s`, `br.s`) are kept distinct from their
/// general forms since the host reassembles exactly what it is handed back.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Dup,
    Pop,

    // Constants
    LdNull,
    LdStr,
    LdcI4M1,
    LdcI4_0,
    LdcI4_1,
    LdcI4_2,
    LdcI4_3,
    LdcI4_4,
    LdcI4_5,
    LdcI4_6,
    LdcI4_7,
    LdcI4_8,
    LdcI4S,
    LdcI4,
    LdcI8,
    LdcR4,
    LdcR8,

    // Arguments
    LdArg0,
    LdArg1,
    LdArg2,
    LdArg3,
    LdArg,
    LdArgA,
    StArg,

    // Locals
    LdLoc0,
    LdLoc1,
    LdLoc2,
    LdLoc3,
    LdLoc,
    LdLocA,
    StLoc0,
    StLoc1,
    StLoc2,
    StLoc3,
    StLoc,

    // Members
    Call,
    CallVirt,
    NewObj,
    LdFld,
    LdFldA,
    StFld,
    LdSFld,
    LdSFldA,
    StSFld,

    // Objects
    Box,
    UnboxAny,
    CastClass,
    IsInst,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Ceq,
    Cgt,
    Clt,
    ConvI4,
    ConvI8,
    ConvR4,
    ConvR8,

    // Branches
    Br,
    BrS,
    Leave,
    LeaveS,
    BrTrue,
    BrTrueS,
    BrFalse,
    BrFalseS,
    Beq,
    BeqS,
    BneUn,
    BneUnS,
    Bge,
    BgeS,
    Bgt,
    BgtS,
    Ble,
    BleS,
    Blt,
    BltS,
    Switch,

    Ret,
    Throw,
}

/// How control leaves an instruction
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FlowControl {
    /// Falls through to the next instruction
    Next,

    /// Always jumps
    Branch,

    /// May jump or fall through (includes `switch`)
    CondBranch,

    /// Calls a method, then falls through
    Call,

    Return,
    Throw,
}

/// Shape of the operand an opcode expects
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum OperandKind {
    None,
    Int8,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Argument,
    Local,
    Branch,
    Switch,
    Method,
    Field,
    Type,
}

impl Opcode {
    /// Textual name, as it would appear in a disassembly
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Dup => "dup",
            Opcode::Pop => "pop",
            Opcode::LdNull => "ldnull",
            Opcode::LdStr => "ldstr",
            Opcode::LdcI4M1 => "ldc.i4.m1",
            Opcode::LdcI4_0 => "ldc.i4.0",
            Opcode::LdcI4_1 => "ldc.i4.1",
            Opcode::LdcI4_2 => "ldc.i4.2",
            Opcode::LdcI4_3 => "ldc.i4.3",
            Opcode::LdcI4_4 => "ldc.i4.4",
            Opcode::LdcI4_5 => "ldc.i4.5",
            Opcode::LdcI4_6 => "ldc.i4.6",
            Opcode::LdcI4_7 => "ldc.i4.7",
            Opcode::LdcI4_8 => "ldc.i4.8",
            Opcode::LdcI4S => "ldc.i4.s",
            Opcode::LdcI4 => "ldc.i4",
            Opcode::LdcI8 => "ldc.i8",
            Opcode::LdcR4 => "ldc.r4",
            Opcode::LdcR8 => "ldc.r8",
            Opcode::LdArg0 => "ldarg.0",
            Opcode::LdArg1 => "ldarg.1",
            Opcode::LdArg2 => "ldarg.2",
            Opcode::LdArg3 => "ldarg.3",
            Opcode::LdArg => "ldarg",
            Opcode::LdArgA => "ldarga",
            Opcode::StArg => "starg",
            Opcode::LdLoc0 => "ldloc.0",
            Opcode::LdLoc1 => "ldloc.1",
            Opcode::LdLoc2 => "ldloc.2",
            Opcode::LdLoc3 => "ldloc.3",
            Opcode::LdLoc => "ldloc",
            Opcode::LdLocA => "ldloca",
            Opcode::StLoc0 => "stloc.0",
            Opcode::StLoc1 => "stloc.1",
            Opcode::StLoc2 => "stloc.2",
            Opcode::StLoc3 => "stloc.3",
            Opcode::StLoc => "stloc",
            Opcode::Call => "call",
            Opcode::CallVirt => "callvirt",
            Opcode::NewObj => "newobj",
            Opcode::LdFld => "ldfld",
            Opcode::LdFldA => "ldflda",
            Opcode::StFld => "stfld",
            Opcode::LdSFld => "ldsfld",
            Opcode::LdSFldA => "ldsflda",
            Opcode::StSFld => "stsfld",
            Opcode::Box => "box",
            Opcode::UnboxAny => "unbox.any",
            Opcode::CastClass => "castclass",
            Opcode::IsInst => "isinst",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Rem => "rem",
            Opcode::Neg => "neg",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Not => "not",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Ceq => "ceq",
            Opcode::Cgt => "cgt",
            Opcode::Clt => "clt",
            Opcode::ConvI4 => "conv.i4",
            Opcode::ConvI8 => "conv.i8",
            Opcode::ConvR4 => "conv.r4",
            Opcode::ConvR8 => "conv.r8",
            Opcode::Br => "br",
            Opcode::BrS => "br.s",
            Opcode::Leave => "leave",
            Opcode::LeaveS => "leave.s",
            Opcode::BrTrue => "brtrue",
            Opcode::BrTrueS => "brtrue.s",
            Opcode::BrFalse => "brfalse",
            Opcode::BrFalseS => "brfalse.s",
            Opcode::Beq => "beq",
            Opcode::BeqS => "beq.s",
            Opcode::BneUn => "bne.un",
            Opcode::BneUnS => "bne.un.s",
            Opcode::Bge => "bge",
            Opcode::BgeS => "bge.s",
            Opcode::Bgt => "bgt",
            Opcode::BgtS => "bgt.s",
            Opcode::Ble => "ble",
            Opcode::BleS => "ble.s",
            Opcode::Blt => "blt",
            Opcode::BltS => "blt.s",
            Opcode::Switch => "switch",
            Opcode::Ret => "ret",
            Opcode::Throw => "throw",
        }
    }

    pub fn flow_control(&self) -> FlowControl {
        match self {
            Opcode::Br | Opcode::BrS | Opcode::Leave | Opcode::LeaveS => FlowControl::Branch,

            Opcode::BrTrue
            | Opcode::BrTrueS
            | Opcode::BrFalse
            | Opcode::BrFalseS
            | Opcode::Beq
            | Opcode::BeqS
            | Opcode::BneUn
            | Opcode::BneUnS
            | Opcode::Bge
            | Opcode::BgeS
            | Opcode::Bgt
            | Opcode::BgtS
            | Opcode::Ble
            | Opcode::BleS
            | Opcode::Blt
            | Opcode::BltS
            | Opcode::Switch => FlowControl::CondBranch,

            Opcode::Call | Opcode::CallVirt | Opcode::NewObj => FlowControl::Call,
            Opcode::Ret => FlowControl::Return,
            Opcode::Throw => FlowControl::Throw,
            _ => FlowControl::Next,
        }
    }

    pub fn operand_kind(&self) -> OperandKind {
        match self {
            Opcode::LdStr => OperandKind::String,
            Opcode::LdcI4S => OperandKind::Int8,
            Opcode::LdcI4 => OperandKind::Int32,
            Opcode::LdcI8 => OperandKind::Int64,
            Opcode::LdcR4 => OperandKind::Float32,
            Opcode::LdcR8 => OperandKind::Float64,
            Opcode::LdArg | Opcode::LdArgA | Opcode::StArg => OperandKind::Argument,
            Opcode::LdLoc | Opcode::LdLocA | Opcode::StLoc => OperandKind::Local,
            Opcode::Call | Opcode::CallVirt | Opcode::NewObj => OperandKind::Method,
            Opcode::LdFld
            | Opcode::LdFldA
            | Opcode::StFld
            | Opcode::LdSFld
            | Opcode::LdSFldA
            | Opcode::StSFld => OperandKind::Field,
            Opcode::Box | Opcode::UnboxAny | Opcode::CastClass | Opcode::IsInst => {
                OperandKind::Type
            }
            Opcode::Switch => OperandKind::Switch,
            _ if self.flow_control() == FlowControl::Branch
                || self.flow_control() == FlowControl::CondBranch =>
            {
                OperandKind::Branch
            }
            _ => OperandKind::None,
        }
    }

    /// Can this opcode carry the given operand?
    ///
    /// Integer operands must also fit in the width the opcode encodes.
    pub fn accepts(&self, operand: &Operand<'_>) -> bool {
        match (self.operand_kind(), operand) {
            (OperandKind::None, Operand::None) => true,
            (OperandKind::Int8, Operand::Integer(i)) => i8::try_from(*i).is_ok(),
            (OperandKind::Int32, Operand::Integer(i)) => i32::try_from(*i).is_ok(),
            (OperandKind::Int64, Operand::Integer(_)) => true,
            (OperandKind::Float32 | OperandKind::Float64, Operand::Float(_)) => true,
            (OperandKind::String, Operand::String(_)) => true,
            (OperandKind::Argument, Operand::Argument(_)) => true,
            (OperandKind::Local, Operand::Local(_)) => true,
            (OperandKind::Branch, Operand::Label(_)) => true,
            (OperandKind::Switch, Operand::Labels(_)) => true,
            (OperandKind::Method, Operand::Method(_)) => true,
            (OperandKind::Field, Operand::Field(_)) => true,
            (OperandKind::Type, Operand::Type(_)) => true,
            _ => false,
        }
    }

    /// Calls and field loads (instance or static, by value or by address)
    ///
    /// These are the instructions whose operand is a member a patch can search for or replace.
    /// Stores and `newobj` are deliberately not included.
    pub fn is_member_access(&self) -> bool {
        matches!(
            self,
            Opcode::Call
                | Opcode::CallVirt
                | Opcode::LdSFld
                | Opcode::LdSFldA
                | Opcode::LdFld
                | Opcode::LdFldA
        )
    }

    /// Value pushed by the compact integer constant opcodes (`ldc.i4.m1` to `ldc.i4.8`)
    pub fn compact_integer(&self) -> Option<i64> {
        match self {
            Opcode::LdcI4M1 => Some(-1),
            Opcode::LdcI4_0 => Some(0),
            Opcode::LdcI4_1 => Some(1),
            Opcode::LdcI4_2 => Some(2),
            Opcode::LdcI4_3 => Some(3),
            Opcode::LdcI4_4 => Some(4),
            Opcode::LdcI4_5 => Some(5),
            Opcode::LdcI4_6 => Some(6),
            Opcode::LdcI4_7 => Some(7),
            Opcode::LdcI4_8 => Some(8),
            _ => None,
        }
    }

    /// Does this opcode push a 32-bit integer constant?
    pub fn is_int32_constant(&self) -> bool {
        matches!(self, Opcode::LdcI4S | Opcode::LdcI4) || self.compact_integer().is_some()
    }

    /// Argument index of the compact `ldarg.N` forms
    pub fn compact_argument(&self) -> Option<u16> {
        match self {
            Opcode::LdArg0 => Some(0),
            Opcode::LdArg1 => Some(1),
            Opcode::LdArg2 => Some(2),
            Opcode::LdArg3 => Some(3),
            _ => None,
        }
    }

    /// Local index of the compact `ldloc.N` and `stloc.N` forms
    pub fn compact_local(&self) -> Option<u16> {
        match self {
            Opcode::LdLoc0 | Opcode::StLoc0 => Some(0),
            Opcode::LdLoc1 | Opcode::StLoc1 => Some(1),
            Opcode::LdLoc2 | Opcode::StLoc2 => Some(2),
            Opcode::LdLoc3 | Opcode::StLoc3 => Some(3),
            _ => None,
        }
    }

    /// Loads of a local, either by value or by address
    pub fn is_load_local(&self) -> bool {
        matches!(
            self,
            Opcode::LdLoc0
                | Opcode::LdLoc1
                | Opcode::LdLoc2
                | Opcode::LdLoc3
                | Opcode::LdLoc
                | Opcode::LdLocA
        )
    }

    pub fn is_store_local(&self) -> bool {
        matches!(
            self,
            Opcode::StLoc0 | Opcode::StLoc1 | Opcode::StLoc2 | Opcode::StLoc3 | Opcode::StLoc
        )
    }

    /// Is this one of the short (1-byte offset) branch encodings?
    pub fn is_short_branch(&self) -> bool {
        matches!(
            self,
            Opcode::BrS
                | Opcode::LeaveS
                | Opcode::BrTrueS
                | Opcode::BrFalseS
                | Opcode::BeqS
                | Opcode::BneUnS
                | Opcode::BgeS
                | Opcode::BgtS
                | Opcode::BleS
                | Opcode::BltS
        )
    }

    /// Two-way branch that may fall through (so not `switch`)
    pub fn is_conditional_branch(&self) -> bool {
        self.flow_control() == FlowControl::CondBranch && *self != Opcode::Switch
    }

    /// Unconditional branch with the requested encoding
    pub fn unconditional_branch(short: bool) -> Opcode {
        if short {
            Opcode::BrS
        } else {
            Opcode::Br
        }
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
