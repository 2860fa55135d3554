use super::Opcode;

#[derive(Debug)]
pub enum Error {
    /// The operand doesn't have the shape (or width) the opcode expects
    InvalidOperand { opcode: Opcode, operand: String },

    MissingType(String),
    MissingMember(String),

    /// A type or member name failed validation
    MalformedName(String),
}
