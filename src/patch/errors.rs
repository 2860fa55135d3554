use crate::il;
use crate::il::{LabelId, Opcode};

#[derive(Debug)]
pub enum Error {
    Il(il::Error),

    /// A search reached the start or end of the body without a match
    NavigationExhausted { from: usize, boundary: Boundary },

    /// A procedure parameter could not be bound by any rule
    UnknownParameter { procedure: String, parameter: String },

    /// A replacement procedure has fewer parameters than the member it replaces needs
    MissingParameter { procedure: String, expected: String },

    /// A by-ref parameter was bound to a value that has no address
    MissingByRef { parameter: String, found: String },

    /// A plain parameter was bound to a by-ref value
    UnexpectedByRef { parameter: String, found: String },

    TypeIncompatible {
        binding: String,
        expected: String,
        found: String,
    },

    /// `__instance` was requested in a static method, or a replacement procedure doesn't take the
    /// instance of the replaced member
    MissingInstance(String),

    /// An injected return into a non-void method has no `__result` parameter
    MissingResult(String),

    /// An injected return into a void method (or an injected jump) has a `__result` parameter
    UnexpectedResult(String),

    /// Replacement procedure parameters don't line up with those of the replaced member
    ParameterOrderMismatch {
        procedure: String,
        position: usize,
        expected: String,
        found: String,
    },

    /// A local or label name is already used by another local or label
    NameCollision(String),

    /// The instruction under the cursor doesn't support the operation
    InvalidCurrentInstruction {
        position: usize,
        expected: &'static str,
        found: String,
    },

    /// The return type of the procedure doesn't suit the injection
    InvalidReturn { procedure: String, found: String },

    /// Injected procedures must be static
    NonStaticProcedure(String),

    /// The local already has a caller-chosen name
    LocalAlreadyNamed { index: u16, name: String },

    UnknownLocal(String),
    UnknownLabel(String),

    /// The same label is attached to more than one instruction
    DuplicateLabel(LabelId),

    /// An unconditional or multi-way branch was found where a conditional one was expected
    UnexpectedBranch { position: usize, opcode: Opcode },

    /// Labels are referenced by branches but not attached to any instruction
    UnplacedLabels(Vec<LabelId>),

    /// A method body must have at least one instruction
    EmptyMethodBody,

    EmptyPredicateChain,

    InvalidName(String),

    /// Position outside of the instruction stream
    InvalidPosition { position: usize, len: usize },
}

/// End of the instruction stream that a search ran into
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Boundary {
    Start,
    End,
}

impl From<il::Error> for Error {
    fn from(err: il::Error) -> Error {
        Error::Il(err)
    }
}
