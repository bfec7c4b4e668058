use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CodegenError {
    #[error("cannot take the address of a {operand_kind} expression")]
    UnsupportedAddressOf { operand_kind: String },

    #[error(
        "subroutine \"{subroutine}\" calls itself; recursion is unsupported because parameters and returns are allocated as static storage"
    )]
    InvalidRecursion { subroutine: String },

    #[error("record \"{record}\" has no field named \"{field}\"")]
    MissingFieldOffset { record: String, field: String },

    #[error("unknown record type \"{0}\"")]
    UnknownRecord(String),

    #[error("inline assembly expression ({kind}) does not fold to a compile-time constant")]
    NonConstantAsmExpr { kind: String },
}
