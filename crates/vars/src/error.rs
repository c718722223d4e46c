//! Error codes for the variable engine (spec §7).
//!
//! Each variant renders to both a human `Display` message and the
//! machine-readable uppercase-tag error code list a caller would attach
//! to an interpreter result, via [`VarError::code`].

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VarError {
    #[error("can't read \"{name}\": no such variable")]
    NoSuchVariable { name: String },

    #[error("can't read \"{name}\": no such element in array")]
    NoSuchElement { name: String },

    #[error("can't read \"{name}\": variable is array")]
    IsArray { name: String },

    #[error("can't read \"{name}\": variable isn't array")]
    NeedArray { name: String },

    #[error("can't read \"{name}\": upvar refers to variable in deleted namespace or frame")]
    DanglingVar { name: String },

    #[error("can't read \"{name}\": upvar refers to element in deleted array")]
    DanglingElement { name: String },

    #[error("bad namespace name \"{name}\"")]
    BadNamespace { name: String },

    #[error("can't read \"{name}\": variable is array")]
    ReadArray { name: String },

    #[error("can't set \"{name}\": variable is array")]
    WriteArray { name: String },

    #[error("can't set \"{name}\": name refers to an element in an array")]
    WriteVarName { name: String },

    #[error("can't unset \"{name}\": name refers to an element in an array")]
    UnsetVarName { name: String },

    #[error("can't set \"{name}\": variable is constant")]
    WriteConst { name: String },

    #[error("can't unset \"{name}\": variable is constant")]
    UnsetConst { name: String },

    #[error("can't upvar from variable \"{name}\" in namespace to a variable in an inner frame")]
    UpvarInverted { name: String },

    #[error("can't upvar \"{name}\" to itself")]
    UpvarSelf { name: String },

    #[error("can't upvar to variable \"{name}\": it has traces")]
    UpvarTraced { name: String },

    #[error("variable \"{name}\" already exists")]
    UpvarExists { name: String },

    #[error("bad variable name \"{name}\": can't create a scalar variable that looks like an array element")]
    UpvarLocalElement { name: String },

    #[error("index \"{index}\" out of range")]
    IndexOutOfRange { index: String },

    #[error("missing argument to \"{option}\"")]
    ArgumentMissing { option: String },

    #[error("\"{option}\" specified more than once")]
    ArgumentDoubled { option: String },

    #[error("bad value for \"{option}\": {reason}")]
    ArgumentFormat { option: String, reason: String },

    #[error("array \"{name}\" changed during iteration")]
    ArrayChangedDuringIteration { name: String },
}

impl VarError {
    /// The uppercase-tag error code list from spec §7, e.g.
    /// `["LOOKUP", "VARIABLE", "x"]` or `["WRITE", "CONST"]`.
    pub fn code(&self) -> Vec<String> {
        match self {
            VarError::NoSuchVariable { name } => {
                vec!["LOOKUP".into(), "VARIABLE".into(), name.clone()]
            }
            VarError::NoSuchElement { name } => {
                vec!["LOOKUP".into(), "ELEMENT".into(), name.clone()]
            }
            VarError::IsArray { name } => vec!["LOOKUP".into(), "ARRAY".into(), name.clone()],
            VarError::NeedArray { name } => vec!["LOOKUP".into(), "VARNAME".into(), name.clone()],
            VarError::DanglingVar { name } => {
                vec!["LOOKUP".into(), "VARIABLE".into(), name.clone()]
            }
            VarError::DanglingElement { name } => {
                vec!["LOOKUP".into(), "ELEMENT".into(), name.clone()]
            }
            VarError::BadNamespace { name } => {
                vec!["LOOKUP".into(), "CLASS".into(), name.clone()]
            }
            VarError::ReadArray { .. } => vec!["READ".into(), "ARRAY".into()],
            VarError::WriteArray { .. } => vec!["WRITE".into(), "ARRAY".into()],
            VarError::WriteVarName { .. } => vec!["WRITE".into(), "VARNAME".into()],
            VarError::UnsetVarName { .. } => vec!["UNSET".into(), "VARNAME".into()],
            VarError::WriteConst { .. } => vec!["WRITE".into(), "CONST".into()],
            VarError::UnsetConst { .. } => vec!["UNSET".into(), "CONST".into()],
            VarError::UpvarInverted { .. } => vec!["UPVAR".into(), "INVERTED".into()],
            VarError::UpvarSelf { .. } => vec!["UPVAR".into(), "SELF".into()],
            VarError::UpvarTraced { .. } => vec!["UPVAR".into(), "TRACED".into()],
            VarError::UpvarExists { .. } => vec!["UPVAR".into(), "EXISTS".into()],
            VarError::UpvarLocalElement { .. } => vec!["UPVAR".into(), "LOCAL_ELEMENT".into()],
            VarError::IndexOutOfRange { .. } => {
                vec!["VALUE".into(), "INDEX".into(), "OUTOFRANGE".into()]
            }
            VarError::ArgumentMissing { .. } => vec!["ARGUMENT".into(), "MISSING".into()],
            VarError::ArgumentDoubled { .. } => vec!["ARGUMENT".into(), "DOUBLED".into()],
            VarError::ArgumentFormat { .. } => vec!["ARGUMENT".into(), "FORMAT".into()],
            VarError::ArrayChangedDuringIteration { .. } => {
                vec!["READ".into(), "array".into(), "for".into()]
            }
        }
    }
}
