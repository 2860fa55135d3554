use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Fully qualified names of types (eg. `System.Int32`, `Game.Player`, `System.Int32&`)
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct TypeName(Cow<'static, str>);

/// Names of methods, fields, and parameters
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct MemberName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for TypeName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for MemberName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for MemberName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(String::from("Member name is empty"))
        } else if name.contains(|c: char| c.is_whitespace() || c == ';' || c == '&') {
            Err(format!("Member name '{}' contains an illegal character", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(MemberName(Cow::Owned(name)))
    }
}

impl Name for TypeName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        let element = name.strip_suffix('&').unwrap_or(name);
        if element.is_empty() {
            Err(format!("Type name '{}' is empty", name))
        } else if element.contains('&') {
            Err(format!("Type name '{}' nests by-reference types", name))
        } else {
            element
                .split('.')
                .map(|segment| {
                    if segment.is_empty() {
                        Err(format!("Type name '{}' has an empty segment", name))
                    } else {
                        MemberName::check_valid(segment)
                    }
                })
                .collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(TypeName(Cow::Owned(name)))
    }
}

impl Debug for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Debug for MemberName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for MemberName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl TypeName {
    /// Name of the by-reference type whose element type has this name
    pub fn by_ref(&self) -> TypeName {
        TypeName(Cow::Owned(format!("{}&", self.as_str())))
    }

    /// Is this the name of a by-reference type?
    pub fn is_by_ref(&self) -> bool {
        self.0.ends_with('&')
    }

    const fn name(value: &'static str) -> TypeName {
        TypeName(Cow::Borrowed(value))
    }

    // Core names
    pub const BOOLEAN: Self = Self::name("System.Boolean");
    pub const DOUBLE: Self = Self::name("System.Double");
    pub const INT32: Self = Self::name("System.Int32");
    pub const INT64: Self = Self::name("System.Int64");
    pub const OBJECT: Self = Self::name("System.Object");
    pub const SINGLE: Self = Self::name("System.Single");
    pub const STRING: Self = Self::name("System.String");
    pub const VALUETYPE: Self = Self::name("System.ValueType");
    pub const VOID: Self = Self::name("System.Void");
}

impl MemberName {
    /// Name of the getter method backing a property
    pub fn getter(&self) -> MemberName {
        MemberName(Cow::Owned(format!("get_{}", self.as_str())))
    }

    /// Name of the setter method backing a property
    pub fn setter(&self) -> MemberName {
        MemberName(Cow::Owned(format!("set_{}", self.as_str())))
    }

    const fn name(value: &'static str) -> MemberName {
        MemberName(Cow::Borrowed(value))
    }

    // Special names
    pub const CTOR: Self = Self::name(".ctor");
    pub const CCTOR: Self = Self::name(".cctor");
    pub const INSTANCE: Self = Self::name("__instance");
    pub const RESULT: Self = Self::name("__result");
}
