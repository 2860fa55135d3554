use bitflags::bitflags;

bitflags! {
    /// Attributes on methods
    ///
    /// Only the bits that change how a method is called or bound are modelled. The values match
    /// the `MethodAttributes` column of the method definition table.
    pub struct MethodAccessFlags: u16 {
        const PRIVATE = 0x0001;
        const ASSEMBLY = 0x0003;
        const FAMILY = 0x0004;
        const PUBLIC = 0x0006;
        const STATIC = 0x0010;
        const FINAL = 0x0020;
        const VIRTUAL = 0x0040;
        const HIDE_BY_SIG = 0x0080;
        const ABSTRACT = 0x0400;
        const SPECIAL_NAME = 0x0800;
    }
}

bitflags! {
    /// Attributes on fields
    ///
    /// The values match the `FieldAttributes` column of the field definition table.
    pub struct FieldAccessFlags: u16 {
        const PRIVATE = 0x0001;
        const ASSEMBLY = 0x0003;
        const FAMILY = 0x0004;
        const PUBLIC = 0x0006;
        const STATIC = 0x0010;
        const INIT_ONLY = 0x0020;
        const LITERAL = 0x0040;
    }
}

impl MethodAccessFlags {
    /// Flags of a plain `public static` helper, the shape expected of injected procedures
    pub fn public_static() -> MethodAccessFlags {
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC | MethodAccessFlags::HIDE_BY_SIG
    }
}
