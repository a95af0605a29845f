use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Declaration modifiers as they read in source.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        /// `static`
        const STATIC = 0x0001;
        /// `abstract`
        const ABSTRACT = 0x0002;
        /// `virtual`
        const VIRTUAL = 0x0004;
        /// `override`
        const OVERRIDE = 0x0008;
        /// `sealed`, on a class or together with `override`
        const SEALED = 0x0010;
        /// `readonly`
        const READONLY = 0x0020;
        /// `const`
        const CONST = 0x0040;
        /// `volatile`
        const VOLATILE = 0x0080;
        /// `extern`
        const EXTERN = 0x0100;
        /// `required`
        const REQUIRED = 0x0200;
        /// `ref`, on a ref struct
        const REF = 0x0400;
    }
}

// Keyword order used when rendering
const KEYWORDS: [(Modifiers, &str); 11] = [
    (Modifiers::STATIC, "static"),
    (Modifiers::EXTERN, "extern"),
    (Modifiers::REQUIRED, "required"),
    (Modifiers::CONST, "const"),
    (Modifiers::ABSTRACT, "abstract"),
    (Modifiers::VIRTUAL, "virtual"),
    (Modifiers::SEALED, "sealed"),
    (Modifiers::OVERRIDE, "override"),
    (Modifiers::READONLY, "readonly"),
    (Modifiers::VOLATILE, "volatile"),
    (Modifiers::REF, "ref"),
];

impl Modifiers {
    /// Keywords of the set modifiers in declaration order
    #[must_use]
    pub fn keywords(self) -> Vec<&'static str> {
        KEYWORDS
            .iter()
            .filter(|(modifier, _)| self.contains(*modifier))
            .map(|(_, keyword)| *keyword)
            .collect()
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keywords().join(" "))
    }
}
