use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields, parameters, and type variables
///
/// See <https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, with `/` as the package separator
///
/// See <https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(Cow<'static, str>);

impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    fn as_cow(&self) -> &Cow<'static, str>;

    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;

    /// Like `from_string`, but borrowing
    fn from_str(name: &str) -> Result<Self, String> {
        Self::from_string(name.to_owned())
    }
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(String::from("Unqualified name is empty"))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(String::from("Binary name is empty"))
        } else {
            name.split('/').try_for_each(UnqualifiedName::check_valid)
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

/// A single segment is a binary name in the default package
impl From<UnqualifiedName> for BinaryName {
    fn from(name: UnqualifiedName) -> BinaryName {
        BinaryName(name.0)
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    /// Is this one of the two special method names?
    pub fn is_special_method(&self) -> bool {
        self == &Self::INIT || self == &Self::CLINIT
    }

    /// Method names additionally can't contain angle brackets, except for `<init>` and `<clinit>`
    pub fn check_valid_method(&self) -> Result<(), String> {
        if !self.is_special_method() && self.0.contains(&['<', '>'][..]) {
            Err(format!("Method name '{}' contains an angle bracket", self))
        } else {
            Ok(())
        }
    }

    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");
    pub const THIS: Self = Self::name("this");

    // JDK names
    pub const MAIN: Self = Self::name("main");
    pub const OUT: Self = Self::name("out");
    pub const ERR: Self = Self::name("err");
    pub const PRINTLN: Self = Self::name("println");
    pub const PRINT: Self = Self::name("print");
    pub const VALUEOF: Self = Self::name("valueOf");
    pub const INTVALUE: Self = Self::name("intValue");
    pub const TOSTRING: Self = Self::name("toString");
    pub const EQUALS: Self = Self::name("equals");
    pub const HASHCODE: Self = Self::name("hashCode");
    pub const LENGTH: Self = Self::name("length");
    pub const APPEND: Self = Self::name("append");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    /// Name for a class nested in this one (`Outer$Inner`)
    pub fn nested(&self, simple_name: &UnqualifiedName) -> BinaryName {
        BinaryName(Cow::Owned(format!("{}${}", self, simple_name)))
    }

    /// Join a new segment onto the end of this name
    pub fn join(&self, other: &UnqualifiedName) -> BinaryName {
        BinaryName(Cow::Owned(format!("{}/{}", self, other)))
    }

    /// Part of the name after the last `/`
    pub fn last_segment(&self) -> &str {
        self.as_str().rsplit('/').next().unwrap_or("")
    }

    /// Source-level name, with `.` as the package separator
    pub fn java_name(&self) -> String {
        self.as_str().replace('/', ".")
    }

    // JDK names
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const CHARSEQUENCE: Self = Self::name("java/lang/CharSequence");
    pub const COMPARABLE: Self = Self::name("java/lang/Comparable");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const SYSTEM: Self = Self::name("java/lang/System");
    pub const MATH: Self = Self::name("java/lang/Math");
    pub const STRINGBUILDER: Self = Self::name("java/lang/StringBuilder");
    pub const ITERABLE: Self = Self::name("java/lang/Iterable");
    pub const RUNNABLE: Self = Self::name("java/lang/Runnable");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const ILLEGALARGUMENTEXCEPTION: Self =
        Self::name("java/lang/IllegalArgumentException");
    pub const ILLEGALSTATEEXCEPTION: Self = Self::name("java/lang/IllegalStateException");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
    pub const PRINTSTREAM: Self = Self::name("java/io/PrintStream");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unqualified_names() {
        assert!(UnqualifiedName::from_str("foo").is_ok());
        assert!(UnqualifiedName::from_str("$Foo_1").is_ok());
        assert!(UnqualifiedName::from_str("").is_err());
        assert!(UnqualifiedName::from_str("a.b").is_err());
        assert!(UnqualifiedName::from_str("a/b").is_err());
        assert!(UnqualifiedName::from_str("[a").is_err());
        assert!(UnqualifiedName::from_str("a;").is_err());
    }

    #[test]
    fn method_names() {
        assert!(UnqualifiedName::INIT.check_valid_method().is_ok());
        assert!(UnqualifiedName::CLINIT.check_valid_method().is_ok());
        let bad = UnqualifiedName::from_str("<foo>").unwrap();
        assert!(bad.check_valid_method().is_err());
    }

    #[test]
    fn binary_names() {
        let name = BinaryName::from_str("examples/HelloWorld").unwrap();
        assert_eq!(name.last_segment(), "HelloWorld");
        assert_eq!(name.java_name(), "examples.HelloWorld");

        let inner = name.nested(&UnqualifiedName::from_str("Inner").unwrap());
        assert_eq!(inner.as_str(), "examples/HelloWorld$Inner");

        assert!(BinaryName::from_str("").is_err());
        assert!(BinaryName::from_str("a//b").is_err());
        assert!(BinaryName::from_str("a.b").is_err());
    }
}
