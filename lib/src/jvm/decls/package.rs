use crate::jvm::{BinaryName, Error, Name, UnqualifiedName};

/// Package as written in source (`java.lang`)
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PackageDecl {
    java_name: String,
}

/// Package in its internal form (`java/lang`)
///
/// The default package has no name.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct PackageRef {
    internal_name: Option<BinaryName>,
}

impl PackageDecl {
    pub fn new(java_name: &str) -> Result<PackageDecl, Error> {
        if !java_name.is_empty() {
            for segment in java_name.split('.') {
                UnqualifiedName::check_valid(segment).map_err(|err| {
                    Error::InvalidName(format!("package '{}': {}", java_name, err))
                })?;
            }
        }
        Ok(PackageDecl {
            java_name: java_name.to_owned(),
        })
    }

    pub fn java_name(&self) -> &str {
        &self.java_name
    }

    pub fn reference(&self) -> PackageRef {
        // Segments were checked in `new`, so the joined name is a valid binary name
        let internal_name = BinaryName::from_string(self.java_name.replace('.', "/")).ok();
        PackageRef { internal_name }
    }
}

impl PackageRef {
    /// The unnamed package
    pub const DEFAULT: PackageRef = PackageRef {
        internal_name: None,
    };

    /// Parse a dotted java package name
    pub fn from_java_name(java_name: &str) -> Result<PackageRef, Error> {
        PackageDecl::new(java_name).map(|decl| decl.reference())
    }

    pub fn internal_name(&self) -> &str {
        self.internal_name.as_ref().map_or("", |name| name.as_str())
    }

    pub fn is_default(&self) -> bool {
        self.internal_name.is_none()
    }

    /// Binary name of a top-level class in this package
    pub fn class_name(&self, simple_name: &UnqualifiedName) -> BinaryName {
        match &self.internal_name {
            None => BinaryName::from(simple_name.clone()),
            Some(package) => package.join(simple_name),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn package_names() {
        let package = PackageRef::from_java_name("me.alec.examples").unwrap();
        assert_eq!(package.internal_name(), "me/alec/examples");
        assert!(!package.is_default());
        assert!(PackageRef::from_java_name("").unwrap().is_default());

        assert!(PackageRef::from_java_name(".me").is_err());
        assert!(PackageRef::from_java_name("me.").is_err());
        assert!(PackageRef::from_java_name("me..alec").is_err());
        assert!(PackageRef::from_java_name("me/alec").is_err());
    }

    #[test]
    fn class_names() {
        let hello = UnqualifiedName::from_str("HelloWorld").unwrap();
        let package = PackageRef::from_java_name("examples").unwrap();
        assert_eq!(package.class_name(&hello).as_str(), "examples/HelloWorld");
        assert_eq!(PackageRef::DEFAULT.class_name(&hello).as_str(), "HelloWorld");
    }
}
