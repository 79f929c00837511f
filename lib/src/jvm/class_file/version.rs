use crate::jvm::class_file::Serialize;
use byteorder::WriteBytesExt;
use std::fmt;
use std::io::Result;

/// Version of the class file, which is used to verify that the JVM has the
/// necessary features to interpret the class
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    const fn major(major_version: u16) -> Version {
        Version {
            major_version,
            minor_version: 0,
        }
    }

    pub const JAVA6: Version = Version::major(50);
    pub const JAVA7: Version = Version::major(51);

    /// First version where `StackMapTable` frames are mandatory
    pub const JAVA8: Version = Version::major(52);
    pub const JAVA9: Version = Version::major(53);
    pub const JAVA10: Version = Version::major(54);

    /// First version with `NestHost`/`NestMembers`
    pub const JAVA11: Version = Version::major(55);
    pub const JAVA12: Version = Version::major(56);
    pub const JAVA13: Version = Version::major(57);
    pub const JAVA14: Version = Version::major(58);
    pub const JAVA15: Version = Version::major(59);
    pub const JAVA16: Version = Version::major(60);
    pub const JAVA17: Version = Version::major(61);

    /// Does this version understand the nest-based access control attributes?
    pub fn supports_nestmates(&self) -> bool {
        *self >= Version::JAVA11
    }
}

impl Default for Version {
    fn default() -> Version {
        Version::JAVA8
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major_version, self.minor_version)
    }
}

/// Minor version goes first in the file
impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Version::JAVA6 < Version::JAVA8);
        assert!(!Version::default().supports_nestmates());
        assert!(Version::JAVA17.supports_nestmates());
        assert_eq!(Version::JAVA8.to_bytes().unwrap(), vec![0, 0, 0, 52]);
    }
}
