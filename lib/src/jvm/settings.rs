use crate::jvm::class_file::Version;

/// Knobs for how a module's classes are written out
#[derive(Clone, Debug)]
pub struct Settings {
    /// Class file version
    ///
    /// `NestHost`/`NestMembers` attributes are only emitted when the version supports them. Stack
    /// map frames are always emitted, so versions before Java 7 will still load (older JVMs ignore
    /// the `StackMapTable` attribute).
    pub class_version: Version,

    /// Emit `Signature` attributes for generic classes, methods, and fields
    ///
    /// Turning this off leaves only the erased descriptors, which is all the JVM needs to run the
    /// code. Generic information is only used by `javac` and reflection.
    pub emit_generic_signatures: bool,

    /// Emit `LineNumberTable` attributes for methods that recorded line numbers
    pub emit_line_numbers: bool,

    /// Emit `LocalVariableTable` attributes naming the arguments and scoped locals of each method
    ///
    /// Off by default, like `javac` without `-g`.
    pub emit_local_variables: bool,
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            class_version: Version::default(),
            emit_generic_signatures: true,
            emit_line_numbers: true,
            emit_local_variables: false,
        }
    }

    pub fn with_class_version(mut self, class_version: Version) -> Settings {
        self.class_version = class_version;
        self
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}
