//! Getting generated classes into a running JVM
//!
//! The builders stop at bytes: [`ClassLoader`] is the seam where those bytes get handed to
//! something that can actually define and run the class. [`JavaProcessLoader`] is the simplest
//! possible implementation, spawning a `java` process per invocation.

use crate::jvm::{BinaryName, Error};
use log::debug;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Argument to, or result of, a method invoked through a [`ClassLoader`]
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => f.write_str(s),
            Value::Null => f.write_str("null"),
        }
    }
}

/// Something which can define classes from their bytes and call static methods on them
pub trait ClassLoader {
    /// What the loader hands back to refer to a loaded class
    type Handle;

    fn load(&mut self, bytes: &[u8], binary_name: &BinaryName) -> Result<Self::Handle, Error>;

    /// Invoke a static method of a loaded class
    fn invoke(
        &mut self,
        handle: &Self::Handle,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error>;
}

/// Loader which writes classes into a classpath directory and runs them with `java`
///
/// Only `main` can be invoked. The arguments are passed on the command line and whatever the
/// program prints to standard output comes back as a [`Value::String`].
pub struct JavaProcessLoader {
    directory: PathBuf,
    java: PathBuf,
}

impl JavaProcessLoader {
    pub fn new(directory: impl Into<PathBuf>) -> JavaProcessLoader {
        JavaProcessLoader {
            directory: directory.into(),
            java: PathBuf::from("java"),
        }
    }

    /// Use a specific `java` executable instead of the one on the `PATH`
    pub fn with_java(mut self, java: impl Into<PathBuf>) -> JavaProcessLoader {
        self.java = java.into();
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl ClassLoader for JavaProcessLoader {
    type Handle = BinaryName;

    fn load(&mut self, bytes: &[u8], binary_name: &BinaryName) -> Result<BinaryName, Error> {
        let path = self.directory.join(format!("{}.class", binary_name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!("Wrote {} to {}", binary_name, path.display());
        Ok(binary_name.clone())
    }

    fn invoke(
        &mut self,
        handle: &BinaryName,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        if method != "main" {
            return Err(Error::LoaderError(format!(
                "cannot invoke {}.{} from a separate process (only `main`)",
                handle, method
            )));
        }

        debug!("Running {} with {}", handle, self.java.display());
        let output = Command::new(&self.java)
            .arg("-cp")
            .arg(&self.directory)
            .arg(handle.java_name())
            .args(args.iter().map(Value::to_string))
            .output()
            .map_err(|err| {
                Error::LoaderError(format!("could not run {}: {}", self.java.display(), err))
            })?;

        if !output.status.success() {
            return Err(Error::LoaderError(format!(
                "{} exited with {}: {}",
                handle,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(Value::String(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    #[test]
    fn values_as_arguments() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::String(String::from("hi")).to_string(), "hi");
    }

    #[test]
    fn classes_are_written_under_the_classpath() {
        let directory = std::env::temp_dir().join(format!("classforge-loader-{}", std::process::id()));
        let mut loader = JavaProcessLoader::new(&directory);
        let name = BinaryName::from_str("examples/nested/Demo").unwrap();

        let handle = loader.load(&[0xCA, 0xFE, 0xBA, 0xBE], &name).unwrap();
        assert_eq!(handle, name);
        let written = fs::read(directory.join("examples/nested/Demo.class")).unwrap();
        assert_eq!(written, vec![0xCA, 0xFE, 0xBA, 0xBE]);

        assert!(matches!(
            loader.invoke(&handle, "run", &[]),
            Err(Error::LoaderError(_))
        ));
        fs::remove_dir_all(&directory).unwrap();
    }
}
