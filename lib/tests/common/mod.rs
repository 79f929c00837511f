#![allow(dead_code)]

use classforge::jvm::class_file::{ClassFile, Constant};
use classforge::jvm::decls::PackageRef;
use classforge::jvm::loader::{ClassLoader, Value};
use classforge::jvm::{BinaryName, Error};
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::process::Command;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn package() -> PackageRef {
    PackageRef::from_java_name("examples").unwrap()
}

/// Every UTF-8 constant in the class file
pub fn utf8_constants(class_file: &ClassFile) -> Vec<String> {
    class_file
        .constants
        .values()
        .filter_map(|constant| match constant {
            Constant::Utf8(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

/// Loader which just remembers what it was given
#[derive(Default)]
pub struct RecordingLoader {
    pub loaded: HashMap<BinaryName, Vec<u8>>,
    pub invocations: Vec<(BinaryName, String, Vec<Value>)>,
}

impl ClassLoader for RecordingLoader {
    type Handle = BinaryName;

    fn load(&mut self, bytes: &[u8], binary_name: &BinaryName) -> Result<BinaryName, Error> {
        self.loaded.insert(binary_name.clone(), bytes.to_vec());
        Ok(binary_name.clone())
    }

    fn invoke(
        &mut self,
        handle: &BinaryName,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        if !self.loaded.contains_key(handle) {
            return Err(Error::LoaderError(format!("{} was never loaded", handle)));
        }
        self.invocations
            .push((handle.clone(), method.to_owned(), args.to_vec()));
        Ok(Value::Void)
    }
}

/// Is there a `java` on the `PATH`?
pub fn java_available() -> bool {
    Command::new("java")
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Fresh scratch directory for class files
pub fn scratch_directory(test_name: &str) -> PathBuf {
    let directory =
        std::env::temp_dir().join(format!("classforge-{}-{}", test_name, std::process::id()));
    let _ = std::fs::remove_dir_all(&directory);
    std::fs::create_dir_all(&directory).unwrap();
    directory
}

/// What the tests look at in a class file, read back from its bytes
#[derive(Debug)]
pub struct ParsedClass {
    pub major_version: u16,
    pub minor_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: String,
    pub interfaces: Vec<String>,

    /// `(name, descriptor, attribute names)` for every field
    pub fields: Vec<(String, String, Vec<String>)>,

    /// `(name, descriptor, attribute names)` for every method
    pub methods: Vec<(String, String, Vec<String>)>,
    pub attributes: Vec<String>,
}

impl ParsedClass {
    pub fn parse(bytes: &[u8]) -> io::Result<ParsedClass> {
        let mut input = Cursor::new(bytes);
        let magic = input.read_u32::<BigEndian>()?;
        if magic != 0xCAFE_BABE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
        }
        let minor_version = input.read_u16::<BigEndian>()?;
        let major_version = input.read_u16::<BigEndian>()?;

        // Only UTF-8 and class constants matter here, everything else is skipped
        let count = input.read_u16::<BigEndian>()? as usize;
        let mut utf8s: HashMap<u16, String> = HashMap::new();
        let mut classes: HashMap<u16, u16> = HashMap::new();
        let mut index = 1;
        while index < count {
            let tag = input.read_u8()?;
            let mut width = 1;
            match tag {
                1 => {
                    let len = input.read_u16::<BigEndian>()? as usize;
                    let mut buf = vec![0u8; len];
                    input.read_exact(&mut buf)?;
                    utf8s.insert(index as u16, String::from_utf8_lossy(&buf).into_owned());
                }
                7 => {
                    classes.insert(index as u16, input.read_u16::<BigEndian>()?);
                }
                8 | 16 | 19 | 20 => skip(&mut input, 2)?,
                15 => skip(&mut input, 3)?,
                3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => skip(&mut input, 4)?,
                5 | 6 => {
                    skip(&mut input, 8)?;
                    width = 2;
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unknown constant tag {}", tag),
                    ))
                }
            }
            index += width;
        }

        let utf8 = |idx: u16| utf8s.get(&idx).cloned().unwrap_or_default();
        let class = |idx: u16| classes.get(&idx).map(|name| utf8(*name)).unwrap_or_default();

        let access_flags = input.read_u16::<BigEndian>()?;
        let this_class = class(input.read_u16::<BigEndian>()?);
        let super_class = class(input.read_u16::<BigEndian>()?);
        let interface_count = input.read_u16::<BigEndian>()?;
        let mut interfaces = vec![];
        for _ in 0..interface_count {
            interfaces.push(class(input.read_u16::<BigEndian>()?));
        }

        let fields = read_members(&mut input, &utf8)?;
        let methods = read_members(&mut input, &utf8)?;
        let attributes = attribute_names(&mut input, &utf8)?;

        Ok(ParsedClass {
            major_version,
            minor_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn method(&self, name: &str) -> Option<&(String, String, Vec<String>)> {
        self.methods.iter().find(|method| method.0 == name)
    }
}

fn skip(input: &mut Cursor<&[u8]>, bytes: u64) -> io::Result<()> {
    let position = input.position() + bytes;
    if position > input.get_ref().len() as u64 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"));
    }
    input.set_position(position);
    Ok(())
}

fn read_members(
    input: &mut Cursor<&[u8]>,
    utf8: &impl Fn(u16) -> String,
) -> io::Result<Vec<(String, String, Vec<String>)>> {
    let count = input.read_u16::<BigEndian>()?;
    let mut members = vec![];
    for _ in 0..count {
        let _access_flags = input.read_u16::<BigEndian>()?;
        let name = utf8(input.read_u16::<BigEndian>()?);
        let descriptor = utf8(input.read_u16::<BigEndian>()?);
        let attributes = attribute_names(input, utf8)?;
        members.push((name, descriptor, attributes));
    }
    Ok(members)
}

fn attribute_names(
    input: &mut Cursor<&[u8]>,
    utf8: &impl Fn(u16) -> String,
) -> io::Result<Vec<String>> {
    let count = input.read_u16::<BigEndian>()?;
    let mut names = vec![];
    for _ in 0..count {
        names.push(utf8(input.read_u16::<BigEndian>()?));
        let len = input.read_u32::<BigEndian>()?;
        skip(input, len as u64)?;
    }
    Ok(names)
}
