//! Build, verify, and serialize JVM classes
//!
//! Classes are generated through a hierarchy of scoped builders (see [`builder`]): a module owns
//! classes, a class owns methods, and a method owns a tree of code scopes. Every instruction is
//! checked against the verifier's view of the stack and locals as soon as it is emitted, and the
//! module checks the declarations once all of its classes are closed.
//!
//! ### Simple example
//!
//! Consider the following simple Java class:
//!
//! ```java,ignore,no_run
//! public class Point {
//!     public final int x;
//!     public final int y;
//!
//!     public Point(int x, int y) {
//!         this.x = x;
//!         this.y = y;
//!     }
//! }
//! ```
//!
//! Generating an analogous class file can be done as follows:
//!
//! ```
//! use classforge::jvm::builder::ModuleBuilder;
//! use classforge::jvm::class_graph::{ClassGraph, ClassGraphArenas};
//! use classforge::jvm::decls::{ClassDecl, ClassRef, MethodRef, PackageRef, Param};
//! use classforge::jvm::types::JvmType;
//! use classforge::jvm::*;
//!
//! # fn generate_class() -> Result<(), Error> {
//! // Setup the class graph, add in Java standard library types
//! let class_graph_arenas = ClassGraphArenas::new();
//! let class_graph = ClassGraph::new(&class_graph_arenas);
//! class_graph.insert_java_library_types()?;
//!
//! // Declare the class and its fields
//! let module = ModuleBuilder::new(&class_graph);
//! let package = PackageRef::from_java_name("me.alec")?;
//! let class = module.create_class(ClassDecl::new(&package, "Point")?, ClassModifiers::PUBLIC)?;
//! let field_modifiers = FieldModifiers::PUBLIC | FieldModifiers::FINAL;
//! let field_x = class.create_field("x", field_modifiers, JvmType::INT)?;
//! let field_y = class.create_field("y", field_modifiers, JvmType::INT)?;
//!
//! // Generate the constructor method body
//! let params = vec![Param::new("x", JvmType::INT), Param::new("y", JvmType::INT)];
//! let constructor = class.create_constructor(MethodModifiers::PUBLIC, params)?;
//! let code = constructor.begin_code()?;
//! let this = code.this_var()?;
//! code.load(&this)?;
//! code.invoke_constructor(&MethodRef::constructor(ClassRef::raw(BinaryName::OBJECT), vec![])?)?;
//! code.load(&this)?;
//! code.load(&code.argument(0)?)?;
//! code.put_field(&field_x)?;
//! code.load(&this)?;
//! code.load(&code.argument(1)?)?;
//! code.put_field(&field_y)?;
//! code.ret()?;
//! code.close()?;
//! constructor.close()?;
//! class.close()?;
//!
//! // Finally, verify the module and encode the class into bytes
//! let classes = module.close()?.check()?;
//! let class_bytes: Vec<u8> = classes[0].bytes()?;
//! assert_eq!(&class_bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
//! # Ok(())
//! # }
//! # generate_class().unwrap();
//! ```

pub mod builder;
pub mod class_file;
pub mod class_graph;
pub mod code;
pub mod decls;
mod errors;
pub mod loader;
pub mod model;
mod modifiers;
mod names;
mod settings;
pub mod types;
pub mod verifier;

pub use errors::*;
pub use modifiers::*;
pub use names::*;
pub use settings::*;
