//! Generate JVM class files from Rust
//!
//! Everything lives under [`jvm`]: the builders used to assemble classes, the verifier that
//! checks their code as it is emitted, and the serializer that writes out class files.

pub mod jvm;
mod util;
