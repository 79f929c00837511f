use classforge::jvm::builder::{CompiledModule, ModuleBuilder};
use classforge::jvm::class_file::Version;
use classforge::jvm::class_graph::{ClassGraph, ClassGraphArenas};
use classforge::jvm::decls::{ClassDecl, ClassRef, FieldRef, MethodRef, MethodSignature, PackageRef};
use classforge::jvm::loader::{ClassLoader, JavaProcessLoader};
use classforge::jvm::types::JvmType;
use classforge::jvm::*;

use clap::{value_parser, Arg, ArgAction, Command};
use std::fs;
use std::path::PathBuf;
use std::process;

/// Build a class whose `main` prints `message`
fn hello_world<'g>(
    class_graph: &'g ClassGraph<'g>,
    settings: Settings,
    java_name: &str,
    message: &str,
) -> Result<CompiledModule, Error> {
    let (package, simple_name) = match java_name.rsplit_once('.') {
        Some((package, simple_name)) => (PackageRef::from_java_name(package)?, simple_name),
        None => (PackageRef::DEFAULT, java_name),
    };

    let module = ModuleBuilder::with_settings(class_graph, settings);
    let class = module.create_class(
        ClassDecl::new(&package, simple_name)?,
        ClassModifiers::PUBLIC,
    )?;
    class.create_default_constructor(MethodModifiers::PUBLIC)?;

    let main = class.create_method(
        "main",
        MethodModifiers::PUBLIC | MethodModifiers::STATIC,
        MethodSignature::new().param("args", JvmType::array(JvmType::string())),
    )?;
    let println = MethodRef::new(
        ClassRef::raw(BinaryName::PRINTSTREAM),
        "println",
        false,
        MethodSignature::new().param("x", JvmType::string()),
    )?;

    let code = main.begin_code()?;
    code.line_number(1)?;
    code.get_field(&FieldRef::system_out())?;
    code.ldc(message)?;
    code.invoke(&println)?;
    code.ret()?;
    code.close()?;
    main.close()?;
    class.close()?;

    module.close()
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let matches = Command::new("classforge")
        .version("0.1.0")
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Generate a verified hello-world class file")
        .arg(
            Arg::new("class")
                .long("class")
                .value_name("CLASS_NAME")
                .default_value("examples.HelloWorld")
                .help("Java name of the generated class (eg. `foo.bar.Baz`)"),
        )
        .arg(
            Arg::new("message")
                .long("message")
                .value_name("MESSAGE")
                .default_value("Hello, World!")
                .help("What the generated `main` prints"),
        )
        .arg(
            Arg::new("output")
                .long("output-directory")
                .value_name("DIRECTORY")
                .default_value("out")
                .value_parser(value_parser!(PathBuf))
                .help("Directory the class file is written under"),
        )
        .arg(
            Arg::new("version")
                .long("class-version")
                .value_name("MAJOR")
                .value_parser(value_parser!(u16))
                .help("Class file major version (defaults to 52, Java 8)"),
        )
        .arg(
            Arg::new("debug-locals")
                .long("debug-locals")
                .action(ArgAction::SetTrue)
                .help("Emit a `LocalVariableTable` for each method (like `javac -g`)"),
        )
        .arg(
            Arg::new("jar")
                .long("jar")
                .value_name("JAR")
                .value_parser(value_parser!(PathBuf))
                .help("Also package the class in a `jar` (uses `jar` utility on PATH)"),
        )
        .arg(
            Arg::new("run")
                .long("run")
                .action(ArgAction::SetTrue)
                .help("Run the class once it is written"),
        )
        .arg(
            Arg::new("java")
                .long("java")
                .value_name("JAVA")
                .value_parser(value_parser!(PathBuf))
                .help("Sets the `java` executable to use with `--run`"),
        )
        .get_matches();

    let java_name = matches
        .get_one::<String>("class")
        .map_or("examples.HelloWorld", String::as_str);
    let message = matches
        .get_one::<String>("message")
        .map_or("Hello, World!", String::as_str);
    let output = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("out"));

    let mut settings = Settings::new();
    if let Some(major) = matches.get_one::<u16>("version") {
        settings = settings.with_class_version(Version {
            major_version: *major,
            minor_version: 0,
        });
    }
    settings.emit_local_variables = matches.get_flag("debug-locals");

    let class_graph_arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&class_graph_arenas);
    class_graph.insert_java_library_types()?;

    log::info!("Generating '{}'", java_name);
    let compiled = hello_world(&class_graph, settings, java_name, message)?;
    let classes = compiled.check()?;

    fs::create_dir_all(&output)?;
    for class in &classes {
        let path = class.save_to_directory(&output)?;
        log::info!("Wrote '{}'", path.display());
    }

    // Package the results in a JAR
    if let Some(jar_name) = matches.get_one::<PathBuf>("jar") {
        let mut command = process::Command::new("jar");
        command.arg("cf").arg(jar_name).arg("-C").arg(&output);
        for class in &classes {
            command.arg(format!("{}.class", class.name()));
        }
        if !command.status()?.success() {
            log::error!("Failed to create JAR {}", jar_name.display());
        } else {
            log::info!("Packaged '{}'", jar_name.display());
        }
    }

    if matches.get_flag("run") {
        let mut loader = JavaProcessLoader::new(&output);
        if let Some(java) = matches.get_one::<PathBuf>("java") {
            loader = loader.with_java(java);
        }
        for class in &classes {
            let handle = class.load(&mut loader)?;
            let printed = loader.invoke(&handle, "main", &[])?;
            print!("{}", printed);
        }
    }

    Ok(())
}
