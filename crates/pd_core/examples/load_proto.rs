//! Example: Resolve a PROTO and inspect its dependency tree.
//!
//! Run with: cargo run --example load_proto -- protos/Crate.proto

use std::env;
use std::rc::Rc;

use pd_core::{to_scene_document, FileFetcher, ProtoNode, Resolver};

fn print_dependencies(proto: &ProtoNode, depth: usize) {
    for dependency in proto.dependencies() {
        println!(
            "{}- {} ({})",
            "  ".repeat(depth + 1),
            dependency.proto_name(),
            dependency.url()
        );
        print_dependencies(dependency, depth + 1);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: load_proto <path-to-proto-file>");
        println!("\nExamples:");
        println!("  cargo run --example load_proto -- protos/Crate.proto");
        println!("  cargo run --example load_proto -- protos/Table.proto");
        return;
    }

    let path = &args[1];
    println!("Loading PROTO file: {}", path);

    let resolver = Resolver::new(Rc::new(FileFetcher));
    match pollster::block_on(resolver.load(path)) {
        Ok(proto) => {
            println!("\n=== PROTO: {} ===", proto.proto_name());
            println!("Templated: {}", proto.is_template());
            println!("Parameters: {}", proto.parameters().len());
            println!("Cached prototypes: {}", resolver.cached_proto_models());

            println!("\n--- Parameters ---");
            for parameter in proto.parameters() {
                println!(
                    "  {} {}{}",
                    parameter.field_type(),
                    parameter.name(),
                    if parameter.is_template_regenerator() {
                        " [template]"
                    } else {
                        ""
                    }
                );
            }

            println!("\n--- Dependencies ---");
            print_dependencies(&proto, 0);

            match resolver.create_instance(path) {
                Ok(node) => match to_scene_document(&node) {
                    Ok(document) => {
                        println!("\n--- Scene document ---");
                        println!("{}", document);
                    }
                    Err(e) => eprintln!("Failed to serialize instance: {}", e),
                },
                Err(e) => eprintln!("Failed to instantiate: {}", e),
            }
        }
        Err(e) => {
            eprintln!("Failed to load PROTO: {}", e);
            std::process::exit(1);
        }
    }
}
