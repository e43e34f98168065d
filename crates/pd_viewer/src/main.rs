//! PD Viewer - load a PROTO, print its scene document and replay field edits.
//!
//! Usage:
//!
//! ```text
//! pd_viewer <proto> [--config resolver.json] [--set <field> <literal>]...
//! ```
//!
//! Every `--set` goes through the same path an editor would use, with the
//! renderer commands written to the log (`RUST_LOG=info`).

use std::env;
use std::fs;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use pd_core::{
    to_fragment, FieldValue, FileFetcher, LoggingBridge, Node, Resolver, ResolverConfig,
    UpdateContext,
};

struct Args {
    proto: String,
    config: Option<String>,
    edits: Vec<(String, String)>,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut proto = None;
    let mut config = None;
    let mut edits = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(args.next().context("--config needs a path")?);
            }
            "--set" => {
                let field = args.next().context("--set needs a field name")?;
                let literal = args.next().context("--set needs a value")?;
                edits.push((field, literal));
            }
            _ if proto.is_none() => proto = Some(arg),
            _ => bail!("Unexpected argument '{}'", arg),
        }
    }

    let proto = proto.ok_or_else(|| {
        anyhow!("Usage: pd_viewer <proto> [--config resolver.json] [--set <field> <literal>]...")
    })?;
    Ok(Args {
        proto,
        config,
        edits,
    })
}

fn load_config(path: Option<&str>) -> Result<ResolverConfig> {
    let Some(path) = path else {
        return Ok(ResolverConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path))
}

fn print_parameters(node: &Node) {
    println!("\n--- Parameters ---");
    for parameter in node.parameters() {
        let value = parameter
            .value()
            .map(|v| v.to_json().to_string())
            .unwrap_or_else(|| "-".to_string());
        let marker = if parameter.is_template_regenerator() {
            " (regenerates body)"
        } else {
            ""
        };
        println!(
            "  {} {} = {}{}",
            parameter.field_type(),
            parameter.name(),
            value,
            marker
        );
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = parse_args()?;
    let config = load_config(args.config.as_deref())?;

    log::info!("Starting PD Viewer");

    let resolver = Resolver::with_config(config, Rc::new(FileFetcher));
    let model = pollster::block_on(resolver.load(&args.proto))
        .with_context(|| format!("loading {}", args.proto))?;

    println!("\n=== PROTO: {} ===", model.proto_name());
    println!("URL: {}", model.url());
    println!("Templated: {}", model.is_template());
    println!("EXTERNPROTOs: {}", model.extern_protos().len());
    println!("Cached prototypes: {}", resolver.cached_proto_models());

    let mut node = resolver.create_instance(&args.proto)?;
    print_parameters(&node);

    println!("\n--- Scene document ---");
    println!("{}", to_fragment(&node)?);

    if args.edits.is_empty() {
        return Ok(());
    }

    let mut bridge = LoggingBridge;
    for (field, literal) in &args.edits {
        let field_type = node
            .parameter(field)
            .map(|p| p.field_type())
            .with_context(|| format!("{} has no field '{}'", node.type_name(), field))?;
        let value = FieldValue::parse_literal(field_type, literal)
            .with_context(|| format!("parsing value for '{}'", field))?;

        log::info!("Setting {} to {}", field, literal);
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);
        node.set_parameter_value(field, value, &mut ctx)?;
    }

    println!("\n--- Scene document after edits ---");
    println!("{}", to_fragment(&node)?);

    Ok(())
}
