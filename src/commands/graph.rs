//! `cumulo graph` - print the dependency relation
//!
//! Explicit ordering edges and implicit attribute references are distinct
//! things to the reconciliation engine, so they are rendered distinctly:
//! solid for authored edges, dashed for references.

use crate::cli::GraphFormat;
use crate::config::StackConfig;
use crate::{Context, stack, ui};
use anyhow::Result;

pub fn run(ctx: &Context, config: &StackConfig, format: GraphFormat) -> Result<()> {
    let app = stack::build(config)?;

    match format {
        GraphFormat::Text => print_text(ctx, &app),
        GraphFormat::Dot => print_dot(&app),
    }
    Ok(())
}

fn print_text(ctx: &Context, app: &topograph::App) {
    if !ctx.quiet {
        ui::header("Resource graph");
    }
    for node in app.graph().nodes() {
        println!("{}  [{}]", node.logical_id(), node.resource_type());
        for dep in node.depends_on() {
            ui::dim(&format!("depends on {dep}"));
        }
        for reference in node.references() {
            let marker = if app.graph().is_external(reference) { " (external)" } else { "" };
            ui::dim(&format!("references {reference}{marker}"));
        }
    }
    if !app.graph().externals().is_empty() && !ctx.quiet {
        ui::header("External references");
        for external in app.graph().externals() {
            println!("{}  [{}] -> '{}'", external.logical_id(), external.kind(), external.name());
        }
    }
}

fn print_dot(app: &topograph::App) {
    println!("digraph topology {{");
    println!("  rankdir=BT;");
    for node in app.graph().nodes() {
        println!("  \"{}\";", node.logical_id());
        for dep in node.depends_on() {
            println!("  \"{}\" -> \"{}\";", node.logical_id(), dep);
        }
        for reference in node.references() {
            println!("  \"{}\" -> \"{}\" [style=dashed];", node.logical_id(), reference);
        }
    }
    for external in app.graph().externals() {
        println!("  \"{}\" [shape=box,label=\"{} ({})\"];", external.logical_id(), external.name(), external.kind());
    }
    println!("}}");
}
