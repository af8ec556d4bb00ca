//! `cumulo synth` - evaluate the declaration and emit the template

use crate::config::StackConfig;
use crate::{Context, stack, ui};
use anyhow::{Context as _, Result};
use std::fs;
use std::path::Path;

pub fn run(ctx: &Context, config: &StackConfig, output: Option<&Path>, compact: bool) -> Result<()> {
    let app = stack::build(config)?;
    let template = app.synth()?;
    log::info!(
        "synthesized {} resources, {} externals",
        template.resources().len(),
        template.externals().len()
    );

    let json = if compact {
        let mut line = template.to_json_compact()?;
        line.push('\n');
        line
    } else {
        template.to_json()?
    };

    match output {
        Some(path) => {
            fs::write(path, &json)
                .with_context(|| format!("could not write template to {}", path.display()))?;
            if !ctx.quiet {
                ui::success(&format!(
                    "wrote {} resources to {}",
                    template.resources().len(),
                    path.display()
                ));
            }
        }
        None => print!("{json}"),
    }
    Ok(())
}
