//! `portcullis lookup` command handler

use std::io::Write;

use serde::Serialize;

use portcullis_core::config::PortcullisConfig;
use portcullis_core::types::{Direction, Protocol};
use portcullis_port_grouping::PortGroupBuilder;

use crate::cli::LookupArgs;
use crate::commands::load_signatures;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `lookup` command.
pub async fn execute(
    args: LookupArgs,
    config: &PortcullisConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let signatures = load_signatures(&args.target, config).await?;
    let protocol = Protocol::from(args.target.protocol);
    let direction = Direction::from(args.target.direction);

    let map = PortGroupBuilder::from_config(protocol, direction, &config.grouping)
        .build(&signatures)?;

    let group = map.group_for(args.port);
    let report = LookupReport {
        port: args.port,
        protocol,
        direction,
        group: group.map(|g| g.id.to_string()),
        group_ports: group
            .map(|g| g.ranges.iter().map(ToString::to_string).collect())
            .unwrap_or_default(),
        signatures: map.signatures_for(args.port).iter().map(|sid| sid.0).collect(),
    };
    writer.render(&report)?;
    Ok(())
}

/// Result of resolving one port.
#[derive(Serialize)]
pub struct LookupReport {
    pub port: u16,
    pub protocol: Protocol,
    pub direction: Direction,
    pub group: Option<String>,
    pub group_ports: Vec<String>,
    pub signatures: Vec<u32>,
}

impl Render for LookupReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Port {} ({} {})",
            self.port.to_string().bold(),
            self.protocol,
            self.direction
        )?;

        match &self.group {
            Some(group) => {
                writeln!(w, "  Group: {} [{}]", group.cyan(), self.group_ports.join(","))?;
                let sids: Vec<String> = self.signatures.iter().map(u32::to_string).collect();
                writeln!(w, "  Signatures ({}): {}", sids.len(), sids.join(", "))?;
            }
            None => writeln!(w, "  Group: {}", "none".yellow())?,
        }
        Ok(())
    }
}
