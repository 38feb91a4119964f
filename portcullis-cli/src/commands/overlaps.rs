//! `portcullis overlaps` command handler

use std::io::Write;

use serde::Serialize;

use portcullis_core::config::PortcullisConfig;
use portcullis_core::types::{Direction, PortRange, Protocol};
use portcullis_port_grouping::PortGroupBuilder;

use crate::cli::OverlapsArgs;
use crate::commands::load_signatures;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `overlaps` command.
pub async fn execute(
    args: OverlapsArgs,
    config: &PortcullisConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let signatures = load_signatures(&args.target, config).await?;
    let protocol = Protocol::from(args.target.protocol);
    let direction = Direction::from(args.target.direction);

    let sids = PortGroupBuilder::from_config(protocol, direction, &config.grouping)
        .overlapping_signatures(&signatures, args.range)?;

    let report = OverlapReport {
        range: args.range,
        protocol,
        direction,
        signatures: sids
            .into_iter()
            .filter_map(|sid| signatures.find(sid))
            .map(|sig| OverlapEntry {
                sid: sig.sid.0,
                msg: sig.msg.clone(),
                ports: sig
                    .ports_for(direction)
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            })
            .collect(),
    };
    writer.render(&report)?;
    Ok(())
}

/// Signatures whose declared ports overlap the queried range.
#[derive(Serialize)]
pub struct OverlapReport {
    pub range: PortRange,
    pub protocol: Protocol,
    pub direction: Direction,
    pub signatures: Vec<OverlapEntry>,
}

#[derive(Serialize)]
pub struct OverlapEntry {
    pub sid: u32,
    pub msg: String,
    pub ports: Vec<String>,
}

impl Render for OverlapReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Signatures overlapping {} ({} {}): {}",
            self.range.to_string().bold(),
            self.protocol,
            self.direction,
            self.signatures.len()
        )?;
        for sig in &self.signatures {
            writeln!(
                w,
                "  {:<10} {:<20} {}",
                sig.sid,
                sig.ports.join(","),
                sig.msg.dimmed()
            )?;
        }
        Ok(())
    }
}
