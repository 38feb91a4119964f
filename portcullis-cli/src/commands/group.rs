//! `portcullis group` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use portcullis_core::config::PortcullisConfig;
use portcullis_core::types::{Direction, Protocol};
use portcullis_port_grouping::{PortGroupBuilder, PortGroupMap};

use crate::cli::GroupArgs;
use crate::commands::load_signatures;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `group` command.
pub async fn execute(
    args: GroupArgs,
    config: &PortcullisConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let signatures = load_signatures(&args.target, config).await?;
    let protocol = Protocol::from(args.target.protocol);
    let direction = Direction::from(args.target.direction);

    let map = PortGroupBuilder::from_config(protocol, direction, &config.grouping)
        .build(&signatures)?;
    info!(%protocol, %direction, groups = map.len(), "port groups built");

    let report = GroupReport::new(&map, signatures.len(), config);
    writer.render(&report)?;
    Ok(())
}

/// Port-group listing for one protocol and direction.
#[derive(Serialize)]
pub struct GroupReport {
    pub protocol: Protocol,
    pub direction: Direction,
    pub signatures: usize,
    pub limit: usize,
    pub covered_ports: u32,
    pub groups: Vec<GroupEntry>,
}

/// One row of the group listing.
#[derive(Serialize)]
pub struct GroupEntry {
    pub id: String,
    pub ports: Vec<String>,
    pub signatures: Vec<u32>,
    pub whitelisted: bool,
}

impl GroupReport {
    fn new(map: &PortGroupMap, signature_count: usize, config: &PortcullisConfig) -> Self {
        Self {
            protocol: map.protocol(),
            direction: map.direction(),
            signatures: signature_count,
            limit: config.grouping.limits().for_direction(map.direction()),
            covered_ports: map.table().covered_ports(),
            groups: map
                .groups()
                .iter()
                .map(|g| GroupEntry {
                    id: g.id.to_string(),
                    ports: g.ranges.iter().map(ToString::to_string).collect(),
                    signatures: g.signatures.iter().map(|sid| sid.0).collect(),
                    whitelisted: g.whitelisted,
                })
                .collect(),
        }
    }
}

impl Render for GroupReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Port groups: {} {} ({} of max {}, {} signatures, {} ports covered)",
            self.protocol.as_str().bold(),
            self.direction.as_str().bold(),
            self.groups.len(),
            self.limit,
            self.signatures,
            self.covered_ports
        )?;

        if self.groups.is_empty() {
            writeln!(w, "  (no groups)")?;
            return Ok(());
        }

        writeln!(w, "{:<6} {:<5} {:<9} {}", "GROUP", "WL", "SIGS", "PORTS")?;
        writeln!(w, "{}", "-".repeat(60))?;
        for g in &self.groups {
            let wl = if g.whitelisted {
                "yes".green().to_string()
            } else {
                "-".to_owned()
            };
            writeln!(
                w,
                "{:<6} {:<5} {:<9} {}",
                g.id,
                wl,
                g.signatures.len(),
                g.ports.join(",")
            )?;
        }
        Ok(())
    }
}
