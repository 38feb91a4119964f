//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use portcullis_core::types::{Direction, PortRange, Protocol};

/// Portcullis -- signature port-group compiler.
///
/// Use `portcullis <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "portcullis", version, about, long_about = None)]
pub struct Cli {
    /// Path to the portcullis.toml configuration file.
    #[arg(short, long, global = true, default_value = "portcullis.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build port groups and print them.
    Group(GroupArgs),

    /// Show the group and signatures that apply to one port.
    Lookup(LookupArgs),

    /// List signatures whose port ranges overlap a range.
    Overlaps(OverlapsArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

/// Transport protocol selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolArg {
    Tcp,
    Udp,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Tcp => Protocol::Tcp,
            ProtocolArg::Udp => Protocol::Udp,
        }
    }
}

/// Flow direction selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    ToServer,
    ToClient,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::ToServer => Direction::ToServer,
            DirectionArg::ToClient => Direction::ToClient,
        }
    }
}

/// Options shared by every command that builds from a signature inventory.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Signature inventory file (default: `signatures.path` from config).
    #[arg(short, long)]
    pub signatures: Option<PathBuf>,

    /// Transport protocol.
    #[arg(short, long, value_enum, default_value = "tcp")]
    pub protocol: ProtocolArg,

    /// Flow direction the groups are built for.
    #[arg(short, long, value_enum, default_value = "to-server")]
    pub direction: DirectionArg,
}

// ---- group ----

/// Build port groups for one protocol and direction.
#[derive(Args, Debug)]
pub struct GroupArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

// ---- lookup ----

/// Resolve a single port through the dispatch table.
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Port number (0-65535).
    pub port: u16,

    #[command(flatten)]
    pub target: TargetArgs,
}

// ---- overlaps ----

/// Query the interval tree directly.
#[derive(Args, Debug)]
pub struct OverlapsArgs {
    /// Port range: `any`, `80`, `80:90`, `1024:` or `:1023`.
    pub range: PortRange,

    #[command(flatten)]
    pub target: TargetArgs,
}

// ---- config ----

/// Manage portcullis configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, grouping, signatures).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_group_defaults() {
        let cli = Cli::try_parse_from(["portcullis", "group"]).expect("parse succeeded");
        match cli.command {
            Commands::Group(args) => {
                assert!(args.target.signatures.is_none());
                assert_eq!(args.target.protocol, ProtocolArg::Tcp);
                assert_eq!(args.target.direction, DirectionArg::ToServer);
            }
            _ => panic!("expected Group command"),
        }
        assert_eq!(cli.config, PathBuf::from("portcullis.toml"));
    }

    #[test]
    fn test_cli_parse_group_with_target() {
        let cli = Cli::try_parse_from([
            "portcullis",
            "group",
            "--signatures",
            "/tmp/sigs.toml",
            "--protocol",
            "udp",
            "--direction",
            "to-client",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Group(args) => {
                assert_eq!(args.target.signatures, Some(PathBuf::from("/tmp/sigs.toml")));
                assert_eq!(Protocol::from(args.target.protocol), Protocol::Udp);
                assert_eq!(Direction::from(args.target.direction), Direction::ToClient);
            }
            _ => panic!("expected Group command"),
        }
    }

    #[test]
    fn test_cli_parse_lookup_port() {
        let cli = Cli::try_parse_from(["portcullis", "lookup", "443"]).expect("parse succeeded");
        match cli.command {
            Commands::Lookup(args) => assert_eq!(args.port, 443),
            _ => panic!("expected Lookup command"),
        }
    }

    #[test]
    fn test_cli_rejects_out_of_range_port() {
        assert!(Cli::try_parse_from(["portcullis", "lookup", "70000"]).is_err());
    }

    #[test]
    fn test_cli_parse_overlaps_range() {
        let cli =
            Cli::try_parse_from(["portcullis", "overlaps", "1024:"]).expect("parse succeeded");
        match cli.command {
            Commands::Overlaps(args) => {
                assert_eq!(args.range, PortRange::new(1024, 65535).expect("valid range"));
            }
            _ => panic!("expected Overlaps command"),
        }
    }

    #[test]
    fn test_cli_rejects_inverted_range() {
        assert!(Cli::try_parse_from(["portcullis", "overlaps", "90:80"]).is_err());
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["portcullis", "config", "show", "--section", "grouping"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(args) => match args.action {
                ConfigAction::Show { section } => {
                    assert_eq!(section, Some("grouping".to_owned()));
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "portcullis",
            "lookup",
            "53",
            "--output",
            "json",
            "--log-level",
            "debug",
            "-c",
            "/etc/portcullis/portcullis.toml",
        ])
        .expect("parse succeeded");
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.log_level, Some("debug".to_owned()));
        assert_eq!(cli.config, PathBuf::from("/etc/portcullis/portcullis.toml"));
    }

    #[test]
    fn test_cli_invalid_output_format() {
        assert!(Cli::try_parse_from(["portcullis", "--output", "yaml", "group"]).is_err());
    }
}
