use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Term,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "squirrel",
    bin_name = "squirrel",
    version,
    disable_help_subcommand = true,
    about = "Save, compare and restore snapshots of process variables",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: $SQUIRREL_CFG, ./.squirrel.toml, user config dir)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub config: Option<PathBuf>,

    /// More log output on stderr (repeat for more)
    #[arg(short, long, global = true, action = ArgAction::Count, help_heading = "Options")]
    pub verbose: u8,

    /// Output format
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputMode::Term,
        help_heading = "Options"
    )]
    pub output: OutputMode,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List active PVs
    #[command(alias = "ls", display_order = 1)]
    Pvs,

    /// Search PVs and snapshots with ATTR OP VALUE triples
    #[command(display_order = 2, after_help = SEARCH_HELP)]
    Search {
        /// e.g. `setpoint like ^MGNT tags gt 0:1 setpoint_data.data isclose 10,0,0.5`
        #[arg(required = true, num_args = 3.., value_names = ["ATTR", "OP", "VALUE"])]
        terms: Vec<String>,
    },

    /// Show one PV or snapshot
    #[command(alias = "v", display_order = 3)]
    Show { id: Uuid },

    /// Add a PV
    #[command(display_order = 10)]
    AddPv {
        #[arg(long)]
        setpoint: Option<String>,

        #[arg(long)]
        readback: Option<String>,

        #[arg(long)]
        config_address: Option<String>,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(long)]
        device: Option<String>,

        /// Tags as `group:tag,tag;group:tag`
        #[arg(long)]
        tags: Option<String>,

        #[arg(long, default_value_t = 0.0)]
        abs_tolerance: f64,

        #[arg(long, default_value_t = 0.0)]
        rel_tolerance: f64,
    },

    /// Change fields of a PV
    #[command(display_order = 11)]
    EditPv {
        id: Uuid,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        device: Option<String>,

        /// Tags as `group:tag,tag;group:tag`
        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        abs_tolerance: Option<f64>,

        #[arg(long)]
        rel_tolerance: Option<f64>,
    },

    /// Archive a PV, keeping it for the snapshots that captured it
    #[command(display_order = 12)]
    Archive { id: Uuid },

    /// Delete a PV or snapshot
    #[command(alias = "rm", display_order = 13)]
    Delete { id: Uuid },

    /// Import PVs from a CSV file
    #[command(display_order = 14)]
    Import { path: PathBuf },

    /// List snapshots
    #[command(display_order = 20)]
    Snapshots {
        /// Only titles containing this text
        #[arg(long)]
        title: Option<String>,
    },

    /// Capture live values into a new snapshot
    #[command(display_order = 21)]
    Snap {
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Print the snapshot without saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// Write a snapshot's (or PV's) setpoints back
    #[command(display_order = 22)]
    Apply {
        id: Uuid,

        /// One write at a time, stopping at the first failure
        #[arg(long)]
        sequential: bool,
    },

    /// Compare two snapshots
    #[command(display_order = 23)]
    Diff {
        main: Uuid,
        other: Uuid,

        /// Include rows that match
        #[arg(short, long)]
        all: bool,
    },

    /// Manage tag groups and tags
    #[command(display_order = 30)]
    Tags {
        #[command(subcommand)]
        action: Option<TagCommands>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// Show every group and its tags (default)
    List,

    /// Create a tag group
    AddGroup {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Rename a group or change its description
    EditGroup {
        group: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a group, dropping its tags from every PV
    DeleteGroup { group: u32 },

    /// Add a tag to a group
    AddTag { group: u32, name: String },

    /// Rename a tag
    RenameTag { group: u32, tag: u32, name: String },

    /// Delete a tag, dropping it from every PV
    DeleteTag { group: u32, tag: u32 },
}

const SEARCH_HELP: &str = "\
Operators:
  eq, lt, gt, in, like   compared with the attribute's stored value
  isclose                VALUE is target[,rel_tol[,abs_tol]]

Terms are ANDed. `in` takes a comma separated list. Tag sets are written
as group:tag,tag;group:tag using numeric ids (see `squirrel tags`).";

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_collects_triples() {
        let cli = Cli::parse_from([
            "squirrel", "search", "setpoint", "like", "MGNT", "tags", "gt", "0:1",
        ]);
        match cli.command {
            Commands::Search { terms } => assert_eq!(terms.len(), 6),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["squirrel", "pvs", "-vv", "--output", "json"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, OutputMode::Json);
    }

    #[test]
    fn test_tags_defaults_to_list() {
        let cli = Cli::parse_from(["squirrel", "tags"]);
        assert!(matches!(cli.command, Commands::Tags { action: None }));
    }
}
