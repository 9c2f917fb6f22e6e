//! Command-line surface of the `clayfab` binary.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use clayfab_rrc::Controller;

pub mod commands;
pub mod exit_codes;
pub mod logging;
pub mod operator;

#[derive(Debug, Parser)]
#[command(name = "clayfab", version, about = "Robotic pick-and-place of compressed clay cylinders")]
pub struct Cli {
    /// Configuration file (YAML). Missing file means defaults.
    #[arg(long, global = true, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Controller to talk to, overriding the configuration.
    #[arg(short, long, global = true, value_enum)]
    pub controller: Option<ControllerArg>,

    /// More logging, repeat for trace.
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Place every element of a run-data file.
    #[command(name = "fabrication", alias = "fab")]
    Fabrication(FabricationArgs),

    /// Move to a named or explicit joint position.
    #[command(name = "go_to_joint_pos", alias = "goto")]
    GoToJointPos(GoToArgs),

    /// Record frames from the controller, one per Enter.
    #[command(name = "record_poses", alias = "rec")]
    RecordPoses(RecordArgs),

    /// CAD-side RPC proxy.
    #[command(name = "proxy", alias = "rpc")]
    Proxy,
}

#[derive(Debug, Args)]
pub struct FabricationArgs {
    /// Run-data JSON. Defaults to `run_data_path` from the configuration.
    pub run_data: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct GoToArgs {
    /// Configured position to move to.
    #[arg(value_enum, default_value_t = NamedPosition::Start, conflicts_with = "joints")]
    pub position: NamedPosition,

    /// Six joint values in degrees.
    #[arg(long, num_args = 6, allow_hyphen_values = true, value_name = "DEG")]
    pub joints: Option<Vec<f64>>,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Where to write the recorded frames.
    #[arg(short, long, default_value = "recorded_frames.json")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ControllerArg {
    Real,
    Virtual,
}

impl From<ControllerArg> for Controller {
    fn from(arg: ControllerArg) -> Self {
        match arg {
            ControllerArg::Real => Controller::Real,
            ControllerArg::Virtual => Controller::Virtual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NamedPosition {
    Start,
    End,
    Travel,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aliases_and_globals() {
        let cli = Cli::try_parse_from(["clayfab", "-vv", "fab", "wall.json", "-c", "real"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.controller, Some(ControllerArg::Real));
        match cli.command {
            Command::Fabrication(args) => assert_eq!(args.run_data, Some(PathBuf::from("wall.json"))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_goto_explicit_joints() {
        let cli = Cli::try_parse_from(["clayfab", "goto", "--joints", "-10", "0", "0", "0", "90", "0"]).unwrap();
        match cli.command {
            Command::GoToJointPos(args) => {
                assert_eq!(args.joints, Some(vec![-10.0, 0.0, 0.0, 0.0, 90.0, 0.0]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["clayfab", "-v", "-q", "proxy"]).is_err());
    }
}
