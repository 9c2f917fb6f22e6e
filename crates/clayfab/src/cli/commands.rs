use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clayfab::{CancelFlag, Config, RobotClientConfig, Runner, atomic_write_json, preflight};
use clayfab_robotics::{Frame, JointConfiguration};
use clayfab_rrc::{
    DockerComposeSupervisor, DriverSupervisor, Instruction, InstructionChannel, NoopSupervisor, RosBridgeClient, Zone,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use super::exit_codes::codes;
use super::operator::StdinOperator;
use super::{Cli, Command, FabricationArgs, GoToArgs, NamedPosition, RecordArgs, logging};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Fabrication(args) => fabrication(&cli, args).await,
        Command::GoToJointPos(args) => go_to_joint_pos(&cli, args).await,
        Command::RecordPoses(args) => record_poses(&cli, args).await,
        Command::Proxy => bail!("The RPC proxy runs inside the modelling tool; start it from there."),
    }
}

/// Configuration file with the command-line controller applied.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(controller) = cli.controller {
        config.robot_client.controller = controller.into();
    }
    Ok(config)
}

fn supervisor_for(rc: &RobotClientConfig) -> Box<dyn DriverSupervisor> {
    if !rc.docker.manage {
        return Box::new(NoopSupervisor);
    }
    Box::new(DockerComposeSupervisor::new(
        rc.docker.compose_file.clone(),
        Duration::from_secs_f64(rc.docker.sleep_after_up),
    ))
}

fn init_logging(cli: &Cli, log_dir: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = logging::init(cli.verbose, cli.quiet, log_dir)? {
        info!("📝 Logging to {}", path.display());
    }
    Ok(())
}

/// The first interrupt cancels the run. Returns true on a second one, when
/// the operator wants out without waiting for teardown.
async fn watch_interrupts<S, F>(mut next_signal: S, cancel: CancelFlag) -> bool
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_signal().await {
        warn!("Could not listen for interrupts: {}", e);
        return false;
    }
    warn!("🛑 Interrupt received, stopping after the current step (Ctrl-C again quits now)");
    cancel.cancel();
    next_signal().await.is_ok()
}

async fn fabrication(cli: &Cli, args: &FabricationArgs) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let input = args
        .run_data
        .clone()
        .or_else(|| config.run_data_path.clone())
        .ok_or_else(|| anyhow!("no run data file given and no run_data_path configured"))?;

    let mut runner = Runner::load(&input, config).with_context(|| format!("loading {}", input.display()))?;
    if let Some(controller) = cli.controller {
        runner.set_controller(controller.into());
    }
    init_logging(cli, runner.log_dir().as_deref())?;
    info!(
        "📂 Run data {} ({} elements), progress goes to {}",
        input.display(),
        runner.run_data().fab_data.len(),
        runner.progress_path().display()
    );

    let rc = runner.config().robot_client.clone();
    let channel = RosBridgeClient::connect(rc.bridge_settings())?;
    let supervisor = supervisor_for(&rc);

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, on_signal).await {
            error!("🛑 Second interrupt, quitting without teardown");
            std::process::exit(codes::CANCELLED.into());
        }
    });

    let summary = runner.run(&channel, &*supervisor, &mut StdinOperator, &cancel).await?;
    println!(
        "Placed {}/{} elements, results in {}",
        summary.placed,
        summary.total,
        summary.done_path.display()
    );
    Ok(())
}

async fn go_to_joint_pos(cli: &Cli, args: &GoToArgs) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    init_logging(cli, config.log_dir.as_deref())?;
    let rc = &config.robot_client;
    let positions = &rc.robot_movement.joint_positions;

    let joints = match &args.joints {
        Some(values) => JointConfiguration::from_degrees(values)?,
        None => match args.position {
            NamedPosition::Start => positions.start()?,
            NamedPosition::End => positions.end()?,
            NamedPosition::Travel => positions.travel()?,
        },
    };

    let channel = RosBridgeClient::connect(rc.bridge_settings())?;
    let result = async {
        preflight(&channel, &*supervisor_for(rc), rc.controller, &rc.connection_policy()).await?;
        info!("🦾 Moving to {:?} deg", joints.degrees());
        let command = Instruction::MoveToJoints {
            joints,
            speed: rc.robot_movement.speed.travel,
            zone: Zone::FINE,
        };
        channel.send_and_wait(command.into(), None).await?;
        anyhow::Ok(())
    }
    .await;
    channel.close().await;
    result
}

async fn record_poses(cli: &Cli, args: &RecordArgs) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    init_logging(cli, config.log_dir.as_deref())?;
    let rc = &config.robot_client;
    let limit = rc.connection_policy().ping_timeout;

    let channel = RosBridgeClient::connect(rc.bridge_settings())?;
    let result = async {
        preflight(&channel, &*supervisor_for(rc), rc.controller, &rc.connection_policy()).await?;
        println!("Jog the robot, then press Enter to record a frame. 'q' + Enter saves and quits.");

        let mut frames: Vec<Frame> = Vec::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().eq_ignore_ascii_case("q") {
                break;
            }
            let frame = channel.send_and_wait(Instruction::GetFrame.into(), Some(limit)).await?.frame()?;
            let joints = channel.send_and_wait(Instruction::GetJoints.into(), Some(limit)).await?.joints()?;
            info!("📍 Frame {}: {} at joints {:?} deg", frames.len(), frame, joints.degrees());
            frames.push(frame);
        }

        atomic_write_json(&args.output, &frames)?;
        println!("Wrote {} frames to {}", frames.len(), args.output.display());
        anyhow::Ok(())
    }
    .await;
    channel.close().await;
    result
}
