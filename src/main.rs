// src/main.rs
// Entry point for the teleop tool: parses the operator's flags, validates them and
// runs one command against the simulated robot services.

use clap::Parser;
use log::{error, info};
use mobility_teleop::{
    command::YamlSegmentStore,
    sim::{RecordingReconfigure, SimSettings, SimulatedMotion, SimulatedSwitch, StaticPose},
    Collaborators, OperatorRequest, Orchestrator, RunOutcome, TeleopConfig, TeleopError,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line tool for sending mobility commands to a free-flyer
#[derive(Parser, Debug)]
#[command(name = env!("CARGO_BIN_NAME"), version)]
struct Args {
    /// YAML configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Robot namespace
    #[arg(long)]
    ns: Option<String>,
    /// Localization pipeline (none, ml, ar, hr)
    #[arg(long)]
    loc: Option<String>,
    /// Flight mode
    #[arg(long)]
    mode: Option<String>,
    /// Path planning algorithm
    #[arg(long)]
    planner: Option<String>,
    /// Plan in face-forward mode
    #[arg(long)]
    ff: bool,
    /// Segment sampling rate
    #[arg(long, allow_negative_numbers = true)]
    rate: Option<f64>,
    /// Desired velocity
    #[arg(long, allow_negative_numbers = true)]
    vel: Option<f64>,
    /// Desired acceleration
    #[arg(long, allow_negative_numbers = true)]
    accel: Option<f64>,
    /// Desired angular velocity
    #[arg(long, allow_negative_numbers = true)]
    omega: Option<f64>,
    /// Desired angular acceleration
    #[arg(long, allow_negative_numbers = true)]
    alpha: Option<f64>,
    /// Send move command
    #[arg(long = "move")]
    move_to: bool,
    /// Send stop command
    #[arg(long)]
    stop: bool,
    /// Send idle command
    #[arg(long)]
    idle: bool,
    /// Send prep command
    #[arg(long)]
    prep: bool,
    /// Don't validate the segment before running
    #[arg(long)]
    novalidate: bool,
    /// Don't check for collisions during action
    #[arg(long)]
    nocollision: bool,
    /// Don't move to the starting station on execute
    #[arg(long)]
    nobootstrap: bool,
    /// Don't execute immediately
    #[arg(long)]
    noimmediate: bool,
    /// Enable replanning
    #[arg(long)]
    replan: bool,
    /// Enable time synchronization
    #[arg(long)]
    timesync: bool,
    /// Plan and record to this file
    #[arg(long)]
    rec: Option<PathBuf>,
    /// Execute a given segment
    #[arg(long)]
    exec: Option<PathBuf>,
    /// Desired position in cartesian format 'X Y Z' (meters)
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pos: String,
    /// Desired attitude, 'angle X Y Z' or a yaw angle (radians)
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    att: String,
    /// Defer move by given amount in seconds (needs --noimmediate)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    wait: f64,
    /// Action connect timeout
    #[arg(long, allow_negative_numbers = true)]
    connect: Option<f64>,
    /// Action active timeout
    #[arg(long, allow_negative_numbers = true)]
    active: Option<f64>,
    /// Action response timeout
    #[arg(long, allow_negative_numbers = true)]
    response: Option<f64>,
    /// Action deadline timeout
    #[arg(long, allow_negative_numbers = true)]
    deadline: Option<f64>,
}

impl Args {
    fn load_config(&self) -> Result<TeleopConfig, TeleopError> {
        let mut config = match &self.config {
            Some(path) => TeleopConfig::from_yaml_file(path)?,
            None => TeleopConfig::default(),
        };

        let timeouts = &mut config.timeouts;
        for (slot, flag) in [
            (&mut timeouts.connect, self.connect),
            (&mut timeouts.active, self.active),
            (&mut timeouts.response, self.response),
            (&mut timeouts.deadline, self.deadline),
        ] {
            if let Some(value) = flag {
                *slot = value;
            }
        }

        if let Some(ns) = &self.ns {
            config.frames.namespace = ns.clone();
        }
        if let Some(mode) = &self.mode {
            config.flight_mode = mode.clone();
        }

        let planner = &mut config.planner;
        if let Some(name) = &self.planner {
            planner.planner = name.clone();
        }
        for (slot, flag) in [
            (&mut planner.desired_rate, self.rate),
            (&mut planner.desired_vel, self.vel),
            (&mut planner.desired_accel, self.accel),
            (&mut planner.desired_omega, self.omega),
            (&mut planner.desired_alpha, self.alpha),
        ] {
            if flag.is_some() {
                *slot = flag;
            }
        }
        planner.face_forward |= self.ff;
        planner.replanning |= self.replan;
        planner.timesync |= self.timesync;
        planner.validation &= !self.novalidate;
        planner.collision_checking &= !self.nocollision;
        planner.bootstrapping &= !self.nobootstrap;
        planner.immediate &= !self.noimmediate;

        config.validate()?;
        Ok(config)
    }

    fn operator_request(&self) -> OperatorRequest {
        OperatorRequest {
            pipeline: self.loc.clone(),
            move_to: self.move_to,
            stop: self.stop,
            idle: self.idle,
            prep: self.prep,
            execute: self.exec.clone(),
            record: self.rec.clone(),
            position: self.pos.clone(),
            attitude: self.att.clone(),
            wait: self.wait,
        }
    }
}

fn run(args: Args) -> Result<RunOutcome, TeleopError> {
    let config = args.load_config()?;
    let request = args.operator_request().validate()?;

    let collaborators = Collaborators {
        poses: Box::new(StaticPose::default()),
        store: Box::new(YamlSegmentStore),
        planner: Box::new(RecordingReconfigure::default()),
    };
    let orchestrator = Orchestrator::new(
        config,
        request,
        SimulatedSwitch::new(SimSettings::default()),
        SimulatedMotion::new(SimSettings::default()),
        collaborators,
    )?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(orchestrator.run())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("Starting teleop...");
    match run(args) {
        Ok(outcome) => {
            println!("{}", outcome);
            if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
