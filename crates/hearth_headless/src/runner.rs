//! Headless game runner implementation.
//!
//! Two drivers share one [`Simulation`]:
//!
//! - [`run_match`] plays a scenario for a fixed number of ticks, writing a
//!   JSON stats line every simulated second.
//! - [`Session`] serves the JSON-lines protocol for an external controller.

use std::io::{self, BufRead, Write};

use hearth_core::events::{StatsSnapshot, TickEvents};
use hearth_core::math::Vec2Fixed;
use hearth_core::simulation::Simulation;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::protocol::{merge_events, Request, Response};

/// Totals gathered over a headless match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Ticks simulated.
    pub ticks: u64,
    /// Units spawned by growth or training.
    pub units_spawned: usize,
    /// Unit deaths on any side.
    pub unit_deaths: usize,
    /// Buildings raised after setup.
    pub buildings_constructed: usize,
    /// Buildings demolished or destroyed.
    pub buildings_destroyed: usize,
    /// Trees felled by lumber mills.
    pub trees_felled: usize,
    /// Volleys fired.
    pub volleys_launched: usize,
    /// Commands rejected.
    pub commands_rejected: usize,
    /// Attack waves the opponent sent.
    pub waves_launched: u32,
    /// Final settlement overview.
    pub final_stats: Option<StatsSnapshot>,
    /// Final state hash.
    pub state_hash: u64,
}

impl MatchSummary {
    fn record(&mut self, events: &TickEvents) {
        self.ticks += 1;
        self.units_spawned += events.units_spawned.len();
        self.unit_deaths += events.unit_deaths.len();
        self.buildings_constructed += events.buildings_constructed.len();
        self.buildings_destroyed += events.buildings_destroyed.len();
        self.trees_felled += events.trees_felled.len();
        self.volleys_launched += events.volleys_launched;
        self.commands_rejected += events.rejected.len();
    }
}

/// Play `ticks` ticks, writing one JSON [`StatsSnapshot`] per simulated
/// second to `out`.
///
/// # Errors
///
/// Fails only when `out` cannot be written.
pub fn run_match<W: Write>(sim: &mut Simulation, ticks: u64, out: &mut W) -> io::Result<MatchSummary> {
    let cadence = sim.world().config.fast_cadence();
    let mut summary = MatchSummary::default();

    info!(ticks, seed = sim.world().config.seed, "Starting match");
    for _ in 0..ticks {
        let events = sim.tick();
        summary.record(&events);
        if sim.get_tick() % cadence == 0 {
            let line = serde_json::to_string(&sim.stats()).map_err(io::Error::other)?;
            writeln!(out, "{line}")?;
        }
    }
    out.flush()?;

    summary.waves_launched = sim.opponent().waves_launched();
    summary.final_stats = Some(sim.stats());
    summary.state_hash = sim.state_hash();
    info!(
        ticks = summary.ticks,
        population = sim.stats().population,
        deaths = summary.unit_deaths,
        waves = summary.waves_launched,
        hash = summary.state_hash,
        "Match finished"
    );
    Ok(summary)
}

/// An interactive protocol session around one simulation.
#[derive(Debug)]
pub struct Session {
    sim: Simulation,
    finished: bool,
}

impl Session {
    /// Wrap a simulation.
    #[must_use]
    pub const fn new(sim: Simulation) -> Self {
        Self { sim, finished: false }
    }

    /// The simulation being driven.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Whether a `quit` request has been served.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Serve one request.
    pub fn handle(&mut self, request: &Request) -> Response {
        if let Some(command) = request.to_command() {
            debug!(cmd = request.name(), "Queued command");
            self.sim.issue(command);
            return Response::queued(request.name());
        }

        match request {
            Request::Tick { count } => {
                let mut events = TickEvents::default();
                for _ in 0..*count {
                    merge_events(&mut events, self.sim.tick());
                }
                Response::Ticked {
                    tick: self.sim.get_tick(),
                    events,
                }
            }
            Request::Stats => Response::Stats { stats: self.sim.stats() },
            Request::Preview { x, y } => {
                let preview = self.sim.placement_preview(Vec2Fixed::from_ints(*x, *y));
                Response::preview(preview.as_ref())
            }
            Request::Hash => Response::StateHash {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            },
            Request::Quit => {
                self.finished = true;
                Response::Bye
            }
            _ => Response::error("request has no handler", Some(request.name())),
        }
    }

    /// Serve one raw JSON line; blank lines produce no response.
    pub fn handle_line(&mut self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match Request::from_json(line) {
            Ok(request) => Some(self.handle(&request)),
            Err(e) => {
                warn!(error = %e, "Unparseable request");
                Some(Response::error(format!("Parse error: {e}"), None))
            }
        }
    }

    /// Serve requests from `input` until `quit` or end of input.
    ///
    /// # Errors
    ///
    /// Fails when reading `input` or writing `output` fails.
    pub fn serve<R: BufRead, W: Write>(&mut self, input: R, output: &mut W) -> io::Result<()> {
        output.write_all(Response::ready(self.sim.get_tick()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            if let Some(response) = self.handle_line(&line) {
                output.write_all(response.to_json_line().as_bytes())?;
                output.flush()?;
            }
            if self.finished {
                return Ok(());
            }
        }
        info!(tick = self.sim.get_tick(), "Input closed");
        output.write_all(Response::Bye.to_json_line().as_bytes())?;
        output.flush()
    }
}
