use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::error::Error;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracemon::buffer::{PushStatus, TraceBuffer};
use tracemon::clock::{Clock, MonotonicClock};
use tracemon::monitor::{FormulaMonitor, PeriodicTask, SchedulePolicy};
use tracemon::mtl::{Formula, TimeBound, Verdict};
use tracemon::writer::Writer;

// --- Configuration Constants ---
/// Events the simulated controller keeps in flight.
const CAPACITY: usize = 256;
/// Monitor releases per second.
const RATE: u64 = 20;
/// How long the demo runs.
const RUN_TIME: Duration = Duration::from_secs(6);
/// Evaluation lags behind the clock so the response window is covered.
const LAG: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Door {
    Request,
    Open,
    Closed,
}

impl Display for Door {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Door::Request => write!(f, "request"),
            Door::Open => write!(f, "open"),
            Door::Closed => write!(f, "closed"),
        }
    }
}

/// A door controller that answers requests after a noisy delay.
struct DoorSimulator {
    rng: ThreadRng,
    response: Normal<f64>,
}

impl DoorSimulator {
    fn new(mean: f64, std_dev: f64) -> Result<Self, rand_distr::NormalError> {
        Ok(DoorSimulator {
            rng: rand::rng(),
            response: Normal::new(mean, std_dev)?,
        })
    }

    fn response_delay(&mut self) -> Duration {
        Duration::from_secs_f64(self.response.sample(&mut self.rng).max(0.0))
    }

    fn idle_delay(&mut self) -> Duration {
        Duration::from_millis(self.rng.random_range(200..600))
    }
}

fn get_formula() -> Formula<Door> {
    // request -> F<1.5 open
    Formula::implies(
        Formula::prop(Door::Request),
        Formula::eventually(
            TimeBound::Less(Duration::from_millis(1500)),
            Formula::prop(Door::Open),
        ),
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let buffer = TraceBuffer::new(CAPACITY)?;
    let clock = MonotonicClock::new();
    let stop = AtomicBool::new(false);

    let mut monitor = FormulaMonitor::builder()
        .formula(get_formula())
        .period(Duration::from_millis(1000 / RATE))
        .policy(SchedulePolicy::Fifo)
        .priority(50)
        .build(&buffer)?;
    println!("Monitoring formula: {}", monitor.formula());
    println!("{}", monitor.formula().to_tree_string(2));

    std::thread::scope(|s| -> Result<(), Box<dyn Error + Send + Sync>> {
        let controller = s.spawn(|| -> Result<(), Box<dyn Error + Send + Sync>> {
            let mut simulator = DoorSimulator::new(1.0, 0.4)?;
            let mut writer = Writer::with_clock(&buffer, clock);
            while !stop.load(Ordering::Relaxed) {
                let _ = writer.push(Door::Request)?;
                std::thread::sleep(simulator.response_delay());
                let _ = writer.push(Door::Open)?;
                std::thread::sleep(simulator.idle_delay());
                if writer.push(Door::Closed)? == PushStatus::Overflow {
                    tracing::info!("monitor is falling behind the controller");
                }
                std::thread::sleep(simulator.idle_delay());
            }
            Ok(())
        });

        let mut counts = [0usize; 3];
        while clock.now() < RUN_TIME {
            std::thread::sleep(monitor.period());
            let Some(origin) = clock.now().checked_sub(LAG) else {
                continue;
            };
            monitor.set_origin(origin);
            let verdict = monitor.run();
            counts[verdict as usize] += 1;
            if verdict == Verdict::False {
                println!("late response at {:.2}s", origin.as_secs_f64());
            }
        }
        stop.store(true, Ordering::Relaxed);
        println!(
            "verdicts: {} true, {} false, {} unknown",
            counts[Verdict::True as usize],
            counts[Verdict::False as usize],
            counts[Verdict::Unknown as usize]
        );

        controller
            .join()
            .map_err(|_| "controller thread panicked")??;
        Ok(())
    })
    .map_err(|e| e as Box<dyn Error>)
}
