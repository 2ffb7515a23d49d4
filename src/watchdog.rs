use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bon::Builder;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::handlers::{Intent, send_intent};
use crate::hw::DeviceSession;
use crate::reading::PowerSwitchState;

const DEFAULT_TICK: Duration = Duration::from_secs(1);
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10);
const DEFAULT_TRAILING_REFRESH_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(10);
const DEFAULT_CYCLE_MODULUS: u8 = 100;

/// Timing for the watchdog loop.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Builder)]
pub struct WatchdogConfig {
    /// Period between checks.
    #[builder(default = DEFAULT_TICK)]
    tick: Duration,
    /// A refresh is sent once no reading has arrived for longer than this.
    #[builder(default = DEFAULT_STALE_AFTER)]
    stale_after: Duration,
    /// Delay between a policy command and its follow-up refresh.
    #[builder(default = DEFAULT_TRAILING_REFRESH_DELAY)]
    trailing_refresh_delay: Duration,
    /// How far in the future the liveness clock starts.
    #[builder(default = DEFAULT_STARTUP_GRACE)]
    startup_grace: Duration,
    /// Number of distinct cycle values before the counter wraps.
    #[builder(default = DEFAULT_CYCLE_MODULUS)]
    cycle_modulus: u8,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl WatchdogConfig {
    #[must_use]
    pub fn tick(&self) -> Duration {
        self.tick
    }

    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    #[must_use]
    pub fn trailing_refresh_delay(&self) -> Duration {
        self.trailing_refresh_delay
    }

    #[must_use]
    pub fn startup_grace(&self) -> Duration {
        self.startup_grace
    }

    #[must_use]
    pub fn cycle_modulus(&self) -> u8 {
        self.cycle_modulus
    }
}

/// Time of the last decoded reading, shared between the live loop and the watchdog.
#[derive(Debug)]
pub struct LivenessClock {
    last_reading_at: Mutex<Instant>,
}

impl LivenessClock {
    /// Starts the clock `grace` in the future so the first refresh is deferred.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            last_reading_at: Mutex::new(Instant::now() + grace),
        }
    }

    /// Records that a reading was decoded now.
    pub fn touch(&self) {
        *self
            .last_reading_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time of the last reading, or the deferred start.
    #[must_use]
    pub fn last_reading_at(&self) -> Instant {
        *self
            .last_reading_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Time since the last reading; zero while the start is still deferred.
    #[must_use]
    pub fn since_last_reading(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_reading_at())
    }
}

/// Wrapping counter that drives the command policy.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CycleCounter {
    value: u8,
    modulus: u8,
}

impl CycleCounter {
    #[must_use]
    pub fn new(modulus: u8) -> Self {
        Self {
            value: 0,
            modulus: modulus.max(1),
        }
    }

    /// Returns the current value and moves to the next one.
    pub fn advance(&mut self) -> u8 {
        let current = self.value;
        self.value = (self.value + 1) % self.modulus;
        current
    }
}

/// Decides which command, if any, the watchdog sends on a given cycle.
pub trait CommandPolicy: Send {
    fn next_action(&mut self, cycle: u8) -> Option<Intent>;
}

/// Cycles the inverter through eco, on and off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoCadence;

impl CommandPolicy for DemoCadence {
    fn next_action(&mut self, cycle: u8) -> Option<Intent> {
        match cycle {
            20 => Some(Intent::PowerSwitch(PowerSwitchState::Eco)),
            50 => Some(Intent::PowerSwitch(PowerSwitchState::On)),
            70 => Some(Intent::PowerSwitch(PowerSwitchState::Off)),
            _ => None,
        }
    }
}

/// Never sends commands; only keepalive refreshes go out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommands;

impl CommandPolicy for NoCommands {
    fn next_action(&mut self, _cycle: u8) -> Option<Intent> {
        None
    }
}

/// What one tick should write.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TickPlan {
    refresh: bool,
    command: Option<Intent>,
}

impl TickPlan {
    /// Whether the link looks stale and needs a refresh.
    #[must_use]
    pub fn refresh(&self) -> bool {
        self.refresh
    }

    /// Policy command for this cycle.
    #[must_use]
    pub fn command(&self) -> Option<Intent> {
        self.command
    }
}

/// Plans a tick. Staleness and the policy are checked independently.
pub fn plan_tick(
    config: &WatchdogConfig,
    since_last_reading: Duration,
    cycle: u8,
    policy: &mut dyn CommandPolicy,
) -> TickPlan {
    TickPlan {
        refresh: since_last_reading > config.stale_after,
        command: policy.next_action(cycle),
    }
}

/// Counts of what the watchdog did before it stopped.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct WatchdogSummary {
    ticks: u64,
    stale_refreshes: u64,
    commands: u64,
    trailing_refreshes: u64,
    failed_writes: u64,
}

impl WatchdogSummary {
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub fn stale_refreshes(&self) -> u64 {
        self.stale_refreshes
    }

    #[must_use]
    pub fn commands(&self) -> u64 {
        self.commands
    }

    #[must_use]
    pub fn trailing_refreshes(&self) -> u64 {
        self.trailing_refreshes
    }

    #[must_use]
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes
    }
}

/// Periodic keepalive and command scheduler.
pub struct Watchdog<'a> {
    config: WatchdogConfig,
    clock: &'a LivenessClock,
    policy: Box<dyn CommandPolicy>,
}

impl<'a> Watchdog<'a> {
    #[must_use]
    pub fn new(
        config: WatchdogConfig,
        clock: &'a LivenessClock,
        policy: Box<dyn CommandPolicy>,
    ) -> Self {
        Self {
            config,
            clock,
            policy,
        }
    }

    /// Ticks until `cancel` fires. The first tick comes one period after the start.
    #[instrument(skip_all, level = "info", fields(tick = ?self.config.tick))]
    pub async fn run(
        mut self,
        session: &DeviceSession,
        cancel: CancellationToken,
    ) -> WatchdogSummary {
        let mut summary = WatchdogSummary::default();
        let mut counter = CycleCounter::new(self.config.cycle_modulus);
        let mut ticker = interval_at(Instant::now() + self.config.tick, self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut trailing_refresh_at: Option<Instant> = None;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = sleep_until(trailing_refresh_at.unwrap_or_else(Instant::now)),
                    if trailing_refresh_at.is_some() =>
                {
                    trailing_refresh_at = None;
                    summary.trailing_refreshes += 1;
                    if !write(session, Intent::Refresh).await {
                        summary.failed_writes += 1;
                    }
                }
                _ = ticker.tick() => {
                    summary.ticks += 1;
                    let cycle = counter.advance();
                    let plan = plan_tick(
                        &self.config,
                        self.clock.since_last_reading(),
                        cycle,
                        self.policy.as_mut(),
                    );

                    if plan.refresh {
                        debug!(cycle, "no recent readings; refreshing");
                        summary.stale_refreshes += 1;
                        if !write(session, Intent::Refresh).await {
                            summary.failed_writes += 1;
                        }
                    }
                    if let Some(intent) = plan.command {
                        info!(cycle, %intent, "sending scheduled command");
                        summary.commands += 1;
                        if !write(session, intent).await {
                            summary.failed_writes += 1;
                        }
                        trailing_refresh_at =
                            Some(Instant::now() + self.config.trailing_refresh_delay);
                    }
                }
            }
        }

        info!(
            ticks = summary.ticks,
            stale_refreshes = summary.stale_refreshes,
            commands = summary.commands,
            "watchdog stopped"
        );
        summary
    }
}

async fn write(session: &DeviceSession, intent: Intent) -> bool {
    match send_intent(session, intent).await {
        Ok(()) => true,
        Err(error) => {
            warn!(%intent, error = %error, "watchdog write failed; dropping it");
            false
        }
    }
}
