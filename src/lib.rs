mod app;
mod cli;
mod controller;
mod error;
mod handlers;
mod hw;
mod protocol;
mod reading;
mod reassembly;
mod telemetry;
mod terminal;
mod utils;
mod watchdog;

pub use app::{
    RunSettings, SessionHandler, fake_hardware_client, real_hardware_client, run,
    run_with_clients, run_with_settings,
};
pub use cli::{
    Args, Command, FakeArgs, LogLevel, MonitorArgs, OutputFormat, PowerArgs, PowerMode,
};
pub use controller::{
    DiscoveryReport, LiveStopReason, LiveSummary, NOTIFICATION_QUEUE_DEPTH, ReadingObserver,
    SessionController, SessionOptions, SessionPhase, SessionSummary, run_session,
};
pub use error::{FixtureError, InteractionError, ProtocolError};
pub use handlers::{
    Command as DeviceCommand, CommandCodec, HANDSHAKE_SEQUENCE, HandshakeHandler,
    HandshakeReport, Intent, PowerHandler, RefreshHandler,
};
pub use hw::{
    ChannelMap, CharacteristicInfo, DeviceSelector, DeviceSession, FoundDevice, HardwareClient,
    InboundNotification, NotificationStopReason, RecordedWrite, ServiceInfo, WriteLog,
};
pub use protocol::EndpointId;
pub use reading::{
    FRAME_LEN, FrameDecodeError, FrameDecoder, OutputPower, PowerState, PowerSwitchState,
    Reading, SHORT_FRAME_LEN,
};
pub use reassembly::{BURST_MARKER, BulkReassembler};
pub use terminal::TerminalClient;
pub use watchdog::{
    CommandPolicy, CycleCounter, DemoCadence, LivenessClock, NoCommands, TickPlan, Watchdog,
    WatchdogConfig, WatchdogSummary, plan_tick,
};
