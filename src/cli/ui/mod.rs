mod device_view;
mod inspect_view;
mod painter;
mod reading_view;
mod summary_view;
mod table;

pub(crate) use self::inspect_view::InspectView;
pub(crate) use self::painter::Painter;
pub(crate) use self::reading_view::ConsoleObserver;
pub(crate) use self::summary_view::{MonitorReadyView, PowerResultView, SessionSummaryView};
