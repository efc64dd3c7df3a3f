pub mod commands;
pub mod console;
pub mod display;
pub mod exercise;
pub mod permissions;
pub mod queue;
pub mod session;
pub mod settings;
pub mod speech;
pub mod state;
pub mod store;

pub use commands::{interpret, WorkoutCommand};
pub use display::{EventSink, WorkoutEvent};
pub use exercise::{Catalog, CatalogFilter, Exercise};
pub use session::{SessionStatus, WorkoutSession, WorkoutSnapshot};
pub use settings::WorkoutSettings;
pub use state::{Backends, ControllerError, WorkoutController};
