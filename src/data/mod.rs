//! Data module - file resolution, loading and presentation frames
//!
//! ```text
//!  data dir ──► matcher ──► loader / workbook ──► SchoolTable<records>
//!                               │                        │
//!                             cache                    frames
//! ```

pub mod cache;
pub mod frames;
pub mod loader;
pub mod matcher;
pub mod model;
mod workbook;

pub use cache::LoadCache;
pub use frames::{FrameError, Frames, SchoolSelection};
pub use loader::{DataLoader, EnvironmentLoad, LoaderError, SchoolFailure};
pub use matcher::{find_file, MatchError, NameMatcher};
pub use model::{EnvironmentRecord, Field, GrowthRecord, Measured, School, SchoolTable};
pub use workbook::{read_growth_workbook, LEAF_COUNT_COLUMN, SHOOT_LENGTH_COLUMN, WEIGHT_COLUMN};
