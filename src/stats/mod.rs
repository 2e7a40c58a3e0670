//! Statistics module - per-school means, join and correlation

mod calculator;

pub use calculator::{
    CorrelationMatrix, FieldRow, MergedRow, OverviewRow, StatsCalculator, StatsError,
    SummaryRow, DESCRIPTIVE_ONLY_MAX_OBSERVATIONS,
};
