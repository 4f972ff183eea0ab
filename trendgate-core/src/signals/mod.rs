//! Entry signal evaluation.

pub mod evaluator;
pub mod predicate;

pub use evaluator::{SignalEvaluator, Verdict};
pub use predicate::{
    ChopFilter, EntryPredicate, EvalContext, HtfTrend, LtfAlignment, LtfConfirmation, NewsBlackout,
    TrendStrength, VolumeConfirmation,
};
