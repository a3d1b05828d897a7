pub mod backtest;
pub mod config;
pub mod crossover;
pub mod gap;
pub mod indicators;
pub mod optimizer;

pub use backtest::{simulate, BacktestResult, Trade};
pub use config::AnalysisConfig;
pub use crossover::{detect_crossovers, SignalSeries};
pub use gap::{classify_trend, ma_gaps};
pub use indicators::{compute_moving_averages, MaSet, MovingAverageSeries};
pub use optimizer::{optimize, ChartPoint, Optimization, PairResult};
